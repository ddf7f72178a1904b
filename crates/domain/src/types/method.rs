use serde::{Deserialize, Serialize};

use crate::impl_wire_name;

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl_wire_name!(Method {
    Get => "get",
    Head => "head",
    Post => "post",
    Put => "put",
    Patch => "patch",
    Delete => "delete",
});

impl Method {
    /// Repeating the request has the same effect as sending it once.
    ///
    /// Only idempotent requests are served from cache or deduplicated by
    /// default.
    pub const fn is_idempotent(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Put | Self::Delete)
    }

    /// Uppercase token as sent on the wire.
    pub const fn as_http(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}
