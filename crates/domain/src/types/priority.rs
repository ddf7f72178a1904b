use serde::{Deserialize, Serialize};

use crate::impl_wire_name;

/// Dispatch priority.
///
/// Ordering follows urgency: `High > Normal > Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl_wire_name!(Priority {
    Low => "low",
    Normal => "normal",
    High => "high",
});

impl Priority {
    /// One step less urgent; `Low` stays `Low`.
    #[must_use]
    pub const fn demote(self) -> Self {
        match self {
            Self::High => Self::Normal,
            Self::Normal | Self::Low => Self::Low,
        }
    }
}
