use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_wire_name;

/// Bearer credential handed out by a credential provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), expires_at: None }
    }

    #[must_use]
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Tokens without an expiry never expire client-side.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Link quality reported by a connectivity oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkQuality {
    Offline,
    Poor,
    Moderate,
    Good,
    #[default]
    Unknown,
}

impl_wire_name!(LinkQuality {
    Offline => "offline",
    Poor => "poor",
    Moderate => "moderate",
    Good => "good",
    Unknown => "unknown",
});
