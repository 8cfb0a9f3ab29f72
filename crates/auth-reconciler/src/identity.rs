//! Signed-in identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Password,
    OauthGoogle,
    OauthGithub,
    /// Local-only identity; never originates from the session source.
    Guest,
}

impl Provider {
    /// Maps a provider name as reported by the auth backend.
    ///
    /// Unknown names fall back to `Password`; `Guest` is never produced here.
    pub fn from_provider_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "google" | "oauth-google" => Provider::OauthGoogle,
            "github" | "oauth-github" => Provider::OauthGithub,
            _ => Provider::Password,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Password => "password",
            Provider::OauthGoogle => "oauth-google",
            Provider::OauthGithub => "oauth-github",
            Provider::Guest => "guest",
        }
    }
}

/// The signed-in user as seen by every session source.
///
/// Equality is structural; two sources agree only if every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: Option<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            email,
            provider,
            issued_at: None,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self.expires_at = Some(expires_at);
        self
    }

    /// A fresh guest identity with a random id.
    pub fn guest() -> Self {
        Self::guest_with_id(format!("guest-{}", Uuid::new_v4()))
    }

    pub fn guest_with_id(id: impl Into<String>) -> Self {
        Self::new(id, None, Provider::Guest)
    }

    pub fn is_guest(&self) -> bool {
        self.provider == Provider::Guest
    }

    /// Guests never expire; identities without an expiry are taken at face value.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) if !self.is_guest() => expires_at <= now,
            _ => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
