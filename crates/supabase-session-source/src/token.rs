//! Persisted Supabase tokens and the wire types they come from.

use crate::SupabaseResult;
use auth_reconciler::{Identity, Provider};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use session_storage::KeyValueStore;
use tracing::warn;

/// Storage key for the token record.
pub const TOKEN_STORAGE_KEY: &str = "sb-auth-token";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// User object returned by `/auth/v1/user` and token grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupabaseUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// Response body of `/auth/v1/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: SupabaseUser,
}

/// What is persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    pub user: SupabaseUser,
}

impl TokenRecord {
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now + Duration::seconds(response.expires_in),
            issued_at: Some(now),
            user: response.user,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn identity(&self) -> Identity {
        let provider = self
            .user
            .app_metadata
            .provider
            .as_deref()
            .map(Provider::from_provider_name)
            .unwrap_or(Provider::Password);

        Identity {
            id: self.user.id.clone(),
            email: self.user.email.clone(),
            provider,
            issued_at: self.issued_at,
            expires_at: Some(self.expires_at),
        }
    }
}

/// Token persistence.
pub struct TokenStore {
    storage: Box<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Load the token record; a corrupt record is discarded.
    pub fn load(&self) -> SupabaseResult<Option<TokenRecord>> {
        let Some(raw) = self.storage.get(TOKEN_STORAGE_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(error = %e, "Discarding corrupt token record");
                self.storage.delete(TOKEN_STORAGE_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, record: &TokenRecord) -> SupabaseResult<()> {
        let json = serde_json::to_string(record)?;
        self.storage.set(TOKEN_STORAGE_KEY, &json)?;
        Ok(())
    }

    pub fn clear(&self) -> SupabaseResult<bool> {
        Ok(self.storage.delete(TOKEN_STORAGE_KEY)?)
    }
}
