//! Supabase adapter errors.

use auth_reconciler::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupabaseError {
    /// Transport or decode failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered and refused the request
    #[error("Rejected by server: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 5xx or rate-limited; the server did not really answer
    #[error("Server unavailable: HTTP {status}")]
    Unavailable { status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Malformed or failed OAuth callback
    #[error("Redirect error: {0}")]
    Redirect(String),

    #[error("Storage error: {0}")]
    Storage(#[from] session_storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SupabaseError {
    /// Returns true if the server could not be reached or did not answer.
    pub fn is_transient(&self) -> bool {
        match self {
            SupabaseError::Http(e) => !e.is_decode() && !e.is_builder(),
            SupabaseError::Unavailable { .. } => true,
            _ => false,
        }
    }
}

impl From<SupabaseError> for AuthError {
    fn from(err: SupabaseError) -> Self {
        if err.is_transient() {
            return AuthError::Network(err.to_string());
        }
        match err {
            SupabaseError::Storage(e) => e.into(),
            SupabaseError::Json(e) => AuthError::Json(e),
            SupabaseError::InvalidUrl(e) => AuthError::Config(e.to_string()),
            other => AuthError::InvalidSession(other.to_string()),
        }
    }
}

pub type SupabaseResult<T> = Result<T, SupabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_transient() {
        let err = SupabaseError::Unavailable { status: 503 };
        assert!(err.is_transient());
        assert!(matches!(AuthError::from(err), AuthError::Network(_)));
    }

    #[test]
    fn test_rejected_maps_to_invalid_session() {
        let err = SupabaseError::Rejected {
            status: 401,
            body: "invalid JWT".to_string(),
        };
        assert!(!err.is_transient());
        let auth: AuthError = err.into();
        assert!(matches!(auth, AuthError::InvalidSession(_)));
        assert!(!auth.is_transient());
    }

    #[test]
    fn test_redirect_error_maps_to_invalid_session() {
        let auth: AuthError = SupabaseError::Redirect("access_denied".to_string()).into();
        assert!(matches!(auth, AuthError::InvalidSession(_)));
    }

    #[test]
    fn test_storage_error_is_preserved() {
        let err = SupabaseError::Storage(session_storage::StorageError::Backend(
            "locked".to_string(),
        ));
        assert!(matches!(AuthError::from(err), AuthError::Storage(_)));
    }
}
