//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
///
/// These never escape the reconciler; they classify session-source outcomes
/// and are logged.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Session source unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// Session source call exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// Token rejected by the session source
    #[error("Session invalid: {0}")]
    InvalidSession(String),

    /// Cached record failed to parse
    #[error("Corrupt stored record under {key}: {reason}")]
    StorageCorrupt { key: String, reason: String },

    /// Consecutive repair failures reached the budget
    #[error("Repair failed after {0} attempts")]
    RetryBudgetExhausted(u32),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(session_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if the session source could not be reached at all.
    ///
    /// Transient errors mean "no answer"; everything else is an answer
    /// (possibly a rejection).
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::Timeout)
    }
}

impl From<session_storage::StorageError> for AuthError {
    fn from(err: session_storage::StorageError) -> Self {
        match err {
            session_storage::StorageError::Corrupt { key, reason } => {
                AuthError::StorageCorrupt { key, reason }
            }
            other => AuthError::Storage(other),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_network() {
        assert!(AuthError::Network("connection refused".to_string()).is_transient());
    }

    #[test]
    fn test_is_transient_timeout() {
        assert!(AuthError::Timeout.is_transient());
    }

    #[test]
    fn test_is_not_transient_invalid_session() {
        assert!(!AuthError::InvalidSession("revoked".to_string()).is_transient());
    }

    #[test]
    fn test_is_not_transient_budget_exhausted() {
        assert!(!AuthError::RetryBudgetExhausted(3).is_transient());
    }

    #[test]
    fn test_backend_failure_maps_to_storage() {
        let err: AuthError = session_storage::StorageError::Backend("disk full".to_string()).into();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_corrupt_record_maps_to_storage_corrupt() {
        let err: AuthError = session_storage::StorageError::Corrupt {
            key: "user".to_string(),
            reason: "expected value".to_string(),
        }
        .into();
        assert!(matches!(
            &err,
            AuthError::StorageCorrupt { key, .. } if key == "user"
        ));
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "Corrupt stored record under user: expected value");
    }
}
