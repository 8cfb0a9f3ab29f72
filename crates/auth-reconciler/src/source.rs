//! Boundary to the remote authentication provider.

use crate::{AuthResult, Identity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Kind of push notification from the session source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    SignedUp,
    UserUpdated,
}

impl AuthEventKind {
    /// Explicit user actions; the only events that end guest mode.
    pub fn is_explicit(&self) -> bool {
        matches!(
            self,
            AuthEventKind::SignedIn | AuthEventKind::SignedUp | AuthEventKind::SignedOut
        )
    }
}

/// A push notification from the session source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub identity: Option<Identity>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, identity: Option<Identity>) -> Self {
        Self { kind, identity }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self::new(AuthEventKind::SignedIn, Some(identity))
    }

    pub fn signed_up(identity: Identity) -> Self {
        Self::new(AuthEventKind::SignedUp, Some(identity))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }

    pub fn token_refreshed(identity: Identity) -> Self {
        Self::new(AuthEventKind::TokenRefreshed, Some(identity))
    }

    pub fn user_updated(identity: Identity) -> Self {
        Self::new(AuthEventKind::UserUpdated, Some(identity))
    }
}

/// The remote authentication provider.
///
/// `Ok(None)` means the source answered and has no valid session. `Err` with
/// a transient error means it could not be reached; other errors are
/// rejections.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn get_session(&self) -> AuthResult<Option<Identity>>;

    async fn refresh_session(&self) -> AuthResult<Option<Identity>>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// Subscribe to push events. Each receiver sees every event sent after
    /// the call.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provider;

    #[test]
    fn test_explicit_events() {
        assert!(AuthEventKind::SignedIn.is_explicit());
        assert!(AuthEventKind::SignedUp.is_explicit());
        assert!(AuthEventKind::SignedOut.is_explicit());
        assert!(!AuthEventKind::TokenRefreshed.is_explicit());
        assert!(!AuthEventKind::UserUpdated.is_explicit());
    }

    #[test]
    fn test_event_constructors() {
        let identity = Identity::new("u1", None, Provider::Password);
        let event = AuthEvent::token_refreshed(identity.clone());
        assert_eq!(event.kind, AuthEventKind::TokenRefreshed);
        assert_eq!(event.identity, Some(identity));
        assert!(AuthEvent::signed_out().identity.is_none());
    }

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&AuthEventKind::TokenRefreshed).unwrap();
        assert_eq!(json, "\"token_refreshed\"");
    }
}
