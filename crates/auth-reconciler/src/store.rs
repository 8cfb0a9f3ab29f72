//! Reactive in-memory session state.

use crate::{Identity, SessionState};
use serde::Serialize;
use tokio::sync::watch;

/// What the UI renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub identity: Option<Identity>,
    pub status: SessionState,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            identity: None,
            status: SessionState::Unknown,
        }
    }
}

/// Single-writer reactive store.
///
/// Only the reconciler writes; any number of readers subscribe. Readers see
/// every committed value but may skip intermediate ones.
pub struct SessionStateStore {
    tx: watch::Sender<SessionView>,
}

impl SessionStateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionView::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SessionView {
        self.tx.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.tx.borrow().identity.clone()
    }

    pub fn status(&self) -> SessionState {
        self.tx.borrow().status
    }

    pub(crate) fn set_identity(&self, identity: Option<Identity>) {
        self.tx.send_if_modified(|view| {
            if view.identity == identity {
                return false;
            }
            view.identity = identity;
            true
        });
    }

    pub(crate) fn set_status(&self, status: SessionState) {
        self.tx.send_if_modified(|view| {
            if view.status == status {
                return false;
            }
            view.status = status;
            true
        });
    }
}

impl Default for SessionStateStore {
    fn default() -> Self {
        Self::new()
    }
}
