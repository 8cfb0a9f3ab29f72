//! UI-facing session API.

use crate::{
    CheckerConfig, CheckerHandle, Identity, Navigation, Reconciler, RecoveryAction, RecoveryPanel,
    RecoveryPrompt, RepairGate, SessionChecker, SessionState, SessionView,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// What views hold on to. Cheap to clone.
///
/// Manual repairs and the background checker share one debounce window.
#[derive(Clone)]
pub struct SessionHandle {
    reconciler: Arc<Reconciler>,
    gate: Arc<RepairGate>,
    checker_config: CheckerConfig,
}

impl SessionHandle {
    pub fn new(reconciler: Arc<Reconciler>, checker_config: CheckerConfig) -> Self {
        Self {
            gate: Arc::new(RepairGate::new(checker_config.repair_debounce)),
            reconciler,
            checker_config,
        }
    }

    /// Start the background checker for this session.
    pub fn start_checker(&self) -> CheckerHandle {
        SessionChecker::new(
            self.reconciler.clone(),
            self.gate.clone(),
            self.checker_config.clone(),
        )
        .spawn()
    }

    /// Reactive view of the identity and trust status.
    pub fn use_session_state(&self) -> watch::Receiver<SessionView> {
        self.reconciler.subscribe()
    }

    pub fn current(&self) -> SessionView {
        self.reconciler.current()
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Debounced manual repair.
    pub async fn request_repair(&self) -> bool {
        self.gate.acquire().await;
        self.reconciler.repair().await
    }

    pub async fn sign_out(&self) -> SessionState {
        self.reconciler.sign_out().await
    }

    pub fn continue_as_guest(&self) -> Identity {
        self.reconciler.continue_as_guest()
    }

    pub fn mark_transition_start(&self) {
        self.reconciler.mark_transition_start();
    }

    pub fn mark_transition_complete(&self, identity: Identity) -> SessionState {
        self.reconciler.mark_transition_complete(identity)
    }

    /// The recovery panel, if it should be visible.
    pub fn recovery_prompt(&self) -> Option<RecoveryPrompt> {
        RecoveryPanel::prompt(
            self.reconciler.state(),
            self.reconciler.is_transition_stuck(),
        )
    }

    pub async fn perform_recovery(&self, action: RecoveryAction) -> Navigation {
        info!(action = ?action, "Recovery action selected");
        match action {
            RecoveryAction::Fix => {
                let repaired = self.request_repair().await;
                if repaired && self.current().identity.is_some() {
                    Navigation::Authenticated
                } else {
                    Navigation::SignIn
                }
            }
            RecoveryAction::ClearAndSignIn => {
                self.reconciler.clear_local_state();
                Navigation::SignIn
            }
            RecoveryAction::ContinueAsGuest => {
                self.reconciler.continue_as_guest();
                Navigation::Authenticated
            }
        }
    }
}
