//! Declarative recovery UI state.

use crate::SessionState;
use serde::Serialize;

/// A user-selectable way out of a broken session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Retry reconciliation once.
    Fix,
    /// Wipe local state and go to sign-in.
    ClearAndSignIn,
    /// Enter guest mode.
    ContinueAsGuest,
}

impl RecoveryAction {
    pub const ALL: [RecoveryAction; 3] = [
        RecoveryAction::Fix,
        RecoveryAction::ClearAndSignIn,
        RecoveryAction::ContinueAsGuest,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecoveryAction::Fix => "Fix",
            RecoveryAction::ClearAndSignIn => "Clear & sign in",
            RecoveryAction::ContinueAsGuest => "Continue as guest",
        }
    }
}

/// Where the UI should go after a recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    Authenticated,
    SignIn,
}

/// Why the recovery panel is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryReason {
    Unrecoverable,
    TransitionStuck,
}

/// Content of the recovery panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryPrompt {
    pub reason: RecoveryReason,
    pub headline: &'static str,
    pub detail: &'static str,
    pub actions: [RecoveryAction; 3],
}

/// Derives whether the recovery panel is visible.
pub struct RecoveryPanel;

impl RecoveryPanel {
    /// Visible iff the session is unrecoverable or a redirect transition is
    /// stuck.
    pub fn prompt(status: SessionState, transition_stuck: bool) -> Option<RecoveryPrompt> {
        if status.needs_recovery() {
            return Some(RecoveryPrompt {
                reason: RecoveryReason::Unrecoverable,
                headline: "We couldn't restore your session",
                detail: "Your saved sign-in could not be verified. Try again, start over, or continue without an account.",
                actions: RecoveryAction::ALL,
            });
        }

        if transition_stuck {
            return Some(RecoveryPrompt {
                reason: RecoveryReason::TransitionStuck,
                headline: "Sign-in is taking longer than expected",
                detail: "The sign-in window did not return. Try again, start over, or continue without an account.",
                actions: RecoveryAction::ALL,
            });
        }

        None
    }
}
