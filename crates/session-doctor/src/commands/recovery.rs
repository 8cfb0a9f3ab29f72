//! Repair and recovery commands.

use auth_reconciler::{Navigation, RecoveryAction, SessionState};
use tracing::{info, warn};

use super::print_prompt;
use crate::app::SessionApp;
use crate::output;

/// Reconcile, then repair until consistent or the retry budget runs out.
pub async fn repair(app: &SessionApp) -> bool {
    let reconciler = app.reconciler();
    let before = reconciler.reconcile();
    info!(state = %before, "Starting repair");

    let budget = reconciler.config().retry_budget.max(1);
    for attempt in 1..=budget {
        if app.handle.request_repair().await {
            break;
        }
        warn!(
            attempt,
            budget,
            failures = reconciler.consecutive_failures(),
            "Repair attempt failed"
        );
        if reconciler.state() == SessionState::Unrecoverable {
            break;
        }
    }

    let state = reconciler.state();
    let view = app.handle.current();
    output::print_row("state", &state.to_string());
    match &view.identity {
        Some(identity) => output::print_row(
            "identity",
            identity.email.as_deref().unwrap_or(&identity.id),
        ),
        None => output::print_row("identity", "signed out"),
    }
    print_prompt(app.handle.recovery_prompt());

    state == SessionState::Consistent
}

pub async fn clear(app: &SessionApp) -> bool {
    let navigation = app
        .handle
        .perform_recovery(RecoveryAction::ClearAndSignIn)
        .await;
    output::print_success("Local session cleared. Sign in again to continue.");
    navigation == Navigation::SignIn
}

pub async fn guest(app: &SessionApp) -> bool {
    let navigation = app
        .handle
        .perform_recovery(RecoveryAction::ContinueAsGuest)
        .await;
    if let Some(identity) = app.handle.current().identity {
        output::print_success(&format!("Continuing as guest {}", identity.id));
    }
    navigation == Navigation::Authenticated
}
