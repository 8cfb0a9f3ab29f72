//! Status command.

use auth_reconciler::{Identity, RecoveryPrompt, SessionState};
use serde::Serialize;

use super::print_prompt;
use crate::app::SessionApp;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: SessionState,
    pub identity: Option<Identity>,
    pub cached: Option<Identity>,
    pub guest_mode: bool,
    pub remote_verified: bool,
    pub transition_pending: bool,
    pub transition_stuck: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryPrompt>,
}

/// Build a report from local state only.
///
/// Nothing here touches the network, so on a fresh process with a cached
/// user the status is `divergent` until a repair verifies it.
pub fn report(app: &SessionApp) -> StatusReport {
    let reconciler = app.reconciler();
    let status = reconciler.reconcile();
    let snapshot = reconciler.snapshot();

    StatusReport {
        status,
        identity: snapshot.in_memory,
        cached: snapshot.cached,
        guest_mode: reconciler.is_guest(),
        remote_verified: reconciler.remote_verified(),
        transition_pending: reconciler
            .transition_marker()
            .is_some_and(|marker| marker.is_pending()),
        transition_stuck: reconciler.is_transition_stuck(),
        recovery: app.handle.recovery_prompt(),
    }
}

pub fn run(app: &SessionApp) -> bool {
    let report = report(app);
    output::print_json(&report);
    print_prompt(report.recovery.clone());
    report.status != SessionState::Unrecoverable
}
