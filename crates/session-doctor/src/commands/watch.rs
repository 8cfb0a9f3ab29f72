//! Foreground session watcher.

use std::future::Future;

use auth_reconciler::{RecoveryPrompt, SessionView};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::app::SessionApp;
use crate::output;

/// One line of watch output.
#[derive(Debug, Serialize)]
struct WatchLine {
    at: DateTime<Utc>,
    #[serde(flatten)]
    view: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovery: Option<RecoveryPrompt>,
}

/// Run the checker until Ctrl+C.
pub async fn run(app: &SessionApp) -> Result<bool, Box<dyn std::error::Error>> {
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<std::io::Result<()>>();
    tokio::spawn(async move {
        let _ = stop_tx.send(tokio::signal::ctrl_c().await);
    });

    follow(app, async {
        match stop_rx.await {
            Ok(Ok(())) => info!("Received Ctrl+C"),
            Ok(Err(e)) => error!(error = %e, "Failed to listen for Ctrl+C"),
            Err(_) => {}
        }
    })
    .await;
    Ok(true)
}

/// Print every session change until `stop` resolves, then shut the checker down.
pub async fn follow<F: Future<Output = ()>>(app: &SessionApp, stop: F) -> usize {
    let mut views = app.handle.use_session_state();
    let checker = app.handle.start_checker();
    let mut printed = 0;

    emit(app, views.borrow_and_update().clone());
    printed += 1;

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                emit(app, views.borrow_and_update().clone());
                printed += 1;
            }
        }
    }

    checker.shutdown().await;
    printed
}

fn emit(app: &SessionApp, view: SessionView) {
    output::print_json_line(&WatchLine {
        at: Utc::now(),
        view,
        recovery: app.handle.recovery_prompt(),
    });
}
