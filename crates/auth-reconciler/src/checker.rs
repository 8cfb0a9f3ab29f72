//! Background session checker.
//!
//! Decides *when* to reconcile: once on load, once shortly after load (to
//! catch redirect completions that fired no push event), on every push
//! event, and on a low-frequency poll. At most one repair runs at a time,
//! and repairs are debounced through a shared [`RepairGate`].

use crate::{AuthEvent, Reconciler, SessionState};
use parking_lot::Mutex;
use session_config_and_utils::TimingConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Scheduling configuration for the checker.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub poll_interval: Duration,
    pub initial_check_delay: Duration,
    pub repair_debounce: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            initial_check_delay: Duration::from_secs(3),
            repair_debounce: Duration::from_secs(1),
        }
    }
}

impl From<&TimingConfig> for CheckerConfig {
    fn from(timings: &TimingConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(timings.poll_interval_ms),
            initial_check_delay: Duration::from_millis(timings.initial_check_delay_ms),
            repair_debounce: Duration::from_millis(timings.repair_debounce_ms),
        }
    }
}

/// Limits repair attempts to one per debounce window.
pub struct RepairGate {
    debounce: Duration,
    last: Mutex<Option<Instant>>,
}

impl RepairGate {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last: Mutex::new(None),
        }
    }

    /// Claim the window if it is open. Automatic checks skip when this
    /// returns false.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock();
        match *last {
            Some(at) if now.duration_since(at) < self.debounce => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Wait for the window to open, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut last = self.last.lock();
                match *last {
                    Some(at) if now.duration_since(at) < self.debounce => {
                        self.debounce - now.duration_since(at)
                    }
                    _ => {
                        *last = Some(now);
                        return;
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

/// Background task driving reconciliation.
pub struct SessionChecker {
    reconciler: Arc<Reconciler>,
    gate: Arc<RepairGate>,
    config: CheckerConfig,
}

/// Handle to a running checker.
///
/// Dropping the handle also stops the checker.
pub struct CheckerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl CheckerHandle {
    /// Stop the checker and wait for it to exit. An in-flight repair is
    /// aborted.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "Session checker task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl SessionChecker {
    pub fn new(reconciler: Arc<Reconciler>, gate: Arc<RepairGate>, config: CheckerConfig) -> Self {
        Self {
            reconciler,
            gate,
            config,
        }
    }

    /// Start the checker on the current runtime.
    ///
    /// The event subscription is taken before this returns, so no push event
    /// sent afterwards is missed.
    pub fn spawn(self) -> CheckerHandle {
        let events = self.reconciler.source().subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(events, shutdown_rx));
        CheckerHandle { shutdown_tx, join }
    }

    async fn run(
        self,
        mut events: broadcast::Receiver<AuthEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Session checker started"
        );

        let mut in_flight = self.on_load();
        let mut events_open = true;

        let initial_check = tokio::time::sleep(self.config.initial_check_delay);
        tokio::pin!(initial_check);
        let mut initial_check_done = false;

        let mut poll = tokio::time::interval_at(
            Instant::now() + self.config.poll_interval,
            self.config.poll_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv(), if events_open => match event {
                    Ok(event) => {
                        self.reconciler.apply_event(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed auth events, forcing a repair");
                        if in_flight.is_none() {
                            in_flight = self.start_repair("lagged");
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Auth event stream closed");
                        events_open = false;
                    }
                },
                succeeded = join_repair(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    debug!(succeeded, state = %self.reconciler.state(), "Repair finished");
                }
                _ = &mut initial_check, if !initial_check_done => {
                    initial_check_done = true;
                    if in_flight.is_none() {
                        in_flight = self.initial_check();
                    }
                }
                _ = poll.tick() => {
                    if in_flight.is_none() {
                        in_flight = self.poll();
                    }
                }
            }
        }

        if let Some(task) = in_flight {
            task.abort();
        }
        info!("Session checker stopped");
    }

    fn on_load(&self) -> Option<JoinHandle<bool>> {
        match self.reconciler.reconcile() {
            SessionState::Divergent => self.start_repair("load"),
            _ => None,
        }
    }

    /// Catches redirect completions that never produced a push event.
    fn initial_check(&self) -> Option<JoinHandle<bool>> {
        let state = self.reconciler.reconcile();
        if !state.allows_automatic_repair() || self.reconciler.is_guest() {
            return None;
        }

        let transition_pending = self
            .reconciler
            .transition_marker()
            .is_some_and(|marker| marker.is_pending());

        if state == SessionState::Divergent
            || !self.reconciler.remote_verified()
            || transition_pending
        {
            return self.start_repair("initial_check");
        }
        None
    }

    fn poll(&self) -> Option<JoinHandle<bool>> {
        self.reconciler.prune_abandoned_transition();

        if !self.reconciler.state().allows_automatic_repair() {
            debug!("Session unrecoverable, skipping poll");
            return None;
        }
        if self.reconciler.transition_in_flight() {
            debug!("Auth transition in flight, deferring poll");
            return None;
        }

        let presence_mismatch = self.reconciler.snapshot().presence_mismatch();
        let state = self.reconciler.reconcile();
        if presence_mismatch || state == SessionState::Divergent {
            debug!(presence_mismatch, state = %state, "Poll found disagreement");
            return self.start_repair("poll");
        }
        None
    }

    fn start_repair(&self, trigger: &'static str) -> Option<JoinHandle<bool>> {
        if !self.gate.try_acquire() {
            debug!(trigger, "Repair debounced");
            return None;
        }

        debug!(trigger, "Starting repair");
        let reconciler = self.reconciler.clone();
        Some(tokio::spawn(async move { reconciler.repair().await }))
    }
}

async fn join_repair(task: &mut Option<JoinHandle<bool>>) -> bool {
    match task.as_mut() {
        Some(handle) => match handle.await {
            Ok(succeeded) => succeeded,
            Err(e) => {
                warn!(error = %e, "Repair task failed");
                false
            }
        },
        None => std::future::pending().await,
    }
}
