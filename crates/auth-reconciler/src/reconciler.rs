//! Session reconciliation across the remote session, the durable cache and
//! the in-memory store.
//!
//! The reconciler is the only writer of the in-memory store. Every mutation
//! that must win over an in-flight repair (push events, sign-out, guest
//! entry, manual clear) bumps a generation counter; a repair captures the
//! generation before its first await and commits only if it is unchanged.

use crate::trust_fsm::{SessionState, TrustMachine, TrustMachineInput};
use crate::{AuthError, AuthEvent, AuthEventKind, AuthResult, Identity, SessionSource};
use crate::{SessionStateStore, SessionView};
use chrono::Utc;
use parking_lot::Mutex;
use session_config_and_utils::TimingConfig;
use session_storage::{EphemeralMarkers, GuestRecord, LocalCache, TransitionMarker};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Tunables for repair and transition handling.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Deadline for each session-source call.
    pub repair_timeout: Duration,
    /// Consecutive failed repairs before giving up.
    pub retry_budget: u32,
    /// A pending redirect older than this is stuck.
    pub transition_stuck_after: Duration,
    /// A pending redirect older than this is abandoned.
    pub transition_abandoned_after: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            repair_timeout: Duration::from_secs(8),
            retry_budget: 3,
            transition_stuck_after: Duration::from_secs(10),
            transition_abandoned_after: Duration::from_secs(300),
        }
    }
}

impl From<&TimingConfig> for ReconcilerConfig {
    fn from(timings: &TimingConfig) -> Self {
        Self {
            repair_timeout: Duration::from_millis(timings.repair_timeout_ms),
            retry_budget: timings.retry_budget,
            transition_stuck_after: Duration::from_millis(timings.transition_stuck_after_ms),
            transition_abandoned_after: Duration::from_millis(
                timings.transition_abandoned_after_ms,
            ),
        }
    }
}

/// Point-in-time view of all three sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Last identity the session source confirmed, if any.
    pub remote: Option<Identity>,
    /// Whether `remote` reflects an actual answer from the source.
    pub remote_verified: bool,
    /// Durable cache contents (the guest identity in guest mode).
    pub cached: Option<Identity>,
    pub in_memory: Option<Identity>,
    pub guest_mode: bool,
    pub generation: u64,
}

impl SessionSnapshot {
    /// Agreement rules:
    /// - guest mode: the in-memory identity is the cached guest and no
    ///   remote identity exists
    /// - otherwise: nothing anywhere, or a verified remote identity equal to
    ///   both local copies
    pub fn is_consistent(&self) -> bool {
        if self.guest_mode {
            return self.remote.is_none()
                && matches!(&self.in_memory, Some(identity) if identity.is_guest())
                && self.in_memory == self.cached;
        }

        match (&self.remote, &self.cached, &self.in_memory) {
            (None, None, None) => true,
            (Some(remote), Some(cached), Some(in_memory)) => {
                self.remote_verified && remote == cached && cached == in_memory
            }
            _ => false,
        }
    }

    /// Cheap local check used by periodic polling.
    pub fn presence_mismatch(&self) -> bool {
        self.in_memory.is_some() != self.cached.is_some()
    }
}

/// What the session source said.
enum RemoteAnswer {
    Session(Identity),
    NoSession,
    Unreachable,
}

struct Inner {
    machine: TrustMachine,
    generation: u64,
    remote: Option<Identity>,
    remote_verified: bool,
    consecutive_failures: u32,
}

/// Keeps the three session sources in agreement.
pub struct Reconciler {
    source: Arc<dyn SessionSource>,
    cache: LocalCache,
    markers: EphemeralMarkers,
    store: SessionStateStore,
    config: ReconcilerConfig,
    inner: Mutex<Inner>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn SessionSource>,
        cache: LocalCache,
        markers: EphemeralMarkers,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            source,
            cache,
            markers,
            store: SessionStateStore::new(),
            config,
            inner: Mutex::new(Inner {
                machine: TrustMachine::new(),
                generation: 0,
                remote: None,
                remote_verified: false,
                consecutive_failures: 0,
            }),
        }
    }

    pub fn source(&self) -> &Arc<dyn SessionSource> {
        &self.source
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Subscribe to the in-memory store.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.store.subscribe()
    }

    pub fn current(&self) -> SessionView {
        self.store.current()
    }

    pub fn state(&self) -> SessionState {
        SessionState::from(self.inner.lock().machine.state())
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// True once the session source has answered at least once since the
    /// last local reset.
    pub fn remote_verified(&self) -> bool {
        self.inner.lock().remote_verified
    }

    pub fn is_guest(&self) -> bool {
        self.read_guest().is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        self.snapshot_locked(&inner)
    }

    /// Compare the three sources and record agreement or disagreement.
    ///
    /// Never touches the network and never mutates session data.
    pub fn reconcile(&self) -> SessionState {
        let mut inner = self.inner.lock();
        let snapshot = self.snapshot_locked(&inner);
        let input = if snapshot.is_consistent() {
            TrustMachineInput::Agree
        } else {
            TrustMachineInput::Disagree
        };

        debug!(
            generation = snapshot.generation,
            guest_mode = snapshot.guest_mode,
            remote_verified = snapshot.remote_verified,
            has_remote = snapshot.remote.is_some(),
            has_cached = snapshot.cached.is_some(),
            has_in_memory = snapshot.in_memory.is_some(),
            consistent = matches!(input, TrustMachineInput::Agree),
            "Reconciled session sources"
        );

        self.transition(&mut inner, &input)
    }

    /// Attempt once to bring all sources into agreement.
    ///
    /// Priority: guest mode, then a valid remote session, then a single
    /// refresh attempt, then the logged-out state. If the source cannot be
    /// reached at all, the in-memory identity is cleared while the durable
    /// cache is kept, and the attempt counts against the retry budget.
    ///
    /// Returns true if the sources agree afterwards. A result superseded by
    /// a newer generation is discarded.
    pub async fn repair(&self) -> bool {
        let generation = self.inner.lock().generation;

        if let Some(record) = self.read_guest() {
            return self.commit_guest(generation, Identity::guest_with_id(record.id));
        }

        let has_local = self.store.identity().is_some() || self.read_cached_user().is_some();

        let unreachable = match self.ask("get_session", self.source.get_session()).await {
            RemoteAnswer::Session(identity) => return self.commit_remote(generation, identity),
            RemoteAnswer::NoSession => false,
            RemoteAnswer::Unreachable => true,
        };

        if !has_local {
            return self.commit_logged_out(generation, !unreachable);
        }

        match self
            .ask("refresh_session", self.source.refresh_session())
            .await
        {
            RemoteAnswer::Session(identity) => self.commit_remote(generation, identity),
            RemoteAnswer::NoSession => self.commit_logged_out(generation, true),
            RemoteAnswer::Unreachable => self.fail_closed(generation),
        }
    }

    /// Apply a push event from the session source.
    ///
    /// Events are authoritative and win over any in-flight repair. While in
    /// guest mode only explicit sign-in, sign-up and sign-out are honored.
    pub fn apply_event(&self, event: AuthEvent) -> SessionState {
        let mut inner = self.inner.lock();
        let guest_mode = self.read_guest().is_some();

        match event.kind {
            AuthEventKind::SignedOut => {
                self.bump_generation(&mut inner);
                if let Err(e) = self.cache.clear_all() {
                    warn!(error = %e, "Failed to clear cache on sign-out");
                }
                inner.remote = None;
                inner.remote_verified = true;
                self.store.set_identity(None);
                info!(generation = inner.generation, "Signed out");
            }
            kind => {
                if guest_mode && !kind.is_explicit() {
                    debug!(kind = ?kind, "Ignoring auth event in guest mode");
                    return SessionState::from(inner.machine.state());
                }

                let Some(identity) = event.identity.filter(|identity| !identity.is_guest())
                else {
                    warn!(kind = ?kind, "Auth event without a usable identity, ignoring");
                    return SessionState::from(inner.machine.state());
                };

                self.bump_generation(&mut inner);
                if guest_mode {
                    info!("Leaving guest mode");
                    if let Err(e) = self.cache.clear_guest() {
                        warn!(error = %e, "Failed to clear guest record");
                    }
                }
                if let Err(e) = self.cache.set_user(&identity) {
                    warn!(error = %e, "Failed to persist session from auth event");
                }
                self.complete_pending_transition();

                info!(
                    kind = ?kind,
                    user_id = %identity.id,
                    generation = inner.generation,
                    "Applied auth event"
                );
                inner.remote = Some(identity.clone());
                inner.remote_verified = true;
                self.store.set_identity(Some(identity));
            }
        }

        inner.consecutive_failures = 0;
        self.transition(&mut inner, &TrustMachineInput::AuthEvent)
    }

    /// Sign out remotely (best effort) and clear all local session state.
    pub async fn sign_out(&self) -> SessionState {
        let guest_mode = {
            let mut inner = self.inner.lock();
            self.bump_generation(&mut inner);
            self.read_guest().is_some()
        };

        if !guest_mode {
            match tokio::time::timeout(self.config.repair_timeout, self.source.sign_out()).await {
                Ok(Ok(())) => debug!("Remote sign-out acknowledged"),
                Ok(Err(e)) => warn!(error = %e, "Remote sign-out failed, clearing locally"),
                Err(_) => warn!(
                    error = %AuthError::Timeout,
                    "Remote sign-out timed out, clearing locally"
                ),
            }
        }

        self.apply_event(AuthEvent::signed_out())
    }

    /// Enter guest mode, reusing the existing guest id if already a guest.
    pub fn continue_as_guest(&self) -> Identity {
        let mut inner = self.inner.lock();
        let identity = match self.read_guest() {
            Some(record) => Identity::guest_with_id(record.id),
            None => Identity::guest(),
        };

        self.bump_generation(&mut inner);
        if let Err(e) = self.cache.clear_user() {
            warn!(error = %e, "Failed to clear cached user");
        }
        if let Err(e) = self.cache.set_guest(&GuestRecord::new(identity.id.clone())) {
            warn!(error = %e, "Failed to persist guest record");
        }
        if let Err(e) = self.markers.clear() {
            warn!(error = %e, "Failed to clear transition markers");
        }

        inner.remote = None;
        inner.remote_verified = false;
        inner.consecutive_failures = 0;
        self.store.set_identity(Some(identity.clone()));
        info!(guest_id = %identity.id, "Continuing as guest");

        self.transition(&mut inner, &TrustMachineInput::ManualRecovery);
        identity
    }

    /// Wipe the local cache and transition markers unconditionally.
    pub fn clear_local_state(&self) -> SessionState {
        let mut inner = self.inner.lock();
        self.bump_generation(&mut inner);

        if let Err(e) = self.cache.clear_all() {
            warn!(error = %e, "Failed to clear local cache");
        }
        if let Err(e) = self.markers.clear() {
            warn!(error = %e, "Failed to clear transition markers");
        }

        inner.remote = None;
        inner.remote_verified = false;
        inner.consecutive_failures = 0;
        self.store.set_identity(None);
        info!(generation = inner.generation, "Cleared local session state");

        self.transition(&mut inner, &TrustMachineInput::ManualRecovery)
    }

    // ==========================================
    // Redirect transitions
    // ==========================================

    /// Record that an external redirect login is about to begin.
    pub fn mark_transition_start(&self) {
        self.mark_transition_start_at(now_ms());
    }

    pub fn mark_transition_start_at(&self, now_ms: i64) {
        match self.markers.mark_start(now_ms) {
            Ok(()) => debug!(started_at_ms = now_ms, "Auth transition started"),
            Err(e) => warn!(error = %e, "Failed to record auth transition start"),
        }
    }

    /// Record that the redirect flow returned with `identity`.
    pub fn mark_transition_complete(&self, identity: Identity) -> SessionState {
        if let Err(e) = self.markers.mark_complete(now_ms()) {
            warn!(error = %e, "Failed to record auth transition completion");
        }
        self.apply_event(AuthEvent::signed_in(identity))
    }

    pub fn transition_marker(&self) -> Option<TransitionMarker> {
        match self.markers.marker() {
            Ok(marker) => marker,
            Err(e) => {
                warn!(error = %e, "Failed to read transition markers");
                None
            }
        }
    }

    /// True while a redirect is pending and has not exceeded the stuck timeout.
    pub fn transition_in_flight_at(&self, now_ms: i64) -> bool {
        self.pending_age_ms(now_ms)
            .is_some_and(|age| age <= duration_ms(self.config.transition_stuck_after))
    }

    pub fn transition_in_flight(&self) -> bool {
        self.transition_in_flight_at(now_ms())
    }

    /// True if a redirect started and has exceeded the stuck timeout without
    /// completing. Abandoned markers do not count.
    pub fn is_transition_stuck_at(&self, now_ms: i64) -> bool {
        self.pending_age_ms(now_ms).is_some_and(|age| {
            age > duration_ms(self.config.transition_stuck_after)
                && age <= duration_ms(self.config.transition_abandoned_after)
        })
    }

    pub fn is_transition_stuck(&self) -> bool {
        self.is_transition_stuck_at(now_ms())
    }

    /// Drop a pending marker older than the abandoned timeout.
    pub fn prune_abandoned_transition_at(&self, now_ms: i64) -> bool {
        let abandoned = self
            .pending_age_ms(now_ms)
            .is_some_and(|age| age > duration_ms(self.config.transition_abandoned_after));
        if !abandoned {
            return false;
        }

        match self.markers.clear() {
            Ok(()) => {
                info!("Pruned abandoned auth transition");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to prune abandoned auth transition");
                false
            }
        }
    }

    pub fn prune_abandoned_transition(&self) -> bool {
        self.prune_abandoned_transition_at(now_ms())
    }

    // ==========================================
    // Internals
    // ==========================================

    fn pending_age_ms(&self, now_ms: i64) -> Option<i64> {
        self.transition_marker()
            .filter(TransitionMarker::is_pending)
            .map(|marker| marker.age_ms(now_ms))
    }

    fn complete_pending_transition(&self) {
        if self
            .transition_marker()
            .is_some_and(|marker| marker.is_pending())
        {
            if let Err(e) = self.markers.mark_complete(now_ms()) {
                warn!(error = %e, "Failed to record auth transition completion");
            }
        }
    }

    fn snapshot_locked(&self, inner: &Inner) -> SessionSnapshot {
        let guest = self.read_guest();
        let cached = match &guest {
            Some(record) => Some(Identity::guest_with_id(record.id.clone())),
            None => self.read_cached_user(),
        };

        SessionSnapshot {
            remote: inner.remote.clone(),
            remote_verified: inner.remote_verified,
            cached,
            in_memory: self.store.identity(),
            guest_mode: guest.is_some(),
            generation: inner.generation,
        }
    }

    fn read_guest(&self) -> Option<GuestRecord> {
        match self.cache.guest() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to read guest record");
                None
            }
        }
    }

    fn read_cached_user(&self) -> Option<Identity> {
        match self.cache.user::<Identity>() {
            Ok(Some(identity)) if identity.is_guest() => {
                warn!(user_id = %identity.id, "Cached user carries the guest provider, ignoring");
                None
            }
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Failed to read cached user");
                None
            }
        }
    }

    async fn ask<F>(&self, operation: &'static str, call: F) -> RemoteAnswer
    where
        F: Future<Output = AuthResult<Option<Identity>>>,
    {
        let result = match tokio::time::timeout(self.config.repair_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout),
        };

        match result {
            Ok(Some(identity)) if identity.is_guest() => {
                warn!(operation, "Session source returned a guest identity, ignoring");
                RemoteAnswer::NoSession
            }
            Ok(Some(identity)) if identity.is_expired() => {
                debug!(operation, user_id = %identity.id, "Session source returned an expired session");
                RemoteAnswer::NoSession
            }
            Ok(Some(identity)) => RemoteAnswer::Session(identity),
            Ok(None) => {
                debug!(operation, "Session source reports no session");
                RemoteAnswer::NoSession
            }
            Err(e) if e.is_transient() => {
                warn!(operation, error = %e, "Session source unreachable");
                RemoteAnswer::Unreachable
            }
            Err(e) => {
                info!(operation, error = %e, "Session source rejected the session");
                RemoteAnswer::NoSession
            }
        }
    }

    fn commit_guest(&self, generation: u64, identity: Identity) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return self.superseded(&inner, generation);
        }

        inner.remote = None;
        self.store.set_identity(Some(identity));
        self.record_success(&mut inner)
    }

    fn commit_remote(&self, generation: u64, identity: Identity) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return self.superseded(&inner, generation);
        }

        if let Err(e) = self.cache.set_user(&identity) {
            warn!(error = %e, "Failed to persist repaired session");
            return self.record_failure(&mut inner);
        }
        self.complete_pending_transition();

        info!(user_id = %identity.id, generation, "Repair adopted remote session");
        inner.remote = Some(identity.clone());
        inner.remote_verified = true;
        self.store.set_identity(Some(identity));
        self.record_success(&mut inner)
    }

    fn commit_logged_out(&self, generation: u64, remote_verified: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return self.superseded(&inner, generation);
        }

        if let Err(e) = self.cache.clear_user() {
            warn!(error = %e, "Failed to clear cached user");
            return self.record_failure(&mut inner);
        }

        if self.store.identity().is_some() {
            info!(generation, "Repair cleared local session");
        }
        inner.remote = None;
        inner.remote_verified = remote_verified;
        self.store.set_identity(None);
        self.record_success(&mut inner)
    }

    fn fail_closed(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return self.superseded(&inner, generation);
        }

        warn!(generation, "Session source unreachable, clearing in-memory session");
        inner.remote = None;
        inner.remote_verified = false;
        self.store.set_identity(None);
        self.record_failure(&mut inner)
    }

    fn superseded(&self, inner: &Inner, generation: u64) -> bool {
        debug!(
            started_at = generation,
            current = inner.generation,
            "Discarding superseded repair result"
        );
        SessionState::from(inner.machine.state()) == SessionState::Consistent
    }

    fn record_success(&self, inner: &mut Inner) -> bool {
        inner.consecutive_failures = 0;
        self.transition(inner, &TrustMachineInput::RepairSucceeded);
        true
    }

    fn record_failure(&self, inner: &mut Inner) -> bool {
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let state = self.transition(inner, &TrustMachineInput::RepairFailed);

        if state == SessionState::Divergent
            && inner.consecutive_failures >= self.config.retry_budget
        {
            warn!(
                error = %AuthError::RetryBudgetExhausted(inner.consecutive_failures),
                "Giving up on automatic repair"
            );
            self.transition(inner, &TrustMachineInput::BudgetExhausted);
        }
        false
    }

    fn bump_generation(&self, inner: &mut Inner) {
        inner.generation += 1;
        debug!(generation = inner.generation, "Session generation advanced");
    }

    /// Transition the FSM and mirror the result into the store.
    fn transition(&self, inner: &mut Inner, input: &TrustMachineInput) -> SessionState {
        let old_state = SessionState::from(inner.machine.state());

        if inner.machine.consume(input).is_err() {
            debug!(state = %old_state, input = ?input, "Ignoring impossible trust transition");
            return old_state;
        }

        let new_state = SessionState::from(inner.machine.state());
        if old_state != new_state {
            info!(
                old_state = %old_state,
                new_state = %new_state,
                "Session trust transition"
            );
        }
        self.store.set_status(new_state);
        new_state
    }
}
