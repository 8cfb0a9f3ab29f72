//! Shared fixtures for reconciler integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use auth_reconciler::{
    AuthError, AuthEvent, AuthResult, CheckerConfig, Identity, Provider, Reconciler,
    ReconcilerConfig, SessionHandle, SessionSource,
};
use parking_lot::Mutex;
use session_storage::{EphemeralMarkers, LocalCache, MemoryStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

/// One scripted answer from the session source.
#[derive(Debug, Clone)]
pub enum Reply {
    Session(Identity),
    NoSession,
    Offline,
    Rejected,
    /// Never answers; exercises the repair timeout.
    Hang,
}

impl Reply {
    async fn resolve(self) -> AuthResult<Option<Identity>> {
        match self {
            Reply::Session(identity) => Ok(Some(identity)),
            Reply::NoSession => Ok(None),
            Reply::Offline => Err(AuthError::Network("connection refused".to_string())),
            Reply::Rejected => Err(AuthError::InvalidSession("refresh token revoked".to_string())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Session source driven by queued replies, falling back to a default.
pub struct ScriptedSource {
    get_replies: Mutex<VecDeque<Reply>>,
    refresh_replies: Mutex<VecDeque<Reply>>,
    default_reply: Mutex<Reply>,
    get_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    hold_next_get: AtomicBool,
    /// Signalled when a held `get_session` call is waiting.
    pub entered: Notify,
    /// Releases a held `get_session` call.
    pub release: Notify,
    events: broadcast::Sender<AuthEvent>,
}

impl ScriptedSource {
    pub fn new(default_reply: Reply) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            get_replies: Mutex::new(VecDeque::new()),
            refresh_replies: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(default_reply),
            get_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            hold_next_get: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
            events,
        })
    }

    pub fn set_default(&self, reply: Reply) {
        *self.default_reply.lock() = reply;
    }

    pub fn push_get(&self, reply: Reply) {
        self.get_replies.lock().push_back(reply);
    }

    pub fn push_refresh(&self, reply: Reply) {
        self.refresh_replies.lock().push_back(reply);
    }

    /// Make the next `get_session` wait for `release`.
    pub fn hold_next_get(&self) {
        self.hold_next_get.store(true, Ordering::SeqCst);
    }

    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Total number of calls that would touch the network.
    pub fn network_calls(&self) -> usize {
        self.get_calls() + self.refresh_calls() + self.sign_out_calls()
    }

    fn next(&self, queue: &Mutex<VecDeque<Reply>>) -> Reply {
        queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.lock().clone())
    }
}

#[async_trait]
impl SessionSource for ScriptedSource {
    async fn get_session(&self) -> AuthResult<Option<Identity>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.next(&self.get_replies);

        if self.hold_next_get.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        reply.resolve().await
    }

    async fn refresh_session(&self) -> AuthResult<Option<Identity>> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.next(&self.refresh_replies);
        reply.resolve().await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// A reconciler wired to in-memory storage the test can inspect.
pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub reconciler: Arc<Reconciler>,
    pub handle: SessionHandle,
    pub cache: LocalCache,
    pub markers: EphemeralMarkers,
}

impl Harness {
    pub fn new(source: Arc<ScriptedSource>) -> Self {
        Self::with_configs(source, ReconcilerConfig::default(), CheckerConfig::default())
    }

    pub fn with_configs(
        source: Arc<ScriptedSource>,
        reconciler_config: ReconcilerConfig,
        checker_config: CheckerConfig,
    ) -> Self {
        let cache_store = Arc::new(MemoryStore::new());
        let marker_store = Arc::new(MemoryStore::new());

        let reconciler = Arc::new(Reconciler::new(
            source.clone(),
            LocalCache::new(Box::new(cache_store.clone())),
            EphemeralMarkers::new(Box::new(marker_store.clone())),
            reconciler_config,
        ));
        let handle = SessionHandle::new(reconciler.clone(), checker_config);

        Self {
            source,
            reconciler,
            handle,
            cache: LocalCache::new(Box::new(cache_store)),
            markers: EphemeralMarkers::new(Box::new(marker_store)),
        }
    }

    pub fn cached_user(&self) -> Option<Identity> {
        self.cache.user::<Identity>().unwrap()
    }

    pub fn in_memory(&self) -> Option<Identity> {
        self.reconciler.current().identity
    }
}

pub fn user(id: &str) -> Identity {
    Identity::new(id, Some(format!("{}@example.com", id)), Provider::Password)
}

pub fn google_user(id: &str) -> Identity {
    Identity::new(id, Some(format!("{}@gmail.com", id)), Provider::OauthGoogle)
}
