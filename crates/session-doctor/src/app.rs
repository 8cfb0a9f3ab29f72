//! Root composition: wires storage, the Supabase source and the reconciler.

use std::sync::Arc;

use auth_reconciler::{CheckerConfig, Reconciler, ReconcilerConfig, SessionHandle};
use session_config_and_utils::{Config, Paths};
use session_storage::{EphemeralMarkers, FileStore, LocalCache};
use supabase_session_source::{SupabaseSessionSource, TokenStore};
use tracing::debug;

/// Everything a command needs.
pub struct SessionApp {
    pub config: Config,
    pub source: Arc<SupabaseSessionSource>,
    pub handle: SessionHandle,
}

impl SessionApp {
    pub fn open(paths: &Paths, config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        paths.ensure_dirs()?;

        let tokens = TokenStore::new(Box::new(FileStore::open(paths.auth_token_file())?));
        let source = Arc::new(SupabaseSessionSource::new(
            config.supabase_url()?,
            config.supabase_publishable_key.clone(),
            tokens,
        ));

        let cache = LocalCache::new(Box::new(FileStore::open(paths.local_cache_file())?));
        let markers =
            EphemeralMarkers::new(Box::new(FileStore::open(paths.ephemeral_markers_file())?));

        let reconciler = Arc::new(Reconciler::new(
            source.clone(),
            cache,
            markers,
            ReconcilerConfig::from(&config.timings),
        ));
        let handle = SessionHandle::new(reconciler, CheckerConfig::from(&config.timings));

        debug!(base_dir = %paths.base_dir().display(), "Session app ready");

        Ok(Self {
            config,
            source,
            handle,
        })
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        self.handle.reconciler()
    }
}
