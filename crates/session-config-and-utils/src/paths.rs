//! File system paths.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the user's home.
const BASE_DIR_NAME: &str = ".session-doctor";

/// Manages file system paths for cached session state and logs.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.session-doctor)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.session-doctor`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Durable local cache (user / guestUser).
    pub fn local_cache_file(&self) -> PathBuf {
        self.base_dir.join("local_cache.json")
    }

    /// Transition markers (authTransitionStart / authTransitionComplete).
    pub fn ephemeral_markers_file(&self) -> PathBuf {
        self.base_dir.join("ephemeral_markers.json")
    }

    /// Session-source token record.
    pub fn auth_token_file(&self) -> PathBuf {
        self.base_dir.join("auth_token.json")
    }

    /// Get the logs directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Structured JSONL log file.
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("session.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
