//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://random.supabase.co",
};

/// Default Supabase publishable key (can be overridden at compile time via SUPABASE_PUBLISHABLE_KEY env var).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "random-key",
};

/// Where OAuth providers send the browser back to.
pub const DEFAULT_REDIRECT_URL: &str = match option_env!("SESSION_DOCTOR_REDIRECT_URL") {
    Some(url) => url,
    None => "http://localhost:3000/auth/callback",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Reconciliation timings, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Low-frequency presence poll.
    pub poll_interval_ms: u64,
    /// One-shot check after load, to catch redirect completions without a push event.
    pub initial_check_delay_ms: u64,
    /// Upper bound on any single session-source call during repair.
    pub repair_timeout_ms: u64,
    /// Minimum spacing between repair attempts.
    pub repair_debounce_ms: u64,
    /// A pending redirect older than this is reported as stuck.
    pub transition_stuck_after_ms: u64,
    /// A pending redirect older than this is abandoned and pruned.
    pub transition_abandoned_after_ms: u64,
    /// Consecutive failed repairs before giving up.
    pub retry_budget: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            initial_check_delay_ms: 3_000,
            repair_timeout_ms: 8_000,
            repair_debounce_ms: 1_000,
            transition_stuck_after_ms: 10_000,
            transition_abandoned_after_ms: 5 * 60 * 1_000,
            retry_budget: 3,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> CoreResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(CoreError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry_budget == 0 {
            return Err(CoreError::Config(
                "retry_budget must be at least 1".to_string(),
            ));
        }
        if self.transition_abandoned_after_ms < self.transition_stuck_after_ms {
            return Err(CoreError::Config(
                "transition_abandoned_after_ms must not be shorter than transition_stuck_after_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// OAuth redirect target.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    /// Reconciliation timings.
    #[serde(default)]
    pub timings: TimingConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_redirect_url() -> String {
    DEFAULT_REDIRECT_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_publishable_key: default_supabase_publishable_key(),
            redirect_url: default_redirect_url(),
            timings: TimingConfig::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.timings.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(level) = env_override("SESSION_DOCTOR_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = env_override("SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = env_override("SUPABASE_PUBLISHABLE_KEY") {
            self.supabase_publishable_key = key;
        }
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Get the OAuth redirect URL as a parsed URL.
    pub fn redirect_url(&self) -> CoreResult<Url> {
        Url::parse(&self.redirect_url).map_err(CoreError::from)
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.supabase_url, DEFAULT_SUPABASE_URL);
        assert_eq!(
            config.supabase_publishable_key,
            DEFAULT_SUPABASE_PUBLISHABLE_KEY
        );
        assert_eq!(config.timings, TimingConfig::default());
    }

    #[test]
    fn test_default_timings() {
        let timings = TimingConfig::default();
        assert_eq!(timings.poll_interval_ms, 10_000);
        assert_eq!(timings.initial_check_delay_ms, 3_000);
        assert_eq!(timings.repair_timeout_ms, 8_000);
        assert_eq!(timings.repair_debounce_ms, 1_000);
        assert_eq!(timings.transition_stuck_after_ms, 10_000);
        assert_eq!(timings.transition_abandoned_after_ms, 300_000);
        assert_eq!(timings.retry_budget, 3);
        assert!(timings.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_partial_timings() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "timings": { "poll_interval_ms": 2500 }
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.timings.poll_interval_ms, 2500);
        assert_eq!(config.timings.retry_budget, 3);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.timings, TimingConfig::default());
    }

    #[test]
    fn test_config_save_writes_timings() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.timings.retry_budget = 5;
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.timings.retry_budget, 5);
    }

    #[test]
    fn test_config_rejects_zero_retry_budget() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        std::fs::write(
            paths.config_file(),
            r#"{ "timings": { "retry_budget": 0 } }"#,
        )
        .unwrap();

        assert!(matches!(Config::load(&paths), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_config_rejects_abandon_shorter_than_stuck() {
        let timings = TimingConfig {
            transition_stuck_after_ms: 10_000,
            transition_abandoned_after_ms: 5_000,
            ..TimingConfig::default()
        };
        assert!(timings.validate().is_err());
    }

    #[test]
    fn test_config_supabase_url_parse() {
        let config = Config::default();
        let url = config.supabase_url().unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.supabase_url = "not a valid url".to_string();
        assert!(config.supabase_url().is_err());
    }
}
