//! Configuration, paths, and logging bootstrap for the session reconciler.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, TimingConfig, DEFAULT_LOG_LEVEL, DEFAULT_REDIRECT_URL, DEFAULT_SUPABASE_PUBLISHABLE_KEY,
    DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
