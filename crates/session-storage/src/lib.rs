//! Client-side session storage.
//!
//! This crate provides the two storage areas the reconciler owns:
//! - **LocalCache**: durable key/value storage that survives reloads
//!   (last-known user object and guest-mode flag)
//! - **EphemeralMarkers**: short-lived storage for in-flight redirect
//!   transition timestamps
//!
//! Both sit on top of the [`KeyValueStore`] trait, with an in-memory
//! backend ([`MemoryStore`]) and a JSON-file backend ([`FileStore`]).

mod cache;
mod file;
mod keys;
mod markers;
mod memory;
mod traits;

pub use cache::{GuestRecord, LocalCache};
pub use file::FileStore;
pub use keys::StorageKeys;
pub use markers::{EphemeralMarkers, TransitionMarker};
pub use memory::MemoryStore;
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A stored record could not be parsed
    #[error("Corrupt record under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
