//! Token persistence for the session client.
//!
//! This crate provides the storage seam for the access/refresh token pair:
//! - the [`SecureStore`] trait for pluggable backends (an OS keychain or
//!   encrypted file store is expected to be injected by the host
//!   application)
//! - an in-memory backend for tests and ephemeral sessions
//! - the typed [`TokenVault`] wrapper used by the session client

mod keys;
mod memory;
mod traits;
mod vault;

pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use traits::SecureStore;
pub use vault::{SessionMeta, TokenVault};

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

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
