//! High-level API for persisting the session token pair.

use crate::{MemoryStore, SecureStore, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session metadata stored beside the token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Account the session belongs to
    #[serde(default)]
    pub username: Option<String>,
    /// When the access token expires (RFC 3339), if the backend reports it
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// High-level API for storing and retrieving the session token pair.
pub struct TokenVault {
    storage: Box<dyn SecureStore>,
}

impl TokenVault {
    /// Create a new vault with the given storage backend.
    pub fn new(storage: Box<dyn SecureStore>) -> Self {
        Self { storage }
    }

    /// Create a vault backed by process-local memory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Persist the token pair, replacing any previous pair.
    pub fn save_tokens(&self, access: &str, refresh: &str) -> StorageResult<()> {
        debug!("Persisting token pair");
        self.storage.set(StorageKeys::ACCESS_TOKEN, access)?;
        self.storage.set(StorageKeys::REFRESH_TOKEN, refresh)
    }

    /// Load the persisted token pair.
    pub fn load_tokens(&self) -> StorageResult<(Option<String>, Option<String>)> {
        let access = self.storage.get(StorageKeys::ACCESS_TOKEN)?;
        let refresh = self.storage.get(StorageKeys::REFRESH_TOKEN)?;
        Ok((access, refresh))
    }

    /// Check whether a token pair is present.
    pub fn has_tokens(&self) -> StorageResult<bool> {
        Ok(self.storage.has(StorageKeys::ACCESS_TOKEN)?
            && self.storage.has(StorageKeys::REFRESH_TOKEN)?)
    }

    /// Remove the token pair and any session metadata.
    pub fn clear(&self) -> StorageResult<()> {
        debug!("Clearing token vault");
        self.storage.delete(StorageKeys::ACCESS_TOKEN)?;
        self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
        self.storage.delete(StorageKeys::SESSION_META)?;
        Ok(())
    }

    /// Persist session metadata.
    pub fn save_meta(&self, meta: &SessionMeta) -> StorageResult<()> {
        let encoded =
            serde_json::to_string(meta).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::SESSION_META, &encoded)
    }

    /// Load session metadata, if any.
    pub fn load_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.get(StorageKeys::SESSION_META)? {
            Some(encoded) => {
                let meta = serde_json::from_str(&encoded)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Check whether the persisted access token is past its recorded expiry.
    ///
    /// Returns false when no metadata or no expiry is recorded.
    pub fn is_expired(&self) -> StorageResult<bool> {
        let Some(meta) = self.load_meta()? else {
            return Ok(false);
        };
        let Some(expires_at) = meta.expires_at else {
            return Ok(false);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        Ok(expires_at < Utc::now())
    }
}
