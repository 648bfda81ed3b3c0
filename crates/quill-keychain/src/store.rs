//! Platform secure storage interface.
//!
//! The mobile shells back this with the OS keystore (Keychain on iOS,
//! EncryptedSharedPreferences on Android). The custody layer treats it
//! as an opaque encrypted-at-rest byte store addressed by string keys.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

/// Encrypted-at-rest key-value store provided by the platform shell.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Reads the value at `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Removes `key`. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory [`SecretStore`] for tests and for platforms without a
/// native backend. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries. Test helper.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sorted snapshot of the stored keys. Test helper.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
