//! In-memory key-value store

use super::KvStore;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A `HashMap` behind a lock. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Check if a key exists
    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(hex::encode(key)))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(hex::encode(key)))
    }
}
