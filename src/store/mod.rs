//! Key-value storage backing the tree
//!
//! The tree keeps no node graph in memory. Everything lives in a [`KvStore`]
//! under two logical keyspaces: `nodes` (digest → payload) and `values`
//! (path → application value). Two backends are provided: [`MemoryStore`] and
//! the single-file [`FileStore`].

mod file_store;
mod keyspace;
mod memory;
mod record;

pub use file_store::{FileStore, StoreOptions};
pub use keyspace::{Keyspace, HISTORY_PREFIX, NODES_PREFIX, VALUES_PREFIX};
pub use memory::MemoryStore;
pub use record::Record;

use crate::Result;
use std::sync::Arc;

/// Atomic get/set/delete over opaque byte keys
///
/// Methods take `&self`; implementations provide their own interior locking.
pub trait KvStore {
    /// Fetch the value for `key`, or [`crate::Error::NotFound`]
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Insert or overwrite `key`
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`, or [`crate::Error::NotFound`] if it is absent
    fn delete(&self, key: &[u8]) -> Result<()>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }
}
