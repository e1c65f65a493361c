//! Logical keyspaces over a shared store

use super::KvStore;
use crate::Result;

/// Key prefix for node payloads (keyed by digest)
pub const NODES_PREFIX: &[u8] = b"n:";
/// Key prefix for application values (keyed by path)
pub const VALUES_PREFIX: &[u8] = b"v:";
/// Key prefix for superseded values (keyed by value hash)
pub const HISTORY_PREFIX: &[u8] = b"h:";

/// A view of `S` where every key is namespaced by a fixed prefix
///
/// Lets the `nodes` and `values` keyspaces share one physical store.
#[derive(Clone, Debug)]
pub struct Keyspace<S> {
    inner: S,
    prefix: &'static [u8],
}

impl<S: KvStore> Keyspace<S> {
    pub fn new(inner: S, prefix: &'static [u8]) -> Self {
        Keyspace { inner, prefix }
    }

    /// The `nodes` keyspace of `inner`
    pub fn nodes(inner: S) -> Self {
        Self::new(inner, NODES_PREFIX)
    }

    /// The `values` keyspace of `inner`
    pub fn values(inner: S) -> Self {
        Self::new(inner, VALUES_PREFIX)
    }

    /// The value `history` keyspace of `inner`
    pub fn history(inner: S) -> Self {
        Self::new(inner, HISTORY_PREFIX)
    }

    pub fn prefix(&self) -> &[u8] {
        self.prefix
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl<S: KvStore> KvStore for Keyspace<S> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.set(&self.full_key(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.delete(&self.full_key(key))
    }
}
