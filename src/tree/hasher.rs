//! Domain-separated hashing for tree nodes

use crate::model::{Hash, Node, LEAF_PREFIX};
use crate::{Error, Result};

/// Hashes keys, values and nodes for the tree.
///
/// Leaf and internal payloads carry different one-byte prefixes, so an internal
/// node can never be passed off as a leaf (or vice versa) by a second preimage.
/// All digests are single-pass BLAKE3; roots are only comparable with other
/// implementations that hash the same way.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeHasher;

impl TreeHasher {
    pub fn new() -> Self {
        TreeHasher
    }

    /// Generic content hash
    pub fn digest(&self, data: &[u8]) -> Hash {
        Hash::digest(data)
    }

    /// Map an application key into the path space
    pub fn path(&self, key: &[u8]) -> Hash {
        self.digest(key)
    }

    /// Digest and raw payload of a leaf
    pub fn digest_leaf(&self, path: &Hash, value_hash: &Hash) -> (Hash, Vec<u8>) {
        let raw = Node::leaf(*path, *value_hash).encode();
        (self.digest(&raw), raw)
    }

    /// Digest and raw payload of an internal node
    pub fn digest_node(&self, left: &Hash, right: &Hash) -> (Hash, Vec<u8>) {
        let raw = Node::internal(*left, *right).encode();
        (self.digest(&raw), raw)
    }

    pub fn is_leaf(&self, raw: &[u8]) -> bool {
        raw.first() == Some(&LEAF_PREFIX)
    }

    /// Split a leaf payload into `(path, value_hash)`
    pub fn parse_leaf(&self, raw: &[u8]) -> Result<(Hash, Hash)> {
        match Node::decode(raw)? {
            Node::Leaf { path, value_hash } => Ok((path, value_hash)),
            Node::Internal { .. } => Err(Error::Corruption(
                "expected a leaf payload, found an internal node".into(),
            )),
        }
    }

    /// Split an internal payload into `(left, right)`
    pub fn parse_node(&self, raw: &[u8]) -> Result<(Hash, Hash)> {
        match Node::decode(raw)? {
            Node::Internal { left, right } => Ok((left, right)),
            Node::Leaf { .. } => Err(Error::Corruption(
                "expected an internal payload, found a leaf".into(),
            )),
        }
    }

    /// The empty-subtree marker. Never stored.
    pub fn placeholder(&self) -> Hash {
        Hash::ZERO
    }

    /// Path length in bytes
    pub fn path_size(&self) -> usize {
        Hash::LEN
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        self.path_size() * 8
    }
}
