//! Tree node types

use crate::model::Hash;
use crate::{Error, Result};

/// Domain prefix of a leaf payload
pub const LEAF_PREFIX: u8 = 0x00;
/// Domain prefix of an internal node payload
pub const NODE_PREFIX: u8 = 0x01;

/// Encoded length of any node payload: one prefix byte plus two digests
pub const NODE_LEN: usize = 1 + 2 * Hash::LEN;

/// A node in the sparse merkle tree
///
/// Nodes are stored under their digest, so the payload layout is part of the
/// root commitment:
/// - leaf: `0x00 ‖ path ‖ value_hash`
/// - internal: `0x01 ‖ left ‖ right`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    /// A single key/value binding at the bottom of a compressed branch
    Leaf {
        /// Full path of the key (not just the remaining suffix)
        path: Hash,
        /// Digest of the stored value
        value_hash: Hash,
    },
    /// A branch with two child digests, either of which may be the placeholder
    Internal { left: Hash, right: Hash },
}

impl Node {
    /// Create a leaf node
    pub fn leaf(path: Hash, value_hash: Hash) -> Self {
        Node::Leaf { path, value_hash }
    }

    /// Create an internal node
    pub fn internal(left: Hash, right: Hash) -> Self {
        Node::Internal { left, right }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Serialize to the raw payload that gets hashed and stored
    pub fn encode(&self) -> Vec<u8> {
        let (prefix, a, b) = match self {
            Node::Leaf { path, value_hash } => (LEAF_PREFIX, path, value_hash),
            Node::Internal { left, right } => (NODE_PREFIX, left, right),
        };
        let mut out = Vec::with_capacity(NODE_LEN);
        out.push(prefix);
        out.extend_from_slice(a.as_bytes());
        out.extend_from_slice(b.as_bytes());
        out
    }

    /// Parse a raw payload
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != NODE_LEN {
            return Err(Error::Corruption(format!(
                "node payload is {} bytes, expected {}",
                data.len(),
                NODE_LEN
            )));
        }

        let a = Hash::from_slice(&data[1..1 + Hash::LEN])?;
        let b = Hash::from_slice(&data[1 + Hash::LEN..])?;
        match data[0] {
            LEAF_PREFIX => Ok(Node::Leaf {
                path: a,
                value_hash: b,
            }),
            NODE_PREFIX => Ok(Node::Internal { left: a, right: b }),
            other => Err(Error::Corruption(format!("invalid node prefix: {:#04x}", other))),
        }
    }

    /// Compute the digest this node is stored under
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.encode())
    }
}
