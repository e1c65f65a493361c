//! Sparse merkle tree
//!
//! A binary trie over the 256-bit path space, compressed so that:
//! - An empty subtree is the all-zero placeholder and is never stored
//! - A subtree holding a single key collapses to that key's leaf
//! - Every node is stored under its own digest, so the root hash commits to
//!   the full key/value mapping
//!
//! Inserting the same set of keys in any order yields the same root.

pub mod bits;
mod hasher;
mod proof;
mod smt;

pub use hasher::TreeHasher;
pub use proof::{SparseCompactMerkleProof, SparseMerkleProof};
pub use smt::{SparseMerkleTree, DEFAULT_VALUE};
