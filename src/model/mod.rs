//! Core data model types for sparse_merkle

mod hash;
mod node;

pub use hash::Hash;
pub use node::{Node, LEAF_PREFIX, NODE_LEN, NODE_PREFIX};
