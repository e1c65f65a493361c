//! # sparse_merkle
//!
//! A content-addressed sparse merkle tree with a persistent file backend.
//!
//! Every key is hashed to a 256-bit path. The tree commits to the whole
//! key/value mapping in a single root digest, and empty subtrees cost nothing:
//! they are represented by a zero placeholder that is never stored.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Leaves and internal nodes, stored under their own digest
//! - **Roots**: A digest naming one version of the mapping
//! - **Stores**: Anything implementing [`KvStore`]; in memory or a single file
//! - **Tags**: Named roots kept in the file store, like branches of history
//!
//! ## Example
//!
//! ```ignore
//! use sparse_merkle::Database;
//!
//! let mut db = Database::open_or_create("tree.smt")?;
//! let root = db.update(b"alice", b"100")?;
//! assert_eq!(db.get(b"alice")?, b"100");
//! db.tag("genesis")?;
//! ```

pub mod config;
pub mod model;
pub mod store;
pub mod tree;

mod database;
mod error;

pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};
pub use model::{Hash, Node};
pub use store::{FileStore, Keyspace, KvStore, MemoryStore, StoreOptions};
pub use tree::{
    SparseCompactMerkleProof, SparseMerkleProof, SparseMerkleTree, TreeHasher, DEFAULT_VALUE,
};

/// Database version for format compatibility
pub const VERSION: u32 = 1;

/// Magic bytes for file identification
pub const MAGIC: &[u8; 8] = b"SPARSEMT";
