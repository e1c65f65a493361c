//! Error types for sparse_merkle

use crate::model::Hash;
use thiserror::Error;

/// Result type alias for sparse_merkle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sparse_merkle operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A store lookup or delete missed. `get` on the tree maps this to the default value.
    #[error("Key not found in store: {0}")]
    NotFound(String),

    /// A node referenced by the tree is absent from the `nodes` keyspace
    #[error("Missing tree node: {0}")]
    MissingNode(Hash),

    #[error("Key is already empty")]
    AlreadyEmpty,

    #[error("Key not found: path is occupied by a different key")]
    KeyMismatch,

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Cannot build a tree from empty input")]
    EmptyInput,

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid database file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Ref not found: {0}")]
    RefNotFound(String),

    #[error("Invalid ref name: {0:?}")]
    InvalidRefName(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller may treat this as "key not present" rather than a failure
    pub fn is_absent_key(&self) -> bool {
        matches!(self, Error::AlreadyEmpty | Error::KeyMismatch)
    }
}
