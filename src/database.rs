//! High-level Database API
//!
//! A [`SparseMerkleTree`] persisted in a single [`FileStore`], with the
//! current root and any named roots kept as refs in the same file.
//!
//! When orphans are retained, every written value is also kept under its
//! hash so reads against a checked-out historical root see that root's
//! values rather than the latest ones.

use crate::config::Config;
use crate::model::Hash;
use crate::store::{FileStore, KvStore, Keyspace};
use crate::tree::{SparseCompactMerkleProof, SparseMerkleProof, SparseMerkleTree, DEFAULT_VALUE};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Ref holding the current root
const HEAD_REF: &str = "HEAD";
/// Namespace for user tags among the store's refs
const TAG_PREFIX: &str = "tags/";

type FileTree = SparseMerkleTree<Keyspace<Arc<FileStore>>>;

/// The main database interface
///
/// Provides a convenient API for:
/// - Reading and writing keys
/// - Producing proofs against the current root
/// - Naming roots and switching between them
pub struct Database {
    store: Arc<FileStore>,
    tree: FileTree,
    /// Values by value hash, written only when orphans are retained
    history: Keyspace<Arc<FileStore>>,
    config: Config,
}

impl Database {
    /// Create a new database at the given path
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(path.as_ref())?;
        Self::create_with_config(path, config)
    }

    /// Create a new database with an explicit config
    pub fn create_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let store = FileStore::create(path, config.store_options())?;
        info!(path = %store.path().display(), "created database");
        Self::from_store(store, config)
    }

    /// Open an existing database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(path.as_ref())?;
        Self::open_with_config(path, config)
    }

    /// Open an existing database with an explicit config
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let store = FileStore::open(path, config.store_options())?;
        Self::from_store(store, config)
    }

    /// Open or create a database
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(path.as_ref())?;
        let store = FileStore::open_or_create(path, config.store_options())?;
        Self::from_store(store, config)
    }

    fn from_store(store: FileStore, config: Config) -> Result<Self> {
        let store = Arc::new(store);
        let root = store.get_ref(HEAD_REF).unwrap_or(Hash::ZERO);
        let tree = SparseMerkleTree::import(
            Keyspace::nodes(Arc::clone(&store)),
            Keyspace::values(Arc::clone(&store)),
            root,
        )
        .prune_orphans(config.prune_orphans);

        debug!(root = %root, prune_orphans = config.prune_orphans, "opened tree");
        Ok(Database {
            history: Keyspace::history(Arc::clone(&store)),
            store,
            tree,
            config,
        })
    }

    // === Key Operations ===

    /// Get the value the current root holds for `key`; empty if absent
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let Some(value_hash) = self.tree.value_hash_for_root(key, self.root())? else {
            return Ok(DEFAULT_VALUE.to_vec());
        };

        let latest = self.tree.get(key)?;
        if self.tree.hasher().digest(&latest) == value_hash {
            return Ok(latest);
        }

        // The root is older than the last write to this key
        self.history.get(value_hash.as_bytes()).map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!(
                "value {} of root {} is no longer stored",
                value_hash.short(),
                self.root().short()
            )),
            e => e,
        })
    }

    /// Whether `key` is present under the current root
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.tree.value_hash_for_root(key, self.root())?.is_some())
    }

    /// Set `key` to `value`, returning the new root
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<Hash> {
        let root = self.tree.update(key, value)?;
        if !self.config.prune_orphans && value != DEFAULT_VALUE {
            let value_hash = self.tree.hasher().digest(value);
            self.history.set(value_hash.as_bytes(), value)?;
        }
        self.store.set_ref(HEAD_REF, root);
        Ok(root)
    }

    /// Remove `key`, returning the new root
    pub fn delete(&mut self, key: &[u8]) -> Result<Hash> {
        let root = self.tree.delete(key)?;
        self.store.set_ref(HEAD_REF, root);
        Ok(root)
    }

    /// Get the current root
    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    // === Proofs ===

    /// Proof of (non-)membership of `key` against the current root
    pub fn prove(&self, key: &[u8]) -> Result<SparseMerkleProof> {
        self.tree.prove(key)
    }

    pub fn prove_compact(&self, key: &[u8]) -> Result<SparseCompactMerkleProof> {
        self.tree.prove_compact(key)
    }

    // === Tags ===

    /// Name the current root
    pub fn tag(&self, name: &str) -> Result<Hash> {
        if name.is_empty() {
            return Err(Error::InvalidRefName(name.to_string()));
        }
        let root = self.root();
        self.store.set_ref(&tag_ref(name), root);
        info!(tag = name, root = %root, "tagged root");
        Ok(root)
    }

    /// Remove a tag
    pub fn untag(&self, name: &str) -> Result<()> {
        self.store
            .remove_ref(&tag_ref(name))
            .map_err(|_| Error::RefNotFound(name.to_string()))
    }

    /// Make a tagged root, or a root given in hex, the current root
    ///
    /// Fails with [`Error::MissingNode`] if the root's nodes have been pruned.
    pub fn checkout(&mut self, reference: &str) -> Result<Hash> {
        let root = self.resolve(reference)?;
        if !root.is_zero() {
            // The root node must still be stored for the tree to be walkable
            self.tree
                .nodes()
                .get(root.as_bytes())
                .map_err(|e| match e {
                    Error::NotFound(_) => Error::MissingNode(root),
                    e => e,
                })?;
        }

        self.tree.set_root(root);
        self.store.set_ref(HEAD_REF, root);
        info!(reference, root = %root, "checked out root");
        Ok(root)
    }

    /// List all tags, sorted by name
    pub fn tags(&self) -> Vec<(String, Hash)> {
        self.store
            .list_refs()
            .into_iter()
            .filter_map(|(name, hash)| {
                name.strip_prefix(TAG_PREFIX)
                    .map(|tag| (tag.to_string(), hash))
            })
            .collect()
    }

    fn resolve(&self, reference: &str) -> Result<Hash> {
        if let Some(hash) = self.store.get_ref(&tag_ref(reference)) {
            return Ok(hash);
        }
        Hash::from_hex(reference).map_err(|_| Error::RefNotFound(reference.to_string()))
    }

    // === Maintenance ===

    /// Number of records (nodes and values) in the store
    pub fn entry_count(&self) -> usize {
        self.store.entry_count()
    }

    /// Sync to disk
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.store.path())
            .field("root", &self.root())
            .finish()
    }
}

fn tag_ref(name: &str) -> String {
    format!("{}{}", TAG_PREFIX, name)
}
