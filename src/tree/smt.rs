//! Sparse merkle tree over a key-value store

use super::bits::{common_prefix_len, get_bit, RIGHT};
use super::hasher::TreeHasher;
use crate::model::{Hash, Node};
use crate::store::KvStore;
use crate::{Error, Result};
use tracing::{debug, trace};

/// The value every absent key maps to. Writing it deletes the key.
pub const DEFAULT_VALUE: &[u8] = &[];

/// A sparse merkle tree whose nodes live in `N` and values in `V`
///
/// The only in-memory state is the current root. Every operation walks the
/// store from a root, so the `*_for_root` methods can target any root whose
/// nodes are still stored.
pub struct SparseMerkleTree<N, V = N> {
    hasher: TreeHasher,
    nodes: N,
    values: V,
    root: Hash,
    prune_orphans: bool,
}

/// Result of descending from a root towards a path.
///
/// Both vectors are ordered bottom-up: `side_nodes[0]` is the sibling closest
/// to the leaf level and `path_nodes[0]` is where the walk stopped (a leaf or
/// the placeholder). The last entry of `path_nodes` is the root.
#[derive(Debug)]
pub(crate) struct SideNodes {
    pub(crate) side_nodes: Vec<Hash>,
    pub(crate) path_nodes: Vec<Hash>,
    /// The leaf at `path_nodes[0]`, if the walk ended on one
    pub(crate) leaf: Option<Node>,
    /// Raw payload of `side_nodes[0]`, when requested and not the placeholder
    pub(crate) sibling_data: Option<Vec<u8>>,
}

impl SideNodes {
    /// The `(path, value_hash)` of the leaf the walk ended on
    fn leaf_fields(&self) -> Result<(Hash, Hash)> {
        match self.leaf {
            Some(Node::Leaf { path, value_hash }) => Ok((path, value_hash)),
            _ => Err(Error::Corruption(format!(
                "walk ended on {:?} without reaching a leaf",
                self.path_nodes.first()
            ))),
        }
    }
}

impl<N: KvStore, V: KvStore> SparseMerkleTree<N, V> {
    /// Create an empty tree over the given stores
    pub fn new(nodes: N, values: V) -> Self {
        Self::import(nodes, values, Hash::ZERO)
    }

    /// Open a tree at an existing root
    pub fn import(nodes: N, values: V, root: Hash) -> Self {
        SparseMerkleTree {
            hasher: TreeHasher::new(),
            nodes,
            values,
            root,
            prune_orphans: true,
        }
    }

    /// Build a tree holding every `(key, value)` in `entries`
    pub fn from_entries<I, K, T>(nodes: N, values: V, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<[u8]>,
        T: AsRef<[u8]>,
    {
        let mut tree = Self::new(nodes, values);
        let mut count = 0usize;
        for (key, value) in entries {
            tree.update(key.as_ref(), value.as_ref())?;
            count += 1;
        }
        if count == 0 {
            return Err(Error::EmptyInput);
        }
        debug!(entries = count, root = %tree.root, "built tree from entries");
        Ok(tree)
    }

    /// Whether nodes orphaned by an update are deleted from the store
    /// (default `true`). Keep them to be able to walk historical roots.
    pub fn prune_orphans(mut self, prune: bool) -> Self {
        self.prune_orphans = prune;
        self
    }

    /// Get the current root
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Install a new current root
    pub fn set_root(&mut self, root: Hash) {
        self.root = root;
    }

    pub fn hasher(&self) -> &TreeHasher {
        &self.hasher
    }

    pub fn depth(&self) -> usize {
        self.hasher.depth()
    }

    pub fn nodes(&self) -> &N {
        &self.nodes
    }

    pub fn values(&self) -> &V {
        &self.values
    }

    /// Get the value stored for `key`, or [`DEFAULT_VALUE`] if there is none
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        if self.root == self.hasher.placeholder() {
            return Ok(DEFAULT_VALUE.to_vec());
        }

        let path = self.hasher.path(key);
        match self.values.get(path.as_bytes()) {
            Ok(value) => Ok(value),
            Err(Error::NotFound(_)) => Ok(DEFAULT_VALUE.to_vec()),
            Err(e) => Err(e),
        }
    }

    /// Whether `key` holds a non-default value
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)? != DEFAULT_VALUE)
    }

    /// The value hash `root` commits to for `key`, or `None` if the key is
    /// absent under that root
    pub fn value_hash_for_root(&self, key: &[u8], root: Hash) -> Result<Option<Hash>> {
        let path = self.hasher.path(key);
        let walk = self.side_nodes_for_root(&path, &root, false)?;
        Ok(match walk.leaf {
            Some(Node::Leaf {
                path: leaf_path,
                value_hash,
            }) if leaf_path == path => Some(value_hash),
            _ => None,
        })
    }

    /// Set `key` to `value` and install the resulting root
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<Hash> {
        let new_root = self.update_for_root(key, value, self.root)?;
        self.root = new_root;
        Ok(new_root)
    }

    /// Delete `key` and install the resulting root
    pub fn delete(&mut self, key: &[u8]) -> Result<Hash> {
        self.update(key, DEFAULT_VALUE)
    }

    /// Set `key` to `value` in the tree at `root` and return the new root.
    ///
    /// The tree's current root is left untouched. Writing [`DEFAULT_VALUE`]
    /// deletes the key.
    pub fn update_for_root(&self, key: &[u8], value: &[u8], root: Hash) -> Result<Hash> {
        let path = self.hasher.path(key);
        let walk = self.side_nodes_for_root(&path, &root, false)?;

        let new_root = if value == DEFAULT_VALUE {
            let new_root = self.delete_with_side_nodes(&path, &walk)?;
            self.delete_value(&path)?;
            new_root
        } else {
            self.update_with_side_nodes(&path, value, &walk, root)?
        };

        debug!(old_root = %root, new_root = %new_root, path = %path.short(), "updated tree");
        Ok(new_root)
    }

    /// Delete `key` from the tree at `root` and return the new root
    pub fn delete_for_root(&self, key: &[u8], root: Hash) -> Result<Hash> {
        self.update_for_root(key, DEFAULT_VALUE, root)
    }

    /// Descend from `root` along `path`, collecting siblings and visited nodes
    pub(crate) fn side_nodes_for_root(
        &self,
        path: &Hash,
        root: &Hash,
        with_sibling_data: bool,
    ) -> Result<SideNodes> {
        let placeholder = self.hasher.placeholder();
        let depth = self.depth();
        let mut side_nodes = Vec::with_capacity(depth);
        let mut path_nodes = Vec::with_capacity(depth + 1);
        path_nodes.push(*root);

        if *root == placeholder {
            return Ok(SideNodes {
                side_nodes,
                path_nodes,
                leaf: None,
                sibling_data: None,
            });
        }

        let mut current = self.load_node(root)?;
        if current.is_leaf() {
            return Ok(SideNodes {
                side_nodes,
                path_nodes,
                leaf: Some(current),
                sibling_data: None,
            });
        }

        let mut leaf = None;
        for i in 0..depth {
            let Node::Internal { left, right } = current else {
                return Err(Error::Corruption(format!(
                    "expected an internal node at depth {}",
                    i
                )));
            };

            let (side_node, node) = if get_bit(path.as_bytes(), i) == RIGHT {
                (left, right)
            } else {
                (right, left)
            };
            side_nodes.push(side_node);
            path_nodes.push(node);

            if node == placeholder {
                break;
            }

            current = self.load_node(&node)?;
            if current.is_leaf() {
                leaf = Some(current);
                break;
            }
        }

        let sibling_data = match side_nodes.last() {
            Some(sibling) if with_sibling_data && *sibling != placeholder => {
                Some(self.load_raw(sibling)?)
            }
            _ => None,
        };

        trace!(
            path = %path.short(),
            side_nodes = side_nodes.len(),
            reached_leaf = leaf.is_some(),
            "walked side nodes"
        );

        side_nodes.reverse();
        path_nodes.reverse();
        Ok(SideNodes {
            side_nodes,
            path_nodes,
            leaf,
            sibling_data,
        })
    }

    fn update_with_side_nodes(
        &self,
        path: &Hash,
        value: &[u8],
        walk: &SideNodes,
        root: Hash,
    ) -> Result<Hash> {
        let depth = self.depth();
        let placeholder = self.hasher.placeholder();

        let value_hash = self.hasher.digest(value);
        let (mut current, leaf_data) = self.hasher.digest_leaf(path, &value_hash);

        // How many leading bits the new path shares with the leaf already sitting
        // at its position. `depth` means the slot was empty or holds this key.
        let (common_prefix, old_value_hash) = if walk.path_nodes[0] == placeholder {
            (depth, None)
        } else {
            let (actual_path, old_value_hash) = walk.leaf_fields()?;
            (
                common_prefix_len(path.as_bytes(), actual_path.as_bytes()),
                Some(old_value_hash),
            )
        };

        if common_prefix == depth && old_value_hash == Some(value_hash) {
            trace!(path = %path.short(), "value unchanged");
            return Ok(root);
        }
        self.nodes.set(current.as_bytes(), &leaf_data)?;

        if common_prefix != depth {
            // Another key's leaf is in the way: join both under one internal node
            // at the depth where the paths diverge.
            let bit = get_bit(path.as_bytes(), common_prefix);
            current = self.store_internal(bit, &current, &walk.path_nodes[0])?;
        } else if old_value_hash.is_some() {
            self.prune(&walk.path_nodes[0])?;
            self.delete_value(&path)?;
        }

        for orphan in &walk.path_nodes[1..] {
            self.prune(orphan)?;
        }

        // Levels below the deepest recorded side node have no sibling of their own.
        let offset = depth - walk.side_nodes.len();
        for i in 0..depth {
            let side_node = match i.checked_sub(offset) {
                Some(idx) => walk.side_nodes[idx],
                // Between the divergence point and the old leaf's position the
                // branch is padded with empty siblings.
                None if common_prefix != depth && common_prefix > depth - 1 - i => placeholder,
                None => continue,
            };

            let bit = get_bit(path.as_bytes(), depth - 1 - i);
            current = self.store_internal(bit, &current, &side_node)?;
        }

        self.values.set(path.as_bytes(), value)?;
        Ok(current)
    }

    fn delete_with_side_nodes(&self, path: &Hash, walk: &SideNodes) -> Result<Hash> {
        let placeholder = self.hasher.placeholder();

        if walk.path_nodes[0] == placeholder {
            return Err(Error::AlreadyEmpty);
        }
        let (actual_path, _) = walk.leaf_fields()?;
        if actual_path != *path {
            return Err(Error::KeyMismatch);
        }

        for orphan in &walk.path_nodes {
            self.prune(orphan)?;
        }

        let num_side_nodes = walk.side_nodes.len();
        let mut current: Option<Hash> = None;
        let mut non_placeholder_reached = false;

        for (i, side_node) in walk.side_nodes.iter().enumerate() {
            let node = match current {
                Some(node) => node,
                None => {
                    if *side_node == placeholder {
                        continue;
                    }
                    if self.load_node(side_node)?.is_leaf() {
                        // A lone leaf sibling moves up in place of the deleted
                        // leaf's parent.
                        current = Some(*side_node);
                        continue;
                    }
                    // A subtree sibling stays where it is, next to an empty slot.
                    non_placeholder_reached = true;
                    placeholder
                }
            };

            if !non_placeholder_reached {
                if *side_node == placeholder {
                    // Keep bubbling until the first real sibling.
                    continue;
                }
                non_placeholder_reached = true;
            }

            let bit = get_bit(path.as_bytes(), num_side_nodes - 1 - i);
            current = Some(self.store_internal(bit, &node, side_node)?);
        }

        Ok(current.unwrap_or(placeholder))
    }

    /// Hash `node` with its sibling (ordered by `bit`), persist it and return its digest
    fn store_internal(&self, bit: u8, node: &Hash, side_node: &Hash) -> Result<Hash> {
        let (hash, data) = if bit == RIGHT {
            self.hasher.digest_node(side_node, node)
        } else {
            self.hasher.digest_node(node, side_node)
        };
        self.nodes.set(hash.as_bytes(), &data)?;
        Ok(hash)
    }

    /// Remove an orphaned node, unless orphans are retained
    fn prune(&self, hash: &Hash) -> Result<()> {
        if !self.prune_orphans {
            return Ok(());
        }
        trace!(node = %hash.short(), "pruning orphan");
        self.nodes.delete(hash.as_bytes()).map_err(|e| match e {
            Error::NotFound(_) => Error::MissingNode(*hash),
            e => e,
        })
    }

    /// Drop the value at `path`. The values keyspace only tracks the latest
    /// write, so it may already be gone when updating a historical root.
    fn delete_value(&self, path: &Hash) -> Result<()> {
        match self.values.delete(path.as_bytes()) {
            Err(Error::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    fn load_raw(&self, hash: &Hash) -> Result<Vec<u8>> {
        self.nodes.get(hash.as_bytes()).map_err(|e| match e {
            Error::NotFound(_) => Error::MissingNode(*hash),
            e => e,
        })
    }

    fn load_node(&self, hash: &Hash) -> Result<Node> {
        Node::decode(&self.load_raw(hash)?)
    }
}

impl<N, V> std::fmt::Debug for SparseMerkleTree<N, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseMerkleTree")
            .field("root", &self.root)
            .field("prune_orphans", &self.prune_orphans)
            .finish()
    }
}
