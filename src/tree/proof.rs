//! Merkle proof data
//!
//! Proofs carry what a verifier needs to recompute a root for one key: the
//! side nodes along the key's path and, for non-membership, the leaf that
//! occupies the key's position. Verification itself is left to the caller.

use super::bits::{count_set_bits, get_bit, set_bit};
use super::hasher::TreeHasher;
use super::smt::SparseMerkleTree;
use crate::model::{Hash, Node};
use crate::store::KvStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Proof of membership or non-membership of a key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseMerkleProof {
    /// Siblings along the path, bottom-up
    pub side_nodes: Vec<Hash>,
    /// Raw payload of a different key's leaf found at the key's position
    pub non_membership_leaf_data: Option<Vec<u8>>,
    /// Raw payload of the deepest sibling, for proofs that will be updated
    pub sibling_data: Option<Vec<u8>>,
}

/// [`SparseMerkleProof`] with placeholder side nodes replaced by a bitmask
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseCompactMerkleProof {
    /// Non-placeholder siblings, bottom-up
    pub side_nodes: Vec<Hash>,
    pub non_membership_leaf_data: Option<Vec<u8>>,
    /// Bit i (from the MSB) is set when side node i is the placeholder
    pub bit_mask: Vec<u8>,
    /// Length of the uncompacted side node list
    pub num_side_nodes: usize,
    pub sibling_data: Option<Vec<u8>>,
}

impl SparseMerkleProof {
    /// Check the proof is well formed for `hasher`'s tree shape
    pub fn sanity_check(&self, hasher: &TreeHasher) -> Result<()> {
        if self.side_nodes.len() > hasher.depth() {
            return Err(Error::InvalidProof(format!(
                "{} side nodes exceed tree depth {}",
                self.side_nodes.len(),
                hasher.depth()
            )));
        }
        if let Some(data) = &self.non_membership_leaf_data {
            hasher
                .parse_leaf(data)
                .map_err(|e| Error::InvalidProof(format!("non-membership leaf: {}", e)))?;
        }
        if let Some(data) = &self.sibling_data {
            Node::decode(data).map_err(|e| Error::InvalidProof(format!("sibling data: {}", e)))?;
        }
        Ok(())
    }

    /// Drop placeholder side nodes, remembering their positions in a bitmask
    pub fn compact(&self, hasher: &TreeHasher) -> Result<SparseCompactMerkleProof> {
        self.sanity_check(hasher)?;

        let mut bit_mask = vec![0u8; self.side_nodes.len().div_ceil(8)];
        let mut side_nodes = Vec::new();
        for (i, node) in self.side_nodes.iter().enumerate() {
            if *node == hasher.placeholder() {
                set_bit(&mut bit_mask, i);
            } else {
                side_nodes.push(*node);
            }
        }

        Ok(SparseCompactMerkleProof {
            side_nodes,
            non_membership_leaf_data: self.non_membership_leaf_data.clone(),
            bit_mask,
            num_side_nodes: self.side_nodes.len(),
            sibling_data: self.sibling_data.clone(),
        })
    }

    /// Whether the proof shows another key's leaf at the proven position
    pub fn is_non_membership_by_leaf(&self) -> bool {
        self.non_membership_leaf_data.is_some()
    }

    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a bincode-encoded proof
    pub fn from_bytes(bytes: &[u8], hasher: &TreeHasher) -> Result<Self> {
        let proof: SparseMerkleProof = bincode::deserialize(bytes)?;
        proof.sanity_check(hasher)?;
        Ok(proof)
    }
}

impl SparseCompactMerkleProof {
    /// Check the bitmask and node count agree
    pub fn sanity_check(&self, hasher: &TreeHasher) -> Result<()> {
        if self.num_side_nodes > hasher.depth() {
            return Err(Error::InvalidProof(format!(
                "{} side nodes exceed tree depth {}",
                self.num_side_nodes,
                hasher.depth()
            )));
        }
        if self.bit_mask.len() != self.num_side_nodes.div_ceil(8) {
            return Err(Error::InvalidProof(format!(
                "bitmask of {} bytes does not cover {} side nodes",
                self.bit_mask.len(),
                self.num_side_nodes
            )));
        }
        let placeholders = count_set_bits(&self.bit_mask);
        if self.side_nodes.len() + placeholders != self.num_side_nodes {
            return Err(Error::InvalidProof(format!(
                "{} side nodes and {} placeholders do not add up to {}",
                self.side_nodes.len(),
                placeholders,
                self.num_side_nodes
            )));
        }
        Ok(())
    }

    /// Restore the full side node list
    pub fn decompact(&self, hasher: &TreeHasher) -> Result<SparseMerkleProof> {
        self.sanity_check(hasher)?;

        let mut compacted = self.side_nodes.iter();
        let mut side_nodes = Vec::with_capacity(self.num_side_nodes);
        for i in 0..self.num_side_nodes {
            if get_bit(&self.bit_mask, i) == 1 {
                side_nodes.push(hasher.placeholder());
            } else {
                let node = compacted.next().ok_or_else(|| {
                    Error::InvalidProof("bitmask marks more side nodes than provided".into())
                })?;
                side_nodes.push(*node);
            }
        }

        let proof = SparseMerkleProof {
            side_nodes,
            non_membership_leaf_data: self.non_membership_leaf_data.clone(),
            sibling_data: self.sibling_data.clone(),
        };
        proof.sanity_check(hasher)?;
        Ok(proof)
    }

    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

impl<N: KvStore, V: KvStore> SparseMerkleTree<N, V> {
    /// Proof for `key` against the current root
    pub fn prove(&self, key: &[u8]) -> Result<SparseMerkleProof> {
        self.prove_for_root(key, self.root())
    }

    /// Proof for `key` against `root`
    pub fn prove_for_root(&self, key: &[u8], root: Hash) -> Result<SparseMerkleProof> {
        self.do_prove(key, root, false)
    }

    /// Proof for `key` that also carries the deepest sibling's payload, so the
    /// holder can recompute the branch after updating the key
    pub fn prove_updatable(&self, key: &[u8]) -> Result<SparseMerkleProof> {
        self.prove_updatable_for_root(key, self.root())
    }

    pub fn prove_updatable_for_root(&self, key: &[u8], root: Hash) -> Result<SparseMerkleProof> {
        self.do_prove(key, root, true)
    }

    /// Compact proof for `key` against the current root
    pub fn prove_compact(&self, key: &[u8]) -> Result<SparseCompactMerkleProof> {
        self.prove_compact_for_root(key, self.root())
    }

    pub fn prove_compact_for_root(&self, key: &[u8], root: Hash) -> Result<SparseCompactMerkleProof> {
        self.prove_for_root(key, root)?.compact(self.hasher())
    }

    fn do_prove(&self, key: &[u8], root: Hash, with_sibling_data: bool) -> Result<SparseMerkleProof> {
        let path = self.hasher().path(key);
        let walk = self.side_nodes_for_root(&path, &root, with_sibling_data)?;

        let non_membership_leaf_data = match walk.leaf {
            Some(leaf @ Node::Leaf { path: actual_path, .. }) if actual_path != path => {
                Some(leaf.encode())
            }
            _ => None,
        };

        Ok(SparseMerkleProof {
            side_nodes: walk.side_nodes,
            non_membership_leaf_data,
            sibling_data: walk.sibling_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn tree_with(keys: &[&str]) -> SparseMerkleTree<MemoryStore> {
        let mut tree = SparseMerkleTree::new(MemoryStore::new(), MemoryStore::new());
        for key in keys {
            tree.update(key.as_bytes(), format!("value-{}", key).as_bytes())
                .unwrap();
        }
        tree
    }

    #[test]
    fn test_empty_tree_proof() {
        let tree = tree_with(&[]);
        let proof = tree.prove(b"anything").unwrap();
        assert!(proof.side_nodes.is_empty());
        assert!(proof.non_membership_leaf_data.is_none());
    }

    #[test]
    fn test_membership_proof_has_no_leaf_data() {
        let tree = tree_with(&["a", "b", "c"]);
        let proof = tree.prove(b"a").unwrap();
        assert!(!proof.side_nodes.is_empty());
        assert!(!proof.is_non_membership_by_leaf());
        assert!(proof.sibling_data.is_none());
    }

    #[test]
    fn test_non_membership_proof_carries_other_leaf() {
        let tree = tree_with(&["present"]);
        let proof = tree.prove(b"absent").unwrap();

        let data = proof.non_membership_leaf_data.expect("leaf data");
        let (path, _) = tree.hasher().parse_leaf(&data).unwrap();
        assert_eq!(path, tree.hasher().path(b"present"));
    }

    #[test]
    fn test_updatable_proof_has_sibling_data() {
        let tree = tree_with(&["a", "b"]);
        let proof = tree.prove_updatable(b"a").unwrap();

        let sibling = proof.sibling_data.expect("sibling data");
        assert_eq!(Hash::digest(&sibling), proof.side_nodes[0]);
    }

    #[test]
    fn test_compact_roundtrip() {
        let tree = tree_with(&["a", "b", "c", "d"]);
        let hasher = tree.hasher();
        for key in ["a", "b", "c", "d", "e"] {
            let proof = tree.prove(key.as_bytes()).unwrap();
            let compact = tree.prove_compact(key.as_bytes()).unwrap();

            assert_eq!(compact.num_side_nodes, proof.side_nodes.len());
            assert!(compact.side_nodes.iter().all(|n| !n.is_zero()));
            assert_eq!(compact.decompact(hasher).unwrap(), proof);
        }
    }

    #[test]
    fn test_compact_rejects_inconsistent_counts() {
        let tree = tree_with(&["a", "b"]);
        let hasher = tree.hasher();
        let mut compact = tree.prove_compact(b"a").unwrap();
        compact.num_side_nodes += 1;
        assert!(matches!(compact.decompact(hasher), Err(Error::InvalidProof(_))));

        let mut compact = tree.prove_compact(b"a").unwrap();
        compact.side_nodes.push(Hash::digest(b"extra"));
        assert!(matches!(compact.decompact(hasher), Err(Error::InvalidProof(_))));
    }

    #[test]
    fn test_proof_bytes_roundtrip() {
        let tree = tree_with(&["a", "b", "c"]);
        let proof = tree.prove_updatable(b"b").unwrap();
        let bytes = proof.to_bytes().unwrap();
        assert_eq!(
            SparseMerkleProof::from_bytes(&bytes, tree.hasher()).unwrap(),
            proof
        );
    }

    #[test]
    fn test_proof_for_historical_root() {
        let mut tree = tree_with(&[]).prune_orphans(false);
        tree.update(b"a", b"1").unwrap();
        let old_root = tree.update(b"b", b"2").unwrap();
        tree.update(b"c", b"3").unwrap();
        tree.delete(b"a").unwrap();

        let old = tree.prove_for_root(b"a", old_root).unwrap();
        assert!(!old.side_nodes.is_empty());
        assert!(old.non_membership_leaf_data.is_none());
    }

    #[test]
    fn test_pruned_history_is_unavailable() {
        let mut tree = tree_with(&[]);
        tree.update(b"a", b"1").unwrap();
        let old_root = tree.update(b"b", b"2").unwrap();
        tree.update(b"c", b"3").unwrap();

        let err = tree.prove_for_root(b"a", old_root).unwrap_err();
        assert!(matches!(err, Error::MissingNode(h) if h == old_root));
    }
}
