//! # Merkle Commitment over Records
//!
//! The registry is append-only, and this module makes that claim checkable.
//! Every committed record contributes one leaf (its [`Record::digest`]),
//! keyed by content hash. The root commits to the full record set: changing,
//! dropping or inserting any record under the registry's feet changes it.
//!
//! ```text
//!                    Root Hash
//!                   /         \
//!           H(D1+D2)           H(D3+D3)      odd levels duplicate
//!            /    \             /            the last node
//!          D1      D2         D3
//!          |       |          |
//!       record  record     record            leaves sorted by content hash
//! ```
//!
//! A holder of a record can ask for a proof and check it against a root
//! obtained from any trusted source, without access to the database.
//!
//! ## References
//!
//! - **Merkle, R. C. (1979)** - "Secrecy, Authentication, and Public Key Systems"
//!   <https://www.ralphmerkle.com/papers/Thesis1979.pdf>
//! - **RFC 6962** - Certificate Transparency
//!   <https://www.rfc-editor.org/rfc/rfc6962>

use crate::models::{ContentHash, Hash, MerkleProof, MerkleProofNode, Record, HASH_SIZE};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Root of a tree with no records.
pub const EMPTY_HASH: Hash = [0u8; HASH_SIZE];

/// Merkle tree over record digests.
///
/// The root is recomputed on every insertion, so reads never need mutable
/// access.
///
/// # Example
///
/// ```rust
/// use poe_registry::merkle::MerkleTree;
/// use poe_registry::{Address, ContentHash, Locator, Record, Tags};
///
/// let record = Record {
///     content_hash: ContentHash::digest(b"contract.pdf"),
///     owner: Address::from_low_u64(1),
///     created_at: 1_700_000_000,
///     tags: Tags::new("legal").unwrap(),
///     locator: Locator::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"),
/// };
///
/// let mut tree = MerkleTree::new();
/// tree.insert(&record);
///
/// let root = tree.root();
/// let proof = tree.proof(&record.content_hash).unwrap();
/// assert!(MerkleTree::verify_record(&record, &proof, &root));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    /// Record digests indexed by content hash.
    leaves: BTreeMap<ContentHash, Hash>,

    /// Root over the current leaves.
    root: Hash,
}

impl MerkleTree {
    pub fn new() -> Self {
        MerkleTree {
            leaves: BTreeMap::new(),
            root: EMPTY_HASH,
        }
    }

    /// Builds a tree from an existing record set.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let leaves: BTreeMap<ContentHash, Hash> = records
            .into_iter()
            .map(|record| (record.content_hash, record.digest()))
            .collect();
        let root = build_root(&leaves.values().copied().collect::<Vec<_>>());
        MerkleTree { leaves, root }
    }

    /// Adds the record's digest as a leaf and updates the root.
    pub fn insert(&mut self, record: &Record) {
        self.leaves.insert(record.content_hash, record.digest());
        self.root = build_root(&self.leaf_hashes());
    }

    /// Leaf digest for a content hash, if present.
    pub fn get(&self, content_hash: &ContentHash) -> Option<&Hash> {
        self.leaves.get(content_hash)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Root hash committing to every leaf. All zeros for an empty tree.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Inclusion proof for the record stored under `content_hash`.
    pub fn proof(&self, content_hash: &ContentHash) -> Option<MerkleProof> {
        let leaf_hash = *self.leaves.get(content_hash)?;
        let index = self.leaves.keys().position(|k| k == content_hash)?;

        Some(MerkleProof {
            leaf_hash,
            path: build_proof_path(&self.leaf_hashes(), index),
            root_hash: self.root,
        })
    }

    fn leaf_hashes(&self) -> Vec<Hash> {
        self.leaves.values().copied().collect()
    }

    /// Recomputes the root from a proof and compares it to `expected_root`.
    ///
    /// `expected_root` must come from a trusted source; a forged root
    /// verifies forged proofs.
    pub fn verify_proof(proof: &MerkleProof, expected_root: &Hash) -> bool {
        let mut current = proof.leaf_hash;

        for node in &proof.path {
            current = if node.is_left {
                hash_pair(&node.hash, &current)
            } else {
                hash_pair(&current, &node.hash)
            };
        }

        current == *expected_root
    }

    /// Checks that `proof` is about exactly this record, then verifies it.
    pub fn verify_record(record: &Record, proof: &MerkleProof, expected_root: &Hash) -> bool {
        proof.leaf_hash == record.digest() && Self::verify_proof(proof, expected_root)
    }
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two nodes"),
        })
        .collect()
}

fn build_root(hashes: &[Hash]) -> Hash {
    match hashes.len() {
        0 => EMPTY_HASH,
        1 => hashes[0],
        _ => {
            let mut level = hashes.to_vec();
            while level.len() > 1 {
                level = next_level(&level);
            }
            level[0]
        }
    }
}

fn build_proof_path(hashes: &[Hash], leaf_index: usize) -> Vec<MerkleProofNode> {
    let mut path = Vec::new();
    let mut level = hashes.to_vec();
    let mut index = leaf_index;

    while level.len() > 1 {
        let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };

        // A node without a sibling is paired with itself.
        let sibling = level.get(sibling_index).copied().unwrap_or(level[index]);

        path.push(MerkleProofNode {
            hash: sibling,
            is_left: index % 2 == 1,
        });

        level = next_level(&level);
        index /= 2;
    }

    path
}

/// SHA-256 of the concatenated children.
fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
