//! The versioned, Merkle-committed backing store.
//!
//! [`MerkleStore`] keeps a working set plus one immutable snapshot per saved
//! version. The root of a version is a binary Merkle tree over the sorted
//! `(key, value)` leaves, so replicas that applied the same flushes report
//! bit-identical roots. Proof generation covers both membership and absence
//! (via the adjacent leaves bracketing the missing key).
//!
//! The store is in-memory: it is the reference implementation of the
//! versioned contract and the seam a persistent Merkle tree backend would
//! implement.

use crate::backing::{check_key, KvStore, StoreIter};
use crate::memory::collect_range;
use punnet_types::error::StoreError;
use punnet_crypto::hash::sha256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::BTreeMap;

/// The root hash of an empty version.
pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

const LEAF_DOMAIN: u8 = 0x00;
const INNER_DOMAIN: u8 = 0x01;

/// The result of resolving a key against a committed version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Membership {
    /// The key is present with the given value.
    Present(Vec<u8>),
    /// The key is absent.
    Absent,
}

/// One step of a Merkle audit path, bottom-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// The sibling subtree hash at this level.
    #[serde(with = "hex::serde")]
    pub sibling: [u8; 32],
    /// True when the sibling is the left operand of the parent hash.
    pub sibling_on_left: bool,
}

/// A proof that one leaf is part of the committed root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    /// The proven key.
    #[serde(with = "hex::serde")]
    pub key: Vec<u8>,
    /// The proven value.
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
    /// The leaf's position among the sorted leaves.
    pub leaf_index: u64,
    /// The total number of leaves in the version.
    pub leaf_count: u64,
    /// The audit path from leaf to root.
    pub path: Vec<ProofStep>,
}

/// A commitment proof for a key: either membership, or absence demonstrated
/// by the adjacent leaves bracketing the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentProof {
    /// The key exists; the contained proof anchors it to the root.
    Membership(MembershipProof),
    /// The key does not exist; the neighbors (when present) anchor the gap.
    Absence {
        /// The greatest leaf strictly below the key, if any.
        predecessor: Option<MembershipProof>,
        /// The smallest leaf strictly above the key, if any.
        successor: Option<MembershipProof>,
    },
}

fn leaf_hash(key: &[u8], value: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_DOMAIN]);
    hasher.update((key.len() as u64).to_le_bytes());
    hasher.update(key);
    hasher.update(value);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn inner_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 65];
    buf[0] = INNER_DOMAIN;
    buf[1..33].copy_from_slice(left);
    buf[33..65].copy_from_slice(right);
    sha256(&buf)
}

/// The largest power of two strictly less than `n`. Requires `n >= 2`.
fn split_point(n: usize) -> usize {
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    match leaves.len() {
        0 => EMPTY_ROOT,
        1 => leaves[0],
        n => {
            let k = split_point(n);
            inner_hash(&merkle_root(&leaves[..k]), &merkle_root(&leaves[k..]))
        }
    }
}

fn merkle_path(leaves: &[[u8; 32]], index: usize, path: &mut Vec<ProofStep>) {
    if leaves.len() <= 1 {
        return;
    }
    let k = split_point(leaves.len());
    if index < k {
        merkle_path(&leaves[..k], index, path);
        path.push(ProofStep {
            sibling: merkle_root(&leaves[k..]),
            sibling_on_left: false,
        });
    } else {
        merkle_path(&leaves[k..], index - k, path);
        path.push(ProofStep {
            sibling: merkle_root(&leaves[..k]),
            sibling_on_left: true,
        });
    }
}

fn verify_membership(root: &[u8; 32], proof: &MembershipProof) -> Result<(), StoreError> {
    let mut hash = leaf_hash(&proof.key, &proof.value);
    for step in &proof.path {
        hash = if step.sibling_on_left {
            inner_hash(&step.sibling, &hash)
        } else {
            inner_hash(&hash, &step.sibling)
        };
    }
    if hash != *root {
        return Err(StoreError::InvalidProof(
            "proof does not anchor to the root".into(),
        ));
    }
    Ok(())
}

/// Verifies a [`CommitmentProof`] for `key` against `root`, returning the
/// proven membership outcome.
pub fn verify_commitment_proof(
    root: &[u8; 32],
    key: &[u8],
    proof: &CommitmentProof,
) -> Result<Membership, StoreError> {
    match proof {
        CommitmentProof::Membership(m) => {
            if m.key != key {
                return Err(StoreError::InvalidProof("proof is for a different key".into()));
            }
            verify_membership(root, m)?;
            Ok(Membership::Present(m.value.clone()))
        }
        CommitmentProof::Absence {
            predecessor,
            successor,
        } => {
            match (predecessor, successor) {
                (None, None) => {
                    if *root != EMPTY_ROOT {
                        return Err(StoreError::InvalidProof(
                            "absence in a non-empty tree requires a neighbor".into(),
                        ));
                    }
                }
                (Some(pred), None) => {
                    if pred.key.as_slice() >= key {
                        return Err(StoreError::InvalidProof(
                            "predecessor must sort below the key".into(),
                        ));
                    }
                    if pred.leaf_index + 1 != pred.leaf_count {
                        return Err(StoreError::InvalidProof(
                            "predecessor without successor must be the last leaf".into(),
                        ));
                    }
                    verify_membership(root, pred)?;
                }
                (None, Some(succ)) => {
                    if succ.key.as_slice() <= key {
                        return Err(StoreError::InvalidProof(
                            "successor must sort above the key".into(),
                        ));
                    }
                    if succ.leaf_index != 0 {
                        return Err(StoreError::InvalidProof(
                            "successor without predecessor must be the first leaf".into(),
                        ));
                    }
                    verify_membership(root, succ)?;
                }
                (Some(pred), Some(succ)) => {
                    if !(pred.key.as_slice() < key && key < succ.key.as_slice()) {
                        return Err(StoreError::InvalidProof(
                            "neighbors must bracket the key".into(),
                        ));
                    }
                    if pred.leaf_index + 1 != succ.leaf_index
                        || pred.leaf_count != succ.leaf_count
                    {
                        return Err(StoreError::InvalidProof(
                            "neighbors must be adjacent leaves of one version".into(),
                        ));
                    }
                    verify_membership(root, pred)?;
                    verify_membership(root, succ)?;
                }
            }
            Ok(Membership::Absent)
        }
    }
}

/// The versioned backing-store contract.
pub trait VersionedKvStore: KvStore {
    /// Commits the working set as the next version, returning its root hash
    /// and version number. Versions are monotone integers starting at 0 (the
    /// empty pre-genesis version); the first save produces version 1.
    fn save_version(&mut self) -> Result<([u8; 32], u64), StoreError>;

    /// Resets the working set to a previously saved version. Versions above
    /// the loaded one are discarded so the sequence stays monotone.
    fn load_version(&mut self, version: u64) -> Result<(), StoreError>;

    /// The Merkle root of the current working set.
    fn hash(&self) -> [u8; 32];

    /// Builds a commitment proof for `key` against the current working set.
    fn get_proof(&self, key: &[u8]) -> Result<CommitmentProof, StoreError>;

    /// The most recently saved (or loaded) version number.
    fn version(&self) -> u64;
}

#[derive(Clone, Debug)]
struct VersionSnapshot {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    root: [u8; 32],
}

/// The in-memory versioned Merkle store.
#[derive(Debug, Default)]
pub struct MerkleStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    versions: BTreeMap<u64, VersionSnapshot>,
    version: u64,
    closed: bool,
}

impl MerkleStore {
    /// Creates an empty store at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    fn leaves(&self) -> Vec<[u8; 32]> {
        self.data
            .iter()
            .map(|(k, v)| leaf_hash(k, v))
            .collect()
    }

    fn membership_proof_at(&self, index: usize) -> MembershipProof {
        let leaves = self.leaves();
        let (key, value) = self
            .data
            .iter()
            .nth(index)
            .map(|(k, v)| (k.clone(), v.clone()))
            .expect("index produced by lookup");
        let mut path = Vec::new();
        merkle_path(&leaves, index, &mut path);
        MembershipProof {
            key,
            value,
            leaf_index: index as u64,
            leaf_count: leaves.len() as u64,
            path,
        }
    }

    /// The root hash of a saved version.
    pub fn version_root(&self, version: u64) -> Result<[u8; 32], StoreError> {
        if version == 0 {
            return Ok(EMPTY_ROOT);
        }
        self.versions
            .get(&version)
            .map(|s| s.root)
            .ok_or(StoreError::UnknownVersion(version))
    }
}

impl KvStore for MerkleStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        self.data.remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        Ok(self.data.contains_key(key))
    }

    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError> {
        self.ensure_open()?;
        Ok(StoreIter::new(collect_range(&self.data, start, end)))
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError> {
        self.ensure_open()?;
        let mut entries = collect_range(&self.data, start, end);
        entries.reverse();
        Ok(StoreIter::new(entries))
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.save_version().map(|_| ())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl VersionedKvStore for MerkleStore {
    fn save_version(&mut self) -> Result<([u8; 32], u64), StoreError> {
        self.ensure_open()?;
        let root = merkle_root(&self.leaves());
        self.version += 1;
        self.versions.insert(
            self.version,
            VersionSnapshot {
                data: self.data.clone(),
                root,
            },
        );
        tracing::debug!(
            target: "store",
            version = self.version,
            root = %hex::encode(root),
            entries = self.data.len(),
            "saved version"
        );
        Ok((root, self.version))
    }

    fn load_version(&mut self, version: u64) -> Result<(), StoreError> {
        self.ensure_open()?;
        if version == 0 {
            self.data.clear();
        } else {
            let snapshot = self
                .versions
                .get(&version)
                .ok_or(StoreError::UnknownVersion(version))?;
            self.data = snapshot.data.clone();
        }
        self.version = version;
        self.versions.retain(|v, _| *v <= version);
        Ok(())
    }

    fn hash(&self) -> [u8; 32] {
        merkle_root(&self.leaves())
    }

    fn get_proof(&self, key: &[u8]) -> Result<CommitmentProof, StoreError> {
        self.ensure_open()?;
        check_key(key)?;

        let position = self.data.keys().position(|k| k.as_slice() == key);
        if let Some(index) = position {
            return Ok(CommitmentProof::Membership(self.membership_proof_at(index)));
        }

        let below = self.data.keys().filter(|k| k.as_slice() < key).count();
        let predecessor = below.checked_sub(1).map(|i| self.membership_proof_at(i));
        let successor = if below < self.data.len() {
            Some(self.membership_proof_at(below))
        } else {
            None
        };
        Ok(CommitmentProof::Absence {
            predecessor,
            successor,
        })
    }

    fn version(&self) -> u64 {
        self.version
    }
}
