//! The layered key-value store stack of the Punnet SDK.
//!
//! The stack, bottom to top:
//! - [`backing`]: the raw byte store contract ([`KvStore`]) with range
//!   iteration, flush, and close; [`memory::MemoryStore`] is the in-memory
//!   implementation intended for tests.
//! - [`versioned`]: the versioned variant ([`versioned::MerkleStore`]) that
//!   produces a Merkle root per saved version and serves commitment proofs.
//! - [`prefix`]: a byte-prefix wrapper that scopes all keys of a child store
//!   under an immutable prefix; module isolation lives here.
//! - [`cache`]: the two-level write-through LRU cache with per-entry
//!   dirty/deleted bits.
//! - [`typed`]: the generic record store that combines a prefix store with a
//!   cache and a pluggable serializer; determinism (sorted flush) lives here.
//!
//! Resist collapsing the layers: each one carries exactly one concern.

pub mod backing;
pub mod cache;
pub mod memory;
pub mod prefix;
pub mod scope;
pub mod typed;
pub mod versioned;

pub use backing::{check_key, share, KvPair, KvStore, SharedKvStore, StoreIter};
pub use cache::{CacheConfig, CacheEntry, CacheLevel, TieredCache};
pub use memory::MemoryStore;
pub use prefix::{prefix_bound, PrefixStore};
pub use scope::CancelScope;
pub use typed::{CanonicalJsonCodec, RecordCodec, TypedIter, TypedStore};
pub use versioned::{
    verify_commitment_proof, CommitmentProof, Membership, MembershipProof, MerkleStore,
    ProofStep, VersionedKvStore,
};
