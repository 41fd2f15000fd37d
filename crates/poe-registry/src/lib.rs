//! # Proof-of-Existence Registry
//!
//! A tamper-evident, append-only registry of content. A caller records that
//! a piece of content (identified by its hash) exists, who it belongs to,
//! when it was registered, and where its bytes live in an external content
//! store. Anyone can later look the record up by hash.
//!
//! ## Purpose
//!
//! This crate implements the persistent core that an upgradeable front
//! delegates to:
//!
//! 1. **Data Model** - Strongly typed identities, content hashes, tags and
//!    locators, each with a well-defined zero value.
//!
//! 2. **Persistent Storage** - Sled-backed trees holding records, per-owner
//!    indexes, the circuit breaker and ownership slots. Every mutation is a
//!    single transaction.
//!
//! 3. **Access Control** - Owner-gated operations over storage slots that
//!    survive restarts and upgrades.
//!
//! 4. **Registry Logic** - The [`RegistryLogic`] contract and the
//!    [`StandardLogic`] revision. Logic is stateless and receives storage
//!    explicitly, so revisions can be swapped in place.
//!
//! 5. **Merkle Commitment** - A SHA-256 Merkle tree over record digests for
//!    third-party inclusion proofs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        POE REGISTRY                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌───────────────────┐              ┌─────────────────────────┐     │
//! │  │  REGISTRY LOGIC   │   &Storage   │     SLED STORAGE        │     │
//! │  │  (stateless)      │─────────────▶│                         │     │
//! │  │                   │              │  • records              │     │
//! │  │  • validate       │              │  • owner index / counts │     │
//! │  │  • add / query    │              │  • registry meta        │     │
//! │  │  • toggle breaker │              │  • proxy meta           │     │
//! │  └─────────┬─────────┘              └─────────────────────────┘     │
//! │            │                                                        │
//! │  ┌─────────▼─────────┐              ┌─────────────────────────┐     │
//! │  │  ACCESS CONTROL   │              │     MERKLE TREE         │     │
//! │  │  registry / front │              │  record digests → root  │     │
//! │  └───────────────────┘              └─────────────────────────┘     │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use poe_registry::registry::{RegistryLogic, StandardLogic};
//! use poe_registry::storage::Storage;
//! use poe_registry::{Address, ContentHash, FileSubmission, Locator, RegistryError, Tags};
//!
//! let storage = Storage::temporary().unwrap();
//! let owner = Address::from_low_u64(1);
//! storage.initialize(owner).unwrap();
//!
//! let logic = StandardLogic::new(Address::from_low_u64(0x100));
//! let hash = ContentHash::digest(b"raw file bytes");
//! let submission = FileSubmission::new(
//!     1_700_000_000,
//!     hash,
//!     Tags::new("tag1;tag2").unwrap(),
//!     Locator::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"),
//! );
//!
//! logic.add_my_file(&storage, submission.clone(), &owner).unwrap();
//!
//! // Registered content resolves to its record...
//! assert_eq!(logic.file_details(&storage, &hash).unwrap().owner, owner);
//!
//! // ...and a second registration of the same hash is refused.
//! assert!(matches!(
//!     logic.add_my_file(&storage, submission, &owner),
//!     Err(RegistryError::DuplicateRecord(_))
//! ));
//!
//! // Unknown content yields the zero record, not an error.
//! let missing = logic.file_details(&storage, &ContentHash::digest(b"other")).unwrap();
//! assert!(missing.is_empty());
//! ```
//!
//! ## Security Considerations
//!
//! - **Zero Record**: `file_details` never fails for a missing hash. Always
//!   check [`Record::is_empty`] before trusting a lookup.
//!
//! - **Timestamps**: `created_at` is supplied by the caller and only checked
//!   to be non-zero. It is a claim, not a proof of time.
//!
//! - **Storage Security**: The registry does not encrypt data at rest. Store
//!   the database on access-controlled storage.

pub mod access;
pub mod merkle;
pub mod models;
pub mod registry;
pub mod storage;

pub use access::{AccessControl, OwnerSlot};
pub use models::{
    Address, ContentHash, FileSubmission, Hash, Locator, MerkleProof, Record, RegistryError,
    RegistryEvent, Result, Tags,
};
pub use registry::{RegistryLimits, RegistryLogic, StandardLogic};
pub use storage::Storage;

#[cfg(test)]
mod tests;
