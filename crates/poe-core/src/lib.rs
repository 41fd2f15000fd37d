//! # Proof-of-Existence Core
//!
//! Upgradeable front for the proof-of-existence registry.
//! Holds the persistent state and delegates every registry call to the
//! active logic revision.
//!
//! ## State Regions
//!
//! | Region | Contents | Written by |
//! |--------|----------|------------|
//! | Registry | records, owner index, breaker, registry owner | logic revisions |
//! | Proxy | active revision, front owner, balance | the front |
//!
//! An upgrade writes only the proxy region, so the new revision runs over
//! the data the old one left behind.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    POE CORE                                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌─────────────────┐                          │
//! │   caller ────────▶ │ UpgradableFront │  ← stable handle         │
//! │                    └────────┬────────┘                          │
//! │                             │ active()                          │
//! │         ┌───────────────────┼───────────────────┐               │
//! │         ▼                   ▼                   ▼               │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │  Logic v1   │    │  Logic v2   │    │   Merkle    │          │
//! │  │ (installed) │    │  (active)   │    │ commitment  │          │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘          │
//! │                            ▼                                    │
//! │                   ┌─────────────────┐                           │
//! │                   │  sled Storage   │                           │
//! │                   └─────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poe_core::{PoeConfig, UpgradableFront};
//!
//! let config = PoeConfig::load("poe.toml")?;
//! let mut front = UpgradableFront::from_config(&config)?;
//!
//! let event = front.add_my_file(submission, &caller)?;
//! println!("{}", serde_json::to_string(&event)?);
//! ```
//!
//! ## Security Notes
//!
//! - Front owner and registry owner are separate slots; transferring one
//!   never moves the other
//! - Every mutation is all-or-nothing: a rejected call leaves no trace
//! - `file_details` returns the zero record for unknown hashes

mod config;
mod error;
mod front;

pub use config::{FrontConfig, PoeConfig, RegistryConfig};
pub use error::PoeError;
pub use front::UpgradableFront;

// Re-export registry types for convenience
pub use poe_registry::{
    Address, ContentHash, FileSubmission, Locator, MerkleProof, Record, RegistryError,
    RegistryEvent, RegistryLogic, StandardLogic, Storage, Tags,
};

/// Core result type for front and configuration operations.
pub type Result<T> = std::result::Result<T, PoeError>;
