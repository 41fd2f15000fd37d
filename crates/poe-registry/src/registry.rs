//! # Registry Logic
//!
//! This module defines the contract every registry logic revision
//! implements, and the standard revision.
//!
//! ## Stateless Logic
//!
//! A logic revision owns no data. Every operation receives the shared
//! [`Storage`] handle explicitly, so the upgradeable front can swap one
//! revision for another and the new one picks up exactly where the old one
//! left off.
//!
//! ```text
//!      UpgradableFront ──── &Storage ────┐
//!            │                           ▼
//!            │ forwards        ┌────────────────────┐
//!            └───────────────▶ │ dyn RegistryLogic  │
//!                              │ (handle + limits)  │
//!                              └─────────┬──────────┘
//!                                        │ require_owner
//!                                        ▼
//!                                 AccessControl
//! ```
//!
//! ## Mutation Order
//!
//! Adds check the breaker first, then validate fields against the
//! revision's [`RegistryLimits`], then check uniqueness. All three happen
//! inside the storage transaction that commits the record, so no revision
//! can commit a record with an empty field.

use crate::access::AccessControl;
use crate::models::{
    Address, ContentHash, FileSubmission, Record, RegistryError, RegistryEvent, Result,
};
use crate::storage::Storage;
use std::fmt;
use tracing::{debug, info, warn};

/// Encoded width of a base58 CIDv0 locator ("Qm" + 44 characters).
pub const DEFAULT_LOCATOR_LEN: usize = 46;

/// Validation limits baked into a logic revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    /// Exact encoded width every locator must have.
    pub locator_len: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        RegistryLimits {
            locator_len: DEFAULT_LOCATOR_LEN,
        }
    }
}

/// The registry contract a logic revision fulfils.
///
/// Implementations must not keep registry data of their own: everything
/// they read or write goes through `storage`.
pub trait RegistryLogic: Send + Sync + fmt::Debug {
    /// Handle the front uses to address this revision.
    fn address(&self) -> Address;

    /// Adds a record attributed to `owner`, on behalf of any `caller`.
    fn add_file(
        &self,
        storage: &Storage,
        owner: Address,
        submission: FileSubmission,
        caller: &Address,
    ) -> Result<RegistryEvent>;

    /// Adds a record attributed to the caller.
    fn add_my_file(
        &self,
        storage: &Storage,
        submission: FileSubmission,
        caller: &Address,
    ) -> Result<RegistryEvent> {
        self.add_file(storage, *caller, submission, caller)
    }

    /// Looks up a record. Unknown hashes yield the zero record, not an error.
    fn file_details(&self, storage: &Storage, content_hash: &ContentHash) -> Result<Record>;

    /// Number of records attributed to `owner`.
    fn count_of_files(&self, storage: &Storage, owner: &Address) -> Result<u64>;

    /// Number of records attributed to the caller.
    fn count_of_my_files(&self, storage: &Storage, caller: &Address) -> Result<u64> {
        self.count_of_files(storage, caller)
    }

    /// The caller's record at `index`, in insertion order.
    fn my_file_by_id(&self, storage: &Storage, index: u64, caller: &Address) -> Result<Record>;

    /// Flips the circuit breaker. Registry owner only.
    fn toggle_contract_state(&self, storage: &Storage, caller: &Address) -> Result<RegistryEvent>;

    /// Hands the registry owner slot to `new_owner`.
    fn transfer_ownership(
        &self,
        storage: &Storage,
        new_owner: Address,
        caller: &Address,
    ) -> Result<RegistryEvent>;

    /// Current registry owner.
    fn owner(&self, storage: &Storage) -> Result<Address>;

    /// Whether additions are currently accepted.
    fn is_enabled(&self, storage: &Storage) -> Result<bool>;

    /// Number of records ever committed.
    fn total_count(&self, storage: &Storage) -> Result<u64>;
}

/// The standard registry logic.
///
/// Several instances may run the same code under different handles, the
/// way the same logic can be redeployed and upgraded to.
///
/// # Example
///
/// ```rust
/// use poe_registry::registry::{RegistryLogic, StandardLogic};
/// use poe_registry::storage::Storage;
/// use poe_registry::{Address, ContentHash, FileSubmission, Locator, Tags};
///
/// let storage = Storage::temporary().unwrap();
/// let alice = Address::from_low_u64(1);
/// storage.initialize(alice).unwrap();
///
/// let logic = StandardLogic::new(Address::from_low_u64(0x100));
/// let submission = FileSubmission::new(
///     1_000,
///     ContentHash::digest(b"file bytes"),
///     Tags::new("invoice").unwrap(),
///     Locator::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"),
/// );
///
/// logic.add_my_file(&storage, submission, &alice).unwrap();
/// assert_eq!(logic.count_of_my_files(&storage, &alice).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct StandardLogic {
    address: Address,
    limits: RegistryLimits,
    access: AccessControl,
}

impl StandardLogic {
    pub fn new(address: Address) -> Self {
        Self::with_limits(address, RegistryLimits::default())
    }

    pub fn with_limits(address: Address, limits: RegistryLimits) -> Self {
        StandardLogic {
            address,
            limits,
            access: AccessControl::registry(),
        }
    }

}

impl RegistryLogic for StandardLogic {
    fn address(&self) -> Address {
        self.address
    }

    fn add_file(
        &self,
        storage: &Storage,
        owner: Address,
        submission: FileSubmission,
        caller: &Address,
    ) -> Result<RegistryEvent> {
        let record = submission.into_record(owner);
        let position = match storage.append_record(&record, &self.limits) {
            Ok(position) => position,
            Err(err) => {
                warn!("Add of {} rejected: {}", record.content_hash, err);
                return Err(err);
            }
        };

        debug!(
            "Record {} added by {} at position {} for {}",
            record.content_hash, caller, position, owner
        );

        Ok(RegistryEvent::FileAdded { record, owner })
    }

    fn file_details(&self, storage: &Storage, content_hash: &ContentHash) -> Result<Record> {
        Ok(storage.load_record(content_hash)?.unwrap_or_default())
    }

    fn count_of_files(&self, storage: &Storage, owner: &Address) -> Result<u64> {
        storage.owner_count(owner)
    }

    fn my_file_by_id(&self, storage: &Storage, index: u64, caller: &Address) -> Result<Record> {
        match storage.owner_record_at(caller, index)? {
            Some(record) => Ok(record),
            None => Err(RegistryError::IndexOutOfRange {
                index,
                len: storage.owner_count(caller)?,
            }),
        }
    }

    fn toggle_contract_state(&self, storage: &Storage, caller: &Address) -> Result<RegistryEvent> {
        self.access.require_owner(storage, caller)?;
        let enabled = storage.toggle_enabled(caller)?;

        info!("Registry {} by {}", if enabled { "enabled" } else { "disabled" }, caller);

        Ok(RegistryEvent::StateChanged {
            who: *caller,
            enabled,
        })
    }

    fn transfer_ownership(
        &self,
        storage: &Storage,
        new_owner: Address,
        caller: &Address,
    ) -> Result<RegistryEvent> {
        self.access.transfer_ownership(storage, new_owner, caller)
    }

    fn owner(&self, storage: &Storage) -> Result<Address> {
        self.access.owner(storage)
    }

    fn is_enabled(&self, storage: &Storage) -> Result<bool> {
        storage.is_enabled()
    }

    fn total_count(&self, storage: &Storage) -> Result<u64> {
        storage.total_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Locator, Tags};

    const LOCATOR: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    fn alice() -> Address {
        Address::from_low_u64(1)
    }

    fn setup() -> (Storage, StandardLogic) {
        let storage = Storage::temporary().unwrap();
        storage.initialize(alice()).unwrap();
        (storage, StandardLogic::new(Address::from_low_u64(0x100)))
    }

    fn submission(name: &str) -> FileSubmission {
        FileSubmission::new(
            1_000,
            ContentHash::from_slice(name.as_bytes()).unwrap(),
            Tags::new("tag1;tag2;tag3").unwrap(),
            Locator::new(LOCATOR),
        )
    }

    #[test]
    fn test_add_file_emits_full_record() {
        let (storage, logic) = setup();
        let event = logic
            .add_file(&storage, alice(), submission("0xABCDEFGH"), &alice())
            .unwrap();

        match event {
            RegistryEvent::FileAdded { record, owner } => {
                assert_eq!(owner, alice());
                assert_eq!(record.owner, alice());
                assert_eq!(record.created_at, 1_000);
                assert_eq!(record.tags.as_str(), "tag1;tag2;tag3");
                assert_eq!(record.locator.as_str(), LOCATOR);
            }
            other => panic!("Expected FileAdded, got {:?}", other),
        }
    }

    #[test]
    fn test_add_for_third_party() {
        let (storage, logic) = setup();
        let bob = Address::from_low_u64(2);
        logic
            .add_file(&storage, bob, submission("bobs"), &alice())
            .unwrap();

        assert_eq!(logic.count_of_files(&storage, &bob).unwrap(), 1);
        assert_eq!(logic.count_of_my_files(&storage, &alice()).unwrap(), 0);
    }

    #[test]
    fn test_validation_order() {
        let (storage, logic) = setup();

        // Every field is bad: the owner check must win.
        let bad = FileSubmission::new(0, ContentHash::ZERO, Tags::default(), Locator::new(""));
        assert!(matches!(
            logic.add_file(&storage, Address::ZERO, bad.clone(), &alice()),
            Err(RegistryError::InvalidOwner)
        ));
        assert!(matches!(
            logic.add_file(&storage, alice(), bad, &alice()),
            Err(RegistryError::InvalidLocator { len: 0, expected: 46 })
        ));

        let mut no_hash = submission("x");
        no_hash.content_hash = ContentHash::ZERO;
        no_hash.created_at = 0;
        assert!(matches!(
            logic.add_my_file(&storage, no_hash, &alice()),
            Err(RegistryError::InvalidContentHash)
        ));

        let mut no_time = submission("x");
        no_time.created_at = 0;
        assert!(matches!(
            logic.add_my_file(&storage, no_time, &alice()),
            Err(RegistryError::InvalidTimestamp)
        ));

        assert_eq!(logic.total_count(&storage).unwrap(), 0);
    }

    #[test]
    fn test_overlong_locator_rejected() {
        let (storage, logic) = setup();
        let mut long = submission("x");
        long.locator = Locator::new(format!("{}XXX", LOCATOR));
        assert!(matches!(
            logic.add_my_file(&storage, long, &alice()),
            Err(RegistryError::InvalidLocator { len: 49, .. })
        ));
    }

    #[test]
    fn test_custom_locator_width() {
        let storage = Storage::temporary().unwrap();
        storage.initialize(alice()).unwrap();
        let logic =
            StandardLogic::with_limits(Address::from_low_u64(7), RegistryLimits { locator_len: 2 });

        let mut short = submission("x");
        short.locator = Locator::new("L1");
        logic.add_my_file(&storage, short, &alice()).unwrap();
        assert!(logic.add_my_file(&storage, submission("y"), &alice()).is_err());
    }

    #[test]
    fn test_disabled_beats_validation() {
        let (storage, logic) = setup();
        logic.toggle_contract_state(&storage, &alice()).unwrap();

        let bad = FileSubmission::new(0, ContentHash::ZERO, Tags::default(), Locator::new(""));
        assert!(matches!(
            logic.add_file(&storage, Address::ZERO, bad, &alice()),
            Err(RegistryError::RegistryDisabled)
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let (storage, logic) = setup();
        logic.add_my_file(&storage, submission("dup"), &alice()).unwrap();
        assert!(matches!(
            logic.add_my_file(&storage, submission("dup"), &alice()),
            Err(RegistryError::DuplicateRecord(_))
        ));
        assert_eq!(logic.total_count(&storage).unwrap(), 1);
    }

    #[test]
    fn test_file_details_zero_record() {
        let (storage, logic) = setup();
        let hash = ContentHash::from_slice(b"0xABCDEFGH").unwrap();
        let record = logic.file_details(&storage, &hash).unwrap();
        assert!(record.is_empty());
        assert_eq!(record, Record::default());
    }

    #[test]
    fn test_my_file_by_id() {
        let (storage, logic) = setup();
        for name in ["0x123456", "0xabcdef", "0xtest"] {
            logic.add_my_file(&storage, submission(name), &alice()).unwrap();
        }

        let record = logic.my_file_by_id(&storage, 2, &alice()).unwrap();
        assert_eq!(record.content_hash, ContentHash::from_slice(b"0xtest").unwrap());

        assert!(matches!(
            logic.my_file_by_id(&storage, 3, &alice()),
            Err(RegistryError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_toggle_emits_new_state() {
        let (storage, logic) = setup();
        let event = logic.toggle_contract_state(&storage, &alice()).unwrap();
        assert_eq!(
            event,
            RegistryEvent::StateChanged {
                who: alice(),
                enabled: false
            }
        );
        assert!(!logic.is_enabled(&storage).unwrap());

        let bob = Address::from_low_u64(2);
        assert!(matches!(
            logic.toggle_contract_state(&storage, &bob),
            Err(RegistryError::AccessDenied { .. })
        ));
        assert!(!logic.is_enabled(&storage).unwrap());
    }

    #[test]
    fn test_reads_survive_breaker() {
        let (storage, logic) = setup();
        logic.add_my_file(&storage, submission("kept"), &alice()).unwrap();
        logic.toggle_contract_state(&storage, &alice()).unwrap();

        let hash = ContentHash::from_slice(b"kept").unwrap();
        assert!(!logic.file_details(&storage, &hash).unwrap().is_empty());
        assert_eq!(logic.count_of_my_files(&storage, &alice()).unwrap(), 1);
        assert!(logic.my_file_by_id(&storage, 0, &alice()).is_ok());
    }
}
