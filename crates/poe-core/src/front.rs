//! The upgradeable front.
//!
//! This module provides the stable entry point callers hold on to. The
//! [`UpgradableFront`] owns the storage handle and a catalog of installed
//! logic revisions, and forwards every registry call to whichever revision
//! is currently active. Swapping revisions rewrites a single handle in the
//! proxy region; records, indexes, owners and the breaker are untouched.

use crate::{config::PoeConfig, Result};

use poe_registry::merkle::MerkleTree;
use poe_registry::{
    AccessControl, Address, ContentHash, FileSubmission, Hash, MerkleProof, Record,
    RegistryError, RegistryEvent, RegistryLimits, RegistryLogic, StandardLogic, Storage,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stable handle over a registry whose logic can be replaced in place.
///
/// # Ordering
///
/// Mutating methods take `&mut self`, so one front never has two mutations
/// in flight. Each mutation commits as one storage transaction or not at
/// all. Reads take `&self` and see the last committed state.
///
/// # Example
///
/// ```rust
/// use poe_core::UpgradableFront;
/// use poe_registry::{Address, ContentHash, FileSubmission, Locator, StandardLogic, Storage, Tags};
/// use std::sync::Arc;
///
/// let deployer = Address::from_low_u64(1);
/// let mut front = UpgradableFront::open(Storage::temporary().unwrap(), deployer).unwrap();
///
/// let v1 = front.install(Arc::new(StandardLogic::new(Address::from_low_u64(0x100))));
/// front.upgrade_to(v1, &deployer).unwrap();
///
/// let hash = ContentHash::digest(b"report.pdf");
/// front
///     .add_my_file(
///         FileSubmission::new(
///             1_700_000_000,
///             hash,
///             Tags::new("report").unwrap(),
///             Locator::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"),
///         ),
///         &deployer,
///     )
///     .unwrap();
///
/// assert_eq!(front.file_details(&hash).unwrap().owner, deployer);
/// ```
pub struct UpgradableFront {
    /// Shared persistent state.
    storage: Storage,

    /// Installed logic revisions by handle.
    catalog: HashMap<Address, Arc<dyn RegistryLogic>>,

    /// Gate over the front owner slot.
    front_access: AccessControl,

    /// Commitment over every committed record.
    merkle_tree: MerkleTree,
}

impl UpgradableFront {
    /// Opens a front over `storage`.
    ///
    /// On a fresh database `deployer` claims both owner slots. The Merkle
    /// commitment is rebuilt from the stored records.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidAddress` if the database is fresh and `deployer` is zero
    /// - `RegistryError::Database` if storage cannot be read
    pub fn open(storage: Storage, deployer: Address) -> poe_registry::Result<Self> {
        if storage.initialize(deployer)? {
            info!("Fresh registry claimed by {}", deployer);
        }

        let records = storage.list_records()?;
        let merkle_tree = MerkleTree::from_records(&records);
        debug!("Front opened over {} records", records.len());

        Ok(Self {
            storage,
            catalog: HashMap::new(),
            front_access: AccessControl::front(),
            merkle_tree,
        })
    }

    /// Opens the configured database and installs the configured revisions.
    ///
    /// If no revision is active yet, the first configured one is activated
    /// on behalf of the deployer.
    pub fn from_config(config: &PoeConfig) -> Result<Self> {
        config.validate()?;

        let storage = Storage::open(&config.registry.db_path)?;
        let mut front = Self::open(storage, config.front.deployer)?;

        let limits = RegistryLimits {
            locator_len: config.registry.locator_len,
        };
        for handle in &config.front.implementations {
            front.install(Arc::new(StandardLogic::with_limits(*handle, limits)));
        }

        if front.implementation()?.is_none() {
            if let Some(first) = config.front.implementations.first() {
                front.upgrade_to(*first, &config.front.deployer)?;
            }
        }

        Ok(front)
    }

    /// Makes a logic revision addressable by its handle. No state changes.
    pub fn install(&mut self, logic: Arc<dyn RegistryLogic>) -> Address {
        let handle = logic.address();
        debug!("Installed logic {}", handle);
        self.catalog.insert(handle, logic);
        handle
    }

    /// Resolves the active revision.
    fn active(&self) -> poe_registry::Result<&Arc<dyn RegistryLogic>> {
        let handle = self
            .storage
            .implementation()?
            .ok_or(RegistryError::NoImplementation)?;
        self.catalog
            .get(&handle)
            .ok_or(RegistryError::UnknownImplementation(handle))
    }

    // =========================================================================
    // Forwarded registry operations
    // =========================================================================

    pub fn add_file(
        &mut self,
        owner: Address,
        submission: FileSubmission,
        caller: &Address,
    ) -> poe_registry::Result<RegistryEvent> {
        let event = self
            .active()?
            .add_file(&self.storage, owner, submission, caller)?;
        self.commit(&event);
        Ok(event)
    }

    pub fn add_my_file(
        &mut self,
        submission: FileSubmission,
        caller: &Address,
    ) -> poe_registry::Result<RegistryEvent> {
        let event = self
            .active()?
            .add_my_file(&self.storage, submission, caller)?;
        self.commit(&event);
        Ok(event)
    }

    /// Record for `content_hash`, or the zero record if none exists.
    ///
    /// A missing hash is not an error. Check [`Record::is_empty`] before
    /// trusting the result.
    pub fn file_details(&self, content_hash: &ContentHash) -> poe_registry::Result<Record> {
        self.active()?.file_details(&self.storage, content_hash)
    }

    pub fn count_of_files(&self, owner: &Address) -> poe_registry::Result<u64> {
        self.active()?.count_of_files(&self.storage, owner)
    }

    pub fn count_of_my_files(&self, caller: &Address) -> poe_registry::Result<u64> {
        self.active()?.count_of_my_files(&self.storage, caller)
    }

    pub fn my_file_by_id(&self, index: u64, caller: &Address) -> poe_registry::Result<Record> {
        self.active()?.my_file_by_id(&self.storage, index, caller)
    }

    pub fn toggle_contract_state(&mut self, caller: &Address) -> poe_registry::Result<RegistryEvent> {
        self.active()?.toggle_contract_state(&self.storage, caller)
    }

    /// Transfers the registry owner slot. The front owner is not affected.
    pub fn transfer_ownership(
        &mut self,
        new_owner: Address,
        caller: &Address,
    ) -> poe_registry::Result<RegistryEvent> {
        self.active()?
            .transfer_ownership(&self.storage, new_owner, caller)
    }

    pub fn owner(&self) -> poe_registry::Result<Address> {
        self.active()?.owner(&self.storage)
    }

    pub fn is_enabled(&self) -> poe_registry::Result<bool> {
        self.active()?.is_enabled(&self.storage)
    }

    pub fn total_count(&self) -> poe_registry::Result<u64> {
        self.active()?.total_count(&self.storage)
    }

    // =========================================================================
    // Front operations
    // =========================================================================

    /// Activates the installed revision `implementation`.
    ///
    /// Only the proxy region is written; every record, index, owner and the
    /// breaker stay exactly as they were.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AccessDenied` if `caller` is not the front owner
    /// - `RegistryError::InvalidUpgradeTarget` if `implementation` is zero,
    ///   already active, or not installed
    pub fn upgrade_to(
        &mut self,
        implementation: Address,
        caller: &Address,
    ) -> poe_registry::Result<RegistryEvent> {
        self.front_access.require_owner(&self.storage, caller)?;
        if !self.catalog.contains_key(&implementation) {
            warn!("Upgrade to uninstalled logic {} rejected", implementation);
            return Err(RegistryError::InvalidUpgradeTarget(implementation));
        }

        self.storage.set_implementation(implementation, caller)?;
        info!("Front upgraded to {} by {}", implementation, caller);

        Ok(RegistryEvent::Upgraded { implementation })
    }

    /// Pays the whole balance out to the front owner. A zero balance is allowed.
    pub fn withdraw(&mut self, caller: &Address) -> poe_registry::Result<RegistryEvent> {
        let amount = self.storage.drain_balance(caller)?;
        info!("Withdrawal of {} to {}", amount, caller);

        Ok(RegistryEvent::Withdrawal { to: *caller, amount })
    }

    /// Accepts value into the front.
    ///
    /// # Errors
    ///
    /// `RegistryError::BalanceOverflow` if the balance would pass `u128::MAX`.
    pub fn deposit(&mut self, from: Address, amount: u128) -> poe_registry::Result<RegistryEvent> {
        let balance = self.storage.credit(amount)?;
        debug!("Deposit of {} from {}, balance {}", amount, from, balance);

        Ok(RegistryEvent::Deposit { from, amount })
    }

    /// Transfers the front owner slot. The registry owner is not affected.
    pub fn transfer_front_ownership(
        &mut self,
        new_owner: Address,
        caller: &Address,
    ) -> poe_registry::Result<RegistryEvent> {
        self.front_access
            .transfer_ownership(&self.storage, new_owner, caller)
    }

    pub fn front_owner(&self) -> poe_registry::Result<Address> {
        self.front_access.owner(&self.storage)
    }

    /// Handle of the active revision, if any.
    pub fn implementation(&self) -> poe_registry::Result<Option<Address>> {
        self.storage.implementation()
    }

    pub fn balance(&self) -> poe_registry::Result<u128> {
        self.storage.balance()
    }

    // =========================================================================
    // Tamper evidence
    // =========================================================================

    /// Merkle root over every committed record.
    pub fn records_root(&self) -> Hash {
        self.merkle_tree.root()
    }

    /// Inclusion proof for a committed record.
    pub fn record_proof(&self, content_hash: &ContentHash) -> Option<MerkleProof> {
        self.merkle_tree.proof(content_hash)
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> poe_registry::Result<usize> {
        self.storage.flush()
    }

    fn commit(&mut self, event: &RegistryEvent) {
        if let RegistryEvent::FileAdded { record, .. } = event {
            self.merkle_tree.insert(record);
        }
    }
}

impl fmt::Debug for UpgradableFront {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut installed: Vec<&Address> = self.catalog.keys().collect();
        installed.sort();
        f.debug_struct("UpgradableFront")
            .field("storage", &self.storage)
            .field("installed", &installed)
            .field("records", &self.merkle_tree.len())
            .finish()
    }
}
