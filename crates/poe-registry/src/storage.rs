//! # Persistent Storage Layer
//!
//! This module provides the persistence layer using Sled, an embedded
//! database. All registry and front state lives here, so a logic revision
//! can be swapped without touching a single stored byte.
//!
//! ## Storage Structure
//!
//! The database is split into two disjoint regions. Logic revisions only
//! ever write to the registry region; the proxy region belongs to the front.
//!
//! | Region | Tree | Key | Value |
//! |--------|------|-----|-------|
//! | registry | `records` | content hash (32 bytes) | JSON `Record` |
//! | registry | `owner_index` | owner (20) ++ position (u64 BE) | content hash |
//! | registry | `owner_counts` | owner (20) | u64 BE |
//! | registry | `registry_meta` | `enabled`, `total_count`, `owner` | flag / u64 BE / address |
//! | proxy | `proxy_meta` | `implementation`, `owner`, `balance` | address / address / u128 BE |
//!
//! ## Atomicity
//!
//! Every mutation is a single sled transaction over all the trees it
//! touches. Guards (breaker, ownership, record fields, uniqueness) are
//! evaluated inside the transaction, so a failed guard aborts with nothing
//! written.
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>

use crate::access::{check_owner, OwnerSlot};
use crate::models::{Address, ContentHash, Record, RegistryError, Result, HASH_SIZE};
use crate::registry::RegistryLimits;
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, Transactional,
    TransactionalTree,
};
use sled::IVec;
use std::path::Path;

const RECORD_TREE: &str = "records";
const OWNER_INDEX_TREE: &str = "owner_index";
const OWNER_COUNT_TREE: &str = "owner_counts";
const REGISTRY_META_TREE: &str = "registry_meta";
const PROXY_META_TREE: &str = "proxy_meta";

const KEY_ENABLED: &[u8] = b"enabled";
const KEY_TOTAL_COUNT: &[u8] = b"total_count";
const KEY_IMPLEMENTATION: &[u8] = b"implementation";
const KEY_BALANCE: &[u8] = b"balance";
pub(crate) const KEY_OWNER: &[u8] = b"owner";

pub(crate) type TxResult<T> = ConflictableTransactionResult<T, RegistryError>;

pub(crate) fn decode_u64(bytes: Option<IVec>) -> Result<u64> {
    match bytes {
        None => Ok(0),
        Some(bytes) => {
            let array: [u8; 8] = bytes
                .as_ref()
                .try_into()
                .map_err(|_| RegistryError::Corrupted("counter is not 8 bytes".to_string()))?;
            Ok(u64::from_be_bytes(array))
        }
    }
}

fn decode_u128(bytes: Option<IVec>) -> Result<u128> {
    match bytes {
        None => Ok(0),
        Some(bytes) => {
            let array: [u8; 16] = bytes
                .as_ref()
                .try_into()
                .map_err(|_| RegistryError::Corrupted("balance is not 16 bytes".to_string()))?;
            Ok(u128::from_be_bytes(array))
        }
    }
}

pub(crate) fn decode_address(bytes: Option<IVec>) -> Result<Option<Address>> {
    match bytes {
        None => Ok(None),
        Some(bytes) => Address::from_slice(&bytes)
            .map(Some)
            .ok_or_else(|| RegistryError::Corrupted("address is not 20 bytes".to_string())),
    }
}

/// A missing flag means the registry was never toggled and is open.
fn decode_enabled(bytes: Option<IVec>) -> bool {
    bytes.map_or(true, |flag| flag.first() != Some(&0))
}

fn index_key(owner: &Address, position: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.as_bytes().len() + 8);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(&position.to_be_bytes());
    key
}

/// Field checks every committed record must pass, whichever logic built it.
fn check_fields(record: &Record, limits: &RegistryLimits) -> Result<()> {
    if record.owner.is_zero() {
        return Err(RegistryError::InvalidOwner);
    }
    let locator_len = record.locator.len();
    if locator_len == 0 || locator_len != limits.locator_len {
        return Err(RegistryError::InvalidLocator {
            len: locator_len,
            expected: limits.locator_len,
        });
    }
    if record.content_hash.is_empty() {
        return Err(RegistryError::InvalidContentHash);
    }
    if record.created_at == 0 {
        return Err(RegistryError::InvalidTimestamp);
    }
    Ok(())
}

/// Lifts a registry error into a transaction abort.
pub(crate) fn aborting<T>(result: Result<T>) -> TxResult<T> {
    result.map_err(ConflictableTransactionError::Abort)
}

/// Handle to the registry database.
///
/// Cloning is cheap and every clone sees the same trees. The handle is the
/// only state a logic revision ever receives, which is what lets the front
/// swap logic without migrating data.
///
/// # Example
///
/// ```rust
/// use poe_registry::storage::Storage;
///
/// let storage = Storage::temporary().unwrap();
/// assert_eq!(storage.total_count().unwrap(), 0);
/// assert!(storage.is_enabled().unwrap());
/// ```
#[derive(Clone)]
pub struct Storage {
    /// The underlying Sled database.
    db: sled::Db,

    records: sled::Tree,
    owner_index: sled::Tree,
    owner_counts: sled::Tree,
    registry_meta: sled::Tree,
    proxy_meta: sled::Tree,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Database` if:
    /// - The path is invalid
    /// - Permissions are insufficient
    /// - The database is corrupted
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// Creates a temporary in-memory storage for testing.
    ///
    /// The database is lost when the last clone of the handle is dropped.
    pub fn temporary() -> Result<Self> {
        let config = sled::Config::new().temporary(true);
        Self::from_db(config.open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Storage {
            records: db.open_tree(RECORD_TREE)?,
            owner_index: db.open_tree(OWNER_INDEX_TREE)?,
            owner_counts: db.open_tree(OWNER_COUNT_TREE)?,
            registry_meta: db.open_tree(REGISTRY_META_TREE)?,
            proxy_meta: db.open_tree(PROXY_META_TREE)?,
            db,
        })
    }

    /// Tree holding the owner of the given slot.
    pub(crate) fn owner_tree(&self, slot: OwnerSlot) -> &sled::Tree {
        match slot {
            OwnerSlot::Registry => &self.registry_meta,
            OwnerSlot::Front => &self.proxy_meta,
        }
    }

    /// Claims both ownership slots for `deployer` on a fresh database.
    ///
    /// Slots that already have an owner are left alone, so reopening an
    /// existing database never changes who owns it.
    ///
    /// # Returns
    ///
    /// `true` if at least one slot was claimed.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidAddress` if `deployer` is zero and a
    /// slot still needs an owner.
    pub fn initialize(&self, deployer: Address) -> Result<bool> {
        let trees = (&self.registry_meta, &self.proxy_meta);

        let claimed = trees.transaction(|(registry, proxy)| -> TxResult<bool> {
            let mut claimed = false;
            for tree in [registry, proxy] {
                if tree.get(KEY_OWNER)?.is_none() {
                    if deployer.is_zero() {
                        return abort(RegistryError::InvalidAddress);
                    }
                    tree.insert(KEY_OWNER, deployer.as_bytes().as_slice())?;
                    claimed = true;
                }
            }
            Ok(claimed)
        })?;

        Ok(claimed)
    }

    /// Loads a record by content hash.
    ///
    /// # Returns
    ///
    /// `Some(record)` if registered, `None` otherwise.
    pub fn load_record(&self, hash: &ContentHash) -> Result<Option<Record>> {
        match self.records.get(hash.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Commits a new record and indexes it under its owner.
    ///
    /// Inside one transaction this checks the breaker, the record's fields
    /// against `limits`, and uniqueness, then writes the record, appends to
    /// the owner index, and bumps both the owner count and the global count.
    ///
    /// # Returns
    ///
    /// The record's position in its owner's index.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RegistryDisabled` if the breaker is tripped
    /// - `RegistryError::InvalidOwner` if the owner is zero
    /// - `RegistryError::InvalidLocator` if the locator is empty or not `limits.locator_len` wide
    /// - `RegistryError::InvalidContentHash` if the hash is empty
    /// - `RegistryError::InvalidTimestamp` if `created_at` is zero
    /// - `RegistryError::DuplicateRecord` if the hash is taken
    pub fn append_record(&self, record: &Record, limits: &RegistryLimits) -> Result<u64> {
        let value = serde_json::to_vec(record)?;
        let hash_key = record.content_hash.as_bytes().as_slice();
        let owner_key = record.owner.as_bytes().as_slice();

        let trees = (
            &self.records,
            &self.owner_index,
            &self.owner_counts,
            &self.registry_meta,
        );

        let position = trees.transaction(|(records, index, counts, meta)| -> TxResult<u64> {
            if !decode_enabled(meta.get(KEY_ENABLED)?) {
                return abort(RegistryError::RegistryDisabled);
            }
            aborting(check_fields(record, limits))?;
            if records.get(hash_key)?.is_some() {
                return abort(RegistryError::DuplicateRecord(record.content_hash));
            }

            let position = aborting(decode_u64(counts.get(owner_key)?))?;
            let total = aborting(decode_u64(meta.get(KEY_TOTAL_COUNT)?))?;

            records.insert(hash_key, value.as_slice())?;
            index.insert(index_key(&record.owner, position), hash_key)?;
            counts.insert(owner_key, (position + 1).to_be_bytes().as_slice())?;
            meta.insert(KEY_TOTAL_COUNT, (total + 1).to_be_bytes().as_slice())?;

            Ok(position)
        })?;

        Ok(position)
    }

    /// Number of records attributed to `owner`.
    pub fn owner_count(&self, owner: &Address) -> Result<u64> {
        decode_u64(self.owner_counts.get(owner.as_bytes())?)
    }

    /// Loads the record at `position` in `owner`'s index.
    pub fn owner_record_at(&self, owner: &Address, position: u64) -> Result<Option<Record>> {
        let Some(hash_bytes) = self.owner_index.get(index_key(owner, position))? else {
            return Ok(None);
        };
        if hash_bytes.len() != HASH_SIZE {
            return Err(RegistryError::Corrupted(
                "owner index entry is not a content hash".to_string(),
            ));
        }
        let hash = ContentHash::from_slice(&hash_bytes)?;
        match self.load_record(&hash)? {
            Some(record) => Ok(Some(record)),
            None => Err(RegistryError::Corrupted(format!(
                "owner index points at missing record {}",
                hash
            ))),
        }
    }

    /// Number of records ever committed.
    pub fn total_count(&self) -> Result<u64> {
        decode_u64(self.registry_meta.get(KEY_TOTAL_COUNT)?)
    }

    /// Current breaker state. `true` means the registry accepts additions.
    pub fn is_enabled(&self) -> Result<bool> {
        Ok(decode_enabled(self.registry_meta.get(KEY_ENABLED)?))
    }

    /// Flips the breaker if `caller` owns the registry slot.
    ///
    /// # Returns
    ///
    /// The new breaker state.
    pub fn toggle_enabled(&self, caller: &Address) -> Result<bool> {
        let enabled = self.registry_meta.transaction(|meta| -> TxResult<bool> {
            check_owner(meta, caller)?;
            let enabled = !decode_enabled(meta.get(KEY_ENABLED)?);
            meta.insert(KEY_ENABLED, &[u8::from(enabled)][..])?;
            Ok(enabled)
        })?;

        Ok(enabled)
    }

    /// All records in content-hash order.
    pub fn list_records(&self) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.records.len());
        for entry in self.records.iter() {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    /// Handle of the active logic revision, if one has been set.
    pub fn implementation(&self) -> Result<Option<Address>> {
        decode_address(self.proxy_meta.get(KEY_IMPLEMENTATION)?)
    }

    /// Replaces the active logic handle if `caller` owns the front slot.
    ///
    /// Only `proxy_meta` takes part in the transaction; the registry region
    /// cannot be touched by an upgrade.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AccessDenied` if `caller` is not the front owner
    /// - `RegistryError::InvalidUpgradeTarget` if `implementation` is zero or current
    pub fn set_implementation(&self, implementation: Address, caller: &Address) -> Result<()> {
        self.proxy_meta.transaction(|proxy| -> TxResult<()> {
            check_owner(proxy, caller)?;
            let current = aborting(decode_address(proxy.get(KEY_IMPLEMENTATION)?))?;
            if implementation.is_zero() || current == Some(implementation) {
                return abort(RegistryError::InvalidUpgradeTarget(implementation));
            }
            proxy.insert(KEY_IMPLEMENTATION, implementation.as_bytes().as_slice())?;
            Ok(())
        })?;

        Ok(())
    }

    /// Funds held by the front.
    pub fn balance(&self) -> Result<u128> {
        decode_u128(self.proxy_meta.get(KEY_BALANCE)?)
    }

    /// Adds `amount` to the front balance.
    ///
    /// # Returns
    ///
    /// The new balance.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::BalanceOverflow` if the sum exceeds `u128::MAX`;
    /// the balance is left unchanged.
    pub fn credit(&self, amount: u128) -> Result<u128> {
        let balance = self.proxy_meta.transaction(|proxy| -> TxResult<u128> {
            let current = aborting(decode_u128(proxy.get(KEY_BALANCE)?))?;
            let Some(balance) = current.checked_add(amount) else {
                return abort(RegistryError::BalanceOverflow {
                    balance: current,
                    amount,
                });
            };
            proxy.insert(KEY_BALANCE, balance.to_be_bytes().as_slice())?;
            Ok(balance)
        })?;

        Ok(balance)
    }

    /// Empties the front balance if `caller` owns the front slot.
    ///
    /// # Returns
    ///
    /// The amount that was held.
    pub fn drain_balance(&self, caller: &Address) -> Result<u128> {
        let drained = self.proxy_meta.transaction(|proxy| -> TxResult<u128> {
            check_owner(proxy, caller)?;
            let balance = aborting(decode_u128(proxy.get(KEY_BALANCE)?))?;
            proxy.insert(KEY_BALANCE, 0u128.to_be_bytes().as_slice())?;
            Ok(balance)
        })?;

        Ok(drained)
    }

    /// Flushes all pending writes to disk.
    ///
    /// # Returns
    ///
    /// The number of bytes flushed.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

/// Reads the owner stored in a transactional view of an owner tree.
pub(crate) fn read_owner(tree: &TransactionalTree) -> TxResult<Address> {
    let owner = aborting(decode_address(tree.get(KEY_OWNER)?))?;
    Ok(owner.unwrap_or(Address::ZERO))
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("records_count", &self.records.len())
            .finish()
    }
}
