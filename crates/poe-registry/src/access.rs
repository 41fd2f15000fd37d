//! # Access Control
//!
//! Single-owner gating for privileged operations. The owner identity is not
//! held in memory: it lives in a storage slot, so it survives restarts and
//! logic upgrades just like the records do.
//!
//! Two slots exist and are tracked independently:
//!
//! | Slot | Tree | Gates |
//! |------|------|-------|
//! | [`OwnerSlot::Registry`] | `registry_meta` | breaker toggle, registry ownership transfer |
//! | [`OwnerSlot::Front`] | `proxy_meta` | upgrades, withdrawals, front ownership transfer |
//!
//! Both are claimed by the deployer when a database is first initialized.
//! Transferring one never moves the other.

use crate::models::{Address, RegistryError, RegistryEvent, Result};
use crate::storage::{decode_address, read_owner, Storage, TxResult, KEY_OWNER};
use sled::transaction::{abort, TransactionalTree};
use tracing::{info, warn};

/// Which ownership slot an [`AccessControl`] guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSlot {
    /// Owner of the registry state (breaker, registry ownership).
    Registry,
    /// Owner of the upgradeable front (upgrades, balance).
    Front,
}

/// Fails the enclosing transaction unless `caller` owns the slot behind `tree`.
///
/// An unclaimed slot (zero owner) denies everyone, including the zero address.
pub(crate) fn check_owner(tree: &TransactionalTree, caller: &Address) -> TxResult<Address> {
    let owner = read_owner(tree)?;
    if owner.is_zero() || owner != *caller {
        return abort(RegistryError::AccessDenied { caller: *caller });
    }
    Ok(owner)
}

/// Owner gate over one storage slot.
///
/// # Example
///
/// ```rust
/// use poe_registry::access::AccessControl;
/// use poe_registry::storage::Storage;
/// use poe_registry::{Address, RegistryError};
///
/// let storage = Storage::temporary().unwrap();
/// let deployer = Address::from_low_u64(1);
/// storage.initialize(deployer).unwrap();
///
/// let access = AccessControl::registry();
/// assert!(access.require_owner(&storage, &deployer).is_ok());
/// assert!(matches!(
///     access.require_owner(&storage, &Address::from_low_u64(2)),
///     Err(RegistryError::AccessDenied { .. })
/// ));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessControl {
    slot: OwnerSlot,
}

impl AccessControl {
    /// Gate over the registry owner slot.
    pub const fn registry() -> Self {
        AccessControl {
            slot: OwnerSlot::Registry,
        }
    }

    /// Gate over the front owner slot.
    pub const fn front() -> Self {
        AccessControl {
            slot: OwnerSlot::Front,
        }
    }

    /// Current owner, or the zero address if the slot was never claimed.
    pub fn owner(&self, storage: &Storage) -> Result<Address> {
        let owner = storage.owner_tree(self.slot).get(KEY_OWNER)?;
        Ok(decode_address(owner)?.unwrap_or(Address::ZERO))
    }

    /// Fails with `AccessDenied` unless `caller` is the current owner.
    pub fn require_owner(&self, storage: &Storage, caller: &Address) -> Result<()> {
        let owner = self.owner(storage)?;
        if owner.is_zero() || owner != *caller {
            warn!("Access denied for {} on {:?} slot", caller, self.slot);
            return Err(RegistryError::AccessDenied { caller: *caller });
        }
        Ok(())
    }

    /// Hands the slot to `new_owner`.
    ///
    /// Transferring to the current owner is allowed and still emits the
    /// notification.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AccessDenied` if `caller` is not the owner
    /// - `RegistryError::InvalidAddress` if `new_owner` is zero
    pub fn transfer_ownership(
        &self,
        storage: &Storage,
        new_owner: Address,
        caller: &Address,
    ) -> Result<RegistryEvent> {
        let tree = storage.owner_tree(self.slot);

        let previous = tree.transaction(|slot| -> TxResult<Address> {
            let previous = check_owner(slot, caller)?;
            if new_owner.is_zero() {
                return abort(RegistryError::InvalidAddress);
            }
            slot.insert(KEY_OWNER, new_owner.as_bytes().as_slice())?;
            Ok(previous)
        })?;

        info!(
            "Ownership of {:?} slot transferred from {} to {}",
            self.slot, previous, new_owner
        );

        Ok(RegistryEvent::OwnershipTransferred {
            previous,
            new: new_owner,
        })
    }
}
