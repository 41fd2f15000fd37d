//! # Integration Tests for the Registry Core
//!
//! These tests drive storage, access control, logic and the Merkle
//! commitment together.
//!
//! ## Test Categories
//!
//! 1. **Invariants**: counts and indexes stay consistent with the records
//! 2. **Validation**: every bad field is rejected with no state change
//! 3. **Gating**: breaker and ownership
//! 4. **Swap**: two logic handles over one storage
//! 5. **Tamper Evidence**: proofs over stored records

use crate::merkle::MerkleTree;
use crate::models::{Address, ContentHash, FileSubmission, Locator, RegistryError, Tags};
use crate::registry::{RegistryLogic, StandardLogic};
use crate::storage::Storage;
use proptest::prelude::*;

// =============================================================================
// Helper Functions
// =============================================================================

const LOCATOR: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

fn deployer() -> Address {
    Address::from_low_u64(1)
}

fn setup() -> (Storage, StandardLogic) {
    let storage = Storage::temporary().unwrap();
    storage.initialize(deployer()).unwrap();
    (storage, StandardLogic::new(Address::from_low_u64(0x100)))
}

fn submission_for(seed: u8) -> FileSubmission {
    FileSubmission::new(
        1_000 + seed as u64,
        ContentHash::digest(&[seed]),
        Tags::new(format!("seed-{}", seed)).unwrap(),
        Locator::new(LOCATOR),
    )
}

/// Snapshot of every observable counter, for "no state change" checks.
fn snapshot(storage: &Storage, owners: &[Address]) -> (u64, bool, Vec<u64>) {
    (
        storage.total_count().unwrap(),
        storage.is_enabled().unwrap(),
        owners
            .iter()
            .map(|o| storage.owner_count(o).unwrap())
            .collect(),
    )
}

// =============================================================================
// Invariant Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_uniqueness_and_counts(
        ops in prop::collection::vec((0u8..12, 1u64..4, any::<bool>()), 1..40),
    ) {
        let (storage, logic) = setup();
        let mut seen = std::collections::HashSet::new();

        for (seed, owner_id, mine) in ops {
            let owner = Address::from_low_u64(owner_id);
            let result = if mine {
                logic.add_my_file(&storage, submission_for(seed), &owner)
            } else {
                logic.add_file(&storage, owner, submission_for(seed), &deployer())
            };

            if seen.insert(seed) {
                prop_assert!(result.is_ok());
            } else {
                let is_duplicate = matches!(result, Err(RegistryError::DuplicateRecord(_)));
                prop_assert!(is_duplicate);
            }
        }

        prop_assert_eq!(storage.total_count().unwrap(), seen.len() as u64);
        prop_assert_eq!(storage.list_records().unwrap().len(), seen.len());

        let indexed: u64 = (1u64..4)
            .map(|id| storage.owner_count(&Address::from_low_u64(id)).unwrap())
            .sum();
        prop_assert_eq!(indexed, seen.len() as u64);
    }

    #[test]
    fn prop_index_preserves_insertion_order(seeds in prop::collection::btree_set(0u8..=255, 1..20)) {
        let (storage, logic) = setup();
        let owner = Address::from_low_u64(7);
        // BTreeSet iteration is sorted; shuffle it deterministically by reversing.
        let order: Vec<u8> = seeds.into_iter().rev().collect();

        for (i, seed) in order.iter().enumerate() {
            if i % 2 == 0 {
                logic.add_my_file(&storage, submission_for(*seed), &owner).unwrap();
            } else {
                logic.add_file(&storage, owner, submission_for(*seed), &deployer()).unwrap();
            }
        }

        prop_assert_eq!(logic.count_of_my_files(&storage, &owner).unwrap(), order.len() as u64);
        prop_assert_eq!(logic.count_of_files(&storage, &owner).unwrap(), order.len() as u64);

        for (i, seed) in order.iter().enumerate() {
            let record = logic.my_file_by_id(&storage, i as u64, &owner).unwrap();
            prop_assert_eq!(record.content_hash, ContentHash::digest(&[*seed]));
        }
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_each_bad_field_rejected_without_change() {
    let (storage, logic) = setup();
    logic
        .add_my_file(&storage, submission_for(0), &deployer())
        .unwrap();
    let before = snapshot(&storage, &[deployer()]);

    let mut cases: Vec<(Address, FileSubmission, &str)> = Vec::new();
    cases.push((Address::ZERO, submission_for(1), "owner"));

    let mut empty_locator = submission_for(1);
    empty_locator.locator = Locator::new("");
    cases.push((deployer(), empty_locator, "locator"));

    let mut long_locator = submission_for(1);
    long_locator.locator = Locator::new(format!("{}XXX", LOCATOR));
    cases.push((deployer(), long_locator, "locator"));

    let mut empty_hash = submission_for(1);
    empty_hash.content_hash = ContentHash::ZERO;
    cases.push((deployer(), empty_hash, "hash"));

    let mut zero_time = submission_for(1);
    zero_time.created_at = 0;
    cases.push((deployer(), zero_time, "timestamp"));

    cases.push((deployer(), submission_for(0), "duplicate"));

    for (owner, submission, field) in cases {
        let result = logic.add_file(&storage, owner, submission, &deployer());
        let matched = match field {
            "owner" => matches!(result, Err(RegistryError::InvalidOwner)),
            "locator" => matches!(result, Err(RegistryError::InvalidLocator { .. })),
            "hash" => matches!(result, Err(RegistryError::InvalidContentHash)),
            "timestamp" => matches!(result, Err(RegistryError::InvalidTimestamp)),
            "duplicate" => matches!(result, Err(RegistryError::DuplicateRecord(_))),
            _ => false,
        };
        assert!(matched, "Unexpected result for bad {}: {:?}", field, result);
        assert_eq!(snapshot(&storage, &[deployer()]), before);
    }
}

// =============================================================================
// Gating Tests
// =============================================================================

#[test]
fn test_breaker_round_trip() {
    let (storage, logic) = setup();

    logic.toggle_contract_state(&storage, &deployer()).unwrap();
    for seed in 0..3 {
        assert!(matches!(
            logic.add_my_file(&storage, submission_for(seed), &deployer()),
            Err(RegistryError::RegistryDisabled)
        ));
    }
    assert_eq!(storage.total_count().unwrap(), 0);

    logic.toggle_contract_state(&storage, &deployer()).unwrap();
    logic
        .add_my_file(&storage, submission_for(0), &deployer())
        .unwrap();
    assert_eq!(storage.total_count().unwrap(), 1);
}

#[test]
fn test_new_registry_owner_controls_breaker() {
    let (storage, logic) = setup();
    let bob = Address::from_low_u64(2);

    logic.transfer_ownership(&storage, bob, &deployer()).unwrap();
    assert_eq!(logic.owner(&storage).unwrap(), bob);

    assert!(matches!(
        logic.toggle_contract_state(&storage, &deployer()),
        Err(RegistryError::AccessDenied { .. })
    ));
    logic.toggle_contract_state(&storage, &bob).unwrap();
    assert!(!logic.is_enabled(&storage).unwrap());
}

// =============================================================================
// Swap Tests
// =============================================================================

#[test]
fn test_second_logic_sees_first_logics_data() {
    let (storage, v1) = setup();
    let v2 = StandardLogic::new(Address::from_low_u64(0x200));

    let event = v1
        .add_my_file(&storage, submission_for(9), &deployer())
        .unwrap();
    v1.toggle_contract_state(&storage, &deployer()).unwrap();

    let hash = ContentHash::digest(&[9]);
    let record = v2.file_details(&storage, &hash).unwrap();
    assert_eq!(
        event,
        crate::RegistryEvent::FileAdded {
            record: record.clone(),
            owner: deployer()
        }
    );
    assert!(!v2.is_enabled(&storage).unwrap());

    // Toggling through v2 flips the state v1 left behind.
    let toggled = v2.toggle_contract_state(&storage, &deployer()).unwrap();
    assert_eq!(
        toggled,
        crate::RegistryEvent::StateChanged {
            who: deployer(),
            enabled: true
        }
    );
}

// =============================================================================
// Tamper Evidence Tests
// =============================================================================

#[test]
fn test_stored_records_prove_against_rebuilt_root() {
    let (storage, logic) = setup();
    for seed in 0..7 {
        logic
            .add_my_file(&storage, submission_for(seed), &deployer())
            .unwrap();
    }

    let records = storage.list_records().unwrap();
    let tree = MerkleTree::from_records(&records);
    let root = tree.root();

    for record in &records {
        let proof = tree.proof(&record.content_hash).unwrap();
        assert!(MerkleTree::verify_record(record, &proof, &root));
    }
}
