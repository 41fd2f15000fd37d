//! # Core Data Models for the Proof-of-Existence Registry
//!
//! This module defines the fundamental types used throughout the registry.
//! Identities, content hashes and annotations are strongly typed so that a
//! caller cannot pass an owner where a content hash is expected, and every
//! type knows its own "zero" value.
//!
//! ## Zero Values
//!
//! The registry answers lookups for unknown content with an all-zero
//! [`Record`] rather than an error. Every field type therefore has a
//! well-defined empty value:
//!
//! | Type | Empty value | Check |
//! |------|-------------|-------|
//! | [`Address`] | 20 zero bytes | [`Address::is_zero`] |
//! | [`ContentHash`] | 32 zero bytes | [`ContentHash::is_empty`] |
//! | [`Tags`] | empty string | [`Tags::is_empty`] |
//! | [`Locator`] | empty string | [`Locator::is_empty`] |
//!
//! ## References
//!
//! - NIST FIPS 180-4 for hash size (SHA-256 = 32 bytes)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// SHA-256 hash output size in bytes.
pub const HASH_SIZE: usize = 32;

/// Width of an identity in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Maximum encoded width of a record's tags, in bytes.
pub const MAX_TAGS_LEN: usize = 32;

/// A 32-byte SHA-256 hash value.
pub type Hash = [u8; HASH_SIZE];

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

/// A 20-byte identity: record owners, registry owners and logic handles.
///
/// The zero address stands for "nobody" and is rejected wherever an
/// identity is required.
///
/// # Example
///
/// ```rust
/// use poe_registry::Address;
///
/// let alice: Address = "0x00000000000000000000000000000000000000a1".parse().unwrap();
/// assert!(!alice.is_zero());
/// assert_eq!(alice, Address::from_low_u64(0xa1));
/// assert!(Address::ZERO.is_zero());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// The zero identity.
    pub const ZERO: Address = Address([0u8; ADDRESS_SIZE]);

    /// Wraps raw identity bytes.
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    /// Builds an address whose low eight bytes hold `value` big-endian.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes[ADDRESS_SIZE - 8..].copy_from_slice(&value.to_be_bytes());
        Address(bytes)
    }

    /// Parses stored identity bytes, failing unless exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; ADDRESS_SIZE] = bytes.try_into().ok()?;
        Some(Address(array))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_SIZE]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        decode_hex(s)
            .and_then(|bytes| Address::from_slice(&bytes))
            .ok_or_else(|| RegistryError::Parse(format!("invalid address: {}", s)))
    }
}

impl TryFrom<String> for Address {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// A fixed-width content identifier, the unique key of a [`Record`].
///
/// Shorter values are right-padded with zeros, so a content hash is
/// "empty" exactly when all 32 bytes are zero.
///
/// # Example
///
/// ```rust
/// use poe_registry::ContentHash;
///
/// let digest = ContentHash::digest(b"hello world");
/// assert!(!digest.is_empty());
///
/// let padded = ContentHash::from_slice(b"0xABCDEFGH").unwrap();
/// assert_eq!(&padded.as_bytes()[..10], b"0xABCDEFGH");
/// assert!(ContentHash::from_slice(&[]).unwrap().is_empty());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(Hash);

impl ContentHash {
    /// The empty content hash.
    pub const ZERO: ContentHash = ContentHash([0u8; HASH_SIZE]);

    pub const fn new(bytes: Hash) -> Self {
        ContentHash(bytes)
    }

    /// Computes the SHA-256 digest of raw file bytes.
    pub fn digest(content: &[u8]) -> Self {
        ContentHash(Sha256::digest(content).into())
    }

    /// Right-pads `bytes` to 32 bytes. Fails above 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > HASH_SIZE {
            return Err(RegistryError::InvalidContentHash);
        }
        let mut hash = [0u8; HASH_SIZE];
        hash[..bytes.len()].copy_from_slice(bytes);
        Ok(ContentHash(hash))
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

impl FromStr for ContentHash {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex(s)
            .ok_or_else(|| RegistryError::Parse(format!("invalid content hash: {}", s)))?;
        ContentHash::from_slice(&bytes)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_string()
    }
}

/// Free-form annotation attached to a record, at most [`MAX_TAGS_LEN`] bytes.
///
/// ```rust
/// use poe_registry::Tags;
///
/// assert!(Tags::new("tag1;tag2;tag3").is_ok());
/// assert!(Tags::new("x".repeat(33)).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tags(String);

impl Tags {
    pub fn new(tags: impl Into<String>) -> Result<Self> {
        let tags = tags.into();
        if tags.len() > MAX_TAGS_LEN {
            return Err(RegistryError::InvalidTags { len: tags.len() });
        }
        Ok(Tags(tags))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for Tags {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        Tags::new(value)
    }
}

impl From<Tags> for String {
    fn from(tags: Tags) -> Self {
        tags.0
    }
}

/// Opaque reference into the external content store.
///
/// The registry never interprets a locator. It only checks that it is
/// non-empty and has the width the active logic expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(locator: impl Into<String>) -> Self {
        Locator(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encoded width in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A registered piece of content.
///
/// Records are append-only: created once by a successful add and never
/// changed afterwards.
///
/// # The Zero Record
///
/// `Record::default()` has every field at its zero value. Lookups for
/// unknown content return it instead of failing, so **callers must check
/// [`Record::is_empty`] to tell "not registered" apart from a real record.**
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique key of the record.
    pub content_hash: ContentHash,

    /// Identity the record is attributed to.
    pub owner: Address,

    /// Caller-supplied logical timestamp, always > 0 for real records.
    pub created_at: u64,

    /// Free-form annotation.
    pub tags: Tags,

    /// Where the raw bytes live in the external content store.
    pub locator: Locator,
}

impl Record {
    /// Returns true for the zero record returned on unknown lookups.
    pub fn is_empty(&self) -> bool {
        self.content_hash.is_empty()
    }

    /// SHA-256 over a length-prefixed binary encoding of every field.
    ///
    /// Used as the Merkle leaf for this record, so any change to any field
    /// changes the registry root.
    pub fn digest(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.content_hash.as_bytes());
        hasher.update(self.owner.as_bytes());
        hasher.update(self.created_at.to_be_bytes());
        for field in [self.tags.as_str(), self.locator.as_str()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.finalize().into()
    }
}

/// The caller-provided part of a new record.
///
/// The owner is supplied separately so that the same submission can be
/// attributed to the caller (`add_my_file`) or to a third party (`add_file`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSubmission {
    pub created_at: u64,
    pub content_hash: ContentHash,
    pub tags: Tags,
    pub locator: Locator,
}

impl FileSubmission {
    pub fn new(created_at: u64, content_hash: ContentHash, tags: Tags, locator: Locator) -> Self {
        FileSubmission {
            created_at,
            content_hash,
            tags,
            locator,
        }
    }

    pub(crate) fn into_record(self, owner: Address) -> Record {
        Record {
            content_hash: self.content_hash,
            owner,
            created_at: self.created_at,
            tags: self.tags,
            locator: self.locator,
        }
    }
}

/// Notification emitted by every committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    /// A record was committed.
    FileAdded { record: Record, owner: Address },

    /// The circuit breaker flipped. `enabled` is the new value.
    StateChanged { who: Address, enabled: bool },

    /// An ownership slot changed hands.
    OwnershipTransferred { previous: Address, new: Address },

    /// The front now delegates to a different logic revision.
    Upgraded { implementation: Address },

    /// The front's balance was paid out.
    Withdrawal { to: Address, amount: u128 },

    /// Value was credited to the front.
    Deposit { from: Address, amount: u128 },
}

/// A node in the Merkle proof path.
///
/// # Fields
///
/// - `hash`: The sibling hash at this level of the tree
/// - `is_left`: Whether this sibling is on the left (true) or right (false)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProofNode {
    /// The sibling hash at this tree level.
    pub hash: Hash,

    /// Whether this sibling is on the left of the path.
    pub is_left: bool,
}

/// Proof that a record digest is included under a registry root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Digest of the record being proven.
    pub leaf_hash: Hash,

    /// Path of sibling hashes from leaf to root.
    pub path: Vec<MerkleProofNode>,

    /// Root hash at the time the proof was generated.
    pub root_hash: Hash,
}

/// Errors that can occur during registry operations.
///
/// Every variant aborts the whole operation: no tree is modified when an
/// error is returned.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The record owner is the zero address.
    #[error("Owner address cannot be empty")]
    InvalidOwner,

    /// The locator is empty or has the wrong encoded width.
    #[error("Locator is not valid or empty: {len} bytes, expected {expected}")]
    InvalidLocator { len: usize, expected: usize },

    /// The content hash is empty or too wide.
    #[error("Content hash cannot be empty")]
    InvalidContentHash,

    /// The timestamp is zero.
    #[error("Creation timestamp has to be greater than 0")]
    InvalidTimestamp,

    /// The tags exceed the maximum width.
    #[error("Tags are {len} bytes, maximum is {}", MAX_TAGS_LEN)]
    InvalidTags { len: usize },

    /// A record with this content hash already exists.
    #[error("Content hash already registered: {0}")]
    DuplicateRecord(ContentHash),

    /// The circuit breaker is tripped.
    #[error("Registry is disabled")]
    RegistryDisabled,

    /// The caller does not hold the required ownership slot.
    #[error("Access denied for {caller}")]
    AccessDenied { caller: Address },

    /// The upgrade target is zero, current, or not installed.
    #[error("Invalid upgrade target: {0}")]
    InvalidUpgradeTarget(Address),

    /// An ownership transfer named the zero address.
    #[error("Invalid new address")]
    InvalidAddress,

    /// The owner index has no entry at this position.
    #[error("Index {index} out of range for {len} records")]
    IndexOutOfRange { index: u64, len: u64 },

    /// A deposit would push the front balance past `u128::MAX`.
    #[error("Deposit of {amount} overflows balance {balance}")]
    BalanceOverflow { balance: u128, amount: u128 },

    /// No logic revision has been activated yet.
    #[error("No implementation is active")]
    NoImplementation,

    /// The stored implementation handle does not match any installed logic.
    #[error("Implementation {0} is not installed")]
    UnknownImplementation(Address),

    /// A textual identity or hash could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Stored bytes do not decode.
    #[error("Corrupted storage: {0}")]
    Corrupted(String),

    /// Failed to open, read or write the database.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Failed to serialize or deserialize data.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sled::transaction::TransactionError<RegistryError>> for RegistryError {
    fn from(err: sled::transaction::TransactionError<RegistryError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(inner) => RegistryError::Database(inner),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
