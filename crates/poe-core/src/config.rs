//! Configuration types for the proof-of-existence front.

use crate::error::PoeError;
use crate::Result;
use poe_registry::registry::DEFAULT_LOCATOR_LEN;
use poe_registry::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for an [`crate::UpgradableFront`].
///
/// # Example
///
/// ```toml
/// [registry]
/// db_path = "./poe_registry.db"
/// locator_len = 46
///
/// [front]
/// deployer = "0x0000000000000000000000000000000000000001"
/// implementations = ["0x0000000000000000000000000000000000000100"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoeConfig {
    /// Storage and validation settings.
    pub registry: RegistryConfig,

    /// Front ownership and installed logic revisions.
    pub front: FrontConfig,
}

/// Registry storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path to the registry database.
    pub db_path: PathBuf,

    /// Exact width every locator must have.
    pub locator_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./poe_registry.db"),
            locator_len: DEFAULT_LOCATOR_LEN,
        }
    }
}

/// Upgradeable front configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontConfig {
    /// Identity that claims both owner slots on a fresh database.
    pub deployer: Address,

    /// Handles of the logic revisions to install. The first one is
    /// activated on a database that has no active revision yet.
    pub implementations: Vec<Address>,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            deployer: Address::from_low_u64(1),
            implementations: vec![Address::from_low_u64(0x100)],
        }
    }
}

impl PoeConfig {
    /// Loads a TOML configuration file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config: PoeConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no front could run with.
    pub fn validate(&self) -> Result<()> {
        if self.registry.locator_len == 0 {
            return Err(PoeError::Config("locator_len must be positive".to_string()));
        }
        if self.front.deployer.is_zero() {
            return Err(PoeError::Config("deployer cannot be the zero address".to_string()));
        }
        if self.front.implementations.iter().any(Address::is_zero) {
            return Err(PoeError::Config(
                "implementation handles cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}
