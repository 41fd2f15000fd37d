//! Error types for the proof-of-existence core.

use poe_registry::RegistryError;
use thiserror::Error;

/// Core error type for front and configuration operations.
#[derive(Debug, Error)]
pub enum PoeError {
    /// Registry error passthrough.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration is well-formed but unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read the configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for [`crate::PoeConfig`].
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}
