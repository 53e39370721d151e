// src/errors.rs

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Compatible settings registry is not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Setting '{0}' not found")]
    SettingNotFound(String),

    #[error("Command '{0}' is not supported")]
    UnsupportedCommand(String),

    #[error("Probe '{probe}' failed: {message}")]
    ProbeFailure { probe: &'static str, message: String },

    #[error("Failed to resolve index for setting '{setting_id}': {message}")]
    ResolutionFailure { setting_id: String, message: String },

    #[error("Invalid catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

/// Problems found while loading a domain catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Setting id '{id}' is declared more than once in domain '{domain}'")]
    DuplicateId { domain: String, id: String },

    #[error("Setting id '{id}' is already owned by domain '{owner}', cannot add it to '{domain}'")]
    IdOwnedByOtherDomain {
        id: String,
        owner: String,
        domain: String,
    },

    #[error("Setting '{setting_id}' declares custom property '{kind}' more than once")]
    DuplicateProperty { setting_id: String, kind: String },

    #[error(
        "Setting '{setting_id}' has {display_names} display names but {value_mappings} value mappings"
    )]
    OptionCountMismatch {
        setting_id: String,
        display_names: usize,
        value_mappings: usize,
    },

    #[error("Setting '{setting_id}' value mappings are not indexed 0..{count}")]
    SparseValueMappings { setting_id: String, count: usize },

    #[error("Setting '{setting_id}' has an empty build range {min}..={max}")]
    InvalidBuildRange {
        setting_id: String,
        min: u32,
        max: u32,
    },
}

/// Refusals raised by the registry write/delete safeguards.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryGuardError {
    #[error("Invalid registry path: '{0}'. Expected format 'HKEY_*\\Subkey\\...'")]
    InvalidPath(String),

    #[error("Unsupported registry hive: {0}")]
    UnsupportedHive(String),

    #[error("Refusing to delete '{path}': keys shallower than {min_depth} levels are protected")]
    TooShallow { path: String, min_depth: usize },

    #[error("Refusing to delete '{path}': it would remove protected key '{root}'")]
    ProtectedKey { path: String, root: String },
}
