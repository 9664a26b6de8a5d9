//! Error types for the rule vault.

/// Errors that can occur while loading or persisting the vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The vault document is well-formed YAML but not a valid vault.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
