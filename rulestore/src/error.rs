//! Error taxonomy for repository operations.
//!
//! Core operations return [`RepoError`]; the `io` layer and the CLI wrap it
//! in `anyhow` with context and map [`ErrorKind`] onto exit codes.

use thiserror::Error;

/// Result type alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse classification used for exit codes and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Assembly,
    Compile,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// A package, asset or version does not resolve.
    #[error("{entity} '{name}' not found")]
    NotFound { entity: &'static str, name: String },

    /// A version number does not exist in a ledger.
    #[error("version {version} of {entity} '{name}' not found")]
    VersionNotFound {
        entity: &'static str,
        name: String,
        version: u64,
    },

    /// Name collision on create or rename.
    #[error("{entity} '{name}' already exists")]
    Conflict { entity: &'static str, name: String },

    /// Malformed input (empty checkin comment, unknown format tag, bad name).
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// A historical tree references an asset version that no longer exists.
    #[error(
        "cannot assemble version {package_version} of package '{package}': asset '{asset}' version {asset_version} is gone"
    )]
    Assembly {
        package: String,
        package_version: u64,
        asset: String,
        asset_version: u64,
    },

    /// Failure reported by the external compiler, passed through unchanged.
    #[error("compile failed: {0}")]
    Compile(String),
}

impl RepoError {
    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            name: name.into(),
        }
    }

    pub fn conflict(entity: &'static str, name: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            name: name.into(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::VersionNotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Assembly { .. } => ErrorKind::Assembly,
            Self::Compile(_) => ErrorKind::Compile,
        }
    }
}
