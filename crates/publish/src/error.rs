//! Publish error types.

use std::fmt;
use std::path::PathBuf;

use pstore_transfer::ChecksumError;

use crate::catalog::CatalogError;

/// Which input a missing file was supplied as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Credentials,
    Binary,
    Mapping,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Credentials => "authentication",
            FileKind::Binary => "binary",
            FileKind::Mapping => "mappings",
        })
    }
}

/// Reasons a [`RawConfig`](crate::RawConfig) is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("package name must not be empty")]
    EmptyPackageName,

    #[error("track name to publish binary to is required")]
    MissingTrack,

    #[error("provided track '{track}' is not supported, supported tracks are {allowed}")]
    UnsupportedTrack { track: String, allowed: String },

    #[error("no files to upload provided")]
    NoFiles,

    #[error("{kind} file '{}' does not exist", path.display())]
    FileNotFound { kind: FileKind, path: PathBuf },
}

/// Errors produced by a publish run.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("invalid publish request: {0}")]
    Validation(#[from] ValidationError),

    #[error("no catalog service instance provided")]
    NoService,

    #[error("failed reading '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed integrity verification with local file hash '{local}' and remote '{remote}'")]
    IntegrityMismatch { local: String, remote: String },

    #[error("catalog error: {0}")]
    Remote(#[from] CatalogError),

    #[error("cancelled")]
    Cancelled,
}

impl From<ChecksumError> for PublishError {
    fn from(e: ChecksumError) -> Self {
        PublishError::IntegrityMismatch {
            local: e.local,
            remote: e.remote,
        }
    }
}

impl PublishError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PublishError::Io {
            path: path.into(),
            source,
        }
    }
}
