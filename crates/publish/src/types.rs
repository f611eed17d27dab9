//! Data types for the publish flow.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pstore_transfer::TransferProgress;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One binary artifact and its optional deobfuscation mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryEntry {
    path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mapping: Option<PathBuf>,
}

impl BinaryEntry {
    /// A binary with no mapping file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mapping: None,
        }
    }

    /// A binary paired with a mapping file.
    pub fn with_mapping(path: impl Into<PathBuf>, mapping: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mapping: Some(mapping.into()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn mapping_path(&self) -> Option<&Path> {
        self.mapping.as_deref()
    }
}

/// Release channel a binary is published to.
///
/// Production is deliberately absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Track {
    #[default]
    Internal,
    Alpha,
    Beta,
}

impl Track {
    /// Every track the publisher accepts.
    pub const ALL: [Track; 3] = [Track::Internal, Track::Alpha, Track::Beta];

    pub fn as_str(self) -> &'static str {
        match self {
            Track::Internal => "internal",
            Track::Alpha => "alpha",
            Track::Beta => "beta",
        }
    }

    fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|t| format!("'{}'", t.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        if name.is_empty() {
            return Err(ValidationError::MissingTrack);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| ValidationError::UnsupportedTrack {
                track: name,
                allowed: Self::allowed_list(),
            })
    }
}

/// Which upload endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// Android App Bundle (`.aab`).
    Bundle,
    /// Android package (`.apk`).
    Apk,
}

/// Opaque handle to the credential file the transport authenticates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsPath(PathBuf);

impl CredentialsPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// Unvalidated publish configuration, as assembled by the caller.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub package_name: String,
    pub track: String,
    /// Credential file. `None` when the token comes from the environment.
    pub credentials_path: Option<PathBuf>,
    pub binaries: Vec<BinaryEntry>,
    pub apk: bool,
    pub verbose: bool,
}

/// A validated, immutable publish request.
///
/// Only [`validate`](crate::validate) constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub(crate) package_name: String,
    pub(crate) track: Track,
    pub(crate) credentials: Option<CredentialsPath>,
    pub(crate) binaries: Vec<BinaryEntry>,
    pub(crate) apk: bool,
    pub(crate) verbose: bool,
}

impl PublishRequest {
    pub(crate) fn new(
        package_name: String,
        track: Track,
        credentials: Option<PathBuf>,
        binaries: Vec<BinaryEntry>,
        apk: bool,
        verbose: bool,
    ) -> Self {
        Self {
            package_name,
            track,
            credentials: credentials.map(CredentialsPath),
            binaries,
            apk,
            verbose,
        }
    }

    /// Trimmed application id, e.g. `com.sample.app`.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn track(&self) -> Track {
        self.track
    }

    pub fn credentials(&self) -> Option<&CredentialsPath> {
        self.credentials.as_ref()
    }

    /// Binaries in upload order. Never empty.
    pub fn binaries(&self) -> &[BinaryEntry] {
        &self.binaries
    }

    pub fn is_apk(&self) -> bool {
        self.apk
    }

    pub fn binary_kind(&self) -> BinaryKind {
        if self.apk {
            BinaryKind::Apk
        } else {
            BinaryKind::Bundle
        }
    }

    /// Whether step-by-step progress is logged at `info` rather than `debug`.
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Server-assigned identifier of an edit session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditId(String);

impl EditId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the catalog reports back for one uploaded binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub version_code: i64,
    /// Lowercase hex SHA-256 of the bytes the catalog received.
    pub sha256: String,
}

/// Result of a committed publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub edit_id: EditId,
    /// Version codes in request order.
    pub version_codes: Vec<i64>,
}

/// Event emitted while a publish run progresses.
#[derive(Debug, Clone)]
pub enum PublishEvent {
    /// An edit session was opened.
    EditCreated { edit_id: EditId },
    /// Periodic upload progress for one binary.
    Progress {
        file: PathBuf,
        progress: TransferProgress,
    },
    /// A binary was uploaded and its checksum verified.
    BinaryUploaded { file: PathBuf, version_code: i64 },
    /// A mapping file was attached to an uploaded binary.
    MappingUploaded { file: PathBuf, version_code: i64 },
    /// The edit was committed.
    Committed { edit_id: EditId },
    /// The edit was abandoned after a failure.
    RolledBack { edit_id: EditId, error: String },
}
