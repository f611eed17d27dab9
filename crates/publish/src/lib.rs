//! Edit-based publish flow for the Play catalog.
//!
//! This crate holds the **business logic** of a publish run. It has no
//! HTTP or CLI dependencies: the caller supplies a [`CatalogService`]
//! implementation and a [`FileAccess`] to read local files through.
//!
//! # Pipeline
//!
//! 1. **Validate**: check inputs and build a [`PublishRequest`]
//! 2. **Open**: create a remote edit
//! 3. **Upload**: send each binary, verify its SHA-256, attach its mapping
//! 4. **Validate edit**: let the catalog check the staged changes
//! 5. **Commit**: publish, or delete the edit on any failure

pub mod catalog;
pub mod edit;
pub mod error;
pub mod fs;
pub mod orchestrator;
pub mod types;
pub mod validate;

// Re-export primary types for convenience.
pub use catalog::{CatalogError, CatalogFuture, CatalogService, UploadBody};
pub use edit::{EditSession, EditState};
pub use error::{FileKind, PublishError, ValidationError};
pub use fs::{FileAccess, FileMeta, MemFileAccess, OsFileAccess, SourceFile};
pub use orchestrator::PublishOrchestrator;
pub use types::{
    BinaryEntry, BinaryKind, CredentialsPath, EditId, PublishEvent, PublishOutcome,
    PublishRequest, RawConfig, Track, UploadResult,
};
pub use validate::{merge_binaries, validate};
