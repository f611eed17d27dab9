//! Per-edit publish session.
//!
//! An [`EditSession`] drives one remote edit from creation to commit and
//! owns the rollback rule: once the edit exists, any failure deletes it
//! exactly once before the original error is returned.

use std::path::Path;
use std::time::Duration;

use pstore_transfer::{ProgressReader, ProgressTracker, checksum_reader, verify_checksum};
use tokio::io::AsyncSeekExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogFuture, CatalogService, UploadBody};
use crate::error::PublishError;
use crate::fs::FileAccess;
use crate::types::{BinaryEntry, BinaryKind, EditId, PublishEvent, PublishOutcome, PublishRequest};

/// Logs a publish step at `info` for verbose requests and `debug` otherwise.
macro_rules! step {
    ($session:expr, $($arg:tt)+) => {
        if $session.request.verbose() {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// Lifecycle of a remote edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Open,
    Uploading,
    Validated,
    Committed,
    Aborted,
}

impl EditState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EditState::Committed | EditState::Aborted)
    }

    fn can_advance_to(self, next: EditState) -> bool {
        use EditState::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Open, Uploading) | (Uploading, Validated) | (Validated, Committed) => true,
            _ => false,
        }
    }
}

/// Manages one open edit.
pub struct EditSession<'a> {
    catalog: &'a dyn CatalogService,
    fs: &'a dyn FileAccess,
    request: &'a PublishRequest,
    cancel: CancellationToken,
    progress_interval: Duration,
    edit_id: EditId,
    state: EditState,
    version_codes: Vec<i64>,
}

impl<'a> EditSession<'a> {
    /// Wraps an edit the catalog has just created.
    pub fn new(
        catalog: &'a dyn CatalogService,
        fs: &'a dyn FileAccess,
        request: &'a PublishRequest,
        edit_id: EditId,
        cancel: CancellationToken,
        progress_interval: Duration,
    ) -> Self {
        Self {
            catalog,
            fs,
            request,
            cancel,
            progress_interval,
            edit_id,
            state: EditState::Open,
            version_codes: Vec::new(),
        }
    }

    pub fn edit_id(&self) -> &EditId {
        &self.edit_id
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    /// Uploads every binary, validates and commits.
    ///
    /// On failure the edit is deleted (best effort) and the original
    /// error is returned.
    pub async fn publish(
        &mut self,
        events_tx: &mpsc::Sender<PublishEvent>,
    ) -> Result<PublishOutcome, PublishError> {
        match self.stage_and_commit(events_tx).await {
            Ok(()) => Ok(PublishOutcome {
                edit_id: self.edit_id.clone(),
                version_codes: self.version_codes.clone(),
            }),
            Err(e) => {
                self.roll_back(&e, events_tx).await;
                Err(e)
            }
        }
    }

    async fn stage_and_commit(
        &mut self,
        events_tx: &mpsc::Sender<PublishEvent>,
    ) -> Result<(), PublishError> {
        let request = self.request;
        let package = request.package_name();
        self.advance(EditState::Uploading);

        for entry in request.binaries() {
            self.check_cancelled()?;

            let version_code = self.upload_binary(entry, events_tx).await?;
            self.version_codes.push(version_code);
            emit(
                events_tx,
                PublishEvent::BinaryUploaded {
                    file: entry.file_path().to_path_buf(),
                    version_code,
                },
            );

            match entry.mapping_path() {
                Some(mapping) => {
                    self.upload_mapping(mapping, version_code).await?;
                    emit(
                        events_tx,
                        PublishEvent::MappingUploaded {
                            file: mapping.to_path_buf(),
                            version_code,
                        },
                    );
                }
                None => {
                    debug!(binary = %entry.file_path().display(), "no mapping provided, skipping mapping upload");
                }
            }
        }

        self.check_cancelled()?;
        step!(self, edit = %self.edit_id, "validating edit");
        self.until_cancelled(self.catalog.validate_edit(package, &self.edit_id))
            .await?;
        self.advance(EditState::Validated);

        self.check_cancelled()?;
        step!(self, edit = %self.edit_id, "committing edit");
        self.until_cancelled(self.catalog.commit_edit(package, &self.edit_id))
            .await?;
        self.advance(EditState::Committed);

        info!(
            edit = %self.edit_id,
            versions = ?self.version_codes,
            "all files uploaded successfully"
        );
        emit(
            events_tx,
            PublishEvent::Committed {
                edit_id: self.edit_id.clone(),
            },
        );
        Ok(())
    }

    /// Uploads one binary and verifies the digest the catalog reports.
    async fn upload_binary(
        &self,
        entry: &BinaryEntry,
        events_tx: &mpsc::Sender<PublishEvent>,
    ) -> Result<i64, PublishError> {
        let path = entry.file_path();
        step!(self, binary = %path.display(), "uploading binary");

        let size = self
            .fs
            .stat(path)
            .map_err(|e| PublishError::io(path, e))?
            .len;
        let mut file = self.fs.open(path).map_err(|e| PublishError::io(path, e))?;

        // Hash first, then rewind so the same bytes go over the wire.
        let local = checksum_reader(&mut file)
            .await
            .map_err(|e| PublishError::io(path, e))?;
        file.rewind().await.map_err(|e| PublishError::io(path, e))?;

        let reader = ProgressReader::new(file);
        let counter = reader.counter();
        let tracker = ProgressTracker::new(Some(self.progress_interval));
        {
            let tx = events_tx.clone();
            let file = path.to_path_buf();
            tracker.on_progress(Box::new(move |progress| {
                emit(
                    &tx,
                    PublishEvent::Progress {
                        file: file.clone(),
                        progress,
                    },
                );
            }));
        }
        tracker.start(counter.clone(), size);

        let body = UploadBody::new(reader, size);
        let package = self.request.package_name();
        let call = match self.request.binary_kind() {
            BinaryKind::Bundle => self.catalog.upload_bundle(body, package, &self.edit_id),
            BinaryKind::Apk => self.catalog.upload_apk(body, package, &self.edit_id),
        };
        let uploaded = self.until_cancelled(call).await;
        tracker.stop().await;
        let uploaded = uploaded?;
        tracker.notify(counter.load(std::sync::atomic::Ordering::Relaxed), size);

        step!(
            self,
            version_code = uploaded.version_code,
            "file uploaded, verifying integrity"
        );
        verify_checksum(&local, &uploaded.sha256)?;
        debug!(sha256 = %uploaded.sha256, "file integrity check passed");

        Ok(uploaded.version_code)
    }

    async fn upload_mapping(&self, path: &Path, version_code: i64) -> Result<(), PublishError> {
        step!(self, mapping = %path.display(), version_code, "uploading mapping");

        let size = self
            .fs
            .stat(path)
            .map_err(|e| PublishError::io(path, e))?
            .len;
        let file = self.fs.open(path).map_err(|e| PublishError::io(path, e))?;

        self.until_cancelled(self.catalog.upload_proguard_mapping(
            UploadBody::new(file, size),
            self.request.package_name(),
            &self.edit_id,
            version_code,
        ))
        .await?;

        step!(self, mapping = %path.display(), "mapping uploaded");
        Ok(())
    }

    /// Deletes the edit after a failure. Never fails.
    async fn roll_back(&mut self, cause: &PublishError, events_tx: &mpsc::Sender<PublishEvent>) {
        if self.state.is_terminal() {
            return;
        }
        self.advance(EditState::Aborted);

        warn!(edit = %self.edit_id, error = %cause, "publish failed, deleting edit");
        if let Err(e) = self
            .catalog
            .delete_edit(self.request.package_name(), &self.edit_id)
            .await
        {
            warn!(edit = %self.edit_id, error = %e, "failed to delete edit");
        }

        emit(
            events_tx,
            PublishEvent::RolledBack {
                edit_id: self.edit_id.clone(),
                error: cause.to_string(),
            },
        );
    }

    fn advance(&mut self, next: EditState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid edit transition {:?} -> {next:?}",
            self.state
        );
        debug!(edit = %self.edit_id, from = ?self.state, to = ?next, "edit state");
        self.state = next;
    }

    /// Awaits a catalog call unless the token fires first. Dropping the
    /// call aborts the request it was making.
    async fn until_cancelled<T>(&self, call: CatalogFuture<'_, T>) -> Result<T, PublishError> {
        tokio::select! {
            biased;
            result = call => Ok(result?),
            () = self.cancel.cancelled() => {
                warn!(edit = %self.edit_id, "cancelled during a catalog call");
                Err(PublishError::Cancelled)
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), PublishError> {
        if self.cancel.is_cancelled() {
            Err(PublishError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sends an event without waiting; a full or closed channel drops it.
pub(crate) fn emit(events_tx: &mpsc::Sender<PublishEvent>, event: PublishEvent) {
    let _ = events_tx.try_send(event);
}
