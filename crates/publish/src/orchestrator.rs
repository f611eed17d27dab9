//! Publish orchestrator.
//!
//! Opens the edit, hands it to an [`EditSession`], and exposes progress
//! events and cancellation to the caller.

use std::time::Duration;

use pstore_transfer::DEFAULT_INTERVAL;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::catalog::CatalogService;
use crate::edit::{EditSession, emit};
use crate::error::PublishError;
use crate::fs::FileAccess;
use crate::types::{PublishEvent, PublishOutcome, PublishRequest};

/// Orchestrates publishing a request through one edit.
pub struct PublishOrchestrator {
    events_tx: mpsc::Sender<PublishEvent>,
    events_rx: Option<mpsc::Receiver<PublishEvent>>,
    cancel: CancellationToken,
    progress_interval: Duration,
}

impl Default for PublishOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishOrchestrator {
    /// Creates a new orchestrator reporting progress every 3 seconds.
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            progress_interval: DEFAULT_INTERVAL,
        }
    }

    /// Overrides the upload progress interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PublishEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Publishes every binary in `request` through a single edit.
    ///
    /// Binaries are uploaded one at a time in request order. Either the
    /// edit is committed, or it is deleted and the first error returned.
    pub async fn publish(
        &self,
        request: &PublishRequest,
        fs: &dyn FileAccess,
        catalog: Option<&dyn CatalogService>,
    ) -> Result<PublishOutcome, PublishError> {
        let catalog = catalog.ok_or(PublishError::NoService)?;
        if self.cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }

        debug!(
            package = request.package_name(),
            track = %request.track(),
            binaries = request.binaries().len(),
            "starting file upload"
        );
        let edit_id = catalog.create_edit(request.package_name()).await?;
        info!(edit = %edit_id, "created edit");
        emit(
            &self.events_tx,
            PublishEvent::EditCreated {
                edit_id: edit_id.clone(),
            },
        );

        let mut session = EditSession::new(
            catalog,
            fs,
            request,
            edit_id,
            self.cancel.clone(),
            self.progress_interval,
        );
        match session.publish(&self.events_tx).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(edit = %session.edit_id(), error = %e, "publish failed");
                Err(e)
            }
        }
    }
}
