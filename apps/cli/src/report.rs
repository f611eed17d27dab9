//! Logs publish events as they arrive.

use pstore_publish::PublishEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Drains `events` until the orchestrator drops its sender.
///
/// Returns the number of events seen.
pub async fn log_events(mut events: mpsc::Receiver<PublishEvent>) -> usize {
    let mut seen = 0;
    while let Some(event) = events.recv().await {
        seen += 1;
        match event {
            PublishEvent::EditCreated { edit_id } => {
                info!(edit = %edit_id, "edit opened");
            }
            PublishEvent::Progress { file, progress } => {
                info!(file = %file.display(), "uploading: {progress}");
            }
            PublishEvent::BinaryUploaded { file, version_code } => {
                info!(file = %file.display(), version_code, "binary uploaded");
            }
            PublishEvent::MappingUploaded { file, version_code } => {
                info!(file = %file.display(), version_code, "mapping uploaded");
            }
            PublishEvent::Committed { edit_id } => {
                info!(edit = %edit_id, "edit committed");
            }
            PublishEvent::RolledBack { edit_id, error } => {
                warn!(edit = %edit_id, %error, "edit discarded");
            }
        }
    }
    seen
}
