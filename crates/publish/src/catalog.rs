//! Catalog service trait.
//!
//! `CatalogService` is implemented by the transport crate on top of the
//! Android Publisher REST API. Using a trait keeps the publish flow
//! decoupled from HTTP and testable with mocks.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::types::{EditId, Track, UploadResult};

/// Boxed future returned by every [`CatalogService`] call.
pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CatalogError>> + Send + 'a>>;

/// Errors surfaced by a catalog implementation.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("authentication error: {0}")]
    Auth(String),
}

/// Media payload for an upload call.
///
/// Owns the source reader, so the underlying file handle is released as
/// soon as the catalog call that consumed it finishes.
pub struct UploadBody {
    reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
    len: u64,
}

impl UploadBody {
    pub fn new(reader: impl AsyncRead + Send + Sync + Unpin + 'static, len: u64) -> Self {
        Self {
            reader: Box::new(reader),
            len,
        }
    }

    /// Declared content length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_reader(self) -> Box<dyn AsyncRead + Send + Sync + Unpin> {
        self.reader
    }

    /// Buffers the whole body.
    pub async fn into_bytes(self) -> io::Result<Vec<u8>> {
        let mut reader = self.reader;
        let mut buf = Vec::with_capacity(self.len as usize);
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadBody").field("len", &self.len).finish()
    }
}

/// Abstract connection to the remote app catalog.
///
/// All calls may be slow and may fail; retries, if any, are the
/// implementation's business.
pub trait CatalogService: Send + Sync {
    /// Opens a new edit for `package` and returns its id.
    fn create_edit<'a>(&'a self, package: &'a str) -> CatalogFuture<'a, EditId>;

    /// Asks the catalog to check the edit without committing it.
    fn validate_edit<'a>(&'a self, package: &'a str, edit: &'a EditId) -> CatalogFuture<'a, ()>;

    /// Commits the edit, publishing every staged change.
    fn commit_edit<'a>(&'a self, package: &'a str, edit: &'a EditId) -> CatalogFuture<'a, ()>;

    /// Discards the edit and everything staged in it.
    fn delete_edit<'a>(&'a self, package: &'a str, edit: &'a EditId) -> CatalogFuture<'a, ()>;

    /// Uploads an app bundle into the edit.
    fn upload_bundle<'a>(
        &'a self,
        body: UploadBody,
        package: &'a str,
        edit: &'a EditId,
    ) -> CatalogFuture<'a, UploadResult>;

    /// Uploads an APK into the edit.
    fn upload_apk<'a>(
        &'a self,
        body: UploadBody,
        package: &'a str,
        edit: &'a EditId,
    ) -> CatalogFuture<'a, UploadResult>;

    /// Attaches a ProGuard mapping file to an uploaded version.
    fn upload_proguard_mapping<'a>(
        &'a self,
        body: UploadBody,
        package: &'a str,
        edit: &'a EditId,
        version_code: i64,
    ) -> CatalogFuture<'a, ()>;

    /// Creates a draft release on `track` holding `version_codes`.
    fn create_draft<'a>(
        &'a self,
        package: &'a str,
        edit: &'a EditId,
        track: Track,
        version_codes: &'a [i64],
    ) -> CatalogFuture<'a, ()>;
}
