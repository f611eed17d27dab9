//! Android Publisher API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! Media uploads are streamed straight from the [`UploadBody`] reader.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use pstore_publish::{
    CatalogError, CatalogFuture, CatalogService, EditId, Track, UploadBody, UploadResult,
};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::auth::AccessToken;
use crate::types::{Apk, AppEdit, Bundle, TrackUpdate};

const DEFAULT_BASE_URL: &str = "https://androidpublisher.googleapis.com";
const DEFAULT_UPLOAD_URL: &str = "https://androidpublisher.googleapis.com/upload";
const API_PATH: &str = "/androidpublisher/v3/applications";

/// Timeout for plain JSON calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for media uploads, which carry whole binaries.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Characters left unescaped in a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn transport(e: reqwest::Error) -> CatalogError {
    CatalogError::Transport(Box::new(e))
}

/// Android Publisher v3 client.
pub struct PlayClient {
    http: reqwest::Client,
    base_url: String,
    upload_url: String,
}

impl PlayClient {
    /// Creates a new client authenticating with `token`.
    pub fn new(token: &AccessToken) -> Result<Self, CatalogError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
            .map_err(|_| CatalogError::Auth("access token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
        })
    }

    /// Sets custom API and upload base URLs (for testing).
    #[cfg(test)]
    pub(crate) fn with_base_urls(mut self, base_url: String, upload_url: String) -> Self {
        self.base_url = base_url;
        self.upload_url = upload_url;
        self
    }

    fn edits_url(&self, base: &str, package: &str) -> String {
        format!(
            "{base}{API_PATH}/{}/edits",
            utf8_percent_encode(package, SEGMENT)
        )
    }

    fn edit_url(&self, base: &str, package: &str, edit: &EditId) -> String {
        format!(
            "{}/{}",
            self.edits_url(base, package),
            utf8_percent_encode(edit.as_str(), SEGMENT)
        )
    }

    /// Sends a request and fails on any non-2xx status.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, CatalogError> {
        let resp = req.send().await.map_err(transport)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp)
    }

    /// Sends a request and decodes the JSON response.
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, CatalogError> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }

    /// Builds a `uploadType=media` POST streaming `body`.
    fn media_request(&self, url: &str, body: UploadBody) -> reqwest::RequestBuilder {
        let len = body.len();
        let stream = ReaderStream::new(body.into_reader());
        self.http
            .post(url)
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .timeout(UPLOAD_TIMEOUT)
            .body(reqwest::Body::wrap_stream(stream))
    }
}

impl CatalogService for PlayClient {
    fn create_edit<'a>(&'a self, package: &'a str) -> CatalogFuture<'a, EditId> {
        Box::pin(async move {
            let url = self.edits_url(&self.base_url, package);
            debug!(%url, "creating edit");
            let edit: AppEdit = self
                .send_json(self.http.post(&url).json(&serde_json::json!({})).timeout(REQUEST_TIMEOUT))
                .await?;
            if edit.id.is_empty() {
                return Err(CatalogError::InvalidResponse("edit has no id".into()));
            }
            Ok(EditId::new(edit.id))
        })
    }

    fn validate_edit<'a>(&'a self, package: &'a str, edit: &'a EditId) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}:validate", self.edit_url(&self.base_url, package, edit));
            debug!(%url, "validating edit");
            self.send(self.http.post(&url).timeout(REQUEST_TIMEOUT))
                .await?;
            Ok(())
        })
    }

    fn commit_edit<'a>(&'a self, package: &'a str, edit: &'a EditId) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            let url = format!("{}:commit", self.edit_url(&self.base_url, package, edit));
            debug!(%url, "committing edit");
            self.send(self.http.post(&url).timeout(REQUEST_TIMEOUT))
                .await?;
            Ok(())
        })
    }

    fn delete_edit<'a>(&'a self, package: &'a str, edit: &'a EditId) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            let url = self.edit_url(&self.base_url, package, edit);
            debug!(%url, "deleting edit");
            self.send(self.http.delete(&url).timeout(REQUEST_TIMEOUT))
                .await?;
            Ok(())
        })
    }

    fn upload_bundle<'a>(
        &'a self,
        body: UploadBody,
        package: &'a str,
        edit: &'a EditId,
    ) -> CatalogFuture<'a, UploadResult> {
        Box::pin(async move {
            let url = format!("{}/bundles", self.edit_url(&self.upload_url, package, edit));
            debug!(%url, bytes = body.len(), "uploading bundle");
            let bundle: Bundle = self.send_json(self.media_request(&url, body)).await?;
            Ok(UploadResult {
                version_code: bundle.version_code,
                sha256: bundle.sha256,
            })
        })
    }

    fn upload_apk<'a>(
        &'a self,
        body: UploadBody,
        package: &'a str,
        edit: &'a EditId,
    ) -> CatalogFuture<'a, UploadResult> {
        Box::pin(async move {
            let url = format!("{}/apks", self.edit_url(&self.upload_url, package, edit));
            debug!(%url, bytes = body.len(), "uploading apk");
            let apk: Apk = self.send_json(self.media_request(&url, body)).await?;
            Ok(UploadResult {
                version_code: apk.version_code,
                sha256: apk.binary.sha256,
            })
        })
    }

    fn upload_proguard_mapping<'a>(
        &'a self,
        body: UploadBody,
        package: &'a str,
        edit: &'a EditId,
        version_code: i64,
    ) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            let url = format!(
                "{}/apks/{version_code}/deobfuscationFiles/proguard",
                self.edit_url(&self.upload_url, package, edit)
            );
            debug!(%url, bytes = body.len(), "uploading mapping");
            self.send(self.media_request(&url, body)).await?;
            Ok(())
        })
    }

    fn create_draft<'a>(
        &'a self,
        package: &'a str,
        edit: &'a EditId,
        track: Track,
        version_codes: &'a [i64],
    ) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            let url = format!(
                "{}/tracks/{}",
                self.edit_url(&self.base_url, package, edit),
                track.as_str()
            );
            debug!(%url, ?version_codes, "creating draft release");
            let payload = TrackUpdate::draft(track.as_str(), version_codes);
            self.send(self.http.put(&url).json(&payload).timeout(REQUEST_TIMEOUT))
                .await?;
            Ok(())
        })
    }
}
