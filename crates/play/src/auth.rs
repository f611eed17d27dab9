//! Bearer credentials for the publisher API.
//!
//! A credential file holds either an access token or a Google service
//! account key. Service account keys are exchanged for a short-lived token
//! using a signed JWT assertion (RFC 7523).

use std::fmt;
use std::path::Path;
use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pstore_publish::CatalogError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::transport;

/// Environment variable that overrides the credential file.
pub const TOKEN_ENV_VAR: &str = "PSTORE_ACCESS_TOKEN";

/// OAuth scope granting access to the publisher API.
pub const PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of a signed assertion. Google rejects anything above one hour.
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// An OAuth2 access token sent as `Authorization: Bearer`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

/// The fields of a service account JSON key that token minting needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

#[derive(Deserialize)]
struct TokenFile {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// What a credential file turned out to hold.
enum Credential {
    Token(AccessToken),
    ServiceAccount(ServiceAccountKey),
}

impl Credential {
    fn parse(contents: &str) -> Result<Self, CatalogError> {
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::Auth("credential file is empty".into()));
        }

        if !trimmed.starts_with('{') {
            return Ok(Self::Token(AccessToken(trimmed.to_string())));
        }

        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| CatalogError::Auth(format!("malformed credential file: {e}")))?;

        if value.get("type").and_then(serde_json::Value::as_str) == Some("service_account") {
            let key = serde_json::from_value(value)
                .map_err(|e| CatalogError::Auth(format!("malformed service account key: {e}")))?;
            return Ok(Self::ServiceAccount(key));
        }

        let file: TokenFile = serde_json::from_value(value)
            .map_err(|e| CatalogError::Auth(format!("malformed credential file: {e}")))?;
        match file.access_token.or(file.token) {
            Some(token) if !token.trim().is_empty() => {
                Ok(Self::Token(AccessToken(token.trim().to_string())))
            }
            _ => Err(CatalogError::Auth(
                "credential file has neither an access_token nor a service account key".into(),
            )),
        }
    }
}

impl ServiceAccountKey {
    /// Builds the RS256-signed assertion for the publisher scope, issued at `now`.
    fn assertion(&self, now: u64) -> Result<String, CatalogError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| CatalogError::Auth(format!("invalid service account private key: {e}")))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = Claims {
            iss: &self.client_email,
            scope: PUBLISHER_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| CatalogError::Auth(format!("failed to sign assertion: {e}")))
    }

    /// Exchanges a fresh assertion for an access token at `token_uri`.
    pub async fn fetch_token(&self, http: &reqwest::Client) -> Result<AccessToken, CatalogError> {
        let assertion = self.assertion(jsonwebtoken::get_current_timestamp())?;
        debug!(uri = %self.token_uri, client_email = %self.client_email, "requesting access token");

        let resp = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let bytes = resp.bytes().await.map_err(transport)?;
        let token: TokenResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        if token.access_token.trim().is_empty() {
            return Err(CatalogError::InvalidResponse(
                "token response has no access_token".into(),
            ));
        }

        Ok(AccessToken(token.access_token.trim().to_string()))
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Resolves the token to send, preferring `PSTORE_ACCESS_TOKEN`.
    ///
    /// Without the variable, `path` must name a credential file: a service
    /// account key, a JSON object with an `access_token` (or `token`) field,
    /// or the bare token.
    pub async fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        Self::load_with(path, std::env::var(TOKEN_ENV_VAR).ok()).await
    }

    async fn load_with(
        path: Option<&Path>,
        env_token: Option<String>,
    ) -> Result<Self, CatalogError> {
        if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
            debug!(var = TOKEN_ENV_VAR, "using access token from environment");
            return Ok(Self(token.trim().to_string()));
        }

        let Some(path) = path else {
            return Err(CatalogError::Auth(format!(
                "no credential file given and {TOKEN_ENV_VAR} is not set"
            )));
        };

        let contents = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded credential file");

        match Credential::parse(&contents)? {
            Credential::Token(token) => Ok(token),
            Credential::ServiceAccount(key) => {
                let http = reqwest::Client::builder().build().map_err(transport)?;
                key.fetch_token(&http).await
            }
        }
    }

    /// The raw token value.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}
