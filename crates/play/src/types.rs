//! Android Publisher v3 resource payloads.

use serde::{Deserialize, Serialize};

/// `AppEdit` resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEdit {
    pub id: String,
    #[serde(default)]
    pub expiry_time_seconds: Option<String>,
}

/// `Bundle` resource returned by a bundle upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub version_code: i64,
    #[serde(default)]
    pub sha1: Option<String>,
    pub sha256: String,
}

/// `Apk` resource returned by an APK upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Apk {
    pub version_code: i64,
    pub binary: ApkBinary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkBinary {
    #[serde(default)]
    pub sha1: Option<String>,
    pub sha256: String,
}

/// `Track` resource sent when creating a draft release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackUpdate {
    pub track: String,
    pub releases: Vec<TrackRelease>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    /// Version codes are int64 values, serialized as strings.
    pub version_codes: Vec<String>,
    pub status: String,
}

impl TrackUpdate {
    /// A track holding a single draft release of `version_codes`.
    pub fn draft(track: &str, version_codes: &[i64]) -> Self {
        Self {
            track: track.to_string(),
            releases: vec![TrackRelease {
                version_codes: version_codes.iter().map(i64::to_string).collect(),
                status: "draft".into(),
            }],
        }
    }
}
