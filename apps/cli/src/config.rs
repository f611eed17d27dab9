//! Publish configuration file.
//!
//! An optional TOML file supplies defaults; command-line flags override
//! every field they set.
//!
//! ```toml
//! auth_file = "secrets/play.json"
//! app_id = "com.example.app"
//! track = "beta"
//!
//! [[binaries]]
//! path = "app/build/app-release.aab"
//! mapping = "app/build/mapping.txt"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use pstore_play::TOKEN_ENV_VAR;
use pstore_publish::{BinaryEntry, RawConfig, Track, merge_binaries};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Contents of a `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    pub auth_file: Option<PathBuf>,
    pub app_id: Option<String>,
    pub track: Option<String>,
    pub apk: bool,
    pub verbose: bool,
    pub binaries: Vec<BinaryEntry>,
}

impl PublishConfig {
    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: PublishConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), binaries = config.binaries.len(), "configuration loaded");
        Ok(config)
    }

    /// Layers `cli` over this file and builds the validator input.
    ///
    /// Binaries from both sources are combined, file entries first; a
    /// mapping given on the command line replaces one from the file. The
    /// credential file may be omitted only when `token_in_env` is set.
    pub fn merge(self, cli: &Cli, token_in_env: bool) -> anyhow::Result<RawConfig> {
        let credentials_path = cli.auth_file.clone().or(self.auth_file);
        if credentials_path.is_none() && !token_in_env {
            anyhow::bail!(
                "no credential file given, pass --auth-file, set auth_file in the config file or set {TOKEN_ENV_VAR}"
            );
        }

        let mut bin_only = Vec::new();
        let mut with_mapping = Vec::new();
        for entry in self.binaries {
            match entry.mapping_path() {
                Some(mapping) => {
                    with_mapping.push((entry.file_path().to_path_buf(), mapping.to_path_buf()))
                }
                None => bin_only.push(entry.file_path().to_path_buf()),
            }
        }
        bin_only.extend(cli.app_bin_only.iter().cloned());
        with_mapping.extend(cli.app_bin.iter().cloned());

        Ok(RawConfig {
            package_name: cli.app_id.clone().or(self.app_id).unwrap_or_default(),
            track: cli
                .track
                .clone()
                .or(self.track)
                .unwrap_or_else(|| Track::default().to_string()),
            credentials_path,
            binaries: merge_binaries(&bin_only, &with_mapping),
            apk: cli.apk || self.apk,
            verbose: cli.verbose || self.verbose,
        })
    }
}
