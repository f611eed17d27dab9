//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

/// Upload Android app binaries to a Google Play testing track
#[derive(Parser, Debug)]
#[command(name = "pstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Service account key or access token file [optional when PSTORE_ACCESS_TOKEN is set]
    #[arg(long, alias = "authFile", value_name = "PATH")]
    pub auth_file: Option<PathBuf>,

    /// Package name of the application, e.g. com.example.app
    #[arg(long, alias = "appId", value_name = "ID")]
    pub app_id: Option<String>,

    /// Binary to upload without a mapping file (repeatable)
    #[arg(long, alias = "appBinOnly", value_name = "PATH")]
    pub app_bin_only: Vec<PathBuf>,

    /// Binary to upload with its ProGuard mapping file (repeatable)
    #[arg(long, alias = "appBin", value_name = "PATH=MAPPING", value_parser = parse_bin_mapping)]
    pub app_bin: Vec<(PathBuf, PathBuf)>,

    /// Release track: internal, alpha or beta [default: internal]
    #[arg(long, value_name = "TRACK")]
    pub track: Option<String>,

    /// Upload binaries as APKs instead of app bundles
    #[arg(long)]
    pub apk: bool,

    /// Log every step of the upload
    #[arg(short, long)]
    pub verbose: bool,

    /// TOML file supplying defaults for any of the above
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Parses `PATH=MAPPING`.
fn parse_bin_mapping(s: &str) -> Result<(PathBuf, PathBuf), String> {
    let (bin, mapping) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=MAPPING, got '{s}'"))?;
    if bin.is_empty() || mapping.is_empty() {
        return Err(format!("both sides of '{s}' must be non-empty"));
    }
    Ok((PathBuf::from(bin), PathBuf::from(mapping)))
}
