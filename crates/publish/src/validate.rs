//! Request validation.
//!
//! Turns a [`RawConfig`] into a [`PublishRequest`]. Nothing here touches
//! the network; the only side effect is stat-ing files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FileKind, ValidationError};
use crate::fs::FileAccess;
use crate::types::{BinaryEntry, PublishRequest, RawConfig, Track};

/// Validates `raw` against `fs` and builds an immutable request.
///
/// Checks run in this order: credential file (when one is given), package
/// name, track, binary list, then each binary and mapping file.
pub fn validate(raw: &RawConfig, fs: &dyn FileAccess) -> Result<PublishRequest, ValidationError> {
    if let Some(credentials) = &raw.credentials_path {
        require_file(fs, FileKind::Credentials, credentials)?;
    }

    let package_name = raw.package_name.trim();
    if package_name.is_empty() {
        return Err(ValidationError::EmptyPackageName);
    }

    let track: Track = raw.track.parse()?;

    if raw.binaries.is_empty() {
        return Err(ValidationError::NoFiles);
    }

    for entry in &raw.binaries {
        require_file(fs, FileKind::Binary, entry.file_path())?;
        if let Some(mapping) = entry.mapping_path() {
            require_file(fs, FileKind::Mapping, mapping)?;
        }
    }

    debug!(
        package = package_name,
        track = %track,
        binaries = raw.binaries.len(),
        apk = raw.apk,
        "publish request validated"
    );

    Ok(PublishRequest::new(
        package_name.to_string(),
        track,
        raw.credentials_path.clone(),
        raw.binaries.clone(),
        raw.apk,
        raw.verbose,
    ))
}

fn require_file(fs: &dyn FileAccess, kind: FileKind, path: &Path) -> Result<(), ValidationError> {
    if fs.exists(path) {
        Ok(())
    } else {
        Err(ValidationError::FileNotFound {
            kind,
            path: path.to_path_buf(),
        })
    }
}

/// Merges binary-only paths with binary→mapping pairs into one list.
///
/// A path given both ways keeps its mapping. Mapped entries come first in
/// input order, followed by the remaining binary-only paths. If a path is
/// paired with more than one distinct mapping, the last pairing wins.
pub fn merge_binaries(bin_only: &[PathBuf], with_mapping: &[(PathBuf, PathBuf)]) -> Vec<BinaryEntry> {
    let mut entries: Vec<BinaryEntry> = Vec::with_capacity(bin_only.len() + with_mapping.len());

    for (path, mapping) in with_mapping {
        match entries.iter_mut().find(|e| e.file_path() == path) {
            Some(existing) if existing.mapping_path() == Some(mapping.as_path()) => {
                debug!(binary = %path.display(), "binary and mapping listed twice");
            }
            Some(existing) => {
                warn!(
                    binary = %path.display(),
                    previous = ?existing.mapping_path(),
                    mapping = %mapping.display(),
                    "binary given more than one mapping, using the last"
                );
                *existing = BinaryEntry::with_mapping(path, mapping);
            }
            None => entries.push(BinaryEntry::with_mapping(path, mapping)),
        }
    }

    for path in bin_only {
        if entries.iter().any(|e| e.file_path() == path) {
            debug!(binary = %path.display(), "binary already listed, keeping the entry with its mapping");
            continue;
        }
        entries.push(BinaryEntry::new(path));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFileAccess;

    fn fs_with(files: &[&str]) -> MemFileAccess {
        let fs = MemFileAccess::new();
        for f in files {
            fs.insert(*f, b"x".to_vec());
        }
        fs
    }

    fn raw(binaries: Vec<BinaryEntry>) -> RawConfig {
        RawConfig {
            package_name: "com.sample.app".into(),
            track: "internal".into(),
            credentials_path: Some("auth.json".into()),
            binaries,
            apk: false,
            verbose: false,
        }
    }

    #[test]
    fn rejects_blank_package_name() {
        let fs = fs_with(&["auth.json", "bin.aab"]);
        for name in ["", " ", "\t\n"] {
            let mut cfg = raw(vec![BinaryEntry::new("bin.aab")]);
            cfg.package_name = name.into();
            assert!(matches!(
                validate(&cfg, &fs),
                Err(ValidationError::EmptyPackageName)
            ));
        }
    }

    #[test]
    fn rejects_missing_credentials() {
        let fs = fs_with(&["bin.aab"]);
        let err = validate(&raw(vec![BinaryEntry::new("bin.aab")]), &fs).unwrap_err();
        match err {
            ValidationError::FileNotFound { kind, path } => {
                assert_eq!(kind, FileKind::Credentials);
                assert_eq!(path, PathBuf::from("auth.json"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn credential_file_is_optional() {
        let fs = fs_with(&["bin.aab"]);
        let mut cfg = raw(vec![BinaryEntry::new("bin.aab")]);
        cfg.credentials_path = None;

        let req = validate(&cfg, &fs).unwrap();
        assert!(req.credentials().is_none());
    }

    #[test]
    fn rejects_unsupported_tracks() {
        let fs = fs_with(&["auth.json", "bin.aab"]);
        for track in ["production", "prod", "staging", "internal-2"] {
            let mut cfg = raw(vec![BinaryEntry::new("bin.aab")]);
            cfg.track = track.into();
            let err = validate(&cfg, &fs).unwrap_err();
            assert!(
                matches!(err, ValidationError::UnsupportedTrack { .. }),
                "{track} should be rejected"
            );
            let msg = err.to_string();
            assert!(msg.contains(track));
            assert!(msg.contains("'internal', 'alpha', 'beta'"));
        }
    }

    #[test]
    fn rejects_blank_track() {
        let fs = fs_with(&["auth.json", "bin.aab"]);
        let mut cfg = raw(vec![BinaryEntry::new("bin.aab")]);
        cfg.track = "  ".into();
        assert!(matches!(validate(&cfg, &fs), Err(ValidationError::MissingTrack)));
    }

    #[test]
    fn rejects_empty_binary_list() {
        let fs = fs_with(&["auth.json"]);
        assert!(matches!(validate(&raw(vec![]), &fs), Err(ValidationError::NoFiles)));
    }

    #[test]
    fn rejects_missing_binary_and_names_it() {
        let fs = fs_with(&["auth.json", "bin.aab"]);
        let cfg = raw(vec![BinaryEntry::new("bin.aab"), BinaryEntry::new("dontexist.aab")]);
        let err = validate(&cfg, &fs).unwrap_err();
        assert!(matches!(
            &err,
            ValidationError::FileNotFound { kind: FileKind::Binary, .. }
        ));
        assert_eq!(err.to_string(), "binary file 'dontexist.aab' does not exist");
    }

    #[test]
    fn rejects_missing_mapping() {
        let fs = fs_with(&["auth.json", "bin.aab"]);
        let cfg = raw(vec![BinaryEntry::with_mapping("bin.aab", "mapping.txt")]);
        let err = validate(&cfg, &fs).unwrap_err();
        match err {
            ValidationError::FileNotFound { kind, path } => {
                assert_eq!(kind, FileKind::Mapping);
                assert_eq!(path, PathBuf::from("mapping.txt"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn builds_request_from_valid_config() {
        let fs = fs_with(&["auth.json", "bin.aab", "mapping.txt"]);
        let mut cfg = raw(vec![BinaryEntry::with_mapping("bin.aab", "mapping.txt")]);
        cfg.package_name = "  com.sample.app ".into();
        cfg.track = "Beta".into();

        let req = validate(&cfg, &fs).unwrap();
        assert_eq!(req.package_name(), "com.sample.app");
        assert_eq!(req.track(), Track::Beta);
        assert_eq!(
            req.credentials().map(|c| c.as_path()),
            Some(Path::new("auth.json"))
        );
        assert_eq!(req.binaries(), cfg.binaries.as_slice());
        assert!(!req.is_apk());
        assert!(!req.verbose());
    }

    #[test]
    fn merge_prefers_entry_with_mapping() {
        let merged = merge_binaries(
            &["a.aab".into(), "b.aab".into()],
            &[("b.aab".into(), "b-map.txt".into())],
        );
        assert_eq!(
            merged,
            vec![
                BinaryEntry::with_mapping("b.aab", "b-map.txt"),
                BinaryEntry::new("a.aab"),
            ]
        );
    }

    #[test]
    fn merge_collapses_duplicate_binary_only_paths() {
        let merged = merge_binaries(&["a.aab".into(), "a.aab".into()], &[]);
        assert_eq!(merged, vec![BinaryEntry::new("a.aab")]);
    }

    #[test]
    fn merge_last_mapping_wins() {
        let merged = merge_binaries(
            &[],
            &[
                ("a.aab".into(), "old.txt".into()),
                ("a.aab".into(), "new.txt".into()),
            ],
        );
        assert_eq!(merged, vec![BinaryEntry::with_mapping("a.aab", "new.txt")]);
    }

    #[test]
    fn merge_collapses_repeated_identical_pair() {
        let merged = merge_binaries(
            &["a.aab".into()],
            &[
                ("a.aab".into(), "map.txt".into()),
                ("a.aab".into(), "map.txt".into()),
            ],
        );
        assert_eq!(merged, vec![BinaryEntry::with_mapping("a.aab", "map.txt")]);
    }

    #[test]
    fn merge_empty_inputs() {
        assert!(merge_binaries(&[], &[]).is_empty());
    }
}
