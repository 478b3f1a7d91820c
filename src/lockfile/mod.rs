//! Dependency-file normalizers.
//!
//! Each parser takes file content and produces a [`DependencyMap`]. All
//! parsers fail soft: a malformed or unreadable file logs a warning and
//! yields an empty map so a scan can continue with whatever the other
//! files produced.
//!
//! | Parser | File | Notes |
//! |--------|------|-------|
//! | [`manifest`] | `package.json` | `dependencies` + `devDependencies` |
//! | [`package_lock`] | `package-lock.json` | lockfile v1 (nested) and v2/v3 (flat) |
//! | [`yarn`] | `yarn.lock` | Yarn v1 line format |

pub mod discover;
pub mod manifest;
pub mod package_lock;
pub mod yarn;

pub use discover::{find_dependency_files, load_all, DependencyFiles};

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::InputError;

/// Mapping from package name to version string.
///
/// When multiple files name the same package, the most recently processed
/// file wins; no version reconciliation is attempted.
pub type DependencyMap = BTreeMap<String, String>;

/// Loads dependencies from a single file, dispatching on the file name.
///
/// This is the CLI `--file` entry point; unlike the parsers themselves it
/// reports missing or unrecognized files as hard errors.
pub fn load_file(path: &Path) -> Result<DependencyMap, InputError> {
    if !path.exists() {
        return Err(InputError::FileNotFound(path.display().to_string()));
    }

    let deps = match path.file_name().and_then(|n| n.to_str()) {
        Some("package.json") => manifest::load(path),
        Some("package-lock.json") => package_lock::load(path),
        Some("yarn.lock") => yarn::load(path),
        _ => return Err(InputError::UnsupportedFile(path.display().to_string())),
    };

    if deps.is_empty() {
        return Err(InputError::NoDependencies(path.display().to_string()));
    }
    Ok(deps)
}

/// Reads a file to a string, soft-failing to `None` with a warning.
pub(crate) fn read_soft(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read dependency file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file_missing() {
        let err = load_file(Path::new("/nonexistent/package.json")).unwrap_err();
        assert!(matches!(err, InputError::FileNotFound(_)));
    }

    #[test]
    fn test_load_file_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Gemfile.lock");
        std::fs::File::create(&path).unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, InputError::UnsupportedFile(_)));
    }

    #[test]
    fn test_load_file_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{{}}").unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, InputError::NoDependencies(_)));
    }

    #[test]
    fn test_load_file_manifest_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{"dependencies": {{"lodash": "^4.17.21"}}}}"#).unwrap();

        let deps = load_file(&path).unwrap();
        assert_eq!(deps.get("lodash").map(String::as_str), Some("^4.17.21"));
    }
}
