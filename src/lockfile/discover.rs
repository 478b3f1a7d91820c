//! Recursive discovery of dependency files under a directory tree.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{manifest, package_lock, yarn, DependencyMap};

/// Dependency files discovered under a root, grouped by kind.
#[derive(Debug, Default)]
pub struct DependencyFiles {
    pub manifests: Vec<PathBuf>,
    pub package_locks: Vec<PathBuf>,
    pub yarn_locks: Vec<PathBuf>,
}

impl DependencyFiles {
    pub fn total(&self) -> usize {
        self.manifests.len() + self.package_locks.len() + self.yarn_locks.len()
    }
}

/// Walks `root` collecting `package.json`, `package-lock.json`, and
/// `yarn.lock` files, skipping anything under a `node_modules` directory.
///
/// Paths are sorted within each kind so aggregation order is stable.
pub fn find_dependency_files(root: &Path) -> DependencyFiles {
    let mut files = DependencyFiles::default();

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .path()
            .components()
            .any(|c| c.as_os_str() == "node_modules")
        {
            continue;
        }
        match entry.file_name().to_str() {
            Some("package.json") => files.manifests.push(entry.into_path()),
            Some("package-lock.json") => files.package_locks.push(entry.into_path()),
            Some("yarn.lock") => files.yarn_locks.push(entry.into_path()),
            _ => {}
        }
    }

    files.manifests.sort();
    files.package_locks.sort();
    files.yarn_locks.sort();
    files
}

/// Loads and merges every discovered file into one map.
///
/// Processing order is fixed (manifests, then package-locks, then yarn
/// locks, path order within each kind); the last file to name a package
/// decides its version.
pub fn load_all(files: &DependencyFiles) -> DependencyMap {
    let mut all = DependencyMap::new();

    for path in &files.manifests {
        tracing::info!(path = %path.display(), "loading dependencies");
        all.extend(manifest::load(path));
    }
    for path in &files.package_locks {
        tracing::info!(path = %path.display(), "loading dependencies");
        all.extend(package_lock::load(path));
    }
    for path in &files.yarn_locks {
        tracing::info!(path = %path.display(), "loading dependencies");
        all.extend(yarn::load(path));
    }

    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_find_excludes_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(
            &root.join("package.json"),
            r#"{"dependencies": {"lodash": "^4.17.21"}}"#,
        );
        write(
            &root.join("node_modules/evil/package.json"),
            r#"{"dependencies": {"evil-dep": "1.0.0"}}"#,
        );
        write(&root.join("sub/yarn.lock"), "a@^1:\n  version \"1.0.0\"\n");

        let files = find_dependency_files(root);
        assert_eq!(files.manifests.len(), 1);
        assert_eq!(files.yarn_locks.len(), 1);
        assert_eq!(files.package_locks.len(), 0);
        assert_eq!(files.total(), 2);

        let deps = load_all(&files);
        assert!(deps.contains_key("lodash"));
        assert!(deps.contains_key("a"));
        assert!(!deps.contains_key("evil-dep"));
    }

    #[test]
    fn test_load_all_later_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        // Manifest says ^1.0.0, lockfile pins 1.2.3; locks are processed
        // after manifests so the pinned version wins.
        write(
            &root.join("package.json"),
            r#"{"dependencies": {"shared": "^1.0.0"}}"#,
        );
        write(
            &root.join("package-lock.json"),
            r#"{"packages": {"": {}, "node_modules/shared": {"name": "shared", "version": "1.2.3"}}}"#,
        );

        let files = find_dependency_files(root);
        let deps = load_all(&files);
        assert_eq!(deps["shared"], "1.2.3");
    }
}
