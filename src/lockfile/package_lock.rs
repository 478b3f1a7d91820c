//! `package-lock.json` parser for lockfile v1 (nested) and v2/v3 (flat).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::DependencyMap;

/// Bound on legacy-lockfile nesting; the format has no cycles but
/// malformed input should not blow the stack.
const MAX_DEPTH: usize = 64;

#[derive(Deserialize)]
struct PackageLock {
    /// Lockfile v2/v3: flat map keyed by install path.
    packages: Option<BTreeMap<String, FlatEntry>>,
    /// Lockfile v1: nested dependency tree.
    dependencies: Option<BTreeMap<String, NestedEntry>>,
}

#[derive(Deserialize)]
struct FlatEntry {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Deserialize)]
struct NestedEntry {
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, NestedEntry>,
}

/// Parses a `package-lock.json` into a name -> version map.
///
/// A `packages` object selects the modern flat schema; otherwise a
/// top-level `dependencies` object selects the legacy nested one.
pub fn parse(content: &str) -> DependencyMap {
    let lock: PackageLock = match serde_json::from_str(content) {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse package-lock.json");
            return DependencyMap::new();
        }
    };

    let mut deps = DependencyMap::new();

    if let Some(packages) = lock.packages {
        // Modern schema: skip the empty-path root entry, keep only entries
        // that carry both a name and a version.
        for (path, entry) in packages {
            if path.is_empty() {
                continue;
            }
            if let (Some(name), Some(version)) = (entry.name, entry.version) {
                deps.insert(name, version);
            }
        }
    } else if let Some(tree) = lock.dependencies {
        walk_nested(&tree, &mut deps, 0);
    }

    deps
}

fn walk_nested(tree: &BTreeMap<String, NestedEntry>, out: &mut DependencyMap, depth: usize) {
    if depth >= MAX_DEPTH {
        tracing::warn!("package-lock dependency tree exceeds depth limit, truncating");
        return;
    }
    for (name, entry) in tree {
        let version = entry.version.clone().unwrap_or_else(|| "unknown".to_string());
        out.insert(name.clone(), version);
        if !entry.dependencies.is_empty() {
            walk_nested(&entry.dependencies, out, depth + 1);
        }
    }
}

pub fn load(path: &Path) -> DependencyMap {
    super::read_soft(path).map(|c| parse(&c)).unwrap_or_default()
}
