//! `package.json` manifest parser.

use std::path::Path;

use serde::Deserialize;

use super::DependencyMap;

#[derive(Deserialize, Default)]
struct Manifest {
    #[serde(default)]
    dependencies: DependencyMap,
    #[serde(rename = "devDependencies", default)]
    dev_dependencies: DependencyMap,
}

/// Parses a `package.json`, merging `dependencies` and `devDependencies`.
///
/// Dev entries overwrite same-named runtime entries, matching the order
/// the manifest declares them in.
pub fn parse(content: &str) -> DependencyMap {
    let manifest: Manifest = match serde_json::from_str(content) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse package.json");
            return DependencyMap::new();
        }
    };

    let mut deps = manifest.dependencies;
    deps.extend(manifest.dev_dependencies);
    deps
}

pub fn load(path: &Path) -> DependencyMap {
    super::read_soft(path).map(|c| parse(&c)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_merges_dev_dependencies() {
        let content = r#"{
            "name": "demo",
            "dependencies": {"lodash": "^4.17.21", "express": "4.18.2"},
            "devDependencies": {"jest": "^29.0.0", "express": "5.0.0-beta"}
        }"#;

        let deps = parse(content);
        assert_eq!(deps.len(), 3);
        assert_eq!(deps["lodash"], "^4.17.21");
        assert_eq!(deps["jest"], "^29.0.0");
        // devDependencies wins on collision
        assert_eq!(deps["express"], "5.0.0-beta");
    }

    #[test]
    fn test_parse_no_dependency_sections() {
        let deps = parse(r#"{"name": "empty"}"#);
        assert!(deps.is_empty());
    }

    #[test]
    fn test_parse_malformed_json_is_empty() {
        let deps = parse("{not json");
        assert!(deps.is_empty());
    }
}
