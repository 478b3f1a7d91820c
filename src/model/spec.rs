use serde::{Deserialize, Serialize};

/// A package specification parsed from a string like `lodash@4.17.21`.
///
/// An absent version is always `None`, never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PackageSpec {
    /// Parses a package specification, honoring npm scoped-package syntax.
    ///
    /// - `lodash` -> name `lodash`, no version
    /// - `lodash@4.17.21` -> name `lodash`, version `4.17.21`
    /// - `@babel/core@7.0.0` -> name `@babel/core`, version `7.0.0`
    /// - `@babel/core` -> treated as a bare name (no version)
    pub fn parse(spec: &str) -> Self {
        if !spec.contains('@') {
            return Self {
                name: spec.to_string(),
                version: None,
            };
        }

        if let Some(rest) = spec.strip_prefix('@') {
            // Scoped package: expect "@scope/name@version". Splitting on '@'
            // must yield the scope-qualified name and a version; anything
            // less is a bare scoped name. Extra '@' segments are dropped.
            let mut parts = rest.split('@');
            let name = parts.next().unwrap_or_default();
            match parts.next() {
                Some(version) if !name.is_empty() && !version.is_empty() => Self {
                    name: format!("@{name}"),
                    version: Some(version.to_string()),
                },
                _ => Self {
                    name: spec.to_string(),
                    version: None,
                },
            }
        } else {
            // Unscoped: only the first two '@'-separated segments are used.
            let mut parts = spec.split('@');
            let name = parts.next().unwrap_or_default().to_string();
            let version = parts.next().filter(|v| !v.is_empty()).map(String::from);
            Self { name, version }
        }
    }
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Strips a leading run of semver range operators (`^ ~ > = <`) from a
/// version string taken from a dependency file.
///
/// No range resolution happens here; `^1.2.3` simply becomes `1.2.3`.
pub fn strip_version_operators(version: &str) -> &str {
    version.trim_start_matches(['^', '~', '>', '=', '<'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let spec = PackageSpec::parse("lodash");
        assert_eq!(spec.name, "lodash");
        assert_eq!(spec.version, None);
    }

    #[test]
    fn test_parse_name_and_version() {
        let spec = PackageSpec::parse("lodash@4.17.21");
        assert_eq!(spec.name, "lodash");
        assert_eq!(spec.version.as_deref(), Some("4.17.21"));
    }

    #[test]
    fn test_parse_scoped_with_version() {
        let spec = PackageSpec::parse("@babel/core@7.0.0");
        assert_eq!(spec.name, "@babel/core");
        assert_eq!(spec.version.as_deref(), Some("7.0.0"));
    }

    #[test]
    fn test_parse_scoped_without_version() {
        let spec = PackageSpec::parse("@babel/core");
        assert_eq!(spec.name, "@babel/core");
        assert_eq!(spec.version, None);
    }

    #[test]
    fn test_parse_scoped_trailing_at() {
        // Empty version segment falls back to the whole string as name.
        let spec = PackageSpec::parse("@babel/core@");
        assert_eq!(spec.name, "@babel/core@");
        assert_eq!(spec.version, None);
    }

    #[test]
    fn test_parse_extra_at_segments() {
        // Only the first two segments are used.
        let spec = PackageSpec::parse("lodash@4.17.21@extra");
        assert_eq!(spec.name, "lodash");
        assert_eq!(spec.version.as_deref(), Some("4.17.21"));

        let spec = PackageSpec::parse("@babel/core@7.0.0@extra");
        assert_eq!(spec.name, "@babel/core");
        assert_eq!(spec.version.as_deref(), Some("7.0.0"));
    }

    #[test]
    fn test_parse_empty_version_is_none() {
        let spec = PackageSpec::parse("lodash@");
        assert_eq!(spec.name, "lodash");
        assert_eq!(spec.version, None);
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(PackageSpec::parse("lodash@4.17.21").to_string(), "lodash@4.17.21");
        assert_eq!(PackageSpec::parse("@babel/core@7.0.0").to_string(), "@babel/core@7.0.0");
        assert_eq!(PackageSpec::parse("lodash").to_string(), "lodash");
    }

    #[test]
    fn test_strip_version_operators() {
        assert_eq!(strip_version_operators("^1.2.3"), "1.2.3");
        assert_eq!(strip_version_operators("~0.9.0"), "0.9.0");
        assert_eq!(strip_version_operators(">=2.0"), "2.0");
        assert_eq!(strip_version_operators("<=1.0.0"), "1.0.0");
        assert_eq!(strip_version_operators("4.17.21"), "4.17.21");
        assert_eq!(strip_version_operators("unknown"), "unknown");
    }
}
