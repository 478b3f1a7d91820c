//! `yarn.lock` parser (Yarn v1 line format).
//!
//! Known limitation, preserved deliberately: a multi-alias block header
//! such as `pkg-a@^1, pkg-b@^2:` only records the text before the first
//! `@` of the whole line, so the extra aliases are dropped. Scoped header
//! lines (leading `@`) leave nothing before the first `@` and the whole
//! block is dropped.

use std::path::Path;

use super::DependencyMap;

/// Single-pass line parser for Yarn v1 lock text.
///
/// A non-blank, non-comment line ending in `:` opens a block; the next
/// `version` line assigns that block's version. A block with no `version`
/// line before the next header is silently dropped.
pub fn parse(content: &str) -> DependencyMap {
    let mut deps = DependencyMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.ends_with(':') {
            let name = line
                .split('@')
                .next()
                .unwrap_or_default()
                .trim_matches('"')
                .to_string();
            // Scoped headers leave nothing before the first '@'; such a
            // block has no usable name and is dropped.
            current = Some(name).filter(|n| !n.is_empty());
        } else if line.starts_with("version") {
            if let Some(name) = current.take() {
                let version = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .trim_matches('"')
                    .to_string();
                deps.insert(name, version);
            }
        }
    }

    deps
}

pub fn load(path: &Path) -> DependencyMap {
    super::read_soft(path).map(|c| parse(&c)).unwrap_or_default()
}
