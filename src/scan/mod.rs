//! Scan orchestration: single-package, batch, repository, and
//! organization workflows composed from the normalizers, the OSV client,
//! and the classifier.

mod engine;
mod result;

pub use engine::{ScanEngine, DEFAULT_MAX_REPOS};
pub use result::*;
