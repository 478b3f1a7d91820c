pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod github;
pub mod lockfile;
pub mod mcp;
pub mod model;
pub mod osv;
pub mod output;
pub mod scan;

pub use cache::DetailCache;
pub use classifier::{classify, ClassifiedFinding};
pub use config::Config;
pub use error::InputError;
pub use github::{GitHubClient, SourceHost};
pub use lockfile::DependencyMap;
pub use model::PackageSpec;
pub use osv::{OsvClient, VulnDatabase};
pub use scan::{ScanEngine, ScanResult, ScanStatus};
