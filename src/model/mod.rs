//! Core data types shared across the scanner.
//!
//! - [`PackageSpec`] - A parsed `name@version` package specification
//!
//! # Example
//!
//! ```
//! use roguepkg::model::PackageSpec;
//!
//! let spec = PackageSpec::parse("lodash@4.17.21");
//! assert_eq!(spec.name, "lodash");
//! assert_eq!(spec.version.as_deref(), Some("4.17.21"));
//! ```

mod spec;

pub use spec::*;
