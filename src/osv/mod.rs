//! OSV.dev client and response types.
//!
//! The remote database is reached through three operations: a single
//! package query, a batch query, and a per-finding detail fetch. All of
//! them fail soft to `None` with a logged warning; callers treat that as
//! "no data".

mod client;
mod types;

pub use client::{OsvClient, VulnDatabase, OSV_API_URL};
pub use types::*;
