//! Shared types, adapter traits, and error types for pushsync.
//!
//! Adapter crates depend only on this crate, so storage and registry
//! implementations compile independently of the reconciliation engine.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod error;
pub mod kv_adapter;
pub mod prelude;
pub mod registry_adapter;
pub mod settings;
pub mod subscription_adapter;
pub mod types;
pub mod utils;

// vim: ts=4
