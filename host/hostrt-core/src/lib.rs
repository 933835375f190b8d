//!
//! hostrt-core - Core Types
//!
//! This crate provides the types shared by every hostrt crate:
//!
//! - `HostError` / `MisuseKind` for failures of the threading primitives
//! - `HostConfig` for the TOML configuration of a host instance
//! - `init_logging` for installing the stderr tracing subscriber
//! - `report` for logging a failed substrate call at the C boundary
//!
//! Rust callers receive `HostResult` values and decide what to do with them.
//! The C ABI goes through `report`, which logs the failure and hands back a
//! negative errno so the embedding runtime still sees it.
//!

pub mod config;
pub mod error;
pub mod logging;
pub mod report;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use report::*;
