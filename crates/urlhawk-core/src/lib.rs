//! urlhawk-core: Shared types, configuration, and error handling for urlhawk.
//!
//! This crate provides the foundational types used across all urlhawk components:
//! - `Outcome`, the tagged result every probe produces
//! - `ScanResult`, the aggregated per-target mapping handed to consumers
//! - `Target` and the URL normalizer
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod target;
pub mod types;

pub use error::HawkError;
pub use target::{extract_domain, normalize, Target};
pub use types::{FieldValue, Outcome, ProbeInfo, ScanResult};
