//! urlhawk-engine: Concurrent, deadline-bound probe execution.
//!
//! This crate runs every registered probe against one target and collects
//! their outcomes into a single [`urlhawk_core::ScanResult`]:
//! - A probe registry built once at startup and shared read-only
//! - A scan deadline derived into every probe and nested sub-check
//! - One fan-out/fan-in primitive with per-task panic isolation
//! - The built-in reconnaissance probes

pub mod deadline;
pub mod error;
pub mod fanout;
pub mod orchestrator;
pub mod probe;
pub mod probes;
pub mod registry;

pub use deadline::{Deadline, DeadlineExceeded, DeadlineGuard};
pub use error::EngineError;
pub use fanout::{run_concurrently, FanOut, TaskOutcome};
pub use orchestrator::Orchestrator;
pub use probe::{probe_fn, NetClients, Probe, ProbeContext};
pub use registry::{ProbeDescriptor, Registry};
