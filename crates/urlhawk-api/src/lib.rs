//! urlhawk-api: HTTP front end for the scan orchestrator.
//!
//! - `GET /api/scan?url=<target>` runs a full scan (or one probe with
//!   `&probe=<name>`) and returns the JSON result
//! - `GET /api/probes` lists the registered probes

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;
