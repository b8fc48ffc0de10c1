//! Penalty catalog and driver deduction workflows for the franchise fleet
//! platform.
//!
//! The library exposes the domain services behind storage and mail-transport
//! seams so the HTTP service, the CLI demo, and the test suites can all drive
//! the same workflow code against their own infrastructure.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
