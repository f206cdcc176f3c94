//! Web analytics log pipeline core.
//!
//! This crate provides:
//! - The record validation stage for delivery micro-batches
//! - Hourly compaction of the raw log table into columnar holding tables
//! - The query engine seam (live HTTP client and in-memory engine)
//! - CLI, logging, and exit code plumbing for the `wa-core` binary

pub mod cli;
pub mod compaction;
pub mod exit_codes;
pub mod logging;
pub mod query;
pub mod timefmt;
pub mod validate;

pub use compaction::{CompactionExecutor, TickReport};
pub use query::{QueryEngine, QueryRequest};
pub use validate::{RecordSchema, ValidationStage};
