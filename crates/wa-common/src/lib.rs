//! Web analytics pipeline common types, IDs, and errors.
//!
//! This crate provides foundational types shared by the validation stage and
//! the compaction job:
//! - Record, query execution, and tick identity types
//! - The unified error type with stable codes
//! - The record schema version

pub mod error;
pub mod id;
pub mod schema;

pub use error::{Error, Result};
pub use id::{QueryExecutionId, RecordId, TickId};
pub use schema::SCHEMA_VERSION;
