//! Query engine seam.
//!
//! The compaction job only ever submits three kinds of statements and, when
//! polling is enabled, asks for their state. [`QueryEngine`] is the narrow
//! trait both the live HTTP client and the in-memory engine implement.

pub mod http;
pub mod memory;

use crate::compaction::partition::PartitionKey;
use serde::Serialize;
use std::fmt;
use tracing::info;
use wa_common::{Error, QueryExecutionId, Result};

pub use http::HttpQueryEngine;
pub use memory::{EngineCall, MemoryQueryEngine};

/// `database.table` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QualifiedTable {
    pub database: String,
    pub table: String,
}

impl QualifiedTable {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// What a statement does to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryKind {
    DropTable,
    AddPartitions { partitions: Vec<PartitionKey> },
    CreateTableAsSelect { external_location: String },
}

/// A fully rendered statement ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub kind: QueryKind,
    /// Table the statement drops, alters, or creates.
    pub table: QualifiedTable,
    pub statement: String,
    /// Where the engine writes result/staging files.
    pub output_location: String,
    pub work_group: String,
    /// Default database for the execution context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_database: Option<String>,
}

/// Lifecycle state of a submitted query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed { reason: String },
    Cancelled { reason: String },
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryState::Queued | QueryState::Running)
    }

    pub fn name(&self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed { .. } => "FAILED",
            QueryState::Cancelled { .. } => "CANCELLED",
        }
    }
}

/// Trait for submitting statements to a SQL query engine.
pub trait QueryEngine {
    /// Submit a statement; returns as soon as the engine accepts it.
    fn start_query(&self, request: &QueryRequest) -> Result<QueryExecutionId>;

    /// Current state of a previously submitted statement.
    fn query_state(&self, id: &QueryExecutionId) -> Result<QueryState>;

    /// Whether `table` is registered in the catalog.
    fn table_exists(&self, table: &QualifiedTable) -> Result<bool>;
}

/// Engine used when no endpoint is configured. Every call fails.
#[derive(Debug, Default)]
pub struct OfflineQueryEngine;

impl QueryEngine for OfflineQueryEngine {
    fn start_query(&self, _request: &QueryRequest) -> Result<QueryExecutionId> {
        Err(offline())
    }

    fn query_state(&self, _id: &QueryExecutionId) -> Result<QueryState> {
        Err(offline())
    }

    fn table_exists(&self, _table: &QualifiedTable) -> Result<bool> {
        Err(offline())
    }
}

fn offline() -> Error {
    Error::Config("no query engine endpoint configured; pass --endpoint or run dry".into())
}

/// Result of handing a request to the engine (or, in dry-run, to the log).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub request: QueryRequest,
    /// `None` in dry-run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<QueryExecutionId>,
}

/// Logs and submits requests, short-circuiting before any engine call in
/// dry-run mode.
pub struct QuerySubmitter<'a> {
    engine: &'a dyn QueryEngine,
    dry_run: bool,
}

impl<'a> QuerySubmitter<'a> {
    pub fn new(engine: &'a dyn QueryEngine, dry_run: bool) -> Self {
        Self { engine, dry_run }
    }

    pub fn submit(&self, request: QueryRequest) -> Result<Submission> {
        info!(statement = %request.statement, "query string");
        if let QueryKind::CreateTableAsSelect { external_location } = &request.kind {
            info!(%external_location, "external location");
        }
        info!(output_location = %request.output_location, "output location");

        if self.dry_run {
            info!("end of dry-run");
            return Ok(Submission {
                request,
                execution_id: None,
            });
        }

        let execution_id = self.engine.start_query(&request)?;
        info!(%execution_id, work_group = %request.work_group, "query submitted");
        Ok(Submission {
            request,
            execution_id: Some(execution_id),
        })
    }
}
