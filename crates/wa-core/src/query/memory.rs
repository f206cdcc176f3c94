//! In-memory query engine with a toy catalog.
//!
//! Applies each request's catalog effect (drop, add partitions, create) and
//! records every call, so tests can assert on both the traffic and the
//! resulting catalog state. Queries report `RUNNING` for a configurable
//! number of polls before `SUCCEEDED`.

use super::{QualifiedTable, QueryEngine, QueryKind, QueryRequest, QueryState};
use crate::compaction::partition::PartitionKey;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use wa_common::{Error, QueryExecutionId, Result};

/// One call observed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Start(QueryRequest),
    State(QueryExecutionId),
    TableExists(QualifiedTable),
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<EngineCall>,
    tables: BTreeMap<QualifiedTable, BTreeSet<PartitionKey>>,
    polls_remaining: HashMap<QueryExecutionId, u32>,
    final_states: HashMap<QueryExecutionId, QueryState>,
    next_id: u64,
}

/// Recording engine backed by an in-memory catalog.
#[derive(Debug, Default)]
pub struct MemoryQueryEngine {
    inner: Mutex<Inner>,
    pending_polls: u32,
    reject: Option<String>,
    fail_kind: Option<&'static str>,
}

impl MemoryQueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a table.
    pub fn with_table(self, table: QualifiedTable) -> Self {
        self.lock().tables.entry(table).or_default();
        self
    }

    /// Report `RUNNING` this many times before a terminal state.
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Reject every submission whose statement contains `needle`.
    pub fn rejecting(mut self, needle: impl Into<String>) -> Self {
        self.reject = Some(needle.into());
        self
    }

    /// Accept but end in `FAILED` every query of this kind
    /// (`drop_table`, `add_partitions`, `create_table_as_select`).
    pub fn failing_kind(mut self, kind: &'static str) -> Self {
        self.fail_kind = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Statements accepted so far, in submission order.
    pub fn statements(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Start(request) => Some(request.statement.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_table(&self, table: &QualifiedTable) -> bool {
        self.lock().tables.contains_key(table)
    }

    pub fn partitions(&self, table: &QualifiedTable) -> BTreeSet<PartitionKey> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn kind_name(kind: &QueryKind) -> &'static str {
    match kind {
        QueryKind::DropTable => "drop_table",
        QueryKind::AddPartitions { .. } => "add_partitions",
        QueryKind::CreateTableAsSelect { .. } => "create_table_as_select",
    }
}

impl QueryEngine for MemoryQueryEngine {
    fn start_query(&self, request: &QueryRequest) -> Result<QueryExecutionId> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::Start(request.clone()));

        if let Some(needle) = &self.reject {
            if request.statement.contains(needle.as_str()) {
                return Err(Error::QuerySubmission(format!(
                    "statement rejected: contains {needle:?}"
                )));
            }
        }

        inner.next_id += 1;
        let id = QueryExecutionId(format!("mem-{:04}", inner.next_id));

        let final_state = if self.fail_kind == Some(kind_name(&request.kind)) {
            QueryState::Failed {
                reason: "injected failure".into(),
            }
        } else {
            match &request.kind {
                QueryKind::DropTable => {
                    inner.tables.remove(&request.table);
                    QueryState::Succeeded
                }
                QueryKind::AddPartitions { partitions } => {
                    match inner.tables.get_mut(&request.table) {
                        Some(existing) => {
                            existing.extend(partitions.iter().cloned());
                            QueryState::Succeeded
                        }
                        None => QueryState::Failed {
                            reason: format!("Table not found {}", request.table),
                        },
                    }
                }
                QueryKind::CreateTableAsSelect { .. } => {
                    if inner.tables.contains_key(&request.table) {
                        QueryState::Failed {
                            reason: format!("Table {} already exists", request.table),
                        }
                    } else {
                        inner.tables.insert(request.table.clone(), BTreeSet::new());
                        QueryState::Succeeded
                    }
                }
            }
        };

        inner.polls_remaining.insert(id.clone(), self.pending_polls);
        inner.final_states.insert(id.clone(), final_state);
        Ok(id)
    }

    fn query_state(&self, id: &QueryExecutionId) -> Result<QueryState> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::State(id.clone()));

        let remaining = inner
            .polls_remaining
            .get_mut(id)
            .ok_or_else(|| Error::Transport(format!("unknown query execution {id}")))?;
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(QueryState::Running);
        }
        inner
            .final_states
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unknown query execution {id}")))
    }

    fn table_exists(&self, table: &QualifiedTable) -> Result<bool> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::TableExists(table.clone()));
        Ok(inner.tables.contains_key(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: QueryKind, table: &str) -> QueryRequest {
        QueryRequest {
            kind,
            table: QualifiedTable::new("db", table),
            statement: format!("-- {table}"),
            output_location: "s3://b/tmp".into(),
            work_group: "primary".into(),
            context_database: None,
        }
    }

    #[test]
    fn test_create_collides_on_repeat() {
        let engine = MemoryQueryEngine::new();
        let ctas = request(
            QueryKind::CreateTableAsSelect {
                external_location: "s3://b/out/".into(),
            },
            "tmp_t",
        );
        let first = engine.start_query(&ctas).unwrap();
        assert_eq!(engine.query_state(&first).unwrap(), QueryState::Succeeded);
        let second = engine.start_query(&ctas).unwrap();
        assert!(matches!(
            engine.query_state(&second).unwrap(),
            QueryState::Failed { .. }
        ));
    }

    #[test]
    fn test_pending_polls_then_success() {
        let engine = MemoryQueryEngine::new().with_pending_polls(2);
        let id = engine.start_query(&request(QueryKind::DropTable, "x")).unwrap();
        assert_eq!(engine.query_state(&id).unwrap(), QueryState::Running);
        assert_eq!(engine.query_state(&id).unwrap(), QueryState::Running);
        assert_eq!(engine.query_state(&id).unwrap(), QueryState::Succeeded);
    }

    #[test]
    fn test_rejection_is_recorded() {
        let engine = MemoryQueryEngine::new().rejecting("forbidden");
        let mut req = request(QueryKind::DropTable, "x");
        req.statement = "DROP forbidden".into();
        assert!(engine.start_query(&req).is_err());
        assert_eq!(engine.calls().len(), 1);
    }
}
