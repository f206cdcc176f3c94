//! Live query engine client.
//!
//! Speaks the JSON 1.1 RPC protocol of the hosted query service:
//! `POST <endpoint>/` with an `X-Amz-Target` header naming the operation.
//! Requests are sent unsigned; the endpoint is expected to be a signing
//! proxy (or a compatible local service) that adds credentials.

use super::{QualifiedTable, QueryEngine, QueryRequest, QueryState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use wa_common::{Error, QueryExecutionId, Result};

const TARGET_PREFIX: &str = "AmazonAthena";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const DEFAULT_CATALOG: &str = "AwsDataCatalog";

/// HTTP client for the query engine.
#[derive(Debug, Clone)]
pub struct HttpQueryEngine {
    agent: ureq::Agent,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionInput<'a> {
    query_string: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_execution_context: Option<ExecutionContext<'a>>,
    result_configuration: ResultConfiguration<'a>,
    work_group: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionContext<'a> {
    database: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfiguration<'a> {
    output_location: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionOutput {
    query_execution_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionInput<'a> {
    query_execution_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionOutput {
    query_execution: QueryExecution,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    status: QueryExecutionStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionStatus {
    state: String,
    #[serde(default)]
    state_change_reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetTableMetadataInput<'a> {
    catalog_name: &'a str,
    database_name: &'a str,
    table_name: &'a str,
}

#[derive(Deserialize)]
struct ServiceError {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl HttpQueryEngine {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call<I: Serialize, O: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        input: &I,
    ) -> std::result::Result<O, CallError> {
        debug!(operation, endpoint = %self.endpoint, "query engine call");
        let response = self
            .agent
            .post(&format!("{}/", self.endpoint))
            .set("Content-Type", CONTENT_TYPE)
            .set("X-Amz-Target", &format!("{TARGET_PREFIX}.{operation}"))
            .send_json(input);

        match response {
            Ok(resp) => resp
                .into_json::<O>()
                .map_err(|e| CallError::Transport(format!("{operation}: bad response body: {e}"))),
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                let parsed: Option<ServiceError> = serde_json::from_str(&body).ok();
                Err(CallError::Service {
                    status,
                    kind: parsed
                        .as_ref()
                        .map(|e| short_error_kind(&e.kind).to_string())
                        .unwrap_or_default(),
                    message: parsed.map(|e| e.message).unwrap_or(body),
                })
            }
            Err(ureq::Error::Transport(t)) => {
                Err(CallError::Transport(format!("{operation}: {t}")))
            }
        }
    }
}

#[derive(Debug)]
enum CallError {
    Service {
        status: u16,
        kind: String,
        message: String,
    },
    Transport(String),
}

impl From<CallError> for Error {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Service {
                status,
                kind,
                message,
            } => Error::QuerySubmission(format!("{kind} (HTTP {status}): {message}")),
            CallError::Transport(msg) => Error::Transport(msg),
        }
    }
}

/// `"com.amazonaws...#InvalidRequestException"` → `"InvalidRequestException"`.
fn short_error_kind(kind: &str) -> &str {
    kind.rsplit('#').next().unwrap_or(kind)
}

/// Map a service state string to [`QueryState`].
fn parse_state(state: &str, reason: Option<String>) -> Result<QueryState> {
    let reason = reason.unwrap_or_default();
    match state {
        "QUEUED" => Ok(QueryState::Queued),
        "RUNNING" => Ok(QueryState::Running),
        "SUCCEEDED" => Ok(QueryState::Succeeded),
        "FAILED" => Ok(QueryState::Failed { reason }),
        "CANCELLED" => Ok(QueryState::Cancelled { reason }),
        other => Err(Error::Transport(format!("unknown query state {other:?}"))),
    }
}

impl QueryEngine for HttpQueryEngine {
    fn start_query(&self, request: &QueryRequest) -> Result<QueryExecutionId> {
        let input = StartQueryExecutionInput {
            query_string: &request.statement,
            query_execution_context: request
                .context_database
                .as_deref()
                .map(|database| ExecutionContext { database }),
            result_configuration: ResultConfiguration {
                output_location: &request.output_location,
            },
            work_group: &request.work_group,
        };
        let output: StartQueryExecutionOutput = self.call("StartQueryExecution", &input)?;
        Ok(QueryExecutionId(output.query_execution_id))
    }

    fn query_state(&self, id: &QueryExecutionId) -> Result<QueryState> {
        let input = GetQueryExecutionInput {
            query_execution_id: &id.0,
        };
        let output: GetQueryExecutionOutput = self.call("GetQueryExecution", &input)?;
        let status = output.query_execution.status;
        parse_state(&status.state, status.state_change_reason)
    }

    fn table_exists(&self, table: &QualifiedTable) -> Result<bool> {
        let input = GetTableMetadataInput {
            catalog_name: DEFAULT_CATALOG,
            database_name: &table.database,
            table_name: &table.table,
        };
        match self.call::<_, serde_json::Value>("GetTableMetadata", &input) {
            Ok(_) => Ok(true),
            Err(CallError::Service { kind, message, .. }) if is_missing_table(&kind, &message) => {
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Whether a `GetTableMetadata` failure means the table is absent.
fn is_missing_table(kind: &str, message: &str) -> bool {
    kind == "MetadataException" && message.to_ascii_lowercase().contains("not found")
}
