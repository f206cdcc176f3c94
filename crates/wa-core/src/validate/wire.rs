//! Wire contract with the delivery pipeline.
//!
//! Input and output batches are camelCase JSON; payloads travel base64
//! encoded. Outcome tags are the pipeline's own: `Ok`, `Dropped`,
//! `ProcessingFailed`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wa_common::RecordId;

/// One micro-batch handed to the validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_stream_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub records: Vec<DeliveryRecord>,
}

/// A buffered record as delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub record_id: RecordId,
    /// Arrival time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approximate_arrival_timestamp: Option<i64>,
    /// Base64-encoded payload.
    pub data: String,
}

/// Per-record outcome reported back to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ValidationOutcome {
    #[serde(rename = "Ok")]
    Accepted,
    Dropped,
    #[serde(rename = "ProcessingFailed")]
    Failed,
}

impl ValidationOutcome {
    /// Whether the pipeline treats the record as successfully processed.
    pub fn is_processed(self) -> bool {
        matches!(self, ValidationOutcome::Accepted | ValidationOutcome::Dropped)
    }
}

/// A record after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransformedRecord {
    pub record_id: RecordId,
    pub result: ValidationOutcome,
    /// Base64-encoded, newline-framed payload.
    pub data: String,
}

/// The batch returned to the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TransformedBatch {
    pub records: Vec<TransformedRecord>,
}

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl TransformedBatch {
    pub fn summary(&self) -> BatchSummary {
        let valid = self
            .records
            .iter()
            .filter(|r| r.result == ValidationOutcome::Accepted)
            .count();
        BatchSummary {
            total: self.records.len(),
            valid,
            invalid: self.records.len() - valid,
        }
    }

    pub fn outcomes(&self) -> Vec<ValidationOutcome> {
        self.records.iter().map(|r| r.result).collect()
    }
}
