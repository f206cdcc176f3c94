//! Validation stage configuration.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What to do when a record's payload cannot be decoded or parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeFailurePolicy {
    /// Fail the whole batch; the delivery pipeline retries it.
    #[default]
    AbortBatch,
    /// Mark only the offending record as failed and keep going.
    IsolateRecord,
}

/// Settings for the record validation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub decode_failure: DecodeFailurePolicy,
}

impl ValidatorConfig {
    pub fn isolating() -> Self {
        Self {
            decode_failure: DecodeFailurePolicy::IsolateRecord,
        }
    }
}
