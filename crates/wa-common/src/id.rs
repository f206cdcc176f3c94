//! Record, query, and tick identity types.
//!
//! Identifiers are opaque strings handed to us by collaborators (the delivery
//! pipeline, the query engine) or generated per compaction tick.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery-pipeline record identifier; correlates output to input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId(id.to_string())
    }
}

/// Execution identifier returned by the query engine on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryExecutionId(pub String);

impl fmt::Display for QueryExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one compaction tick, used to correlate log lines.
///
/// Format: `tick-<target YYYYMMDDHH>-<random>`
/// Example: `tick-2020022802-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickId(pub String);

impl TickId {
    /// Generate a new tick ID for the given target-hour suffix.
    pub fn new(target_suffix: &str) -> Self {
        let random: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect();
        TickId(format!("tick-{}-{}", target_suffix, random))
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_id_format() {
        let tid = TickId::new("2020022802");
        assert!(tid.0.starts_with("tick-2020022802-"));
        assert_eq!(tid.0.len(), "tick-2020022802-".len() + 6);
        assert_ne!(tid, TickId::new("2020022802"));
    }

    #[test]
    fn test_record_id_is_transparent() {
        let json = serde_json::to_string(&RecordId::from("4954")).unwrap();
        assert_eq!(json, "\"4954\"");
    }
}
