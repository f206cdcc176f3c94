//! Error types for the web analytics pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the validation stage and the compaction job.
///
/// Schema violations are deliberately absent: they are recorded on the
/// record as a `Failed` outcome and never surface as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    // Malformed input (20-29)
    #[error("record {record_id}: payload is not valid base64: {reason}")]
    UndecodablePayload { record_id: String, reason: String },

    #[error("record {record_id}: payload is not valid JSON: {reason}")]
    UnparsablePayload { record_id: String, reason: String },

    #[error("malformed reference timestamp {value:?}: expected YYYY-MM-DDTHH:MM:SSZ")]
    MalformedReferenceTime { value: String },

    #[error("malformed trigger event: {0}")]
    MalformedEvent(String),

    // Query engine errors (30-39)
    #[error("query submission rejected: {0}")]
    QuerySubmission(String),

    #[error("query {execution_id} finished in state {state}: {reason}")]
    QueryFailed {
        execution_id: String,
        state: String,
        reason: String,
    },

    #[error("query {execution_id} did not complete after {attempts} polls")]
    CompletionTimeout { execution_id: String, attempts: u32 },

    #[error("compaction tick cancelled")]
    Cancelled,

    #[error("query engine transport error: {0}")]
    Transport(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::MissingSetting(_) => 11,
            Error::UndecodablePayload { .. } => 20,
            Error::UnparsablePayload { .. } => 21,
            Error::MalformedReferenceTime { .. } => 22,
            Error::MalformedEvent(_) => 23,
            Error::QuerySubmission(_) => 30,
            Error::QueryFailed { .. } => 31,
            Error::CompletionTimeout { .. } => 32,
            Error::Cancelled => 33,
            Error::Transport(_) => 34,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_group_by_family() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(Error::Cancelled.code(), 33);
        let err = Error::MalformedReferenceTime {
            value: "yesterday".into(),
        };
        assert_eq!(err.code(), 22);
        assert_eq!(Error::QuerySubmission("denied".into()).code(), 30);
    }

    #[test]
    fn test_reference_time_message_names_pattern() {
        let err = Error::MalformedReferenceTime {
            value: "2020-02-28 03:05".into(),
        };
        assert!(err.to_string().contains("YYYY-MM-DDTHH:MM:SSZ"));
    }
}
