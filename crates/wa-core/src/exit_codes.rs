//! Exit codes for the wa-core CLI.
//!
//! Exit codes communicate the outcome of a run without requiring output
//! parsing. Schedulers retry on non-zero codes.

use wa_common::Error;

/// Exit codes for wa-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Batch transformed or tick completed
    Success = 0,

    /// Configuration error (bad file, bad override, failed validation)
    ConfigError = 10,

    /// Malformed input (batch payload, reference time, trigger event)
    InputError = 11,

    /// Query submission, execution, or wait failed
    QueryError = 12,

    /// I/O error
    IoError = 13,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map an error to the exit code reported for it.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::MissingSetting(_) => ExitCode::ConfigError,
            Error::UndecodablePayload { .. }
            | Error::UnparsablePayload { .. }
            | Error::MalformedReferenceTime { .. }
            | Error::MalformedEvent(_)
            | Error::Json(_) => ExitCode::InputError,
            Error::QuerySubmission(_)
            | Error::QueryFailed { .. }
            | Error::CompletionTimeout { .. }
            | Error::Cancelled
            | Error::Transport(_) => ExitCode::QueryError,
            Error::Io(_) => ExitCode::IoError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ExitCode::from_error(&Error::MissingSetting("OUTPUT_PREFIX")),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from_error(&Error::MalformedReferenceTime {
                value: "x".into()
            }),
            ExitCode::InputError
        );
        assert_eq!(ExitCode::from_error(&Error::Cancelled), ExitCode::QueryError);
        assert_eq!(ExitCode::QueryError.as_i32(), 12);
        assert_eq!(ExitCode::Success.as_i32(), 0);
    }
}
