//! Semantic validation of a resolved compaction config.

use crate::compaction::{CompactionConfig, Sequencing};
use thiserror::Error;

/// A single problem found in the config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a valid catalog identifier")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("{field}: {value:?} must look like scheme://bucket/path")]
    InvalidPrefix { field: &'static str, value: String },

    #[error("{field}: {value:?} must not end with '/'")]
    TrailingSlash { field: &'static str, value: String },

    #[error("column projection is empty")]
    EmptyColumns,

    #[error("poll sequencing needs at least one attempt")]
    NoPollAttempts,

    #[error("request timeout must be positive")]
    ZeroTimeout,
}

/// Result of validating a config: `Ok` or every problem found.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Check identifiers, storage prefixes, and sequencing bounds.
pub fn validate_compaction(config: &CompactionConfig) -> ValidationResult {
    let mut errors = Vec::new();

    for (field, value) in [
        ("source_database", &config.source_database),
        ("source_table", &config.source_table),
        ("destination_database", &config.destination_database),
        ("destination_table", &config.destination_table),
    ] {
        if !is_identifier(value) {
            errors.push(ValidationError::InvalidIdentifier {
                field,
                value: value.clone(),
            });
        }
    }

    for (field, value) in [
        ("source_location_prefix", &config.source_location_prefix),
        ("output_prefix", &config.output_prefix),
        ("staging_output_prefix", &config.staging_output_prefix),
    ] {
        if !has_scheme(value) {
            errors.push(ValidationError::InvalidPrefix {
                field,
                value: value.clone(),
            });
        } else if value.ends_with('/') {
            errors.push(ValidationError::TrailingSlash {
                field,
                value: value.clone(),
            });
        }
    }

    if config.columns.trim().is_empty() {
        errors.push(ValidationError::EmptyColumns);
    }

    if let Sequencing::Poll { max_attempts: 0, .. } = config.sequencing {
        errors.push(ValidationError::NoPollAttempts);
    }

    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn has_scheme(value: &str) -> bool {
    match value.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric())
                && !rest.is_empty()
        }
        None => false,
    }
}
