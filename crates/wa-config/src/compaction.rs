//! Compaction job configuration.
//!
//! A [`CompactionConfig`] is built once per tick by [`crate::resolve`] and then
//! only read. Every component receives it by reference.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default work group for query submission.
pub const DEFAULT_WORK_GROUP: &str = "primary";

/// Default region of the query engine.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default column projection for the compaction query.
pub const DEFAULT_COLUMNS: &str = "*";

/// Default unconditional wait between dependent steps.
pub const DEFAULT_FIXED_DELAY_MS: u64 = 10_000;

/// Default request timeout for live query-engine calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How the job waits for a metadata operation before the dependent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum Sequencing {
    /// Sleep unconditionally after submission.
    FixedDelay { delay_ms: u64 },
    /// Poll the query state with exponential backoff until it completes.
    Poll {
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        max_attempts: u32,
    },
}

impl Sequencing {
    pub fn fixed_delay() -> Self {
        Sequencing::FixedDelay {
            delay_ms: DEFAULT_FIXED_DELAY_MS,
        }
    }

    pub fn poll() -> Self {
        Sequencing::Poll {
            initial_backoff_ms: 250,
            max_backoff_ms: 5_000,
            max_attempts: 30,
        }
    }

    /// Backoff before poll number `attempt` (1-based), capped at the maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        match *self {
            Sequencing::FixedDelay { delay_ms } => Duration::from_millis(delay_ms),
            Sequencing::Poll {
                initial_backoff_ms,
                max_backoff_ms,
                ..
            } => {
                let exponent = attempt.saturating_sub(1).min(31);
                let backoff_ms = initial_backoff_ms
                    .saturating_mul(2_u64.saturating_pow(exponent))
                    .min(max_backoff_ms);
                Duration::from_millis(backoff_ms)
            }
        }
    }
}

impl Default for Sequencing {
    fn default() -> Self {
        Self::poll()
    }
}

/// Selector used on the command line and in environment overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SequencingKind {
    Poll,
    FixedDelay,
}

/// Behavior of the create-table-as-select step when the holding table exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CreateMode {
    /// Ask the catalog first and skip the step when the table is present.
    #[default]
    SkipIfExists,
    /// Always submit; a repeated tick for the same hour collides.
    Always,
}

/// Fully resolved, immutable configuration for one compaction tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Database holding the small-file source table.
    pub source_database: String,
    /// Small-file source table.
    pub source_table: String,
    /// Database holding the compacted destination table.
    pub destination_database: String,
    /// Compacted destination table; holding tables derive their name from it.
    pub destination_table: String,
    pub work_group: String,
    pub region: String,
    /// Storage prefix under which the source table's hourly partitions live.
    pub source_location_prefix: String,
    /// Storage prefix for the compacted output.
    pub output_prefix: String,
    /// Storage prefix for query result/staging files.
    pub staging_output_prefix: String,
    /// Column projection for the compaction query (`*` or a comma list).
    pub columns: String,
    /// Log statements only; never call the query engine.
    pub dry_run: bool,
    pub sequencing: Sequencing,
    pub create_mode: CreateMode,
    /// Base URL of the query-engine endpoint for live runs.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub request_timeout_secs: u64,
}

impl CompactionConfig {
    /// Minimal config pointing at the given bucket root, useful for tests
    /// and local dry runs.
    pub fn for_bucket(bucket_root: &str) -> Self {
        let root = bucket_root.trim_end_matches('/');
        Self {
            source_database: "mydatabase".to_string(),
            source_table: "web_log_json".to_string(),
            destination_database: "mydatabase".to_string(),
            destination_table: "ctas_web_log_parquet".to_string(),
            work_group: DEFAULT_WORK_GROUP.to_string(),
            region: DEFAULT_REGION.to_string(),
            source_location_prefix: format!("{root}/json-data"),
            output_prefix: format!("{root}/parquet-data"),
            staging_output_prefix: format!("{root}/tmp"),
            columns: DEFAULT_COLUMNS.to_string(),
            dry_run: true,
            sequencing: Sequencing::default(),
            create_mode: CreateMode::default(),
            endpoint: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the sequencing strategy.
    pub fn with_sequencing(mut self, sequencing: Sequencing) -> Self {
        self.sequencing = sequencing;
        self
    }

    /// Set the create-table mode.
    pub fn with_create_mode(mut self, create_mode: CreateMode) -> Self {
        self.create_mode = create_mode;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
