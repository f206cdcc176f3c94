//! Partition keys and idempotent partition registration.

use super::window::{partition_hours, CompactionWindow};
use crate::query::{QualifiedTable, QueryKind, QueryRequest, QuerySubmitter, Submission};
use serde::Serialize;
use wa_common::{Error, Result};

/// `(year, month, day, hour)` partition of an hourly table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl PartitionKey {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }

    /// Physical prefix of this partition under `prefix`, with a trailing `/`.
    pub fn location(&self, prefix: &str) -> String {
        format!(
            "{}/year={}/month={:02}/day={:02}/hour={:02}/",
            prefix, self.year, self.month, self.day, self.hour
        )
    }

    /// `PARTITION (...) LOCATION "..."` clause for an `ALTER TABLE ... ADD`.
    pub fn clause(&self, prefix: &str) -> String {
        format!(
            "PARTITION (year={}, month={}, day={}, hour={}) LOCATION \"{}\"",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.location(prefix)
        )
    }
}

impl From<&CompactionWindow> for PartitionKey {
    fn from(window: &CompactionWindow) -> Self {
        Self::new(window.year(), window.month(), window.day(), window.hour())
    }
}

/// Registers the three partitions around a target hour.
pub struct PartitionRegistrar<'a> {
    submitter: &'a QuerySubmitter<'a>,
    work_group: &'a str,
    staging_prefix: &'a str,
}

impl<'a> PartitionRegistrar<'a> {
    pub fn new(submitter: &'a QuerySubmitter<'a>, work_group: &'a str, staging_prefix: &'a str) -> Self {
        Self {
            submitter,
            work_group,
            staging_prefix,
        }
    }

    /// Build the single `ALTER TABLE ... ADD IF NOT EXISTS` statement covering
    /// `window - 1h`, `window`, and `window + 1h`.
    pub fn request(
        &self,
        table: &QualifiedTable,
        window: &CompactionWindow,
        storage_prefix: &str,
    ) -> Result<QueryRequest> {
        let hours = partition_hours(window).ok_or_else(|| Error::MalformedReferenceTime {
            value: window.to_string(),
        })?;
        let partitions: Vec<PartitionKey> = hours.iter().map(PartitionKey::from).collect();
        let clauses: Vec<String> = partitions.iter().map(|p| p.clause(storage_prefix)).collect();

        let statement = format!(
            "ALTER TABLE {} ADD IF NOT EXISTS {}",
            table,
            clauses.join("\n")
        );
        let output_location = format!(
            "{}/alter_table_{}_{}",
            self.staging_prefix,
            table.table,
            window.suffix()
        );

        Ok(QueryRequest {
            kind: QueryKind::AddPartitions { partitions },
            table: table.clone(),
            statement,
            output_location,
            work_group: self.work_group.to_string(),
            context_database: None,
        })
    }

    /// Submit the registration. Re-registering existing partitions is a no-op
    /// in the catalog.
    pub fn ensure_partitions(
        &self,
        table: &QualifiedTable,
        window: &CompactionWindow,
        storage_prefix: &str,
    ) -> Result<Submission> {
        let request = self.request(table, window, storage_prefix)?;
        self.submitter.submit(request)
    }
}
