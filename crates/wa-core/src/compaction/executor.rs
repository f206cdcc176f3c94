//! One compaction tick.
//!
//! Steps run strictly in order:
//!
//! 1. drop the holding table left for the cleanup hour
//! 2. wait
//! 3. register source-table partitions around the target hour
//! 4. wait
//! 5. register destination-table partitions around the target hour
//! 6. wait
//! 7. create the target hour's holding table from the source partition
//!
//! Any failure aborts the tick. In dry-run mode every statement is logged and
//! nothing reaches the engine.

use super::partition::{PartitionKey, PartitionRegistrar};
use super::sequencing::{CancelFlag, Sequencer};
use super::window::{windows_for, CompactionWindow, TickWindows};
use crate::query::{
    QualifiedTable, QueryEngine, QueryKind, QueryRequest, QuerySubmitter, Submission,
};
use serde::Serialize;
use tracing::{info, info_span};
use wa_common::{QueryExecutionId, Result, TickId};
use wa_config::{CompactionConfig, CreateMode};

/// A step of the tick state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStep {
    DropStaleTable,
    RegisterSourcePartitions,
    RegisterDestinationPartitions,
    CreateHoldingTable,
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: TickStep,
    pub table: QualifiedTable,
    pub statement: String,
    pub output_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<QueryExecutionId>,
    /// Why the step was not submitted, if it was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl StepReport {
    fn submitted(step: TickStep, submission: Submission) -> Self {
        Self {
            step,
            table: submission.request.table,
            statement: submission.request.statement,
            output_location: submission.request.output_location,
            execution_id: submission.execution_id,
            skipped: None,
        }
    }

    fn skipped(step: TickStep, request: QueryRequest, reason: impl Into<String>) -> Self {
        Self {
            step,
            table: request.table,
            statement: request.statement,
            output_location: request.output_location,
            execution_id: None,
            skipped: Some(reason.into()),
        }
    }
}

/// Outcome of a completed tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick_id: TickId,
    pub reference_time: String,
    pub dry_run: bool,
    pub windows: TickWindows,
    pub holding_table: QualifiedTable,
    pub steps: Vec<StepReport>,
}

/// Name of the holding table for `window`: `tmp_<destination>_<YYYYMMDDHH>`.
pub fn holding_table(config: &CompactionConfig, window: &CompactionWindow) -> QualifiedTable {
    QualifiedTable::new(
        config.destination_database.clone(),
        format!("tmp_{}_{}", config.destination_table, window.suffix()),
    )
}

/// `DROP TABLE IF EXISTS` for the holding table of `window`.
pub fn drop_holding_table_request(
    config: &CompactionConfig,
    window: &CompactionWindow,
) -> QueryRequest {
    let table = holding_table(config, window);
    QueryRequest {
        kind: QueryKind::DropTable,
        statement: format!("DROP TABLE IF EXISTS {table}"),
        output_location: format!("{}/{}", config.staging_output_prefix, table.table),
        work_group: config.work_group.clone(),
        context_database: None,
        table,
    }
}

/// Create-table-as-select materialising `window` of the source table as a
/// compressed columnar holding table.
pub fn create_holding_table_request(
    config: &CompactionConfig,
    window: &CompactionWindow,
) -> QueryRequest {
    let table = holding_table(config, window);
    let external_location = PartitionKey::from(window).location(&config.output_prefix);
    let statement = format!(
        "CREATE TABLE {table}\n\
WITH (\n  external_location='{external_location}',\n  format = 'PARQUET',\n  parquet_compression = 'SNAPPY')\n\
AS SELECT {columns}\n\
FROM {source_db}.{source_table}\n\
WHERE {predicate}\n\
WITH DATA\n",
        columns = config.columns,
        source_db = config.source_database,
        source_table = config.source_table,
        predicate = window.predicate(),
    );
    QueryRequest {
        kind: QueryKind::CreateTableAsSelect { external_location },
        statement,
        output_location: format!("{}/{}", config.staging_output_prefix, table.table),
        work_group: config.work_group.clone(),
        context_database: Some(config.destination_database.clone()),
        table,
    }
}

/// Runs compaction ticks against a query engine.
pub struct CompactionExecutor<'a> {
    config: &'a CompactionConfig,
    engine: &'a dyn QueryEngine,
    cancel: CancelFlag,
}

impl<'a> CompactionExecutor<'a> {
    pub fn new(config: &'a CompactionConfig, engine: &'a dyn QueryEngine) -> Self {
        Self {
            config,
            engine,
            cancel: CancelFlag::new(),
        }
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run a tick for a `YYYY-MM-DDTHH:MM:SSZ` reference time.
    ///
    /// # Errors
    ///
    /// A malformed reference time fails before any engine call. After that,
    /// the first submission, wait, or query failure aborts the tick.
    pub fn run_tick(&self, reference_time: &str) -> Result<TickReport> {
        let windows = windows_for(reference_time)?;
        self.run_windows(reference_time, windows)
    }

    fn run_windows(&self, reference_time: &str, windows: TickWindows) -> Result<TickReport> {
        let config = self.config;
        let tick_id = TickId::new(&windows.target.suffix());
        let span = info_span!("tick", tick_id = %tick_id);
        let _guard = span.enter();

        info!(
            reference_time,
            target = %windows.target,
            cleanup = %windows.cleanup,
            dry_run = config.dry_run,
            "compaction tick started"
        );

        let submitter = QuerySubmitter::new(self.engine, config.dry_run);
        let sequencer = Sequencer::new(self.engine, config.sequencing, self.cancel.clone());
        let registrar =
            PartitionRegistrar::new(&submitter, &config.work_group, &config.staging_output_prefix);
        let mut steps = Vec::with_capacity(4);

        let dropped = submitter.submit(drop_holding_table_request(config, &windows.cleanup))?;
        sequencer.settle(&dropped, "dropping old table")?;
        steps.push(StepReport::submitted(TickStep::DropStaleTable, dropped));

        let source = QualifiedTable::new(&config.source_database, &config.source_table);
        let registered = registrar.ensure_partitions(
            &source,
            &windows.target,
            &config.source_location_prefix,
        )?;
        sequencer.settle(&registered, &format!("adding partitions to table: {source}"))?;
        steps.push(StepReport::submitted(TickStep::RegisterSourcePartitions, registered));

        let destination =
            QualifiedTable::new(&config.destination_database, &config.destination_table);
        let registered =
            registrar.ensure_partitions(&destination, &windows.target, &config.output_prefix)?;
        sequencer.settle(&registered, &format!("adding partitions to table: {destination}"))?;
        steps.push(StepReport::submitted(
            TickStep::RegisterDestinationPartitions,
            registered,
        ));

        steps.push(self.create_holding_table(&submitter, &windows.target)?);

        info!(steps = steps.len(), "compaction tick finished");
        Ok(TickReport {
            tick_id,
            reference_time: reference_time.to_string(),
            dry_run: config.dry_run,
            windows,
            holding_table: holding_table(config, &windows.target),
            steps,
        })
    }

    fn create_holding_table(
        &self,
        submitter: &QuerySubmitter<'_>,
        target: &CompactionWindow,
    ) -> Result<StepReport> {
        let request = create_holding_table_request(self.config, target);

        if !self.config.dry_run && self.config.create_mode == CreateMode::SkipIfExists {
            if self.engine.table_exists(&request.table)? {
                info!(table = %request.table, "holding table already exists; skipping create");
                return Ok(StepReport::skipped(
                    TickStep::CreateHoldingTable,
                    request,
                    "holding table already exists",
                ));
            }
        }

        let created = submitter.submit(request)?;
        Ok(StepReport::submitted(TickStep::CreateHoldingTable, created))
    }
}

/// Reference time for manual runs: the current hour at minute 05, the same
/// shape as a scheduled trigger.
pub fn default_reference_time() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:05:00Z").to_string()
}
