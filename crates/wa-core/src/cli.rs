//! Command-line interface.
//!
//! `transform` runs the validation stage over one delivery batch, `compact`
//! runs one compaction tick, `windows` previews the hours a tick would touch,
//! and `schema` prints the wire-format JSON Schemas.

use crate::compaction::{default_reference_time, windows_for, CompactionExecutor};
use crate::logging::LogFormat;
use crate::query::{HttpQueryEngine, OfflineQueryEngine, QueryEngine};
use crate::validate::{DeliveryBatch, RecordSchema, TransformedBatch, ValidationStage};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use wa_common::{Error, Result};
use wa_config::{
    resolve_config, CompactionSettings, ConfigPaths, CreateMode, Sequencing, SequencingKind,
    ValidatorConfig,
};

/// Web analytics log pipeline: record validation and hourly compaction.
#[derive(Parser, Debug)]
#[command(name = "wa-core", version, about)]
pub struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a delivery batch and print the transformed batch
    Transform(TransformArgs),
    /// Run one compaction tick (dry-run unless --run)
    Compact(CompactArgs),
    /// Print the windows and partition hours for a reference time
    Windows(WindowsArgs),
    /// Print JSON Schemas of the delivery and transformed batch formats
    Schema,
}

/// Arguments for the transform command
#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Delivery batch JSON file; `-` or absent reads stdin
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Mark undecodable records as failed instead of failing the batch
    #[arg(long)]
    pub isolate_decode_failures: bool,

    /// Config file (defaults to the platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for the compact command
#[derive(Args, Debug, Default)]
pub struct CompactArgs {
    /// Reference time, `YYYY-MM-DDTHH:MM:SSZ` (defaults to the current hour at :05)
    #[arg(long, visible_alias = "dt", value_name = "TS", conflicts_with = "event")]
    pub reference_time: Option<String>,

    /// Scheduled trigger event JSON; its `time` field is the reference time
    #[arg(long, value_name = "FILE")]
    pub event: Option<PathBuf>,

    /// Submit statements to the engine instead of only logging them
    #[arg(long)]
    pub run: bool,

    /// Config file (defaults to the platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub old_database: Option<String>,

    #[arg(long)]
    pub old_table_name: Option<String>,

    #[arg(long)]
    pub new_database: Option<String>,

    #[arg(long)]
    pub new_table_name: Option<String>,

    #[arg(long)]
    pub work_group: Option<String>,

    #[arg(long)]
    pub region_name: Option<String>,

    /// Storage prefix of the raw table partitions
    #[arg(long)]
    pub old_table_location_prefix: Option<String>,

    /// Storage prefix of the compacted output
    #[arg(long)]
    pub output_prefix: Option<String>,

    /// Storage prefix for query result/staging files
    #[arg(long)]
    pub staging_output_prefix: Option<String>,

    /// Comma-separated column projection
    #[arg(long)]
    pub column_names: Option<String>,

    /// Query engine endpoint (required with --run)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// How to wait between dependent steps
    #[arg(long, value_enum)]
    pub sequencing: Option<SequencingKind>,

    /// Delay for fixed-delay sequencing
    #[arg(long, value_name = "MS")]
    pub fixed_delay_ms: Option<u64>,

    /// Behavior when the holding table already exists
    #[arg(long, value_enum)]
    pub create_mode: Option<CreateMode>,

    /// Per-request timeout for engine calls
    #[arg(long, value_name = "SECS")]
    pub request_timeout_secs: Option<u64>,
}

impl CompactArgs {
    /// The command-line layer of the compaction settings.
    pub fn settings(&self) -> CompactionSettings {
        let sequencing = match (self.sequencing, self.fixed_delay_ms) {
            (Some(SequencingKind::Poll), _) => Some(Sequencing::poll()),
            (Some(SequencingKind::FixedDelay), Some(delay_ms)) | (None, Some(delay_ms)) => {
                Some(Sequencing::FixedDelay { delay_ms })
            }
            (Some(SequencingKind::FixedDelay), None) => Some(Sequencing::fixed_delay()),
            (None, None) => None,
        };

        CompactionSettings {
            source_database: self.old_database.clone(),
            source_table: self.old_table_name.clone(),
            destination_database: self.new_database.clone(),
            destination_table: self.new_table_name.clone(),
            work_group: self.work_group.clone(),
            region: self.region_name.clone(),
            source_location_prefix: self.old_table_location_prefix.clone(),
            output_prefix: self.output_prefix.clone(),
            staging_output_prefix: self.staging_output_prefix.clone(),
            columns: self.column_names.clone(),
            dry_run: self.run.then_some(false),
            sequencing,
            create_mode: self.create_mode,
            endpoint: self.endpoint.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Arguments for the windows command
#[derive(Args, Debug)]
pub struct WindowsArgs {
    /// Reference time, `YYYY-MM-DDTHH:MM:SSZ`
    #[arg(long, visible_alias = "dt", value_name = "TS")]
    pub reference_time: String,
}

/// Run the parsed command.
pub fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Transform(args) => run_transform(args),
        Commands::Compact(args) => run_compact(args),
        Commands::Windows(args) => run_windows(args),
        Commands::Schema => run_schema(),
    }
}

fn run_transform(args: &TransformArgs) -> Result<()> {
    let mut validator: ValidatorConfig = ConfigPaths::new(args.config.clone()).load()?.validator;
    if args.isolate_decode_failures {
        validator = ValidatorConfig::isolating();
    }

    let raw = match args.input.as_deref() {
        None => std::io::read_to_string(std::io::stdin())?,
        Some(path) if path == Path::new("-") => std::io::read_to_string(std::io::stdin())?,
        Some(path) => std::fs::read_to_string(path)?,
    };
    let batch: DeliveryBatch = serde_json::from_str(&raw)?;

    let schema = RecordSchema::web_logs();
    let output = ValidationStage::new(&schema, validator).process(&batch)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_compact(args: &CompactArgs) -> Result<()> {
    let paths = ConfigPaths::new(args.config.clone());
    let (config, _) = resolve_config(args.settings(), &paths, |key| std::env::var(key).ok())?;

    let reference_time = match (&args.event, &args.reference_time) {
        (Some(path), _) => reference_time_from_event(&std::fs::read_to_string(path)?)?,
        (None, Some(value)) => value.clone(),
        (None, None) => default_reference_time(),
    };

    let engine: Box<dyn QueryEngine> = match (&config.endpoint, config.dry_run) {
        (Some(endpoint), _) => Box::new(HttpQueryEngine::new(
            endpoint.as_str(),
            config.request_timeout(),
        )),
        (None, true) => Box::new(OfflineQueryEngine),
        (None, false) => {
            return Err(Error::Config(
                "--run needs a query engine endpoint (--endpoint or QUERY_ENGINE_ENDPOINT)".into(),
            ))
        }
    };

    info!(
        work_group = %config.work_group,
        region = %config.region,
        dry_run = config.dry_run,
        "compaction configured"
    );
    let report = CompactionExecutor::new(&config, engine.as_ref()).run_tick(&reference_time)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_windows(args: &WindowsArgs) -> Result<()> {
    let windows = windows_for(&args.reference_time)?;
    let partition_hours = windows.partition_hours().ok_or_else(|| {
        Error::MalformedReferenceTime {
            value: args.reference_time.clone(),
        }
    })?;
    let preview = serde_json::json!({
        "reference_time": args.reference_time,
        "cleanup": windows.cleanup,
        "target": windows.target,
        "holding_suffix": windows.target.suffix(),
        "partition_hours": partition_hours,
    });
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn run_schema() -> Result<()> {
    let schemas = serde_json::json!({
        "deliveryBatch": schemars::schema_for!(DeliveryBatch),
        "transformedBatch": schemars::schema_for!(TransformedBatch),
    });
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}

#[derive(Deserialize)]
struct ScheduledEvent {
    time: Option<String>,
}

/// Extract the reference time from a scheduled trigger event.
///
/// # Errors
///
/// Returns [`Error::MalformedEvent`] when the payload is not JSON or has no
/// string `time` field.
pub fn reference_time_from_event(payload: &str) -> Result<String> {
    let event: ScheduledEvent =
        serde_json::from_str(payload).map_err(|e| Error::MalformedEvent(e.to_string()))?;
    event
        .time
        .ok_or_else(|| Error::MalformedEvent("missing `time` field".into()))
}
