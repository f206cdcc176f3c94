//! End-to-end compaction ticks against the in-memory query engine.
//!
//! Validates:
//! - Dry-run logs every statement and never touches the engine
//! - Live ticks submit drop, source partitions, destination partitions, and
//!   create, in that order
//! - Re-running a tick for the same hour is idempotent with skip-if-exists
//! - Unrelated hours' holding tables survive a tick
//! - A rejected or failed step aborts the tick before later steps

use wa_common::Error;
use wa_config::{CompactionConfig, CreateMode, Sequencing};
use wa_core::compaction::{CancelFlag, CompactionExecutor, PartitionKey, TickStep};
use wa_core::query::{EngineCall, MemoryQueryEngine, QualifiedTable, QueryKind};

// ============================================================================
// Helpers
// ============================================================================

const REFERENCE: &str = "2020-02-28T03:05:00Z";

fn fast_poll() -> Sequencing {
    Sequencing::Poll {
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
        max_attempts: 5,
    }
}

fn live_config() -> CompactionConfig {
    CompactionConfig::for_bucket("s3://web-analytics")
        .with_dry_run(false)
        .with_sequencing(fast_poll())
}

fn source() -> QualifiedTable {
    QualifiedTable::new("mydatabase", "web_log_json")
}

fn destination() -> QualifiedTable {
    QualifiedTable::new("mydatabase", "ctas_web_log_parquet")
}

fn holding(suffix: &str) -> QualifiedTable {
    QualifiedTable::new("mydatabase", format!("tmp_ctas_web_log_parquet_{suffix}"))
}

fn engine() -> MemoryQueryEngine {
    MemoryQueryEngine::new()
        .with_table(source())
        .with_table(destination())
}

fn started_kinds(engine: &MemoryQueryEngine) -> Vec<&'static str> {
    engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::Start(request) => Some(match request.kind {
                QueryKind::DropTable => "drop",
                QueryKind::AddPartitions { .. } => "add_partitions",
                QueryKind::CreateTableAsSelect { .. } => "ctas",
            }),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Dry run
// ============================================================================

#[test]
fn test_dry_run_makes_no_engine_calls() {
    let config = CompactionConfig::for_bucket("s3://web-analytics");
    assert!(config.dry_run);
    let engine = engine();

    let report = CompactionExecutor::new(&config, &engine)
        .run_tick(REFERENCE)
        .unwrap();

    assert!(engine.calls().is_empty());
    assert!(report.dry_run);
    assert_eq!(report.windows.target.suffix(), "2020022802");
    assert_eq!(report.windows.cleanup.suffix(), "2020022801");
    assert_eq!(report.holding_table, holding("2020022802"));
    assert_eq!(report.steps.len(), 4);
    assert!(report.steps.iter().all(|step| step.execution_id.is_none()));
    assert!(report.steps[0]
        .statement
        .starts_with("DROP TABLE IF EXISTS mydatabase.tmp_ctas_web_log_parquet_2020022801"));
}

#[test]
fn test_malformed_reference_fails_before_engine() {
    let config = live_config();
    let engine = engine();
    let err = CompactionExecutor::new(&config, &engine)
        .run_tick("2020-02-28 03:05:00")
        .unwrap_err();
    assert!(matches!(err, Error::MalformedReferenceTime { .. }));
    assert!(engine.calls().is_empty());
}

// ============================================================================
// Live ticks
// ============================================================================

#[test]
fn test_live_tick_step_order_and_catalog_effects() {
    let config = live_config();
    let engine = engine();

    let report = CompactionExecutor::new(&config, &engine)
        .run_tick(REFERENCE)
        .unwrap();

    assert_eq!(
        started_kinds(&engine),
        vec!["drop", "add_partitions", "add_partitions", "ctas"]
    );
    let steps: Vec<TickStep> = report.steps.iter().map(|s| s.step).collect();
    assert_eq!(
        steps,
        vec![
            TickStep::DropStaleTable,
            TickStep::RegisterSourcePartitions,
            TickStep::RegisterDestinationPartitions,
            TickStep::CreateHoldingTable,
        ]
    );

    let expected_hours = [
        PartitionKey::new(2020, 2, 28, 1),
        PartitionKey::new(2020, 2, 28, 2),
        PartitionKey::new(2020, 2, 28, 3),
    ];
    assert_eq!(
        engine.partitions(&source()).into_iter().collect::<Vec<_>>(),
        expected_hours
    );
    assert_eq!(
        engine.partitions(&destination()).into_iter().collect::<Vec<_>>(),
        expected_hours
    );
    assert!(engine.has_table(&holding("2020022802")));

    let statements = engine.statements();
    assert!(statements[1].contains("json-data/year=2020/month=02/day=28/hour=02/"));
    assert!(statements[2].contains("parquet-data/year=2020/month=02/day=28/hour=02/"));
}

#[test]
fn test_each_step_waits_for_the_previous_one() {
    let config = live_config();
    let engine = engine().with_pending_polls(1);

    CompactionExecutor::new(&config, &engine)
        .run_tick(REFERENCE)
        .unwrap();

    // every metadata step is polled to completion before the next start
    let calls = engine.calls();
    let starts: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, EngineCall::Start(_)))
        .map(|(i, _)| i)
        .collect();
    for window in starts.windows(2) {
        let between = &calls[window[0] + 1..window[1]];
        assert!(
            between.iter().any(|c| matches!(c, EngineCall::State(_))),
            "no state poll between starts at {window:?}"
        );
    }
}

#[test]
fn test_repeat_tick_is_idempotent_with_skip_if_exists() {
    let config = live_config();
    let engine = engine();
    let executor = CompactionExecutor::new(&config, &engine);

    executor.run_tick(REFERENCE).unwrap();
    let second = executor.run_tick(REFERENCE).unwrap();

    let create = &second.steps[3];
    assert_eq!(create.step, TickStep::CreateHoldingTable);
    assert!(create.skipped.is_some());
    assert!(create.execution_id.is_none());
    assert_eq!(
        started_kinds(&engine),
        vec![
            "drop",
            "add_partitions",
            "add_partitions",
            "ctas",
            "drop",
            "add_partitions",
            "add_partitions",
        ]
    );
    assert_eq!(engine.partitions(&source()).len(), 3);
}

#[test]
fn test_repeat_tick_with_always_submits_colliding_create() {
    let config = live_config().with_create_mode(CreateMode::Always);
    let engine = engine();
    let executor = CompactionExecutor::new(&config, &engine);

    executor.run_tick(REFERENCE).unwrap();
    // the create step is not awaited, so the collision is not reported here
    let second = executor.run_tick(REFERENCE).unwrap();

    let create = &second.steps[3];
    assert!(create.skipped.is_none());
    assert!(create.execution_id.is_some());
    assert_eq!(
        started_kinds(&engine).iter().filter(|k| **k == "ctas").count(),
        2
    );
}

#[test]
fn test_tick_only_drops_the_cleanup_hour() {
    let config = live_config();
    let engine = engine()
        .with_table(holding("2020022723"))
        .with_table(holding("2020022801"));

    CompactionExecutor::new(&config, &engine)
        .run_tick(REFERENCE)
        .unwrap();

    assert!(!engine.has_table(&holding("2020022801")));
    assert!(engine.has_table(&holding("2020022723")));
    assert!(engine.has_table(&holding("2020022802")));
}

#[test]
fn test_consecutive_ticks_roll_holding_tables() {
    let config = live_config();
    let engine = engine();
    let executor = CompactionExecutor::new(&config, &engine);

    executor.run_tick("2020-02-28T03:05:00Z").unwrap();
    executor.run_tick("2020-02-28T04:05:00Z").unwrap();
    executor.run_tick("2020-02-28T05:05:00Z").unwrap();

    // each tick drops the table the tick before it created
    assert!(!engine.has_table(&holding("2020022802")));
    assert!(!engine.has_table(&holding("2020022803")));
    assert!(engine.has_table(&holding("2020022804")));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_rejected_drop_aborts_tick() {
    let config = live_config();
    let engine = engine().rejecting("DROP TABLE");

    let err = CompactionExecutor::new(&config, &engine)
        .run_tick(REFERENCE)
        .unwrap_err();

    assert!(matches!(err, Error::QuerySubmission(_)));
    assert_eq!(started_kinds(&engine), vec!["drop"]);
}

#[test]
fn test_failed_partition_registration_aborts_before_create() {
    let config = live_config();
    let engine = engine().failing_kind("add_partitions");

    let err = CompactionExecutor::new(&config, &engine)
        .run_tick(REFERENCE)
        .unwrap_err();

    assert!(matches!(err, Error::QueryFailed { .. }));
    assert_eq!(started_kinds(&engine), vec!["drop", "add_partitions"]);
    assert!(!engine.has_table(&holding("2020022802")));
}

#[test]
fn test_missing_source_table_fails_tick() {
    let config = live_config();
    let engine = MemoryQueryEngine::new().with_table(destination());

    let err = CompactionExecutor::new(&config, &engine)
        .run_tick(REFERENCE)
        .unwrap_err();

    match err {
        Error::QueryFailed { reason, .. } => assert!(reason.contains("web_log_json")),
        other => panic!("expected QueryFailed, got {other:?}"),
    }
}

#[test]
fn test_cancelled_tick_stops_at_first_wait() {
    let config = live_config();
    let engine = engine();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = CompactionExecutor::new(&config, &engine)
        .with_cancel_flag(cancel)
        .run_tick(REFERENCE)
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(started_kinds(&engine), vec!["drop"]);
}
