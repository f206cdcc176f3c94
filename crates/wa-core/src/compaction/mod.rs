//! Hourly compaction of the raw log table into columnar holding tables.

pub mod executor;
pub mod partition;
pub mod sequencing;
pub mod window;

pub use executor::{
    create_holding_table_request, default_reference_time, drop_holding_table_request,
    holding_table, CompactionExecutor, StepReport, TickReport, TickStep,
};
pub use partition::{PartitionKey, PartitionRegistrar};
pub use sequencing::{sleep_cancellable, CancelFlag, Sequencer};
pub use window::{partition_hours, windows_for, CompactionWindow, TickWindows};
