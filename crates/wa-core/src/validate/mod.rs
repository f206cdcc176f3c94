//! Record validation stage for delivery micro-batches.

pub mod schema;
pub mod stage;
pub mod wire;

pub use schema::{FieldSpec, FieldType, RecordSchema, Violation};
pub use stage::{reframe_json_line, ValidationStage};
pub use wire::{
    BatchSummary, DeliveryBatch, DeliveryRecord, TransformedBatch, TransformedRecord,
    ValidationOutcome,
};
