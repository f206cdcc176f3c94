//! Web analytics pipeline configuration loading and validation.
//!
//! This crate provides:
//! - Typed settings for the compaction job and the validation stage
//! - Config resolution (CLI → env → config file → defaults)
//! - Semantic validation of the resolved config

pub mod compaction;
pub mod resolve;
pub mod validate;
pub mod validator;

pub use compaction::{CompactionConfig, CreateMode, Sequencing, SequencingKind};
pub use resolve::{resolve_config, CompactionSettings, ConfigFile, ConfigPaths};
pub use validate::{ValidationError, ValidationResult};
pub use validator::{DecodeFailurePolicy, ValidatorConfig};
