//! Configuration resolution: CLI → environment → config file → defaults.
//!
//! Each layer is a [`CompactionSettings`] with every field optional. Layers
//! are overlaid from lowest to highest precedence and the result is turned
//! into an immutable [`CompactionConfig`], validated before it is returned.

use crate::compaction::{
    CompactionConfig, CreateMode, Sequencing, DEFAULT_COLUMNS, DEFAULT_REGION,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WORK_GROUP,
};
use crate::validate::validate_compaction;
use crate::validator::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wa_common::{Error, Result};

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "web_analytics";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// One layer of compaction settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionSettings {
    #[serde(default)]
    pub source_database: Option<String>,
    #[serde(default)]
    pub source_table: Option<String>,
    #[serde(default)]
    pub destination_database: Option<String>,
    #[serde(default)]
    pub destination_table: Option<String>,
    #[serde(default)]
    pub work_group: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub source_location_prefix: Option<String>,
    #[serde(default)]
    pub output_prefix: Option<String>,
    #[serde(default)]
    pub staging_output_prefix: Option<String>,
    #[serde(default)]
    pub columns: Option<String>,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub sequencing: Option<Sequencing>,
    #[serde(default)]
    pub create_mode: Option<CreateMode>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl CompactionSettings {
    /// Overlay `higher` on top of `self`; set fields in `higher` win.
    pub fn overlay(self, higher: CompactionSettings) -> Self {
        Self {
            source_database: higher.source_database.or(self.source_database),
            source_table: higher.source_table.or(self.source_table),
            destination_database: higher.destination_database.or(self.destination_database),
            destination_table: higher.destination_table.or(self.destination_table),
            work_group: higher.work_group.or(self.work_group),
            region: higher.region.or(self.region),
            source_location_prefix: higher
                .source_location_prefix
                .or(self.source_location_prefix),
            output_prefix: higher.output_prefix.or(self.output_prefix),
            staging_output_prefix: higher.staging_output_prefix.or(self.staging_output_prefix),
            columns: higher.columns.or(self.columns),
            dry_run: higher.dry_run.or(self.dry_run),
            sequencing: higher.sequencing.or(self.sequencing),
            create_mode: higher.create_mode.or(self.create_mode),
            endpoint: higher.endpoint.or(self.endpoint),
            request_timeout_secs: higher.request_timeout_secs.or(self.request_timeout_secs),
        }
    }

    /// Read the environment layer through `lookup` (usually `std::env::var`).
    ///
    /// Empty values are treated as unset.
    pub fn from_env<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sequencing = match get("SEQUENCING").as_deref() {
            None => None,
            Some("poll") => Some(Sequencing::poll()),
            Some("fixed-delay") => {
                let delay_ms = match get("FIXED_DELAY_MS") {
                    Some(raw) => raw.parse::<u64>().map_err(|e| {
                        Error::Config(format!("FIXED_DELAY_MS={raw:?} is not a number: {e}"))
                    })?,
                    None => crate::compaction::DEFAULT_FIXED_DELAY_MS,
                };
                Some(Sequencing::FixedDelay { delay_ms })
            }
            Some(other) => {
                return Err(Error::Config(format!(
                    "SEQUENCING must be 'poll' or 'fixed-delay', got {other:?}"
                )))
            }
        };

        let create_mode = match get("CREATE_MODE").as_deref() {
            None => None,
            Some("skip-if-exists") => Some(CreateMode::SkipIfExists),
            Some("always") => Some(CreateMode::Always),
            Some(other) => {
                return Err(Error::Config(format!(
                    "CREATE_MODE must be 'skip-if-exists' or 'always', got {other:?}"
                )))
            }
        };

        Ok(Self {
            source_database: get("OLD_DATABASE"),
            source_table: get("OLD_TABLE_NAME"),
            destination_database: get("NEW_DATABASE"),
            destination_table: get("NEW_TABLE_NAME"),
            work_group: get("ATHENA_WORK_GROUP"),
            region: get("REGION_NAME"),
            source_location_prefix: get("OLD_TABLE_LOCATION_PREFIX"),
            output_prefix: get("OUTPUT_PREFIX"),
            staging_output_prefix: get("STAGING_OUTPUT_PREFIX"),
            columns: get("COLUMN_NAMES"),
            dry_run: get("DRY_RUN").map(|v| v.eq_ignore_ascii_case("true")),
            sequencing,
            create_mode,
            endpoint: get("QUERY_ENGINE_ENDPOINT"),
            request_timeout_secs: None,
        })
    }

    /// Apply defaults, require the storage prefixes, and validate.
    pub fn into_config(self) -> Result<CompactionConfig> {
        let config = CompactionConfig {
            source_database: self.source_database.unwrap_or_else(|| "mydatabase".into()),
            source_table: self.source_table.unwrap_or_else(|| "web_log_json".into()),
            destination_database: self
                .destination_database
                .unwrap_or_else(|| "mydatabase".into()),
            destination_table: self
                .destination_table
                .unwrap_or_else(|| "ctas_web_log_parquet".into()),
            work_group: self.work_group.unwrap_or_else(|| DEFAULT_WORK_GROUP.into()),
            region: self.region.unwrap_or_else(|| DEFAULT_REGION.into()),
            source_location_prefix: self
                .source_location_prefix
                .ok_or(Error::MissingSetting("source table location prefix"))?,
            output_prefix: self
                .output_prefix
                .ok_or(Error::MissingSetting("output prefix"))?,
            staging_output_prefix: self
                .staging_output_prefix
                .ok_or(Error::MissingSetting("staging output prefix"))?,
            columns: self.columns.unwrap_or_else(|| DEFAULT_COLUMNS.into()),
            dry_run: self.dry_run.unwrap_or(true),
            sequencing: self.sequencing.unwrap_or_default(),
            create_mode: self.create_mode.unwrap_or_default(),
            endpoint: self.endpoint,
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        validate_compaction(&config).map_err(|errors| {
            let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            Error::Config(joined.join("; "))
        })?;

        Ok(config)
    }
}

/// On-disk config file shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub compaction: CompactionSettings,
    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// Where to look for the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path passed explicitly; must exist when set.
    pub explicit: Option<PathBuf>,
    /// Platform default; skipped silently when absent.
    pub fallback: Option<PathBuf>,
}

impl ConfigPaths {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            fallback: default_config_file(),
        }
    }

    /// Only consult an explicit path (tests, sandboxed runs).
    pub fn explicit_only(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            fallback: None,
        }
    }

    /// Load the applicable config file, if any.
    pub fn load(&self) -> Result<ConfigFile> {
        if let Some(path) = &self.explicit {
            return load_config_file(path);
        }
        match &self.fallback {
            Some(path) if path.exists() => load_config_file(path),
            _ => Ok(ConfigFile::default()),
        }
    }
}

/// Platform default config file location.
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Parse a JSON config file.
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read config file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))
}

/// Resolve the compaction config from all layers.
pub fn resolve_config<F>(
    cli: CompactionSettings,
    paths: &ConfigPaths,
    env_lookup: F,
) -> Result<(CompactionConfig, ValidatorConfig)>
where
    F: Fn(&str) -> Option<String>,
{
    let file = paths.load()?;
    let env = CompactionSettings::from_env(env_lookup)?;
    let merged = file.compaction.overlay(env).overlay(cli);
    Ok((merged.into_config()?, file.validator))
}
