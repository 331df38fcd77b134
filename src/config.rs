use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    surety::{ConsensusSettings, EconomicTerms, GenesisAirline, SuretyPolicy},
    types::{Identity, Micro},
};

const SCHEMA_FILE_NAME: &str = "flightsurety.schema.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub owner: Identity,
    pub genesis_airline: GenesisAirline,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub economics: EconomicTerms,
    #[serde(default)]
    pub consensus: ConsensusSettings,
    /// Wallet balances credited on first start, before any snapshot exists.
    #[serde(default)]
    pub genesis_balances: BTreeMap<Identity, Micro>,
    #[serde(default)]
    pub simulated_oracles: SimulatedOraclesConfig,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("flightsurety.sock")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./state/flightsurety.json")
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs/flightsurety")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_enabled_true() -> bool {
    true
}

fn default_oracle_id_prefix() -> String {
    "oracle-".to_string()
}

fn default_event_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

/// In-process oracle agents that answer status requests for local testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatedOraclesConfig {
    #[serde(default)]
    pub count: usize,
    #[serde(default = "default_oracle_id_prefix")]
    pub id_prefix: String,
    /// Every agent reports this code when set; otherwise each agent derives
    /// a status from the flight it is asked about.
    #[serde(default)]
    pub fixed_status_code: Option<u8>,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SimulatedOraclesConfig {
    fn default() -> Self {
        Self {
            count: 0,
            id_prefix: default_oracle_id_prefix(),
            fixed_status_code: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config = serde_json::from_value(config_value)
            .context("failed to deserialize flightsurety config")?;
        config.socket_path = resolve_relative(config_base, &config.socket_path);
        config.state_path = resolve_relative(config_base, &config.state_path);
        config.logging.dir = resolve_relative(config_base, &config.logging.dir);

        config
            .policy()
            .validate()
            .map_err(|err| anyhow!("invalid economics/consensus settings: {err}"))?;
        Ok(config)
    }

    pub fn policy(&self) -> SuretyPolicy {
        SuretyPolicy {
            economics: self.economics.clone(),
            consensus: self.consensus.clone(),
        }
    }
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(Value::as_str) {
        return Ok(resolve_relative(config_base, Path::new(path_text)));
    }

    let local_default = config_base.join(SCHEMA_FILE_NAME);
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or {SCHEMA_FILE_NAME} next to it"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|err| anyhow!("failed to compile schema: {err}"))?;

    if let Err(errors) = compiled.validate(config_value) {
        let messages: Vec<String> = errors.map(|error| error.to_string()).collect();
        return Err(anyhow!("config validation failed: {}", messages.join("; ")));
    }
    Ok(())
}
