//! Configuration loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `SBWS_CONFIG`
//! 3. Platform config directory (`<config_dir>/sbws/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing file at the platform location is not an error: the run proceeds
//! with defaults. An explicitly named file that cannot be read or parsed is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SBWS_CONFIG";

/// Annotation column carrying the crowd-sourced majority answer
pub const DEFAULT_LABEL_FIELD: &str = "Answer_is-a-call_most";

/// How a record whose CALL probability is exactly 0.5 is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Pick CALL or NOTCALL uniformly with the model's seeded random source
    #[default]
    Random,
    /// Leave the record unresolved (ABSTAIN)
    Abstain,
}

impl std::str::FromStr for TieBreak {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(TieBreak::Random),
            "abstain" => Ok(TieBreak::Abstain),
            other => Err(Error::Configuration(format!(
                "unknown tie-break policy '{}' (expected 'random' or 'abstain')",
                other
            ))),
        }
    }
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Label model fitting parameters
    #[serde(default)]
    pub model: ModelConfig,

    /// Labeling function names left out of the run
    #[serde(default)]
    pub excluded_lfs: Vec<String>,

    /// Annotation field used to derive ground truth; `None` uses record labels as-is
    #[serde(default = "default_label_field")]
    pub label_field: Option<String>,

    /// Fit the label model with ground truth
    #[serde(default = "default_true")]
    pub ground_truth: bool,

    /// Apply labeling functions across worker threads
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Abandon the run when fitting takes longer than this
    #[serde(default)]
    pub fit_timeout_secs: Option<u64>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            excluded_lfs: Vec::new(),
            label_field: default_label_field(),
            ground_truth: true,
            parallel: true,
            fit_timeout_secs: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Label model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Maximum optimisation epochs
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Seed for initialisation jitter and random tie-breaks
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Early-stop threshold on the largest parameter change per epoch
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            seed: default_seed(),
            tolerance: default_tolerance(),
            tie_break: TieBreak::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_label_field() -> Option<String> {
    Some(DEFAULT_LABEL_FIELD.to_string())
}

fn default_true() -> bool {
    true
}

fn default_epochs() -> usize {
    500
}

fn default_seed() -> u64 {
    123
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    ConfigDir(PathBuf),
    Defaults,
}

/// Resolve which config file (if any) to read
pub fn resolve_config_source(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::CommandLine(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigSource::Environment(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = default_config_path() {
        if path.exists() {
            return ConfigSource::ConfigDir(path);
        }
    }

    // Priority 4: Compiled defaults
    ConfigSource::Defaults
}

/// `<config_dir>/sbws/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sbws").join("config.toml"))
}

/// Resolve and load the configuration
///
/// # Errors
/// `Error::Configuration` when an explicitly named file (CLI or ENV) is
/// unreadable or invalid. A broken file in the platform directory only
/// produces a warning and falls back to defaults.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_source(cli_arg) {
        ConfigSource::CommandLine(path) | ConfigSource::Environment(path) => {
            let config = read_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        ConfigSource::ConfigDir(path) => match read_toml_config(&path) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring unusable config {}: {}. Using defaults.", path.display(), e);
                Ok(TomlConfig::default())
            }
        },
        ConfigSource::Defaults => {
            info!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Configuration(format!("Parse {} failed: {}", path.display(), e)))
}
