#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline configuration loading and canonical data paths.
//!
//! Configuration is a TOML file. A default is embedded at compile time so
//! the toolchain runs without any file present; a `covid_map.toml` in the
//! working directory, the `COVID_MAP_CONFIG` environment variable, or an
//! explicit `--config` path replace it.

pub mod paths;

use std::path::{Path, PathBuf};
use std::time::Duration;

use covid_map_analytics_models::{BreakBasis, DEFAULT_CLASS_COUNT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV: &str = "COVID_MAP_CONFIG";

/// Environment variable overriding the feed endpoint.
pub const ENDPOINT_ENV: &str = "COVID_MAP_ENDPOINT";

/// Config file picked up from the working directory when nothing else is
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "covid_map.toml";

/// Embedded default configuration.
const DEFAULT_CONFIG_TOML: &str = include_str!("../covid_map.default.toml");

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`PipelineConfig`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config could not be serialized back to TOML.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Config parsed but holds an unusable value.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Remote case feed settings.
    pub source: SourceConfig,
    /// Input and output file locations.
    pub files: FileConfig,
    /// Choropleth classification settings.
    #[serde(default)]
    pub classification: ClassificationConfig,
}

/// Remote case feed settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL answering with the `{"records": [...]}` feed document.
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Input and output file locations. Relative paths resolve against the
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Population reference table (`.csv` or a spreadsheet) with `ktn` and
    /// `pop_size` columns.
    pub population: PathBuf,
    /// Worksheet to read from a spreadsheet population file. The first
    /// sheet is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_sheet: Option<String>,
    /// CSV mapping `code_num` to `code`.
    pub code_mapping: PathBuf,
    /// `GeoJSON` file of region polygons.
    pub geometry: PathBuf,
    /// Feature property holding the numeric region identifier.
    #[serde(default = "default_geometry_id_field")]
    pub geometry_id_field: String,
    /// Enriched incidence table written by ingestion.
    pub enriched: PathBuf,
    /// Classified `GeoJSON` written by classification.
    pub choropleth: PathBuf,
}

/// Choropleth classification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Number of quantile classes.
    #[serde(default = "default_classes")]
    pub classes: usize,
    /// Whether breaks are computed per region or per polygon fragment.
    #[serde(default)]
    pub basis: BreakBasis,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            classes: DEFAULT_CLASS_COUNT,
            basis: BreakBasis::default(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    60
}

fn default_geometry_id_field() -> String {
    "KANTONSNUM".to_string()
}

const fn default_classes() -> usize {
    DEFAULT_CLASS_COUNT
}

impl PipelineConfig {
    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is invalid or a value fails
    /// validation.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Returns the embedded default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse. It is a compile-time
    /// constant, so a failure is a development error caught by tests.
    #[must_use]
    pub fn embedded_default() -> Self {
        Self::from_toml_str(DEFAULT_CONFIG_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
    }

    /// Loads the effective configuration.
    ///
    /// Lookup order: `explicit`, then `COVID_MAP_CONFIG`, then
    /// `covid_map.toml` in the working directory, then the embedded
    /// default. `COVID_MAP_ENDPOINT` overrides the endpoint afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen file cannot be read or is
    /// invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut config = match resolve_config_path(explicit, env_path) {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                log::debug!("No config file found, using embedded defaults");
                Self::embedded_default()
            }
        };

        config.apply_endpoint_override(std::env::var(ENDPOINT_ENV).ok())?;

        Ok(config)
    }

    /// Replaces the endpoint if `endpoint` is set and non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the resulting config is invalid.
    pub fn apply_endpoint_override(&mut self, endpoint: Option<String>) -> Result<(), ConfigError> {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            log::info!("Using endpoint override from {ENDPOINT_ENV}: {endpoint}");
            self.source.endpoint = endpoint.trim().to_string();
        }
        self.validate()
    }

    /// Serializes the config to pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TomlSerialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };

        if self.source.endpoint.trim().is_empty() {
            return invalid("source.endpoint must not be empty");
        }
        if self.source.timeout_secs == 0 {
            return invalid("source.timeout_secs must be greater than 0");
        }
        if self.files.geometry_id_field.trim().is_empty() {
            return invalid("files.geometry_id_field must not be empty");
        }
        if self.classification.classes == 0 {
            return invalid("classification.classes must be at least 1");
        }

        Ok(())
    }
}

/// Picks the config file to load, if any.
fn resolve_config_path(explicit: Option<&Path>, env_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path {
        return Some(path);
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.is_file().then_some(local)
}
