//! Layered configuration for whistly.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/whistly/config.toml` (system)
//! 2. `~/.config/whistly/config.toml` (user)
//! 3. `./whistly.toml` (local override, or a path given on the command line)
//! 4. Environment variables (`WHISTLY_*`)
//!
//! Files are merged table by table before they are read, so a local file
//! that sets only `playback.default_tempo` keeps every other value from
//! the layers below it.
//!
//! # Example Config
//!
//! ```toml
//! [playback]
//! default_tempo = 100
//! min_tempo = 40
//! max_tempo = 240
//! tick_interval_ms = 20
//! looping = true
//!
//! [instrument]
//! default_whistle = "D"
//!
//! [instrument.overrides."Low D"]
//! high = 72
//!
//! [logging]
//! level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{InstrumentConfig, LoggingConfig, PlaybackConfig};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use whistle_theory::{CatalogError, InstrumentCatalog, WhistleKey};

/// Longest tick interval that still redraws at 30 Hz.
pub const MAX_TICK_INTERVAL_MS: u64 = 33;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Complete whistly configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WhistlyConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub instrument: InstrumentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WhistlyConfig {
    /// Load configuration from all sources and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit file in place of `./whistly.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = Self::load_files(&files)?;
        loader::apply_env_overrides(&mut config, &mut sources)?;
        config.validate()?;
        Ok((config, sources))
    }

    /// Layer the given files over the compiled defaults. No environment
    /// overrides and no validation.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();
        for path in files {
            loader::merge_tables(&mut merged, loader::load_table(path)?);
            sources.files.push(path.clone());
        }
        let origin = files.last().cloned().unwrap_or_default();
        let config = loader::from_table(merged, &origin)?;
        Ok((config, sources))
    }

    /// Check bounds and build the instrument catalog once to surface bad
    /// overrides at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let playback = &self.playback;
        if !(playback.min_tempo > 0.0 && playback.min_tempo < playback.max_tempo) {
            return Err(ConfigError::Invalid(format!(
                "tempo bounds {}..{} must be positive and increasing",
                playback.min_tempo, playback.max_tempo
            )));
        }
        if !(playback.min_tempo..=playback.max_tempo).contains(&playback.default_tempo) {
            return Err(ConfigError::Invalid(format!(
                "default tempo {} outside {}..={}",
                playback.default_tempo, playback.min_tempo, playback.max_tempo
            )));
        }
        if !(1..=MAX_TICK_INTERVAL_MS).contains(&playback.tick_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "tick interval {}ms outside 1..={}ms",
                playback.tick_interval_ms, MAX_TICK_INTERVAL_MS
            )));
        }
        self.default_whistle()?;
        self.catalog()?;
        Ok(())
    }

    pub fn default_whistle(&self) -> Result<WhistleKey, ConfigError> {
        Ok(self.instrument.default_whistle.parse()?)
    }

    /// Standard whistle profiles with this config's overrides applied.
    pub fn catalog(&self) -> Result<InstrumentCatalog, ConfigError> {
        let overrides = self
            .instrument
            .overrides
            .iter()
            .map(|(name, change)| Ok((name.parse::<WhistleKey>()?, *change)))
            .collect::<Result<Vec<_>, CatalogError>>()?;
        Ok(InstrumentCatalog::with_overrides(overrides)?)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(format!("# whistly configuration\n\n{body}"))
    }
}
