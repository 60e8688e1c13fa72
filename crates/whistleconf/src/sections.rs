//! Configuration sections.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use whistle_theory::ProfileOverride;

/// Transport defaults and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Tempo for freshly loaded tunes, in quarter-note beats per minute.
    /// Default: 120
    #[serde(default = "PlaybackConfig::default_tempo")]
    pub default_tempo: f64,

    /// Default: 40
    #[serde(default = "PlaybackConfig::default_min_tempo")]
    pub min_tempo: f64,

    /// Default: 240
    #[serde(default = "PlaybackConfig::default_max_tempo")]
    pub max_tempo: f64,

    /// Time between cursor updates while playing.
    /// Default: 20
    #[serde(default = "PlaybackConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Default: true
    #[serde(default = "PlaybackConfig::default_looping")]
    pub looping: bool,
}

impl PlaybackConfig {
    fn default_tempo() -> f64 {
        120.0
    }

    fn default_min_tempo() -> f64 {
        40.0
    }

    fn default_max_tempo() -> f64 {
        240.0
    }

    fn default_tick_interval_ms() -> u64 {
        20
    }

    fn default_looping() -> bool {
        true
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_tempo: Self::default_tempo(),
            min_tempo: Self::default_min_tempo(),
            max_tempo: Self::default_max_tempo(),
            tick_interval_ms: Self::default_tick_interval_ms(),
            looping: Self::default_looping(),
        }
    }
}

/// Which whistle to plan for, and per-whistle range adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Default: "D"
    #[serde(default = "InstrumentConfig::default_whistle")]
    pub default_whistle: String,

    /// Keyed by whistle name, e.g. `[instrument.overrides."Low D"]`.
    #[serde(default)]
    pub overrides: BTreeMap<String, ProfileOverride>,
}

impl InstrumentConfig {
    fn default_whistle() -> String {
        "D".to_string()
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            default_whistle: Self::default_whistle(),
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive.
    /// Default: "info"
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}
