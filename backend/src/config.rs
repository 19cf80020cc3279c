//! Analytics configuration file support.
//!
//! Settings are read from an `occupancy.toml` file and may be overridden from
//! the environment. Every field has a default, so an empty file (or no file
//! at all) yields a working configuration.
//!
//! ```toml
//! utc_offset_minutes = 540
//!
//! [night_window]
//! start_hour = 19
//! end_hour = 5
//!
//! [forecast]
//! history_days = 7
//! history_limit = 2000
//!
//! [scoring]
//! threshold = 0.8
//! min_duration_minutes = 120
//!
//! [source]
//! data_file = "data/data.json"
//! timeout_ms = 12000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::forecast::ModelParams;
use crate::models::{offset_from_minutes, NightWindow};
use crate::scoring::{OccupancyScorer, WindowSegmenter};

/// Complete analytics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Offset of the venue's local clock, in minutes east of UTC.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub night_window: NightWindow,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

/// History and model settings for the forecast service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    #[serde(default = "default_history_limit")]
    pub history_limit: Option<usize>,
    #[serde(default = "default_freq_min")]
    pub default_freq_min: u32,
    #[serde(default)]
    pub model: ModelParams,
}

/// Quality scoring and window segmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_ideal")]
    pub ideal: f64,
    #[serde(default = "default_gender_weight")]
    pub gender_weight: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_min_duration_minutes")]
    pub min_duration_minutes: f64,
}

/// Local data source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    /// Consulted once when the primary source fails.
    #[serde(default)]
    pub fallback_file: Option<PathBuf>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_utc_offset_minutes() -> i32 {
    540
}

fn default_history_days() -> u32 {
    7
}

fn default_history_limit() -> Option<usize> {
    Some(2000)
}

fn default_freq_min() -> u32 {
    15
}

fn default_ideal() -> f64 {
    0.7
}

fn default_gender_weight() -> f64 {
    1.5
}

fn default_threshold() -> f64 {
    0.8
}

fn default_min_duration_minutes() -> f64 {
    120.0
}

fn default_timeout_ms() -> u64 {
    12_000
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            night_window: NightWindow::default(),
            forecast: ForecastConfig::default(),
            scoring: ScoringConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            history_limit: default_history_limit(),
            default_freq_min: default_freq_min(),
            model: ModelParams::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ideal: default_ideal(),
            gender_weight: default_gender_weight(),
            threshold: default_threshold(),
            min_duration_minutes: default_min_duration_minutes(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            fallback_file: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AnalyticsConfig {
    /// Parse configuration from TOML text.
    ///
    /// Errors name the offending key path (e.g. `scoring.ideal`).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let deserializer = toml::Deserializer::new(content);
        serde_path_to_error::deserialize(deserializer).map_err(|err| ConfigError::Parse {
            path: err.path().to_string(),
            message: err.inner().to_string(),
        })
    }

    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(AnalyticsConfig)` if successful
    /// * `Err(ConfigError)` if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `occupancy.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let search_paths = [
            PathBuf::from("occupancy.toml"),
            PathBuf::from("backend/occupancy.toml"),
            PathBuf::from("../occupancy.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(ConfigError::NotFound)
    }

    /// Apply overrides from process environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Values that do not parse are ignored with a warning and the previous
    /// setting is kept.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "WINDOW_START") {
            self.night_window.start_hour = v;
        }
        if let Some(v) = parse_var(&lookup, "WINDOW_END") {
            self.night_window.end_hour = v;
        }
        if let Some(v) = parse_var(&lookup, "UTC_OFFSET") {
            self.utc_offset_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "HISTORY_DAYS") {
            self.forecast.history_days = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "HISTORY_LIMIT") {
            self.forecast.history_limit = (v > 0).then_some(v);
        }
        if let Some(v) = parse_var(&lookup, "SOURCE_TIMEOUT_MS") {
            self.source.timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "INSIGHTS_THRESHOLD") {
            self.scoring.threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "INSIGHTS_MIN_DURATION_MINUTES") {
            self.scoring.min_duration_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "INSIGHTS_IDEAL") {
            self.scoring.ideal = v;
        }
        if let Some(v) = parse_var(&lookup, "INSIGHTS_GENDER_WEIGHT") {
            self.scoring.gender_weight = v;
        }
    }

    /// Check ranges that the type system does not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.night_window.start_hour > 23 || self.night_window.end_hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "night_window hours must be in 0..=23, got {}..{}",
                self.night_window.start_hour, self.night_window.end_hour
            )));
        }
        if self.offset().is_none() {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        if self.forecast.history_days == 0 {
            return Err(ConfigError::Invalid("forecast.history_days must be >= 1".into()));
        }
        if self.forecast.history_limit == Some(0) {
            return Err(ConfigError::Invalid("forecast.history_limit must be >= 1".into()));
        }
        if self.forecast.default_freq_min == 0 {
            return Err(ConfigError::Invalid("forecast.default_freq_min must be >= 1".into()));
        }
        self.forecast
            .model
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("forecast.model: {}", e)))?;
        if self.source.timeout_ms == 0 {
            return Err(ConfigError::Invalid("source.timeout_ms must be >= 1".into()));
        }

        let scoring = &self.scoring;
        for (name, value) in [("ideal", scoring.ideal), ("threshold", scoring.threshold)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(scoring.gender_weight.is_finite() && scoring.gender_weight >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scoring.gender_weight must be non-negative, got {}",
                scoring.gender_weight
            )));
        }
        if !(scoring.min_duration_minutes.is_finite() && scoring.min_duration_minutes >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scoring.min_duration_minutes must be non-negative, got {}",
                scoring.min_duration_minutes
            )));
        }
        Ok(())
    }

    /// The configured UTC offset, if representable.
    pub fn offset(&self) -> Option<FixedOffset> {
        offset_from_minutes(self.utc_offset_minutes)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source.timeout_ms)
    }

    pub fn scorer(&self) -> OccupancyScorer {
        OccupancyScorer::new(self.scoring.ideal, self.scoring.gender_weight)
    }

    pub fn segmenter(&self) -> WindowSegmenter {
        WindowSegmenter::new(self.scoring.threshold, self.scoring.min_duration_minutes)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("occupancy.config.ignored_env key={} value={:?}", key, raw);
            None
        }
    }
}
