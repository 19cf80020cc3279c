//! Occupancy report binary
//!
//! Loads the analytics configuration, runs one report against the configured
//! data file and prints the result as JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! DATA_FILE=data/data.json VENUE=ebisu REPORT=forecast-tonight \
//!   cargo run --bin occupancy-report
//! ```
//!
//! # Environment Variables
//!
//! - `OCCUPANCY_CONFIG`: Path to `occupancy.toml` (default: standard locations, then built-in defaults)
//! - `DATA_FILE`: JSON data file, overrides `source.data_file`
//! - `VENUE`: Venue identifier (required)
//! - `REPORT`: `forecast-next-hour` (default), `forecast-tonight`, `windows`, `aggregate` or `insights`
//! - `FREQ_MIN`: Forecast cadence in minutes (default: `forecast.default_freq_min`)
//! - `WITH_INTERVAL`: `1`/`true` to include p10/p50/p90 bands
//! - `RUST_LOG`: Log level (default: info)
//!
//! Setting overrides such as `WINDOW_START` or `UTC_OFFSET` are applied on
//! top of the configuration file.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use occupancy_rust::config::AnalyticsConfig;
use occupancy_rust::error::ConfigError;
use occupancy_rust::forecast::ForecastService;
use occupancy_rust::models::{normalize_records, Observation};
use occupancy_rust::services::{Aggregator, InsightService};
use occupancy_rust::source::{HistoryWindow, JsonFileSource, OccupancySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    ForecastNextHour,
    ForecastTonight,
    Windows,
    Aggregate,
    Insights,
}

impl FromStr for Report {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forecast-next-hour" | "next-hour" => Ok(Self::ForecastNextHour),
            "forecast-tonight" | "tonight" => Ok(Self::ForecastTonight),
            "windows" => Ok(Self::Windows),
            "aggregate" => Ok(Self::Aggregate),
            "insights" => Ok(Self::Insights),
            other => Err(format!("Unknown report: {}", other)),
        }
    }
}

fn load_config() -> anyhow::Result<AnalyticsConfig> {
    let mut config = match env::var("OCCUPANCY_CONFIG") {
        Ok(path) => AnalyticsConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        Err(_) => match AnalyticsConfig::from_default_location() {
            Ok(config) => config,
            Err(ConfigError::NotFound) => {
                info!("No occupancy.toml found, using defaults");
                AnalyticsConfig::default()
            }
            Err(e) => return Err(e).context("loading configuration"),
        },
    };

    config.apply_env_overrides();
    if let Ok(path) = env::var("DATA_FILE") {
        config.source.data_file = Some(path.into());
    }
    config.validate().context("validating configuration")?;
    Ok(config)
}

/// Every observation in the data file for `venue`, in the configured offset.
async fn load_observations(config: &AnalyticsConfig, venue: &str) -> anyhow::Result<Vec<Observation>> {
    let path = config
        .source
        .data_file
        .as_ref()
        .ok_or_else(|| anyhow!("DATA_FILE or source.data_file is required"))?;
    let offset = config
        .offset()
        .ok_or_else(|| anyhow!("invalid utc offset"))?;

    let window = HistoryWindow::new(config.forecast.history_days, None, Utc::now());
    let records = JsonFileSource::new(path)
        .fetch_records(venue, window)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let normalized = normalize_records(&records, Some(venue));
    if normalized.skipped > 0 {
        warn!("Skipped {} malformed records", normalized.skipped);
    }
    Ok(normalized
        .observations
        .iter()
        .map(|o| o.in_offset(&offset))
        .collect())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting occupancy report");

    let config = load_config()?;
    let venue = env::var("VENUE").context("VENUE is required")?;
    let report: Report = env::var("REPORT")
        .unwrap_or_else(|_| "forecast-next-hour".to_string())
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let freq_min: u32 = match env::var("FREQ_MIN") {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("FREQ_MIN must be a positive integer, got {:?}", raw))?,
        Err(_) => config.forecast.default_freq_min,
    };
    if freq_min == 0 {
        bail!("FREQ_MIN must be a positive integer");
    }
    let with_interval = env_flag("WITH_INTERVAL");

    if let Some(offset) = config.offset() {
        if let Some((inside, start, end)) = config
            .night_window
            .collection_state(Utc::now().with_timezone(&offset))
        {
            info!(
                "Night window {} - {} (collecting: {})",
                start.to_rfc3339(),
                end.to_rfc3339(),
                inside
            );
        }
    }

    info!("Running {:?} report for venue {}", report, venue);
    let output = match report {
        Report::ForecastNextHour | Report::ForecastTonight => {
            let service = ForecastService::from_config(&config)?;
            let envelope = if report == Report::ForecastNextHour {
                service
                    .forecast_next_hour(&venue, freq_min, with_interval)
                    .await
            } else {
                service
                    .forecast_tonight(&venue, freq_min, None, with_interval)
                    .await
            };
            serde_json::to_string_pretty(&envelope)?
        }
        Report::Windows => {
            let observations = load_observations(&config, &venue).await?;
            let insights = InsightService::new(config.scorer(), config.segmenter());
            serde_json::to_string_pretty(&insights.quality_windows(&observations))?
        }
        Report::Aggregate => {
            let observations = load_observations(&config, &venue).await?;
            let offset = config
                .offset()
                .ok_or_else(|| anyhow!("invalid utc offset"))?;
            let aggregator = Aggregator::new(config.night_window, offset);
            serde_json::to_string_pretty(&aggregator.aggregate(&observations, Some(&venue)))?
        }
        Report::Insights => {
            let observations = load_observations(&config, &venue).await?;
            let insights = InsightService::new(config.scorer(), config.segmenter());
            serde_json::to_string_pretty(&insights.weekly_report(&venue, &observations, Utc::now()))?
        }
    };

    println!("{}", output);
    info!("Report complete");
    Ok(())
}
