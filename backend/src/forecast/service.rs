//! Forecast orchestration.
//!
//! A forecast call fetches history from the configured source (with a
//! timeout and an optional one-shot fallback), normalizes it into the
//! venue's offset, fits a fresh [`ForecastModel`] and predicts the requested
//! horizon. Failures never escape as errors: upstream problems become a
//! failure envelope and internal faults degrade to an empty success.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use log::{debug, error, info, warn};

use super::horizon::Horizon;
use super::model::{ForecastModel, ModelParams};
use crate::api::{ForecastEnvelope, PredictionPoint};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, AnalyticsResult, ConfigError};
use crate::features::FeatureBuilder;
use crate::models::{normalize_records, Clock, NightWindow, Observation, RawRecord, SystemClock};
use crate::source::{
    ErrorContext, HistoryWindow, JsonFileSource, OccupancySource, SourceError, SourceResult,
};

/// Tunables of the forecast service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSettings {
    /// Offset that history and horizons are expressed in.
    pub offset: FixedOffset,
    pub history_days: u32,
    pub history_limit: Option<usize>,
    /// Upper bound on a single source fetch.
    pub timeout: Duration,
    pub model: ModelParams,
    /// Window used by [`ForecastService::forecast_tonight`] when none is given.
    pub night_window: NightWindow,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        let config = AnalyticsConfig::default();
        Self {
            offset: config.offset().unwrap_or(Utc.fix()),
            history_days: config.forecast.history_days,
            history_limit: config.forecast.history_limit,
            timeout: config.source_timeout(),
            model: config.forecast.model,
            night_window: config.night_window,
        }
    }
}

impl ForecastSettings {
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, ConfigError> {
        let offset = config.offset().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                config.utc_offset_minutes
            ))
        })?;
        Ok(Self {
            offset,
            history_days: config.forecast.history_days,
            history_limit: config.forecast.history_limit,
            timeout: config.source_timeout(),
            model: config.forecast.model,
            night_window: config.night_window,
        })
    }

    fn history_window(&self, until: DateTime<Utc>) -> HistoryWindow {
        HistoryWindow::new(self.history_days, self.history_limit, until)
    }
}

/// Orchestrates fetch, normalization, fitting and prediction.
pub struct ForecastService {
    primary: Arc<dyn OccupancySource>,
    fallback: Option<Arc<dyn OccupancySource>>,
    clock: Arc<dyn Clock>,
    settings: ForecastSettings,
    features: FeatureBuilder,
}

impl ForecastService {
    pub fn new(primary: Arc<dyn OccupancySource>, settings: ForecastSettings) -> Self {
        Self {
            primary,
            fallback: None,
            clock: Arc::new(SystemClock),
            settings,
            features: FeatureBuilder::new(),
        }
    }

    /// Source consulted once when the primary fails.
    pub fn with_fallback(mut self, fallback: Arc<dyn OccupancySource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Service over the JSON data files named in the configuration.
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, ConfigError> {
        let settings = ForecastSettings::from_config(config)?;
        let data_file = config
            .source
            .data_file
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("source.data_file is required".to_string()))?;

        let mut service = Self::new(Arc::new(JsonFileSource::new(data_file)), settings);
        if let Some(fallback) = &config.source.fallback_file {
            service = service.with_fallback(Arc::new(JsonFileSource::new(fallback)));
        }
        Ok(service)
    }

    /// One hour past the newest observation at `freq_min` cadence.
    pub async fn forecast_next_hour(&self, venue: &str, freq_min: u32, with_interval: bool) -> ForecastEnvelope {
        self.forecast(venue, freq_min, Horizon::NextHour, with_interval)
            .await
    }

    /// The current (or most recent) night window at `freq_min` cadence.
    pub async fn forecast_tonight(
        &self,
        venue: &str,
        freq_min: u32,
        window: Option<NightWindow>,
        with_interval: bool,
    ) -> ForecastEnvelope {
        let window = window.unwrap_or(self.settings.night_window);
        self.forecast(venue, freq_min, Horizon::Night(window), with_interval)
            .await
    }

    /// Forecast any horizon.
    ///
    /// A cadence of zero is rejected as an internal fault and yields a
    /// degraded envelope without touching the source.
    pub async fn forecast(
        &self,
        venue: &str,
        freq_min: u32,
        horizon: Horizon,
        with_interval: bool,
    ) -> ForecastEnvelope {
        let envelope = if freq_min == 0 {
            let err = AnalyticsError::invalid_parameter("freq_min must be >= 1");
            error!("forecast.service.error store={} error={}", venue, err);
            ForecastEnvelope::degraded(venue, freq_min, err.to_string())
        } else {
            self.fetch_and_predict(venue, freq_min, horizon, with_interval)
                .await
        };

        match horizon.window() {
            Some(window) => envelope.with_hours(window.start_hour, window.end_hour),
            None => envelope,
        }
    }

    async fn fetch_and_predict(
        &self,
        venue: &str,
        freq_min: u32,
        horizon: Horizon,
        with_interval: bool,
    ) -> ForecastEnvelope {
        let now = self.clock.now();
        let records = match self.fetch_history(venue, now).await {
            Ok(records) => records,
            Err(err) => {
                error!(
                    "forecast.service.upstream_error store={} kind={} error={}",
                    venue,
                    err.kind(),
                    err
                );
                return ForecastEnvelope::upstream_failure(venue, freq_min, err.to_string());
            }
        };

        // Fitting is CPU-bound; keep it off the async worker threads.
        let pipeline = Pipeline {
            settings: self.settings,
            features: self.features,
        };
        let store = venue.to_string();
        let job = tokio::task::spawn_blocking(move || {
            pipeline.run(&store, &records, now, freq_min, horizon, with_interval)
        });

        match job.await {
            Ok(Ok(data)) => ForecastEnvelope::success(venue, freq_min, data),
            Ok(Err(err)) => {
                error!("forecast.service.error store={} error={}", venue, err);
                ForecastEnvelope::degraded(venue, freq_min, err.to_string())
            }
            Err(err) => {
                error!("forecast.service.task_failed store={} error={}", venue, err);
                ForecastEnvelope::degraded(venue, freq_min, format!("Task join error: {}", err))
            }
        }
    }

    async fn fetch_history(&self, venue: &str, now: DateTime<Utc>) -> SourceResult<Vec<RawRecord>> {
        let window = self.settings.history_window(now);
        match self.fetch_from(self.primary.as_ref(), venue, window).await {
            Ok(records) => Ok(records),
            Err(err) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        "forecast.service.fallback store={} source={} retryable={} error={}",
                        venue,
                        fallback.name(),
                        err.is_retryable(),
                        err
                    );
                    self.fetch_from(fallback.as_ref(), venue, window).await
                }
                None => Err(err),
            },
        }
    }

    async fn fetch_from(
        &self,
        source: &dyn OccupancySource,
        venue: &str,
        window: HistoryWindow,
    ) -> SourceResult<Vec<RawRecord>> {
        match tokio::time::timeout(self.settings.timeout, source.fetch_records(venue, window)).await {
            Ok(result) => result.map_err(|e| e.with_source(source.name()).with_venue(venue)),
            Err(_) => Err(SourceError::timeout_with_context(
                format!("no response within {} ms", self.settings.timeout.as_millis()),
                ErrorContext::new("fetch_records")
                    .with_source(source.name())
                    .with_venue(venue)
                    .retryable(),
            )),
        }
    }
}

/// Normalize, fit and predict; everything the service does after a fetch.
#[derive(Debug, Clone, Copy)]
struct Pipeline {
    settings: ForecastSettings,
    features: FeatureBuilder,
}

impl Pipeline {
    fn run(
        &self,
        venue: &str,
        records: &[RawRecord],
        now: DateTime<Utc>,
        freq_min: u32,
        horizon: Horizon,
        with_interval: bool,
    ) -> AnalyticsResult<Vec<PredictionPoint>> {
        let offset = self.settings.offset;
        let normalized = normalize_records(records, Some(venue));
        let history: Vec<Observation> = normalized
            .observations
            .iter()
            .map(|o| o.in_offset(&offset))
            .collect();
        info!("forecast.service.history size={}", history.len());

        let future = horizon.timestamps(
            history.last().map(|o| o.ts),
            now.with_timezone(&offset),
            freq_min,
        )?;
        info!("forecast.service.future size={}", future.len());

        let data = if history.is_empty() {
            future
                .iter()
                .map(|ts| PredictionPoint::zero(*ts, with_interval))
                .collect()
        } else {
            self.predict(&history, &future, with_interval)?
        };
        info!("forecast.service.predicted size={}", data.len());
        Ok(data)
    }

    fn predict(
        &self,
        history: &[Observation],
        future: &[DateTime<FixedOffset>],
        with_interval: bool,
    ) -> AnalyticsResult<Vec<PredictionPoint>> {
        let features = self.features.build(history);
        let men: Vec<f64> = history.iter().map(|o| f64::from(o.men)).collect();
        let women: Vec<f64> = history.iter().map(|o| f64::from(o.women)).collect();

        let mut model = ForecastModel::new(self.settings.model);
        if with_interval {
            model.fit_with_interval(&features, &men, &women)?;
        } else {
            model.fit(&features, &men, &women)?;
        }
        debug!(
            "forecast.service.fit rows={} mode={:?}",
            features.len(),
            model.fit_mode()
        );

        let future_features = self
            .features
            .build_with_future(history, future)
            .tail(future.len());
        let outputs = model.predict(&future_features)?;
        Ok(future
            .iter()
            .zip(&outputs)
            .map(|(ts, output)| PredictionPoint::from_output(*ts, output))
            .collect())
    }
}
