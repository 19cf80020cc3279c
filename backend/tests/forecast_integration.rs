//! End-to-end tests for the forecast service over in-memory and file sources.

mod support;

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use occupancy_rust::api::UPSTREAM_DATA_ERROR;
use occupancy_rust::forecast::{ForecastService, ForecastSettings};
use occupancy_rust::models::{FixedClock, NightWindow, RawRecord};
use occupancy_rust::source::InMemorySource;
use occupancy_rust::AnalyticsConfig;

use support::{friday_night, jst_at, night_records, FailingSource, SlowSource};

fn service_over(source: InMemorySource) -> ForecastService {
    ForecastService::new(Arc::new(source), ForecastSettings::default())
        .with_clock(Arc::new(FixedClock(friday_night())))
}

#[tokio::test]
async fn empty_history_predicts_zeros() {
    let service = service_over(InMemorySource::new());
    let envelope = service.forecast_next_hour("shibuya", 15, false).await;

    assert!(envelope.ok);
    assert_eq!(envelope.store, "shibuya");
    assert_eq!(envelope.freq_min, 15);
    assert_eq!(envelope.data.len(), 4);
    assert!(envelope
        .data
        .iter()
        .all(|p| p.men_pred == 0.0 && p.women_pred == 0.0 && p.total_pred == 0.0));
    assert_eq!(envelope.data[0].ts, jst_at(14, 22, 15));
}

#[tokio::test]
async fn tonight_covers_the_whole_window() {
    let service = service_over(InMemorySource::new());
    let envelope = service.forecast_tonight("shibuya", 15, None, false).await;

    assert!(envelope.ok);
    assert_eq!(envelope.start_h, Some(19));
    assert_eq!(envelope.end_h, Some(5));
    assert_eq!(envelope.data.len(), 40);
    assert_eq!(envelope.data[0].ts, jst_at(14, 19, 0));
    assert_eq!(envelope.data[39].ts, jst_at(15, 4, 45));
}

#[tokio::test]
async fn tonight_accepts_an_explicit_window() {
    let service = service_over(InMemorySource::new());
    let envelope = service
        .forecast_tonight("shibuya", 30, Some(NightWindow::new(20, 23)), false)
        .await;

    assert_eq!(envelope.start_h, Some(20));
    assert_eq!(envelope.end_h, Some(23));
    assert_eq!(envelope.data.len(), 6);
}

#[tokio::test]
async fn next_hour_follows_the_newest_observation() {
    let source = InMemorySource::new();
    source.insert("shibuya", night_records(jst_at(14, 16, 0), 30, "shibuya"));
    let envelope = service_over(source).forecast_next_hour("shibuya", 15, false).await;

    assert!(envelope.ok);
    assert_eq!(envelope.data.len(), 4);
    // newest record is 16:00 + 290 minutes
    assert_eq!(envelope.data[0].ts, jst_at(14, 21, 5));
    assert_eq!(envelope.data[3].ts, jst_at(14, 21, 50));
    for point in &envelope.data {
        assert!(point.men_pred >= 0.0);
        assert!(point.women_pred >= 0.0);
        assert!((point.total_pred - (point.men_pred + point.women_pred)).abs() < 1e-9);
        assert!(!point.has_interval());
    }
}

#[tokio::test]
async fn interval_bands_are_ordered() {
    let source = InMemorySource::new();
    source.insert("shibuya", night_records(jst_at(14, 16, 0), 30, "shibuya"));
    let envelope = service_over(source).forecast_tonight("shibuya", 15, None, true).await;

    assert!(envelope.ok);
    assert_eq!(envelope.data.len(), 40);
    for point in &envelope.data {
        let men = (point.men_p10.unwrap(), point.men_p50.unwrap(), point.men_p90.unwrap());
        let total = (
            point.total_p10.unwrap(),
            point.total_p50.unwrap(),
            point.total_p90.unwrap(),
        );
        assert!(0.0 <= men.0 && men.0 <= men.1 && men.1 <= men.2);
        assert!(0.0 <= total.0 && total.0 <= total.1 && total.1 <= total.2);
        assert!(
            (total.1 - (point.men_p50.unwrap() + point.women_p50.unwrap())).abs() < 1e-9
        );
    }
}

#[tokio::test]
async fn small_history_predicts_the_mean() {
    let source = InMemorySource::new();
    let records = (0..12).map(|i| {
        let ts = jst_at(14, 20, 0) + chrono::Duration::minutes(5 * i);
        RawRecord::new(ts.to_rfc3339(), 10, 6)
    });
    source.insert("shibuya", records);
    let envelope = service_over(source).forecast_next_hour("shibuya", 30, false).await;

    assert_eq!(envelope.data.len(), 2);
    for point in &envelope.data {
        assert_eq!(point.men_pred, 10.0);
        assert_eq!(point.women_pred, 6.0);
        assert_eq!(point.total_pred, 16.0);
    }
}

#[tokio::test]
async fn records_of_other_venues_are_ignored() {
    let source = InMemorySource::new();
    let mut records: Vec<RawRecord> = (0..10)
        .map(|i| {
            let ts = jst_at(14, 20, 0) + chrono::Duration::minutes(10 * i);
            RawRecord::new(ts.to_rfc3339(), 4, 4).with_store("shibuya")
        })
        .collect();
    records.push(RawRecord::new(jst_at(14, 21, 55).to_rfc3339(), 400, 400).with_store("ebisu"));
    source.insert("shibuya", records);

    let envelope = service_over(source).forecast_next_hour("shibuya", 60, false).await;

    assert_eq!(envelope.data.len(), 1);
    assert_eq!(envelope.data[0].ts, jst_at(14, 22, 30));
    assert_eq!(envelope.data[0].total_pred, 8.0);
}

#[tokio::test]
async fn failing_source_yields_upstream_error() {
    let service = ForecastService::new(Arc::new(FailingSource), ForecastSettings::default())
        .with_clock(Arc::new(FixedClock(friday_night())));
    let envelope = service.forecast_tonight("shibuya", 15, None, false).await;

    assert!(!envelope.ok);
    assert_eq!(envelope.error.as_deref(), Some(UPSTREAM_DATA_ERROR));
    assert!(envelope.detail.unwrap().contains("connection refused"));
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.start_h, Some(19));
}

#[tokio::test]
async fn fallback_source_is_consulted_once() {
    let fallback = InMemorySource::new().with_name("backup");
    fallback.insert("shibuya", night_records(jst_at(14, 16, 0), 30, "shibuya"));

    let service = ForecastService::new(Arc::new(FailingSource), ForecastSettings::default())
        .with_fallback(Arc::new(fallback))
        .with_clock(Arc::new(FixedClock(friday_night())));
    let envelope = service.forecast_next_hour("shibuya", 15, false).await;

    assert!(envelope.ok);
    assert_eq!(envelope.error, None);
    assert_eq!(envelope.data[0].ts, jst_at(14, 21, 5));
}

#[tokio::test]
async fn slow_source_times_out() {
    let settings = ForecastSettings {
        timeout: Duration::from_millis(50),
        ..ForecastSettings::default()
    };
    let slow = SlowSource {
        delay: Duration::from_secs(5),
    };
    let service = ForecastService::new(Arc::new(slow), settings)
        .with_clock(Arc::new(FixedClock(friday_night())));
    let envelope = service.forecast_next_hour("shibuya", 15, false).await;

    assert!(!envelope.ok);
    assert_eq!(envelope.error.as_deref(), Some(UPSTREAM_DATA_ERROR));
    assert!(envelope.detail.unwrap().to_lowercase().contains("timeout"));
}

#[tokio::test]
async fn internal_fault_degrades_to_empty_success() {
    let mut settings = ForecastSettings::default();
    settings.model.boosting.rounds = 0;

    let source = InMemorySource::new();
    source.insert("shibuya", night_records(jst_at(14, 16, 0), 30, "shibuya"));
    let service = ForecastService::new(Arc::new(source), settings)
        .with_clock(Arc::new(FixedClock(friday_night())));
    let envelope = service.forecast_next_hour("shibuya", 15, false).await;

    assert!(envelope.ok);
    assert!(envelope.data.is_empty());
    assert!(envelope.is_degraded());

    let value = serde_json::to_value(&envelope).unwrap();
    assert!(value.get("error").is_none());
    assert!(value.get("degraded").is_none());
}

#[tokio::test]
async fn zero_cadence_degrades_without_fetching() {
    let service = ForecastService::new(Arc::new(FailingSource), ForecastSettings::default())
        .with_clock(Arc::new(FixedClock(friday_night())));
    let envelope = service.forecast_tonight("shibuya", 0, None, false).await;

    assert!(envelope.ok);
    assert_eq!(envelope.error, None);
    assert!(envelope.data.is_empty());
    assert!(envelope.is_degraded());
    assert_eq!(envelope.start_h, Some(19));
}

#[tokio::test]
async fn fitting_leaves_the_runtime_responsive() {
    let source = InMemorySource::new();
    source.insert("shibuya", night_records(jst_at(12, 0, 0), 300, "shibuya"));
    let service = service_over(source);

    let (forecast, ticked_at) = tokio::join!(
        async {
            let envelope = service.forecast_tonight("shibuya", 15, None, true).await;
            (envelope, Instant::now())
        },
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Instant::now()
        }
    );
    let (envelope, finished_at) = forecast;

    assert!(envelope.ok);
    assert_eq!(envelope.data.len(), 40);
    assert!(ticked_at < finished_at);
}

#[tokio::test]
async fn service_from_config_reads_the_data_file() {
    let rows: Vec<serde_json::Value> = night_records(jst_at(14, 16, 0), 30, "shibuya")
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::json!({ "rows": rows })).unwrap();

    let mut config = AnalyticsConfig::default();
    config.source.data_file = Some(file.path().to_path_buf());

    let service = ForecastService::from_config(&config)
        .unwrap()
        .with_clock(Arc::new(FixedClock(friday_night())));
    let envelope = service.forecast_next_hour("shibuya", 15, false).await;

    assert!(envelope.ok);
    assert_eq!(envelope.data.len(), 4);
    assert_eq!(envelope.data[0].ts, jst_at(14, 21, 5));
}

#[tokio::test]
async fn missing_data_file_is_an_upstream_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AnalyticsConfig::default();
    config.source.data_file = Some(dir.path().join("absent.json"));

    let service = ForecastService::from_config(&config).unwrap();
    let envelope = service.forecast_next_hour("shibuya", 15, false).await;

    assert!(!envelope.ok);
    assert_eq!(envelope.error.as_deref(), Some(UPSTREAM_DATA_ERROR));
}

#[test]
fn from_config_requires_a_data_file() {
    assert!(ForecastService::from_config(&AnalyticsConfig::default()).is_err());
}
