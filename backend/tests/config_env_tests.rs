//! Tests for configuration loading and environment overrides.

mod support;

use std::io::Write;

use occupancy_rust::{AnalyticsConfig, ConfigError};

const ALL_KEYS: [&str; 10] = [
    "WINDOW_START",
    "WINDOW_END",
    "UTC_OFFSET",
    "HISTORY_DAYS",
    "HISTORY_LIMIT",
    "SOURCE_TIMEOUT_MS",
    "INSIGHTS_THRESHOLD",
    "INSIGHTS_MIN_DURATION_MINUTES",
    "INSIGHTS_IDEAL",
    "INSIGHTS_GENDER_WEIGHT",
];

fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
    ALL_KEYS.iter().map(|k| (*k, None)).collect()
}

#[test]
fn no_env_keeps_defaults() {
    support::with_scoped_env(&cleared(), || {
        let mut config = AnalyticsConfig::default();
        config.apply_env_overrides();
        assert_eq!(config, AnalyticsConfig::default());
    });
}

#[test]
fn env_overrides_every_setting() {
    let mut changes = cleared();
    changes.extend([
        ("WINDOW_START", Some("20")),
        ("WINDOW_END", Some("4")),
        ("UTC_OFFSET", Some("-300")),
        ("HISTORY_DAYS", Some("14")),
        ("HISTORY_LIMIT", Some("500")),
        ("SOURCE_TIMEOUT_MS", Some("2500")),
        ("INSIGHTS_THRESHOLD", Some("0.75")),
        ("INSIGHTS_MIN_DURATION_MINUTES", Some("90")),
        ("INSIGHTS_IDEAL", Some("0.6")),
        ("INSIGHTS_GENDER_WEIGHT", Some("2.0")),
    ]);

    support::with_scoped_env(&changes, || {
        let mut config = AnalyticsConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.night_window.start_hour, 20);
        assert_eq!(config.night_window.end_hour, 4);
        assert_eq!(config.utc_offset_minutes, -300);
        assert_eq!(config.forecast.history_days, 14);
        assert_eq!(config.forecast.history_limit, Some(500));
        assert_eq!(config.source.timeout_ms, 2500);
        assert_eq!(config.scoring.threshold, 0.75);
        assert_eq!(config.scoring.min_duration_minutes, 90.0);
        assert_eq!(config.scoring.ideal, 0.6);
        assert_eq!(config.scoring.gender_weight, 2.0);
        assert!(config.validate().is_ok());
    });
}

#[test]
fn zero_history_limit_means_unbounded() {
    let mut changes = cleared();
    changes.push(("HISTORY_LIMIT", Some("0")));
    support::with_scoped_env(&changes, || {
        let mut config = AnalyticsConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.forecast.history_limit, None);
    });
}

#[test]
fn unparsable_values_keep_previous_setting() {
    let mut changes = cleared();
    changes.extend([
        ("WINDOW_START", Some("late")),
        ("HISTORY_DAYS", Some("-3")),
        ("INSIGHTS_IDEAL", Some("")),
    ]);
    support::with_scoped_env(&changes, || {
        let mut config = AnalyticsConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.night_window.start_hour, 19);
        assert_eq!(config.forecast.history_days, 7);
        assert_eq!(config.scoring.ideal, 0.7);
    });
}

#[test]
fn out_of_range_override_fails_validation() {
    let mut changes = cleared();
    changes.push(("WINDOW_END", Some("30")));
    support::with_scoped_env(&changes, || {
        let mut config = AnalyticsConfig::default();
        config.apply_env_overrides();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    });
}

#[test]
fn env_overrides_apply_on_top_of_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
utc_offset_minutes = 60

[night_window]
start_hour = 21
end_hour = 3

[scoring]
threshold = 0.9
"#
    )
    .unwrap();

    let mut changes = cleared();
    changes.push(("INSIGHTS_THRESHOLD", Some("0.85")));
    support::with_scoped_env(&changes, || {
        let mut config = AnalyticsConfig::from_file(file.path()).unwrap();
        config.apply_env_overrides();

        assert_eq!(config.utc_offset_minutes, 60);
        assert_eq!(config.night_window.start_hour, 21);
        assert_eq!(config.night_window.end_hour, 3);
        assert_eq!(config.scoring.threshold, 0.85);
        assert_eq!(config.scoring.ideal, 0.7);
    });
}

#[test]
fn bundled_config_file_is_valid() {
    let config = AnalyticsConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/occupancy.toml"))
        .unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.utc_offset_minutes, 540);
}
