//! Sources that need no network: an in-memory store and a JSON data file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;
use serde::Deserialize;

use super::error::{ErrorContext, SourceError, SourceResult};
use super::{keep_newest, parsed_utc, HistoryWindow, OccupancySource};
use crate::models::RawRecord;

/// In-memory record store keyed by venue.
///
/// Honours both the look-back and the limit of the [`HistoryWindow`].
/// Records with an unparsable timestamp are always returned so that
/// normalization can account for them.
#[derive(Clone)]
pub struct InMemorySource {
    name: String,
    records: Arc<RwLock<HashMap<String, Vec<RawRecord>>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            name: "in-memory".to_string(),
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append records for a venue.
    pub fn insert(&self, venue: &str, records: impl IntoIterator<Item = RawRecord>) {
        self.records
            .write()
            .entry(venue.to_string())
            .or_default()
            .extend(records);
    }

    pub fn len(&self, venue: &str) -> usize {
        self.records.read().get(venue).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, venue: &str) -> bool {
        self.len(venue) == 0
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OccupancySource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_records(&self, venue: &str, window: HistoryWindow) -> SourceResult<Vec<RawRecord>> {
        let selected: Vec<RawRecord> = {
            let guard = self.records.read();
            guard
                .get(venue)
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| parsed_utc(r).map_or(true, |ts| window.contains(ts)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        let records = keep_newest(selected, window.limit);
        debug!(
            "occupancy.source.fetch source={} venue={} count={}",
            self.name,
            venue,
            records.len()
        );
        Ok(records)
    }
}

/// Document layouts accepted by [`JsonFileSource`].
#[derive(Deserialize)]
#[serde(untagged)]
enum DataFile {
    Rows(Vec<serde_json::Value>),
    Wrapped { rows: Vec<serde_json::Value> },
}

/// Records read from a JSON document on disk.
///
/// The document is either an array of records or an object with a `rows`
/// array. Elements that are not objects are skipped. The whole file is
/// returned regardless of the look-back; only the limit applies.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn context(&self, operation: &str, venue: &str) -> ErrorContext {
        ErrorContext::new(operation)
            .with_source("json-file")
            .with_venue(venue)
            .with_details(self.path.display().to_string())
    }

    /// Parse a data-file document.
    pub fn parse_document(text: &str) -> Result<Vec<RawRecord>, String> {
        // Files written by spreadsheet exports may carry a BOM.
        let text = text.trim_start_matches('\u{feff}');
        let deserializer = &mut serde_json::Deserializer::from_str(text);
        let document: DataFile = serde_path_to_error::deserialize(deserializer)
            .map_err(|err| format!("{} at `{}`", err.inner(), err.path()))?;
        let values = match document {
            DataFile::Rows(rows) | DataFile::Wrapped { rows } => rows,
        };

        let mut records = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            if !value.is_object() {
                debug!("occupancy.source.skip_element index={}", index);
                continue;
            }
            match serde_path_to_error::deserialize::<_, RawRecord>(value) {
                Ok(record) => records.push(record),
                Err(err) => debug!(
                    "occupancy.source.skip_element index={} path={} error={}",
                    index,
                    err.path(),
                    err.inner()
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl OccupancySource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn fetch_records(&self, venue: &str, window: HistoryWindow) -> SourceResult<Vec<RawRecord>> {
        if self.path.as_os_str().is_empty() {
            return Err(SourceError::not_configured_with_context(
                "data file path is empty",
                self.context("read_data_file", venue),
            ));
        }

        let text = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            SourceError::unavailable_with_context(
                format!("cannot read data file: {}", err),
                self.context("read_data_file", venue).retryable(),
            )
        })?;

        let records = Self::parse_document(&text).map_err(|message| {
            SourceError::invalid_payload_with_context(message, self.context("parse_data_file", venue))
        })?;
        let records = keep_newest(records, window.limit);
        info!(
            "occupancy.source.ok source=local venue={} count={}",
            venue,
            records.len()
        );
        Ok(records)
    }
}
