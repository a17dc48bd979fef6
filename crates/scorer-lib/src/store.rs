//! Telemetry store adapter
//!
//! The selector only sees the [`TelemetryStore`] trait. The in-memory store
//! serves replayed or fixture data; it can be filled programmatically or
//! from a JSON snapshot file.

use crate::error::{ScorerError, ScorerResult};
use crate::models::{Metric, MetricSample};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

pub use async_trait::async_trait;

/// Query for a window of samples from one socket
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryQuery {
    pub metrics: Vec<Metric>,
    /// Hardware identity of the node
    pub node_uuid: String,
    pub socket: u32,
    /// Restrict to per-core rows for these cores; `None` asks for socket rows
    pub cores: Option<Vec<u32>>,
    /// Maximum number of rows to return
    pub limit: usize,
}

/// Source of telemetry samples
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Return up to `query.limit` rows, newest first.
    ///
    /// Transport or query failures surface as `TelemetryUnavailable`.
    async fn query(&self, query: &TelemetryQuery) -> ScorerResult<Vec<MetricSample>>;
}

/// One series in a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub uuid: String,
    pub socket: u32,
    pub samples: Vec<MetricSample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub series: Vec<SeriesSnapshot>,
}

/// Telemetry held in memory, keyed by (hardware identity, socket)
#[derive(Debug, Default)]
pub struct InMemoryTelemetryStore {
    series: RwLock<HashMap<(String, u32), Vec<MetricSample>>>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON snapshot file
    pub async fn from_snapshot_file(path: impl AsRef<Path>) -> ScorerResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            ScorerError::ConfigUnreadable(format!("{}: {}", path.display(), e))
        })?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&raw).map_err(|e| {
            ScorerError::ConfigUnreadable(format!("{}: {}", path.display(), e))
        })?;

        let store = Self::new();
        for series in snapshot.series {
            store.extend(&series.uuid, series.socket, series.samples).await;
        }
        Ok(store)
    }

    /// Append samples to a series, keeping it ordered newest first
    pub async fn extend(
        &self,
        uuid: &str,
        socket: u32,
        samples: impl IntoIterator<Item = MetricSample>,
    ) {
        let mut series = self.series.write().await;
        let rows = series.entry((uuid.to_string(), socket)).or_default();
        rows.extend(samples);
        // stable sort keeps the insertion order of rows sharing a timestamp
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    pub async fn push(&self, uuid: &str, socket: u32, sample: MetricSample) {
        self.extend(uuid, socket, [sample]).await;
    }

    pub async fn clear(&self) {
        self.series.write().await.clear();
    }

    pub async fn row_count(&self) -> usize {
        self.series.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn query(&self, query: &TelemetryQuery) -> ScorerResult<Vec<MetricSample>> {
        let series = self.series.read().await;
        let Some(rows) = series.get(&(query.node_uuid.clone(), query.socket)) else {
            return Ok(Vec::new());
        };

        let rows = rows
            .iter()
            .filter(|row| match (&query.cores, row.core_id) {
                (Some(cores), Some(core)) => cores.contains(&core),
                (None, None) => true,
                _ => false,
            })
            .take(query.limit)
            .map(|row| {
                let mut row = row.clone();
                row.values
                    .retain(|name, _| query.metrics.iter().any(|m| m.as_str() == name));
                row
            })
            .collect();

        Ok(rows)
    }
}
