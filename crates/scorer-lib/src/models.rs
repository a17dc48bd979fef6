//! Core data models shared by the aggregator, cache and selector

use crate::error::{ScorerError, ScorerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Hardware performance counters understood by the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "ipc")]
    Ipc,
    #[serde(rename = "mem_read")]
    MemRead,
    #[serde(rename = "mem_write")]
    MemWrite,
    #[serde(rename = "c6res")]
    C6Res,
    #[serde(rename = "l3m")]
    L3Misses,
    #[serde(rename = "procnrg")]
    ProcEnergy,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Ipc,
        Metric::MemRead,
        Metric::MemWrite,
        Metric::C6Res,
        Metric::L3Misses,
        Metric::ProcEnergy,
    ];

    /// Field name used by the telemetry store
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Ipc => "ipc",
            Metric::MemRead => "mem_read",
            Metric::MemWrite => "mem_write",
            Metric::C6Res => "c6res",
            Metric::L3Misses => "l3m",
            Metric::ProcEnergy => "procnrg",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ScorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ScorerError::ConfigUnreadable(format!("unknown metric {s:?}")))
    }
}

/// One row returned by the telemetry store
///
/// Values are kept raw until aggregation so that a malformed field only
/// fails the metric it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Core the row was measured on, absent for socket-level rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_id: Option<u32>,
    pub values: HashMap<String, serde_json::Value>,
}

impl MetricSample {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            core_id: None,
            values: HashMap::new(),
        }
    }

    /// Builder-style setter for a numeric value
    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.values
            .insert(metric.as_str().to_string(), serde_json::Value::from(value));
        self
    }

    pub fn on_core(mut self, core_id: u32) -> Self {
        self.core_id = Some(core_id);
        self
    }

    /// Read a metric as a float.
    ///
    /// Numbers and numeric strings are accepted. Returns `Ok(None)` when the
    /// row does not carry the metric at all.
    pub fn value(&self, metric: Metric) -> ScorerResult<Option<f64>> {
        let Some(raw) = self.values.get(metric.as_str()) else {
            return Ok(None);
        };

        let parsed = match raw {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(ScorerError::Parse {
                metric: metric.as_str().to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Aggregated metric values with one named slot per metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_read: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_write: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c6res: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procnrg: Option<f64>,
}

impl MetricSet {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ipc => self.ipc,
            Metric::MemRead => self.mem_read,
            Metric::MemWrite => self.mem_write,
            Metric::C6Res => self.c6res,
            Metric::L3Misses => self.l3m,
            Metric::ProcEnergy => self.procnrg,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        let slot = match metric {
            Metric::Ipc => &mut self.ipc,
            Metric::MemRead => &mut self.mem_read,
            Metric::MemWrite => &mut self.mem_write,
            Metric::C6Res => &mut self.c6res,
            Metric::L3Misses => &mut self.l3m,
            Metric::ProcEnergy => &mut self.procnrg,
        };
        *slot = Some(value);
    }

    /// Value of a metric, failing with `MissingMetric` when absent
    pub fn require(&self, metric: Metric) -> ScorerResult<f64> {
        self.get(metric).ok_or(ScorerError::MissingMetric(metric))
    }
}

/// The three throughput/bandwidth signals cached per socket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub ipc: f64,
    pub mem_read: f64,
    pub mem_write: f64,
}

impl PerformanceMetrics {
    pub const METRICS: [Metric; 3] = [Metric::Ipc, Metric::MemRead, Metric::MemWrite];

    pub fn from_set(set: &MetricSet) -> ScorerResult<Self> {
        Ok(Self {
            ipc: set.require(Metric::Ipc)?,
            mem_read: set.require(Metric::MemRead)?,
            mem_write: set.require(Metric::MemWrite)?,
        })
    }
}

impl From<PerformanceMetrics> for MetricSet {
    fn from(perf: PerformanceMetrics) -> Self {
        MetricSet {
            ipc: Some(perf.ipc),
            mem_read: Some(perf.mem_read),
            mem_write: Some(perf.mem_write),
            ..MetricSet::default()
        }
    }
}

/// Cache key for one socket of one node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocketKey {
    pub node: String,
    pub socket: u32,
}

impl SocketKey {
    pub fn new(node: impl Into<String>, socket: u32) -> Self {
        Self {
            node: node.into(),
            socket,
        }
    }
}

impl fmt::Display for SocketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.socket)
    }
}
