//! Pluggable score functions
//!
//! A strategy turns one socket's aggregated metrics into a base score where
//! larger is better. Denominators are clamped to [`SCORE_EPSILON`].

use crate::error::ScorerResult;
use crate::models::{Metric, MetricSet, PerformanceMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound for any quantity used as a divisor
pub const SCORE_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Instructions per cycle per unit of memory bandwidth
    #[default]
    IpcPerBandwidth,
    IpcOnly,
    /// Fewer last-level cache misses is better
    InverseL3Misses,
    /// Lower package energy draw is better
    InverseEnergy,
}

impl ScoringStrategy {
    /// Metrics the strategy reads
    pub fn required_metrics(&self) -> &'static [Metric] {
        match self {
            ScoringStrategy::IpcPerBandwidth => &[Metric::Ipc, Metric::MemRead, Metric::MemWrite],
            ScoringStrategy::IpcOnly => &[Metric::Ipc],
            ScoringStrategy::InverseL3Misses => &[Metric::L3Misses],
            ScoringStrategy::InverseEnergy => &[Metric::ProcEnergy],
        }
    }

    /// Metrics to request from the telemetry store on a cache miss.
    ///
    /// The cached triple is always fetched so the result can be written back.
    pub fn fetch_metrics(&self) -> Vec<Metric> {
        let mut metrics = PerformanceMetrics::METRICS.to_vec();
        for m in self.required_metrics() {
            if !metrics.contains(m) {
                metrics.push(*m);
            }
        }
        metrics
    }

    /// Whether cached entries carry everything this strategy needs
    pub fn is_cacheable(&self) -> bool {
        self.required_metrics()
            .iter()
            .all(|m| PerformanceMetrics::METRICS.contains(m))
    }

    pub fn score(&self, metrics: &MetricSet) -> ScorerResult<f64> {
        let score = match self {
            ScoringStrategy::IpcPerBandwidth => {
                let ipc = metrics.require(Metric::Ipc)?;
                let bandwidth =
                    metrics.require(Metric::MemRead)? + metrics.require(Metric::MemWrite)?;
                ipc / bandwidth.max(SCORE_EPSILON)
            }
            ScoringStrategy::IpcOnly => metrics.require(Metric::Ipc)?,
            ScoringStrategy::InverseL3Misses => {
                1.0 / metrics.require(Metric::L3Misses)?.max(SCORE_EPSILON)
            }
            ScoringStrategy::InverseEnergy => {
                1.0 / metrics.require(Metric::ProcEnergy)?.max(SCORE_EPSILON)
            }
        };
        Ok(score)
    }
}

impl fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoringStrategy::IpcPerBandwidth => "ipc_per_bandwidth",
            ScoringStrategy::IpcOnly => "ipc_only",
            ScoringStrategy::InverseL3Misses => "inverse_l3_misses",
            ScoringStrategy::InverseEnergy => "inverse_energy",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScorerError;

    fn set(ipc: f64, read: f64, write: f64) -> MetricSet {
        MetricSet {
            ipc: Some(ipc),
            mem_read: Some(read),
            mem_write: Some(write),
            ..MetricSet::default()
        }
    }

    #[test]
    fn test_default_strategy_is_ipc_per_bandwidth() {
        let strategy = ScoringStrategy::default();
        assert_eq!(strategy, ScoringStrategy::IpcPerBandwidth);
        let score = strategy.score(&set(2.0, 0.1, 0.1)).unwrap();
        assert!((score - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_bandwidth_is_clamped() {
        let score = ScoringStrategy::IpcPerBandwidth
            .score(&set(1.0, 0.0, 0.0))
            .unwrap();
        assert!(score.is_finite());
        assert_eq!(score, 1.0 / SCORE_EPSILON);
    }

    #[test]
    fn test_alternate_strategies() {
        let mut metrics = set(1.7, 0.3, 0.2);
        metrics.l3m = Some(4.0);
        metrics.procnrg = Some(0.0);

        assert_eq!(ScoringStrategy::IpcOnly.score(&metrics).unwrap(), 1.7);
        assert_eq!(ScoringStrategy::InverseL3Misses.score(&metrics).unwrap(), 0.25);
        assert!(ScoringStrategy::InverseEnergy.score(&metrics).unwrap().is_finite());
    }

    #[test]
    fn test_missing_metric_is_reported() {
        let err = ScoringStrategy::InverseL3Misses
            .score(&set(1.0, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, ScorerError::MissingMetric(Metric::L3Misses)));
    }

    #[test]
    fn test_cacheability_and_fetch_set() {
        assert!(ScoringStrategy::IpcPerBandwidth.is_cacheable());
        assert!(ScoringStrategy::IpcOnly.is_cacheable());
        assert!(!ScoringStrategy::InverseEnergy.is_cacheable());

        let fetch = ScoringStrategy::InverseL3Misses.fetch_metrics();
        assert_eq!(
            fetch,
            vec![Metric::Ipc, Metric::MemRead, Metric::MemWrite, Metric::L3Misses]
        );
    }

    #[test]
    fn test_strategy_names_match_serde() {
        for strategy in [
            ScoringStrategy::IpcPerBandwidth,
            ScoringStrategy::IpcOnly,
            ScoringStrategy::InverseL3Misses,
            ScoringStrategy::InverseEnergy,
        ] {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{strategy}\""));
        }
    }
}
