//! Error types for the scoring engine

use crate::models::Metric;
use thiserror::Error;

/// Errors raised while loading topology, aggregating telemetry or scoring nodes
#[derive(Debug, Error)]
pub enum ScorerError {
    /// A raw telemetry value could not be interpreted as a number
    #[error("cannot parse value {value:?} for metric {metric}")]
    Parse { metric: String, value: String },

    /// No samples were available to aggregate
    #[error("no samples to aggregate for metric {0}")]
    EmptyInput(Metric),

    /// Aggregated samples did not carry a metric the caller asked for
    #[error("metric {0} missing from telemetry")]
    MissingMetric(Metric),

    #[error("node not found in topology: {0}")]
    TopologyNotFound(String),

    #[error("socket {socket} not found on node {node}")]
    UnknownSocket { node: String, socket: u32 },

    /// The telemetry store could not be reached or the query failed
    #[error("telemetry unavailable: {0}")]
    TelemetryUnavailable(String),

    #[error("configuration unreadable: {0}")]
    ConfigUnreadable(String),

    #[error("unknown application profile: {0}")]
    UnknownProfile(String),
}

impl ScorerError {
    /// True for failures of the telemetry store itself, which callers treat
    /// as "node unscored" rather than a hard error.
    pub fn is_telemetry_failure(&self) -> bool {
        matches!(self, ScorerError::TelemetryUnavailable(_))
    }
}

impl From<config::ConfigError> for ScorerError {
    fn from(err: config::ConfigError) -> Self {
        ScorerError::ConfigUnreadable(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type ScorerResult<T> = Result<T, ScorerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_failure_classification() {
        assert!(ScorerError::TelemetryUnavailable("timeout".into()).is_telemetry_failure());
        assert!(!ScorerError::EmptyInput(Metric::Ipc).is_telemetry_failure());
        assert!(!ScorerError::TopologyNotFound("kube-09".into()).is_telemetry_failure());
    }

    #[test]
    fn test_error_messages_name_the_subject() {
        let err = ScorerError::Parse {
            metric: "ipc".into(),
            value: "n/a".into(),
        };
        assert_eq!(err.to_string(), "cannot parse value \"n/a\" for metric ipc");

        let err = ScorerError::UnknownSocket {
            node: "kube-01".into(),
            socket: 3,
        };
        assert!(err.to_string().contains("kube-01"));
    }
}
