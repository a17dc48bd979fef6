//! Observability for the scoring engine
//!
//! Provides:
//! - Prometheus metrics (scoring and telemetry latency, cache activity, failures)
//! - Structured JSON logging with tracing

use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

static GLOBAL_METRICS: OnceLock<ScorerMetricsInner> = OnceLock::new();

struct ScorerMetricsInner {
    scoring_latency_seconds: Histogram,
    telemetry_query_latency_seconds: Histogram,
    nodes_scored: IntCounter,
    scoring_failures: IntCounter,
    ineligible_sockets: IntCounter,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    cache_sweeps: IntCounter,
    telemetry_errors: IntCounter,
    placements_recorded: IntCounter,
}

impl ScorerMetricsInner {
    fn new() -> Self {
        Self {
            scoring_latency_seconds: register_histogram!(
                "socket_scorer_scoring_latency_seconds",
                "Time spent scoring one node",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scoring_latency_seconds"),

            telemetry_query_latency_seconds: register_histogram!(
                "socket_scorer_telemetry_query_latency_seconds",
                "Time spent waiting on the telemetry store",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register telemetry_query_latency_seconds"),

            nodes_scored: register_int_counter!(
                "socket_scorer_nodes_scored_total",
                "Nodes scored successfully"
            )
            .expect("Failed to register nodes_scored"),

            scoring_failures: register_int_counter!(
                "socket_scorer_scoring_failures_total",
                "Nodes that could not be scored"
            )
            .expect("Failed to register scoring_failures"),

            ineligible_sockets: register_int_counter!(
                "socket_scorer_ineligible_sockets_total",
                "Sockets scored as zero because their metrics could not be refreshed"
            )
            .expect("Failed to register ineligible_sockets"),

            cache_hits: register_int_counter!(
                "socket_scorer_cache_hits_total",
                "Socket metrics served from the telemetry cache"
            )
            .expect("Failed to register cache_hits"),

            cache_misses: register_int_counter!(
                "socket_scorer_cache_misses_total",
                "Socket metrics fetched from the telemetry store"
            )
            .expect("Failed to register cache_misses"),

            cache_sweeps: register_int_counter!(
                "socket_scorer_cache_sweeps_total",
                "Times the telemetry cache was reset to unknown"
            )
            .expect("Failed to register cache_sweeps"),

            telemetry_errors: register_int_counter!(
                "socket_scorer_telemetry_errors_total",
                "Failed telemetry store queries"
            )
            .expect("Failed to register telemetry_errors"),

            placements_recorded: register_int_counter!(
                "socket_scorer_placements_recorded_total",
                "Placements applied to the telemetry cache"
            )
            .expect("Failed to register placements_recorded"),
        }
    }
}

/// Handle to the process-wide scorer metrics.
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct ScorerMetrics {
    _private: (),
}

impl Default for ScorerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScorerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScorerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScorerMetricsInner {
        GLOBAL_METRICS.get_or_init(ScorerMetricsInner::new)
    }

    pub fn observe_scoring_latency(&self, duration_secs: f64) {
        self.inner().scoring_latency_seconds.observe(duration_secs);
    }

    pub fn observe_telemetry_latency(&self, duration_secs: f64) {
        self.inner()
            .telemetry_query_latency_seconds
            .observe(duration_secs);
    }

    pub fn inc_nodes_scored(&self) {
        self.inner().nodes_scored.inc();
    }

    pub fn inc_scoring_failures(&self) {
        self.inner().scoring_failures.inc();
    }

    pub fn inc_ineligible_sockets(&self) {
        self.inner().ineligible_sockets.inc();
    }

    pub fn inc_cache_hits(&self) {
        self.inner().cache_hits.inc();
    }

    pub fn inc_cache_misses(&self) {
        self.inner().cache_misses.inc();
    }

    pub fn inc_cache_sweeps(&self) {
        self.inner().cache_sweeps.inc();
    }

    pub fn inc_telemetry_errors(&self) {
        self.inner().telemetry_errors.inc();
    }

    pub fn inc_placements_recorded(&self) {
        self.inner().placements_recorded.inc();
    }
}

/// Event-tagged logging for scoring decisions and cache lifecycle
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log the outcome of scoring one node
    pub fn log_node_scored(
        &self,
        node: &str,
        socket: Option<u32>,
        score: f64,
        final_score: f64,
        cores: usize,
        window_secs: u64,
    ) {
        info!(
            event = "node_scored",
            instance = %self.instance,
            node = %node,
            socket = ?socket,
            score = score,
            final_score = final_score,
            cores = cores,
            window_secs = window_secs,
            "Node scored"
        );
    }

    pub fn log_scoring_failed(&self, node: &str, reason: &str) {
        warn!(
            event = "node_scoring_failed",
            instance = %self.instance,
            node = %node,
            reason = %reason,
            "Node left unscored"
        );
    }

    /// Log a placement applied to the cache
    pub fn log_placement(&self, node: &str, socket: u32, profile: &str, counts_toward_idle: bool) {
        info!(
            event = "placement_recorded",
            instance = %self.instance,
            node = %node,
            socket = socket,
            profile = %profile,
            counts_toward_idle = counts_toward_idle,
            "Placement applied to telemetry cache"
        );
    }

    pub fn log_cache_swept(&self, reason: &str) {
        info!(
            event = "cache_swept",
            instance = %self.instance,
            reason = %reason,
            "Telemetry cache reset"
        );
    }

    pub fn log_startup(&self, version: &str, nodes: usize, sockets: usize) {
        info!(
            event = "scorer_started",
            instance = %self.instance,
            version = %version,
            nodes = nodes,
            sockets = sockets,
            "Socket scorer started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "scorer_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Socket scorer shutting down"
        );
    }
}
