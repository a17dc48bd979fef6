//! Socket selection for a candidate node
//!
//! For every socket of the node the selector takes cached metrics when they
//! are fully known and otherwise aggregates a fresh window from the
//! telemetry store. The base score comes from the configured
//! [`ScoringStrategy`], is gated by idle capacity, and the best socket's
//! score is finally weighted by the node's hardware class.

use crate::aggregator::{weighted_average, weighted_average_cores};
use crate::cache::{TelemetryCache, IDLE_EPSILON};
use crate::error::{ScorerError, ScorerResult};
use crate::health::{components, HealthRegistry};
use crate::heterogeneity;
use crate::models::{Metric, MetricSample, MetricSet, PerformanceMetrics};
use crate::observability::ScorerMetrics;
use crate::scoring::ScoringStrategy;
use crate::store::{TelemetryQuery, TelemetryStore};
use crate::topology::{Node, Socket, Topology};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(20);

/// Interval at which the monitoring pipeline writes samples
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// How the idle-capacity gate counts sockets with spare cores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleGateMode {
    /// Only sockets evaluated earlier in topology order lift the penalty
    #[default]
    InOrder,
    /// All sockets of the node are measured before any penalty is applied
    Deferred,
}

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Telemetry window aggregated on a cache miss
    pub window: Duration,
    pub sample_interval: Duration,
    pub strategy: ScoringStrategy,
    pub idle_gate: IdleGateMode,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            strategy: ScoringStrategy::default(),
            idle_gate: IdleGateMode::default(),
        }
    }
}

impl SelectorConfig {
    /// Number of samples per socket covering the window
    pub fn rows_per_window(&self) -> usize {
        let interval = self.sample_interval.as_nanos();
        if interval == 0 {
            return 1;
        }
        ((self.window.as_nanos() / interval) as usize).max(1)
    }
}

/// Per-socket breakdown of a scoring call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketScore {
    pub socket: u32,
    pub cores: usize,
    pub base_score: f64,
    /// Idle residency fraction, absent when it could not be determined
    pub c6res: Option<f64>,
    /// Score after the idle-capacity gate
    pub gated_score: f64,
    pub eligible: bool,
}

impl SocketScore {
    fn measured(socket: &Socket, base_score: f64, c6res: f64) -> Self {
        Self {
            socket: socket.id,
            cores: socket.core_count(),
            base_score,
            c6res: Some(c6res),
            gated_score: base_score,
            eligible: true,
        }
    }

    fn ineligible(socket: &Socket) -> Self {
        Self {
            socket: socket.id,
            cores: socket.core_count(),
            base_score: 0.0,
            c6res: None,
            gated_score: 0.0,
            eligible: false,
        }
    }

    /// Idle residency expressed in whole cores
    pub fn idle_core_equivalent(&self) -> Option<f64> {
        self.c6res.map(|c6| c6 * self.cores as f64)
    }

    fn has_spare_core(&self) -> bool {
        self.eligible && self.idle_core_equivalent().is_some_and(|idle| idle >= 1.0)
    }
}

/// Outcome of scoring one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub node: String,
    /// Gated score of the winning socket
    pub score: f64,
    pub socket: Option<u32>,
    pub core_count: usize,
    /// Score weighted by the node's hardware class
    pub final_score: f64,
    pub window_secs: u64,
    pub sockets: Vec<SocketScore>,
}

/// Apply the idle-capacity gate to measured sockets.
///
/// While no socket counted so far has a whole idle core, a socket's
/// score is multiplied by its idle fraction. Ineligible sockets score 0.
pub fn apply_idle_gate(sockets: &mut [SocketScore], mode: IdleGateMode) {
    fn gated(socket: &SocketScore, tally: usize) -> f64 {
        match socket.c6res {
            Some(c6) if tally < 1 => socket.base_score * c6,
            _ => socket.base_score,
        }
    }

    match mode {
        IdleGateMode::InOrder => {
            let mut tally = 0;
            for socket in sockets.iter_mut() {
                if socket.has_spare_core() {
                    tally += 1;
                }
                socket.gated_score = if socket.eligible {
                    gated(socket, tally)
                } else {
                    0.0
                };
            }
        }
        IdleGateMode::Deferred => {
            let tally = sockets.iter().filter(|s| s.has_spare_core()).count();
            for socket in sockets.iter_mut() {
                socket.gated_score = if socket.eligible {
                    gated(socket, tally)
                } else {
                    0.0
                };
            }
        }
    }
}

/// First socket with the strictly highest positive gated score
pub fn pick_winner(sockets: &[SocketScore]) -> Option<&SocketScore> {
    let mut best = None;
    let mut max = 0.0;
    for socket in sockets {
        if socket.gated_score > max {
            max = socket.gated_score;
            best = Some(socket);
        }
    }
    best
}

pub struct SocketSelector {
    topology: Arc<Topology>,
    cache: Arc<TelemetryCache>,
    store: Arc<dyn TelemetryStore>,
    config: SelectorConfig,
    metrics: ScorerMetrics,
    health: HealthRegistry,
}

impl SocketSelector {
    pub fn new(
        topology: Arc<Topology>,
        cache: Arc<TelemetryCache>,
        store: Arc<dyn TelemetryStore>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            topology,
            cache,
            store,
            config,
            metrics: ScorerMetrics::new(),
            health: HealthRegistry::new(),
        }
    }

    /// Report telemetry store health into a shared registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn cache(&self) -> &Arc<TelemetryCache> {
        &self.cache
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Score every socket of `node_name` and pick the best one.
    ///
    /// Fails with `TopologyNotFound` before touching the cache, and with
    /// `TelemetryUnavailable` only when the store failed for every socket.
    pub async fn score_node(&self, node_name: &str) -> ScorerResult<ScoringResult> {
        let started = Instant::now();
        let node = self.topology.require_node(node_name)?;

        if self.cache.invalidate_if_expired().await {
            self.metrics.inc_cache_sweeps();
            debug!(node = %node_name, "Telemetry cache expired before scoring");
        }

        let mut sockets = Vec::with_capacity(node.sockets.len());
        let mut store_failures = 0;
        let mut last_store_error = None;

        for socket in &node.sockets {
            match self.evaluate_socket(node, socket).await {
                Ok(score) => sockets.push(score),
                Err(err) => {
                    self.metrics.inc_ineligible_sockets();
                    if err.is_telemetry_failure() {
                        warn!(node = %node.name, socket = socket.id, error = %err, "Telemetry fetch failed, socket ineligible");
                        store_failures += 1;
                        last_store_error = Some(err);
                    } else {
                        debug!(node = %node.name, socket = socket.id, error = %err, "Socket metrics unusable, socket ineligible");
                    }
                    sockets.push(SocketScore::ineligible(socket));
                }
            }
        }

        if store_failures == node.sockets.len() {
            if let Some(err) = last_store_error {
                self.metrics.inc_scoring_failures();
                return Err(err);
            }
        }

        apply_idle_gate(&mut sockets, self.config.idle_gate);

        let (score, socket, core_count) = match pick_winner(&sockets) {
            Some(winner) => (winner.gated_score, Some(winner.socket), winner.cores),
            None => (0.0, None, 0),
        };
        let final_score = heterogeneity::adjust(score, self.topology.hardware_class(node));

        self.metrics
            .observe_scoring_latency(started.elapsed().as_secs_f64());
        self.metrics.inc_nodes_scored();

        Ok(ScoringResult {
            node: node.name.clone(),
            score,
            socket,
            core_count,
            final_score,
            window_secs: self.config.window.as_secs(),
            sockets,
        })
    }

    /// Idle residency of the whole node in core units
    pub async fn idle_core_equivalent(&self, node_name: &str) -> ScorerResult<f64> {
        let node = self.topology.require_node(node_name)?;

        let mut total = 0.0;
        let mut store_failures = 0;
        let mut last_store_error = None;

        for socket in &node.sockets {
            let (cached, _) = self.cache.get(&node.name, socket.id).await;
            let c6 = match cached.idle_fraction() {
                Some(c6) => Ok(c6),
                None => self.pooled_idle_fraction(node, socket).await,
            };
            match c6 {
                Ok(c6) => total += c6 * socket.core_count() as f64,
                Err(err) if err.is_telemetry_failure() => {
                    store_failures += 1;
                    last_store_error = Some(err);
                }
                Err(err) => {
                    debug!(node = %node.name, socket = socket.id, error = %err, "Idle residency unavailable");
                }
            }
        }

        match last_store_error {
            Some(err) if store_failures == node.sockets.len() => Err(err),
            _ => Ok(total),
        }
    }

    async fn evaluate_socket(&self, node: &Node, socket: &Socket) -> ScorerResult<SocketScore> {
        let strategy = self.config.strategy;
        let (cached, fresh) = self.cache.get(&node.name, socket.id).await;

        let measured = match cached.performance() {
            Some(perf) if fresh && strategy.is_cacheable() => {
                self.metrics.inc_cache_hits();
                MetricSet::from(perf)
            }
            _ => {
                self.metrics.inc_cache_misses();
                let metrics = strategy.fetch_metrics();
                let samples = self
                    .fetch(TelemetryQuery {
                        metrics: metrics.clone(),
                        node_uuid: node.uuid.clone(),
                        socket: socket.id,
                        cores: None,
                        limit: self.config.rows_per_window(),
                    })
                    .await?;
                weighted_average(&samples, &metrics)?
            }
        };

        let base_score = strategy.score(&measured)?;

        let c6res = match cached.idle_fraction() {
            Some(c6) => c6,
            None => {
                let c6 = self
                    .pooled_idle_fraction(node, socket)
                    .await?
                    .max(IDLE_EPSILON);
                let perf = PerformanceMetrics::from_set(&measured)?;
                self.cache
                    .update_cache(&node.name, socket.id, perf, c6)
                    .await;
                c6
            }
        };

        debug!(
            node = %node.name,
            socket = socket.id,
            base_score = base_score,
            c6res = c6res,
            "Socket measured"
        );

        Ok(SocketScore::measured(socket, base_score, c6res))
    }

    /// Idle residency of a socket, pooled across its cores
    async fn pooled_idle_fraction(&self, node: &Node, socket: &Socket) -> ScorerResult<f64> {
        let cores = socket.core_ids();
        let samples = self
            .fetch(TelemetryQuery {
                metrics: vec![Metric::C6Res],
                node_uuid: node.uuid.clone(),
                socket: socket.id,
                limit: self.config.rows_per_window() * cores.len().max(1),
                cores: Some(cores),
            })
            .await?;

        weighted_average_cores(&samples, &[Metric::C6Res])?.require(Metric::C6Res)
    }

    async fn fetch(&self, query: TelemetryQuery) -> ScorerResult<Vec<MetricSample>> {
        let started = Instant::now();
        let result = self.store.query(&query).await;
        self.metrics
            .observe_telemetry_latency(started.elapsed().as_secs_f64());

        match result {
            Ok(samples) => {
                self.health
                    .report_success(components::TELEMETRY_STORE)
                    .await;
                Ok(samples)
            }
            Err(err) => {
                self.metrics.inc_telemetry_errors();
                let err = match err {
                    ScorerError::TelemetryUnavailable(_) => err,
                    other => ScorerError::TelemetryUnavailable(other.to_string()),
                };
                self.health
                    .report_failure(components::TELEMETRY_STORE, err.to_string())
                    .await;
                Err(err)
            }
        }
    }
}
