//! Bridge between the socket selector and the orchestrator
//!
//! The orchestrator asks for priorities of candidate hosts and later reports
//! where a workload actually landed. Host priorities carry the winning
//! socket, its core count and the heterogeneity-adjusted score in addition
//! to the plain score.

use crate::error::{ScorerError, ScorerResult};
use crate::observability::{ScorerMetrics, StructuredLogger};
use crate::profiles::ProfileCatalog;
use crate::selector::{ScoringResult, SocketSelector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// The workload being placed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    /// Application profile name, if the workload is a known application.
    /// Informational only: scores describe the host, not the workload, so
    /// the profile is logged but does not change the ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Scoring record handed back to the orchestrator for one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub socket: Option<u32>,
    pub score: f64,
    pub num_cores: usize,
    pub final_score: f64,
    pub window_secs: u64,
}

impl From<&ScoringResult> for HostPriority {
    fn from(result: &ScoringResult) -> Self {
        Self {
            host: result.node.clone(),
            socket: result.socket,
            score: result.score,
            num_cores: result.core_count,
            final_score: result.final_score,
            window_secs: result.window_secs,
        }
    }
}

/// A host that could not be scored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFailure {
    pub host: String,
    pub reason: String,
    /// Telemetry outages may clear up; unknown hosts will not
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityList {
    pub workload: String,
    /// Scored hosts, best first
    pub priorities: Vec<HostPriority>,
    pub failures: Vec<NodeFailure>,
}

/// A committed placement of a workload onto a socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub node: String,
    pub socket: u32,
    pub profile: String,
    #[serde(default = "default_counts_toward_idle")]
    pub counts_toward_idle: bool,
}

fn default_counts_toward_idle() -> bool {
    true
}

pub struct PriorityAdapter {
    selector: Arc<SocketSelector>,
    profiles: Arc<ProfileCatalog>,
    metrics: ScorerMetrics,
    logger: StructuredLogger,
}

impl PriorityAdapter {
    pub fn new(
        selector: Arc<SocketSelector>,
        profiles: Arc<ProfileCatalog>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            selector,
            profiles,
            metrics: ScorerMetrics::new(),
            logger,
        }
    }

    pub fn selector(&self) -> &Arc<SocketSelector> {
        &self.selector
    }

    pub fn profiles(&self) -> &ProfileCatalog {
        &self.profiles
    }

    /// Score a single node
    pub async fn score(&self, node: &str) -> ScorerResult<ScoringResult> {
        match self.selector.score_node(node).await {
            Ok(result) => {
                self.log_scored(&result);
                Ok(result)
            }
            Err(err) => {
                self.logger.log_scoring_failed(node, &err.to_string());
                Err(err)
            }
        }
    }

    /// Score every candidate host concurrently.
    ///
    /// Hosts that fail are reported separately; the orchestrator decides
    /// whether to drop or retry them.
    pub async fn prioritize(&self, workload: &Workload, hosts: &[String]) -> PriorityList {
        debug!(
            workload = %workload.name,
            profile = workload.profile.as_deref().unwrap_or("-"),
            hosts = hosts.len(),
            "Prioritizing hosts"
        );

        let mut tasks = JoinSet::new();
        let mut task_hosts = HashMap::with_capacity(hosts.len());
        for host in hosts {
            let selector = self.selector.clone();
            let owned = host.clone();
            let handle = tasks.spawn(async move {
                let result = selector.score_node(&owned).await;
                (owned, result)
            });
            task_hosts.insert(handle.id(), host.clone());
        }

        let mut priorities = Vec::with_capacity(hosts.len());
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(result))) => {
                    self.log_scored(&result);
                    priorities.push(HostPriority::from(&result));
                }
                Ok((host, Err(err))) => {
                    self.logger.log_scoring_failed(&host, &err.to_string());
                    failures.push(NodeFailure {
                        retryable: err.is_telemetry_failure(),
                        reason: err.to_string(),
                        host,
                    });
                }
                Err(err) => {
                    let host = task_hosts.remove(&err.id()).unwrap_or_default();
                    warn!(workload = %workload.name, host = %host, error = %err, "Scoring task failed");
                    self.logger.log_scoring_failed(&host, &err.to_string());
                    failures.push(NodeFailure {
                        host,
                        reason: format!("scoring task failed: {}", err),
                        retryable: true,
                    });
                }
            }
        }

        priorities.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| a.host.cmp(&b.host))
        });
        failures.sort_by(|a, b| a.host.cmp(&b.host));

        PriorityList {
            workload: workload.name.clone(),
            priorities,
            failures,
        }
    }

    /// Apply a committed placement to the telemetry cache.
    ///
    /// Validates node, socket and profile first so a bad request never
    /// touches the cache.
    pub async fn record_placement(&self, placement: &Placement) -> ScorerResult<()> {
        let node = self.selector.topology().require_node(&placement.node)?;
        let socket = node
            .socket(placement.socket)
            .ok_or_else(|| ScorerError::UnknownSocket {
                node: placement.node.clone(),
                socket: placement.socket,
            })?;
        let profile = self.profiles.require(&placement.profile)?;

        self.selector
            .cache()
            .add_app_metrics(
                &node.name,
                socket.id,
                profile,
                socket.core_count(),
                placement.counts_toward_idle,
            )
            .await;

        self.metrics.inc_placements_recorded();
        self.logger.log_placement(
            &node.name,
            socket.id,
            &placement.profile,
            placement.counts_toward_idle,
        );
        Ok(())
    }

    /// Reset every cached entry to unknown
    pub async fn flush_cache(&self) {
        self.selector.cache().clean_cache().await;
        self.metrics.inc_cache_sweeps();
        self.logger.log_cache_swept("flush requested");
    }

    fn log_scored(&self, result: &ScoringResult) {
        self.logger.log_node_scored(
            &result.node,
            result.socket,
            result.score,
            result.final_score,
            result.core_count,
            result.window_secs,
        );
    }
}
