//! Per-socket telemetry cache
//!
//! Holds the last known metrics for every (node, socket) pair behind one
//! lock, with a single freshness timer shared by all entries. Any
//! `update_cache` pushes the deadline back; once the deadline passes with no
//! update the whole cache is reset to [`SENTINEL`].
//!
//! The lock is only held for in-memory reads and writes, never across a
//! telemetry store call.

use crate::models::{PerformanceMetrics, SocketKey};
use crate::observability::ScorerMetrics;
use crate::profiles::AppProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Marker for "unknown, query the store"
pub const SENTINEL: f64 = -1.0;

/// Floor for the cached idle residency after placements
pub const IDLE_EPSILON: f64 = 1e-8;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

/// Last known metrics of one socket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub ipc: f64,
    pub mem_read: f64,
    pub mem_write: f64,
    pub c6res: f64,
}

impl CacheEntry {
    pub const UNKNOWN: CacheEntry = CacheEntry {
        ipc: SENTINEL,
        mem_read: SENTINEL,
        mem_write: SENTINEL,
        c6res: SENTINEL,
    };

    /// True when no field holds the sentinel
    pub fn is_fresh(&self) -> bool {
        [self.ipc, self.mem_read, self.mem_write, self.c6res]
            .iter()
            .all(|v| *v != SENTINEL)
    }

    pub fn performance(&self) -> Option<PerformanceMetrics> {
        let fields = [self.ipc, self.mem_read, self.mem_write];
        if fields.contains(&SENTINEL) {
            return None;
        }
        Some(PerformanceMetrics {
            ipc: self.ipc,
            mem_read: self.mem_read,
            mem_write: self.mem_write,
        })
    }

    pub fn idle_fraction(&self) -> Option<f64> {
        (self.c6res != SENTINEL).then_some(self.c6res)
    }
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// One row of [`TelemetryCache::snapshot`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSocket {
    pub node: String,
    pub socket: u32,
    #[serde(flatten)]
    pub entry: CacheEntry,
    pub fresh: bool,
}

struct CacheState {
    entries: HashMap<SocketKey, CacheEntry>,
    refreshed_at: Instant,
}

pub struct TelemetryCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

impl TelemetryCache {
    /// Create a cache with every given key seeded as unknown
    pub fn new(ttl: Duration, keys: impl IntoIterator<Item = SocketKey>) -> Self {
        let entries = keys
            .into_iter()
            .map(|key| (key, CacheEntry::UNKNOWN))
            .collect();

        Self {
            state: Mutex::new(CacheState {
                entries,
                refreshed_at: Instant::now(),
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current entry and whether every field is known
    pub async fn get(&self, node: &str, socket: u32) -> (CacheEntry, bool) {
        let state = self.state.lock().await;
        let entry = state
            .entries
            .get(&SocketKey::new(node, socket))
            .copied()
            .unwrap_or(CacheEntry::UNKNOWN);
        (entry, entry.is_fresh())
    }

    /// Overwrite all four fields from a fresh measurement and restart the
    /// freshness timer.
    pub async fn update_cache(
        &self,
        node: &str,
        socket: u32,
        metrics: PerformanceMetrics,
        idle_fraction: f64,
    ) {
        let mut state = self.state.lock().await;
        state.entries.insert(
            SocketKey::new(node, socket),
            CacheEntry {
                ipc: metrics.ipc,
                mem_read: metrics.mem_read,
                mem_write: metrics.mem_write,
                c6res: idle_fraction,
            },
        );
        state.refreshed_at = Instant::now();
    }

    /// Fold a freshly placed workload into the cached metrics.
    ///
    /// Memory traffic is added to known values. When the workload counts
    /// toward idle capacity, the idle fraction drops by the share of one
    /// core the workload keeps busy, floored at [`IDLE_EPSILON`]. IPC is left
    /// untouched. Unknown fields stay unknown.
    ///
    /// Returns false when the key is not cached.
    pub async fn add_app_metrics(
        &self,
        node: &str,
        socket: u32,
        profile: &AppProfile,
        core_count: usize,
        counts_toward_idle: bool,
    ) -> bool {
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.get_mut(&SocketKey::new(node, socket)) else {
            warn!(node = %node, socket = socket, "Placement for socket missing from cache");
            return false;
        };

        if entry.mem_read != SENTINEL {
            entry.mem_read += profile.mem_read;
        }
        if entry.mem_write != SENTINEL {
            entry.mem_write += profile.mem_write;
        }
        if counts_toward_idle && entry.c6res != SENTINEL {
            let busy_share = (100.0 - profile.c6res) / (100.0 * core_count.max(1) as f64);
            entry.c6res = (entry.c6res - busy_share).max(IDLE_EPSILON);
        }

        debug!(node = %node, socket = socket, entry = ?entry, "Applied placement to cache");
        true
    }

    /// Reset every entry to unknown
    pub async fn clean_cache(&self) {
        let mut state = self.state.lock().await;
        for entry in state.entries.values_mut() {
            *entry = CacheEntry::UNKNOWN;
        }
    }

    /// Sweep the cache if the freshness deadline passed without an update.
    ///
    /// A sweep restarts the timer. Returns true when a sweep happened.
    pub async fn invalidate_if_expired(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.refreshed_at.elapsed() < self.ttl {
            return false;
        }
        for entry in state.entries.values_mut() {
            *entry = CacheEntry::UNKNOWN;
        }
        state.refreshed_at = Instant::now();
        true
    }

    async fn deadline(&self) -> Instant {
        self.state.lock().await.refreshed_at + self.ttl
    }

    /// All entries, sorted by key
    pub async fn snapshot(&self) -> Vec<CachedSocket> {
        let state = self.state.lock().await;
        let mut rows: Vec<CachedSocket> = state
            .entries
            .iter()
            .map(|(key, entry)| CachedSocket {
                node: key.node.clone(),
                socket: key.socket,
                entry: *entry,
                fresh: entry.is_fresh(),
            })
            .collect();
        rows.sort_by(|a, b| (&a.node, a.socket).cmp(&(&b.node, b.socket)));
        rows
    }

    /// Background sweep: wakes at each freshness deadline and resets the
    /// cache if nothing refreshed it in the meantime.
    pub async fn run_sweeper(
        self: Arc<Self>,
        metrics: ScorerMetrics,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(ttl_ms = self.ttl.as_millis() as u64, "Starting cache sweeper");

        loop {
            let deadline = self.deadline().await;
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    if self.invalidate_if_expired().await {
                        metrics.inc_cache_sweeps();
                        info!("Telemetry cache expired, reset to unknown");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Cache sweeper shutting down");
                    break;
                }
            }
        }
    }
}
