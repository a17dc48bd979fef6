//! Telemetry-driven socket scoring for cluster scheduling
//!
//! This crate provides:
//! - The hardware topology model and hardware classes
//! - Recency-weighted aggregation of telemetry windows
//! - A per-socket telemetry cache with global expiry
//! - Socket selection with idle-capacity gating and pluggable score functions
//! - The priority adapter used by the orchestrator, plus placement feedback
//! - Health checks and observability

pub mod aggregator;
pub mod cache;
pub mod error;
pub mod health;
pub mod heterogeneity;
pub mod models;
pub mod observability;
pub mod priority;
pub mod profiles;
pub mod scoring;
pub mod selector;
pub mod store;
pub mod topology;

pub use cache::{CacheEntry, TelemetryCache};
pub use error::{ScorerError, ScorerResult};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{ScorerMetrics, StructuredLogger};
pub use priority::{HostPriority, Placement, PriorityAdapter, PriorityList, Workload};
pub use profiles::{AppProfile, ProfileCatalog};
pub use scoring::ScoringStrategy;
pub use selector::{IdleGateMode, ScoringResult, SelectorConfig, SocketSelector};
pub use store::{InMemoryTelemetryStore, TelemetryQuery, TelemetryStore};
pub use topology::Topology;
