//! Socket scoring daemon
//!
//! Exposes the scoring engine to the orchestrator over HTTP and keeps the
//! telemetry cache swept in the background.

pub mod api;
pub mod config;
