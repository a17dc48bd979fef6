//! Subcommand implementations

pub mod cache;
pub mod placement;
pub mod score;
pub mod status;
