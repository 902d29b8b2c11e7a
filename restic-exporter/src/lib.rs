//! Restic Exporter Library
//!
//! Periodically lists snapshots across many restic repositories and
//! exposes backup freshness and volume as Prometheus gauges.

pub mod api;
pub mod collector;
pub mod config;
pub mod daemon;
pub mod metrics;
pub mod reader;
pub mod repos;
pub mod secrets;
pub mod utils;

// Re-export commonly used types
pub use collector::{CollectionRun, Collector, RepositoryResult, RunOutcome};
pub use config::Settings;
pub use metrics::MetricsStore;
pub use repos::{ConfigStore, RepositoryConfig};
