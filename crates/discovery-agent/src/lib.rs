//! Daemon plumbing for the discovery agent: configuration, durable state and
//! run counters. The binaries in this crate wire these to the valuation engine.

pub mod config;
pub mod metrics;
pub mod store;

pub use config::AgentConfig;
pub use metrics::AgentMetrics;
pub use store::{JsonFileStore, StoreError};
