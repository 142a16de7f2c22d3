//! Long-lived components: the orchestrator and its collaborators

pub mod backup;
pub mod logging;
pub mod metrics;
pub mod repository;
pub mod server;
