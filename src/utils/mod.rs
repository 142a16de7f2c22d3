pub mod command;
pub mod cron;
pub mod pgpass;
pub mod restic;
pub mod run_guard;

// Trait-based abstraction for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
pub use executor::{CommandExecutor, RealExecutor};
pub use run_guard::{RunGuard, RunLease};
