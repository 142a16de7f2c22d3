//! Restic Agent Library
//!
//! Backup orchestration around restic: volume and database steps run
//! concurrently, database dumps are piped straight into the engine.

pub mod config;
pub mod error;
pub mod managers;
pub mod steps;
pub mod utils;

// Re-export commonly used types
pub use config::{build_backup_set, load_config, Config, ConfigError, Overrides};
pub use error::BackupError;
pub use managers::backup::BackupSet;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::metrics::MetricsCollection;
pub use managers::repository::{RepositoryInitializer, RepositoryState};
pub use steps::{BackupStep, Destination, MariaDbStep, PostgresStep, StepKind, Toolchain, VolumeStep};
