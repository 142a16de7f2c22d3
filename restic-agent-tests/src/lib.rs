//! Test utilities for restic-agent
//!
//! Shared fixtures, a configuration builder and a test context that wires a
//! [`BackupSet`] to a recording [`MockExecutor`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{MockExecutor, MockResponse, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let ctx = TestContext::with_executor(
//!         MockExecutor::new().expect("restic", MockResponse::success()),
//!     );
//!     let mut set = ctx.backup_set();
//!     set.add_step(ctx.volume_step("/data"));
//!     assert!(set.run_synchronously().await);
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use restic_agent::config::{Binaries, Config, DatabaseConfig, Overrides};
pub use restic_agent::managers::backup::BackupSet;
pub use restic_agent::managers::metrics::MetricsCollection;
pub use restic_agent::steps::{BackupStep, Destination, StepKind, Toolchain};

// Re-export mock implementations from the main crate
pub use restic_agent::utils::executor::mock::{CommandCall, MockExecutor, MockResponse};
pub use restic_agent::utils::executor::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
