//! Test context and harness
//!
//! Provides a unified context for setting up backup sets against a
//! recording executor.

use anyhow::Result;
use restic_agent::config::Binaries;
use restic_agent::managers::backup::BackupSet;
use restic_agent::managers::metrics::MetricsCollection;
use restic_agent::steps::{MariaDbStep, PostgresStep, Toolchain, VolumeStep};
use restic_agent::utils::executor::mock::MockExecutor;
use restic_agent::utils::pgpass::PgPassFile;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_REPOSITORY: &str = "/srv/restic";
pub const TEST_PASSWORD: &str = "test-password-123";
pub const TEST_HOSTNAME: &str = "test-host";

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
    executor: MockExecutor,
    metrics: Arc<MetricsCollection>,
}

impl TestContext {
    /// Context whose executor answers every call with success
    pub fn new() -> Self {
        Self::with_executor(MockExecutor::new())
    }

    pub fn with_executor(executor: MockExecutor) -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            executor,
            metrics: Arc::new(MetricsCollection::new().expect("Failed to create metrics")),
        }
    }

    pub fn executor(&self) -> &MockExecutor {
        &self.executor
    }

    pub fn metrics(&self) -> &Arc<MetricsCollection> {
        &self.metrics
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(Arc::new(self.executor.clone()), Binaries::default())
    }

    /// Backup set with destination and metrics configured, no steps yet
    pub fn backup_set(&self) -> BackupSet {
        let mut set = self.backup_set_without_metrics();
        set.set_metrics(Arc::clone(&self.metrics));
        set
    }

    pub fn backup_set_without_metrics(&self) -> BackupSet {
        let mut set = BackupSet::new(self.toolchain());
        set.set_repository(TEST_REPOSITORY, TEST_PASSWORD);
        set.set_hostname(TEST_HOSTNAME);
        set
    }

    /// Volume step without a cache directory argument
    pub fn volume_step(&self, path: &str) -> VolumeStep {
        VolumeStep::new(path).with_cache_root(None)
    }

    /// Postgres step writing its credentials into the temp directory
    pub fn postgres_step(&self, host: &str, database: &str) -> PostgresStep {
        PostgresStep::new(host, "backup", "pg-secret", database, self.pgpass())
            .expect("Failed to create postgres step")
    }

    pub fn mariadb_step(&self, host: &str, database: &str) -> MariaDbStep {
        MariaDbStep::new(host, "root", "maria-secret", database)
    }

    pub fn pgpass(&self) -> PgPassFile {
        PgPassFile::new(self.temp_dir.path().join("pgpass"))
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a subdirectory in the temp dir
    pub fn create_subdir(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create subdirectory");
        path
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Read a file from the temp directory
    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.temp_dir.path().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for std::result::Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}

/// Extension trait for Option assertions
pub trait OptionAssertions<T> {
    /// Assert that the option is Some and return the value
    fn assert_some(self) -> T;
}

impl<T> OptionAssertions<T> for Option<T> {
    fn assert_some(self) -> T {
        match self {
            Some(v) => v,
            None => panic!("Expected Some, got None"),
        }
    }
}
