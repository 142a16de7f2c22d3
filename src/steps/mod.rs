//! Backup steps
//!
//! A step is one independently runnable unit of backup work: a directory
//! tree or a database dump. The step set is closed; [`BackupStep`]
//! dispatches to one execution function per variant.

mod dump;
mod mariadb;
mod postgres;
mod volume;

pub use dump::{resolve_pipe, split_host_port, DumpTarget};
pub use mariadb::{MariaDbStep, MARIADB_DEFAULT_PORT};
pub use postgres::{PostgresStep, POSTGRES_DEFAULT_PORT};
pub use volume::VolumeStep;

use crate::config::Binaries;
use crate::error::{BackupError, Result};
use crate::managers::metrics::MetricsCollection;
use crate::utils::command::ProcessOutput;
use crate::utils::executor::{CommandExecutor, RealExecutor};
use crate::utils::restic;
use crate::utils::run_guard::RunGuard;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Where and how snapshots are written
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Destination {
    pub repository: String,
    pub password: String,
    /// Passed to the engine as `--host`
    pub hostname: String,
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("repository", &self.repository)
            .field("password_length", &self.password.len())
            .field("hostname", &self.hostname)
            .finish()
    }
}

/// Executor plus the program names it launches
#[derive(Clone)]
pub struct Toolchain {
    pub executor: Arc<dyn CommandExecutor>,
    pub binaries: Binaries,
}

impl Toolchain {
    pub fn new(executor: Arc<dyn CommandExecutor>, binaries: Binaries) -> Self {
        Self { executor, binaries }
    }

    /// Real subprocesses with the default program names
    pub fn system() -> Self {
        Self::new(Arc::new(RealExecutor::new()), Binaries::default())
    }
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("binaries", &self.binaries)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Volume,
    Postgres,
    MariaDb,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Volume => "volume",
            StepKind::Postgres => "postgres",
            StepKind::MariaDb => "mariadb",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum BackupStep {
    Volume(VolumeStep),
    Postgres(PostgresStep),
    MariaDb(MariaDbStep),
}

impl BackupStep {
    pub fn kind(&self) -> StepKind {
        match self {
            BackupStep::Volume(_) => StepKind::Volume,
            BackupStep::Postgres(_) => StepKind::Postgres,
            BackupStep::MariaDb(_) => StepKind::MariaDb,
        }
    }

    /// Human readable description for logs
    pub fn describe(&self) -> String {
        match self {
            BackupStep::Volume(s) => s.describe(),
            BackupStep::Postgres(s) => s.describe(),
            BackupStep::MariaDb(s) => s.describe(),
        }
    }

    pub fn run_guard(&self) -> &RunGuard {
        match self {
            BackupStep::Volume(s) => &s.guard,
            BackupStep::Postgres(s) => &s.guard,
            BackupStep::MariaDb(s) => &s.guard,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_guard().is_held()
    }

    pub fn destination(&self) -> &Destination {
        match self {
            BackupStep::Volume(s) => &s.destination,
            BackupStep::Postgres(s) => &s.destination,
            BackupStep::MariaDb(s) => &s.destination,
        }
    }

    /// Store a snapshot of the destination; later changes to the source do
    /// not reach this step.
    pub fn set_destination(&mut self, destination: Destination) {
        match self {
            BackupStep::Volume(s) => s.destination = destination,
            BackupStep::Postgres(s) => s.destination = destination,
            BackupStep::MariaDb(s) => s.destination = destination,
        }
    }

    /// Execute the step once.
    ///
    /// Fails fast with [`BackupError::StepAlreadyRunning`] if the step's own
    /// guard is held, before any process is launched.
    pub async fn run(&self, toolchain: &Toolchain, metrics: &MetricsCollection) -> Result<()> {
        let _lease = self
            .run_guard()
            .try_lease()
            .ok_or(BackupError::StepAlreadyRunning)?;

        let output = match self {
            BackupStep::Volume(s) => s.execute(toolchain).await?,
            BackupStep::Postgres(s) => s.execute(toolchain).await?,
            BackupStep::MariaDb(s) => s.execute(toolchain).await?,
        };

        record_engine_output(&output, metrics);
        Ok(())
    }
}

fn record_engine_output(output: &ProcessOutput, metrics: &MetricsCollection) {
    match restic::parse_backup_output(&output.stdout_lossy()) {
        Some(summary) => {
            debug!(snapshot_id = %summary.snapshot_id, "Recording backup summary");
            metrics.record_summary(&summary);
        }
        None => debug!("No backup summary in engine output"),
    }
}

impl From<VolumeStep> for BackupStep {
    fn from(step: VolumeStep) -> Self {
        BackupStep::Volume(step)
    }
}

impl From<PostgresStep> for BackupStep {
    fn from(step: PostgresStep) -> Self {
        BackupStep::Postgres(step)
    }
}

impl From<MariaDbStep> for BackupStep {
    fn from(step: MariaDbStep) -> Self {
        BackupStep::MariaDb(step)
    }
}
