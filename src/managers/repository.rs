//! Check-then-create bootstrap of the engine repository
//!
//! One existence check and at most one init attempt per call. Two processes
//! racing to initialize the same repository are not coordinated.

use crate::error::{BackupError, Result};
use crate::steps::{Destination, Toolchain};
use crate::utils::command::ProcessOutput;
use crate::utils::restic;
use tracing::{debug, error, info, warn};

/// Outcome of [`RepositoryInitializer::ensure_repository`]. Both states mean
/// the repository is usable; a failed bootstrap is an error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    /// Already present, nothing was created
    Exists,
    /// Created by this call
    Bootstrapped,
}

pub struct RepositoryInitializer<'a> {
    toolchain: &'a Toolchain,
    destination: &'a Destination,
}

impl<'a> RepositoryInitializer<'a> {
    pub fn new(toolchain: &'a Toolchain, destination: &'a Destination) -> Self {
        Self {
            toolchain,
            destination,
        }
    }

    /// `snapshots --json --last`; a zero exit means the repository exists
    pub async fn check(&self) -> Result<()> {
        debug!(repository = %self.destination.repository, "Ensuring backup repository exists");
        let invocation = restic::engine_invocation(
            &self.toolchain.binaries,
            self.destination,
            restic::snapshots_args(),
        );
        let output = self.toolchain.executor.output(&invocation).await?;
        if !output.success() {
            warn!(
                code = ?output.code,
                stdout = %output.stdout_lossy(),
                stderr = %output.stderr_lossy(),
                "Command restic snapshots failed"
            );
            return Err(output.to_error(&invocation.program));
        }
        Ok(())
    }

    /// `init --json`
    pub async fn initialize(&self) -> Result<ProcessOutput> {
        let invocation = restic::engine_invocation(
            &self.toolchain.binaries,
            self.destination,
            restic::init_args(),
        );
        let output = self.toolchain.executor.output(&invocation).await?;
        if !output.success() {
            error!(
                code = ?output.code,
                stdout = %output.stdout_lossy(),
                stderr = %output.stderr_lossy(),
                "Command restic init failed"
            );
            return Err(output.to_error(&invocation.program));
        }
        info!(stdout = %output.stdout_lossy(), "Initializing complete");
        Ok(output)
    }

    /// Check, and create the repository if the check fails
    pub async fn ensure_repository(&self) -> Result<RepositoryState> {
        if self.check().await.is_ok() {
            info!("Repository already exists");
            return Ok(RepositoryState::Exists);
        }

        warn!("Initializing repository");
        self.initialize()
            .await
            .map(|_| RepositoryState::Bootstrapped)
            .map_err(|e| BackupError::RepositoryBootstrapFailed(Box::new(e)))
    }
}
