use super::{Destination, Toolchain};
use crate::error::Result;
use crate::utils::command::{Invocation, ProcessOutput};
use crate::utils::restic;
use crate::utils::run_guard::RunGuard;
use std::path::PathBuf;
use tracing::{debug, info};

/// Backs up one directory tree
#[derive(Debug)]
pub struct VolumeStep {
    pub(super) guard: RunGuard,
    pub(super) destination: Destination,
    path: String,
    /// Home directory under which the per-path cache lives
    cache_root: Option<PathBuf>,
}

impl VolumeStep {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            guard: RunGuard::new(),
            destination: Destination::default(),
            path: path.into(),
            cache_root: dirs::home_dir(),
        }
    }

    /// Override the home directory used for the cache; None disables the
    /// `--cache-dir` argument.
    pub fn with_cache_root(mut self, root: Option<PathBuf>) -> Self {
        self.cache_root = root;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn describe(&self) -> String {
        self.path.clone()
    }

    pub fn invocation(&self, toolchain: &Toolchain) -> Invocation {
        let cache_dir = self
            .cache_root
            .as_deref()
            .map(|home| restic::cache_dir_for(home, &self.path));
        let exclude_file = restic::exclude_file_for(&self.path);

        let args = restic::volume_backup_args(
            &self.destination.hostname,
            cache_dir.as_deref(),
            exclude_file.as_deref(),
            &self.path,
        );
        restic::engine_invocation(&toolchain.binaries, &self.destination, args)
    }

    pub(super) async fn execute(&self, toolchain: &Toolchain) -> Result<ProcessOutput> {
        let invocation = self.invocation(toolchain);
        let output = toolchain.executor.output(&invocation).await?;

        if !output.success() {
            info!(
                path = %self.path,
                code = ?output.code,
                stdout = %output.stdout_lossy(),
                stderr = %output.stderr_lossy(),
                "Command restic backup failed"
            );
            return Err(output.to_error(&invocation.program));
        }

        debug!(
            path = %self.path,
            stdout = %output.stdout_lossy(),
            stderr = %output.stderr_lossy(),
            "Backup step done"
        );
        Ok(output)
    }
}
