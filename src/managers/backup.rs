//! Backup set - orchestrates backup execution
//!
//! A run checks the repository, then launches every registered step as its
//! own task and waits for all of them. Step failures never cancel siblings;
//! they only show up in the logs and in the failed counter.

use crate::error::{BackupError, Result};
use crate::managers::metrics::MetricsCollection;
use crate::managers::repository::{RepositoryInitializer, RepositoryState};
use crate::steps::{BackupStep, Destination, Toolchain};
use crate::utils::run_guard::{RunGuard, RunLease};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct BackupSet {
    destination: Destination,
    running: RunGuard,
    steps: Vec<Arc<BackupStep>>,
    metrics: Option<Arc<MetricsCollection>>,
    toolchain: Toolchain,
}

impl BackupSet {
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            destination: Destination::default(),
            running: RunGuard::new(),
            steps: Vec::new(),
            metrics: None,
            toolchain,
        }
    }

    /// Must be called before [`add_step`](Self::add_step): steps keep the
    /// destination they were registered with.
    pub fn set_repository(&mut self, repository: impl Into<String>, password: impl Into<String>) {
        self.destination.repository = repository.into();
        self.destination.password = password.into();
        debug!(
            repository = %self.destination.repository,
            password_length = self.destination.password.len(),
            "Set repository"
        );
    }

    /// Must be called before [`add_step`](Self::add_step)
    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.destination.hostname = hostname.into();
        debug!(hostname = %self.destination.hostname, "Set hostname");
    }

    pub fn set_metrics(&mut self, metrics: Arc<MetricsCollection>) {
        debug!("Assign metrics collection");
        self.metrics = Some(metrics);
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollection>> {
        self.metrics.as_ref()
    }

    pub fn add_step(&mut self, step: impl Into<BackupStep>) {
        let mut step = step.into();
        info!(kind = %step.kind(), description = %step.describe(), "Add backup step");
        step.set_destination(self.destination.clone());
        self.steps.push(Arc::new(step));
    }

    pub fn steps(&self) -> &[Arc<BackupStep>] {
        &self.steps
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Snapshot of the run guard, not a lock
    pub fn is_running(&self) -> bool {
        self.running.is_held()
    }

    /// Run all steps and return once they have finished.
    ///
    /// Returns false without doing anything if a run is already active.
    pub async fn run_synchronously(&self) -> bool {
        let Some(_lease) = self.running.try_lease() else {
            warn!("Backup already running");
            return false;
        };

        self.run().await;
        true
    }

    /// Start a run on its own task and return immediately.
    ///
    /// The guard stays held until the task finishes, whatever its outcome.
    pub fn run_asynchronously(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        if !self.running.acquire() {
            warn!("Backup already running");
            return Err(BackupError::AlreadyRunning);
        }

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _lease = RunLease::adopt(&this.running);
            this.run().await;
        }))
    }

    /// Make sure the repository exists, creating it if needed
    pub async fn initialize_repository(&self) -> Result<RepositoryState> {
        RepositoryInitializer::new(&self.toolchain, &self.destination)
            .ensure_repository()
            .await
    }

    /// Caller must hold the run guard
    async fn run(&self) {
        info!(step_count = self.steps.len(), "Starting backup set");

        let Some(metrics) = self.metrics.clone() else {
            error!("{}", BackupError::MetricsUnavailable);
            return;
        };

        if let Err(e) = self.initialize_repository().await {
            error!(error = %e, "Skipping backup steps");
            return;
        }

        let mut tasks = JoinSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            let step = Arc::clone(step);
            let toolchain = self.toolchain.clone();
            let metrics = Arc::clone(&metrics);

            tasks.spawn(async move {
                let kind = step.kind();
                let description = step.describe();
                info!(index, %kind, %description, "Running backup step");

                let result = step.run(&toolchain, &metrics).await;
                metrics.record_outcome(result.is_ok());

                match result {
                    Ok(()) => info!(index, %kind, %description, "Backup step finished"),
                    Err(e) => error!(index, %kind, %description, error = %e, "Backup step failed"),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                // A panicked step still counts as attempted
                metrics.record_outcome(false);
                error!(error = %e, "Backup step task aborted");
            }
        }

        info!("All backup steps finished");
    }
}
