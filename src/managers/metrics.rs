//! Counters and gauges describing backup runs
//!
//! Every collection owns its own registry, so independent orchestrators (and
//! tests) never share state.

use crate::utils::restic::BackupSummary;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use tracing::debug;

const NAMESPACE: &str = "backup";

#[derive(Debug)]
pub struct MetricsCollection {
    registry: Registry,

    pub backups_total: IntCounter,
    pub backups_successful: IntCounter,
    pub backups_failed: IntCounter,

    // repository statistics
    pub data_blobs: IntGauge,
    pub tree_blobs: IntGauge,

    // snapshot statistics
    pub files_new: IntGauge,
    pub files_changed: IntGauge,
    pub files_unmodified: IntGauge,
    pub dirs_new: IntGauge,
    pub dirs_changed: IntGauge,
    pub dirs_unmodified: IntGauge,
    pub files_processed: IntGauge,
    pub bytes_processed: IntGauge,
    pub bytes_added: IntGauge,
    /// Milliseconds
    pub backup_duration: Gauge,
    pub last_success_timestamp: IntGauge,
}

impl MetricsCollection {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };
        let gauge = |name: &str, help: &str| -> prometheus::Result<IntGauge> {
            let gauge = IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        let backups_total = counter(
            "backups_all_total",
            "The total number of backups attempted, including failures.",
        )?;
        let backups_successful = counter(
            "backups_successful_total",
            "The total number of backups that succeeded.",
        )?;
        let backups_failed = counter(
            "backups_failed_total",
            "The total number of backups that failed.",
        )?;

        let data_blobs = gauge("restic_blobs_data", "The number of data blobs in the repository.")?;
        let tree_blobs = gauge("restic_blobs_tree", "The number of tree blobs in the repository.")?;
        let files_new = gauge("restic_files_new", "Amount of new files.")?;
        let files_changed = gauge("restic_files_changed", "Amount of files with changes.")?;
        let files_unmodified = gauge(
            "restic_files_unmodified",
            "Amount of files unmodified since last backup.",
        )?;
        let dirs_new = gauge("restic_dirs_new", "Amount of new directories.")?;
        let dirs_changed = gauge("restic_dirs_changed", "Amount of directories with changes.")?;
        let dirs_unmodified = gauge(
            "restic_dirs_unmodified",
            "Amount of directories unmodified since last backup.",
        )?;
        let files_processed = gauge("restic_files_processed", "Total number of files scanned.")?;
        let bytes_processed = gauge(
            "restic_processed_bytes",
            "Total number of bytes scanned by the backup.",
        )?;
        let bytes_added = gauge(
            "restic_added_bytes",
            "Total number of bytes added to the repository.",
        )?;
        let last_success_timestamp = gauge(
            "last_success_timestamp_seconds",
            "Unix time of the last successful backup step.",
        )?;

        let backup_duration = Gauge::with_opts(
            Opts::new(
                "restic_duration_milliseconds",
                "Duration of the last backup in milliseconds.",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(backup_duration.clone()))?;

        Ok(Self {
            registry,
            backups_total,
            backups_successful,
            backups_failed,
            data_blobs,
            tree_blobs,
            files_new,
            files_changed,
            files_unmodified,
            dirs_new,
            dirs_changed,
            dirs_unmodified,
            files_processed,
            bytes_processed,
            bytes_added,
            backup_duration,
            last_success_timestamp,
        })
    }

    /// Publish the statistics of one finished engine run
    pub fn record_summary(&self, summary: &BackupSummary) {
        self.data_blobs.set(summary.data_blobs);
        self.tree_blobs.set(summary.tree_blobs);
        self.files_new.set(clamp(summary.files_new));
        self.files_changed.set(clamp(summary.files_changed));
        self.files_unmodified.set(clamp(summary.files_unmodified));
        self.dirs_new.set(clamp(summary.dirs_new));
        self.dirs_changed.set(clamp(summary.dirs_changed));
        self.dirs_unmodified.set(clamp(summary.dirs_unmodified));
        self.files_processed.set(clamp(summary.total_files_processed));
        self.bytes_processed.set(clamp(summary.total_bytes_processed));
        self.bytes_added.set(clamp(summary.data_added));
        self.backup_duration.set(summary.total_duration * 1000.0);
    }

    /// Count one finished step
    pub fn record_outcome(&self, success: bool) {
        self.backups_total.inc();
        if success {
            self.backups_successful.inc();
            self.last_success_timestamp
                .set(chrono::Utc::now().timestamp());
        } else {
            self.backups_failed.inc();
        }
    }

    pub fn attempted(&self) -> u64 {
        self.backups_total.get()
    }

    pub fn succeeded(&self) -> u64 {
        self.backups_successful.get()
    }

    pub fn failed(&self) -> u64 {
        self.backups_failed.get()
    }

    /// Prometheus text exposition of every metric in this collection
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        debug!(bytes = buffer.len(), "Encoded metrics");
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
