//! Database dump streamed into the backup engine

use super::{Destination, Toolchain};
use crate::error::Result;
use crate::utils::command::{Invocation, PipeOutput, ProcessOutput};
use crate::utils::restic;
use tracing::{debug, error, info};

/// Connection parameters shared by the database steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    /// Virtual file name inside the snapshot
    pub name: String,
}

impl DumpTarget {
    /// `host` may carry a `:port` suffix. `prefix` selects the snapshot
    /// label, e.g. `psql` gives `/psql-<host>-<database>.dmp`.
    pub fn new(host: &str, default_port: u16, user: &str, database: &str, prefix: &str) -> Self {
        let (host, port) = split_host_port(host, default_port);
        // No sub-directory: the engine stores stdin files at the root
        let name = format!("/{}-{}-{}.dmp", prefix, host, database);
        Self {
            host,
            port,
            user: user.to_string(),
            database: database.to_string(),
            name,
        }
    }

    pub fn describe(&self) -> String {
        format!("{}@{}/{}", self.user, self.host, self.database)
    }

    /// Engine invocation reading the dump from stdin
    pub fn consumer(&self, toolchain: &Toolchain, destination: &Destination) -> Invocation {
        let args = restic::stdin_backup_args(&destination.hostname, &self.name);
        restic::engine_invocation(&toolchain.binaries, destination, args)
    }
}

/// Split an optional numeric `:port` suffix off `host`.
///
/// Bare IPv6 addresses (more than one colon) are left untouched.
pub fn split_host_port(host: &str, default_port: u16) -> (String, u16) {
    if host.matches(':').count() == 1 {
        if let Some((name, port)) = host.rsplit_once(':') {
            if let Ok(port) = port.parse::<u16>() {
                if !name.is_empty() {
                    return (name.to_string(), port);
                }
            }
        }
    }
    (host.to_string(), default_port)
}

/// Launch producer and consumer connected by a pipe and decide the outcome
pub(super) async fn stream_dump(
    toolchain: &Toolchain,
    producer: &Invocation,
    consumer: &Invocation,
) -> Result<ProcessOutput> {
    let output = toolchain.executor.pipe(producer, consumer).await?;
    resolve_pipe(output, &producer.program, &consumer.program)
}

/// A failed dump leaves the backup's input undefined, so the producer's
/// error always wins over the consumer's.
pub fn resolve_pipe(output: PipeOutput, producer: &str, consumer: &str) -> Result<ProcessOutput> {
    let PipeOutput {
        producer: dump,
        consumer: backup,
    } = output;

    if !dump.success() {
        info!(
            code = ?dump.code,
            stderr = %dump.stderr_lossy(),
            "Command {} failed",
            producer
        );
        if !backup.success() {
            debug!(
                code = ?backup.code,
                stderr = %backup.stderr_lossy(),
                "Command {} failed after its input failed",
                consumer
            );
        }
        return Err(dump.to_error(producer));
    }

    if !backup.success() {
        error!(
            code = ?backup.code,
            stdout = %backup.stdout_lossy(),
            stderr = %backup.stderr_lossy(),
            "Command {} backup failed",
            consumer
        );
        return Err(backup.to_error(consumer));
    }

    info!(
        stdout = %backup.stdout_lossy(),
        stderr = %backup.stderr_lossy(),
        "Streamed backup finished"
    );
    Ok(backup)
}
