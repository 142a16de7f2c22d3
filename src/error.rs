//! Error taxonomy for backup runs and steps

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// The orchestrator is already executing a run
    #[error("Backup already running")]
    AlreadyRunning,

    /// A single step is already executing
    #[error("Backup step already running")]
    StepAlreadyRunning,

    #[error("Repository bootstrap failed: {0}")]
    RepositoryBootstrapFailed(Box<BackupError>),

    /// Non-zero exit of a dump or engine invocation
    #[error("Command {program} failed with exit code {code:?}: {stderr}")]
    ExternalProcess {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Producer and consumer could not be connected before start
    #[error("Failed to connect {producer} to {consumer}: {source}")]
    PipeSetup {
        producer: String,
        consumer: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to update credentials file {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Metrics collection not assigned")]
    MetricsUnavailable,
}

impl BackupError {
    /// True for guard contention at either orchestrator or step level
    pub fn is_already_running(&self) -> bool {
        matches!(self, Self::AlreadyRunning | Self::StepAlreadyRunning)
    }

    /// Exit code carried by an external process failure
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExternalProcess { code, .. } => *code,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
