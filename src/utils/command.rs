//! Utilities for running external commands and streaming one into another

use crate::error::{BackupError, Result};
use std::fmt;
use std::io;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// A fully described external process launch
#[derive(Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Indexes into `args` that must never be printed
    secret_args: Vec<usize>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument that is masked in logs
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in vars {
            self.env.push((key.clone(), value.clone()));
        }
        self
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn spawn_error(&self, source: io::Error) -> BackupError {
        BackupError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&i) {
                write!(f, " ***")?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("Invocation")
            .field("command", &self.to_string())
            .field("env", &env_keys)
            .finish()
    }
}

/// Exit status and captured streams of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// None when terminated by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Error describing this output as a failure of `program`
    pub fn to_error(&self, program: &str) -> BackupError {
        BackupError::ExternalProcess {
            program: program.to_string(),
            code: self.code,
            stderr: self.stderr_lossy().trim().to_string(),
        }
    }
}

impl From<Output> for ProcessOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Outputs of a dump producer and the consumer reading its stdout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeOutput {
    pub producer: ProcessOutput,
    pub consumer: ProcessOutput,
}

/// Run a command to completion, capturing stdout and stderr.
///
/// A non-zero exit is not an error here; callers inspect the output.
pub async fn run_command(invocation: &Invocation) -> Result<ProcessOutput> {
    debug!(command = %invocation, "Running command");

    let output = invocation
        .to_command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| invocation.spawn_error(e))?;

    Ok(output.into())
}

/// Run `producer` with its stdout connected to the stdin of `consumer`.
///
/// Both processes are started before either is awaited. The producer is
/// awaited first, then the consumer.
pub async fn run_piped(producer: &Invocation, consumer: &Invocation) -> Result<PipeOutput> {
    debug!(producer = %producer, consumer = %consumer, "Running piped commands");

    let pipe_error = |source: io::Error| BackupError::PipeSetup {
        producer: producer.program.clone(),
        consumer: consumer.program.clone(),
        source,
    };

    let mut producer_child = producer
        .to_command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| producer.spawn_error(e))?;

    let consumer_stdin: Stdio = match producer_child.stdout.take() {
        Some(stdout) => match stdout.try_into() {
            Ok(stdio) => stdio,
            Err(e) => {
                let _ = producer_child.start_kill();
                return Err(pipe_error(e));
            }
        },
        None => {
            let _ = producer_child.start_kill();
            return Err(pipe_error(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "producer stdout was not captured",
            )));
        }
    };

    // The command is dropped right after spawning so the parent keeps no
    // handle on the pipe; otherwise a dead consumer would stall the producer.
    let spawned = {
        let mut cmd = consumer.to_command();
        cmd.stdin(consumer_stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.spawn()
    };
    let consumer_child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let _ = producer_child.start_kill();
            return Err(consumer.spawn_error(e));
        }
    };

    // Drain the consumer's streams while waiting on the producer
    let consumer_task = tokio::spawn(consumer_child.wait_with_output());

    let producer_output = producer_child
        .wait_with_output()
        .await
        .map_err(|e| producer.spawn_error(e))?;

    let consumer_output = consumer_task
        .await
        .map_err(|e| consumer.spawn_error(io::Error::new(io::ErrorKind::Other, e)))?
        .map_err(|e| consumer.spawn_error(e))?;

    Ok(PipeOutput {
        producer: producer_output.into(),
        consumer: consumer_output.into(),
    })
}
