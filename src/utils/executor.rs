//! Command execution abstraction for testability
//!
//! Every external process (backup engine, dump tools) is launched through
//! [`CommandExecutor`], so steps and the orchestrator can be exercised
//! against scripted outputs.

use super::command::{Invocation, PipeOutput, ProcessOutput};
use crate::error::Result;
use async_trait::async_trait;

/// Abstraction for process execution, enabling mocking in tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion and capture its output
    async fn output(&self, invocation: &Invocation) -> Result<ProcessOutput>;

    /// Run `producer` piped into `consumer`, producer awaited first
    async fn pipe(&self, producer: &Invocation, consumer: &Invocation) -> Result<PipeOutput>;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for RealExecutor {
    async fn output(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        super::command::run_command(invocation).await
    }

    async fn pipe(&self, producer: &Invocation, consumer: &Invocation) -> Result<PipeOutput> {
        super::command::run_piped(producer, consumer).await
    }
}

/// A mock executor that records calls and returns configured responses.
/// Available for use in external test crates.
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        pub env: Vec<(String, String)>,
    }

    impl CommandCall {
        pub fn has_arg(&self, arg: &str) -> bool {
            self.args.iter().any(|a| a == arg)
        }

        /// First argument, e.g. `backup` for the engine
        pub fn subcommand(&self) -> Option<&str> {
            self.args.first().map(String::as_str)
        }

        pub fn env_value(&self, key: &str) -> Option<&str> {
            self.env
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Scripted process result
    #[derive(Clone, Debug)]
    pub struct MockResponse {
        pub code: i32,
        pub stdout: String,
        pub stderr: String,
        pub delay: Option<Duration>,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            Self::success()
        }
    }

    impl MockResponse {
        pub fn success() -> Self {
            Self {
                code: 0,
                stdout: String::new(),
                stderr: String::new(),
                delay: None,
            }
        }

        pub fn success_with_stdout(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                ..Self::success()
            }
        }

        pub fn failure(code: i32, stderr: &str) -> Self {
            Self {
                code,
                stderr: stderr.to_string(),
                ..Self::success()
            }
        }

        /// Sleep before "exiting"
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        async fn play(self) -> ProcessOutput {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            ProcessOutput {
                code: Some(self.code),
                stdout: self.stdout.into_bytes(),
                stderr: self.stderr.into_bytes(),
            }
        }
    }

    #[derive(Clone, Debug)]
    struct Rule {
        program: String,
        arg: Option<String>,
        response: MockResponse,
    }

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations, in call order
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        rules: Arc<Mutex<Vec<Rule>>>,
        default_response: Arc<Mutex<MockResponse>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for every call to `program`
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.rules.lock().unwrap().push(Rule {
                program: program.to_string(),
                arg: None,
                response,
            });
            self
        }

        /// Configure a response for calls to `program` that carry `arg`.
        /// Argument rules win over program-wide rules.
        pub fn expect_arg(self, program: &str, arg: &str, response: MockResponse) -> Self {
            self.rules.lock().unwrap().push(Rule {
                program: program.to_string(),
                arg: Some(arg.to_string()),
                response,
            });
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn was_called(&self, program: &str) -> bool {
            self.call_count(program) > 0
        }

        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        /// Calls to `program` whose first argument is `subcommand`
        pub fn calls_for(&self, program: &str, subcommand: &str) -> Vec<CommandCall> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program && c.subcommand() == Some(subcommand))
                .cloned()
                .collect()
        }

        fn record_call(&self, invocation: &Invocation) {
            self.calls.lock().unwrap().push(CommandCall {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                env: invocation.env.clone(),
            });
        }

        fn get_response(&self, invocation: &Invocation) -> MockResponse {
            let rules = self.rules.lock().unwrap();
            let by_arg = rules.iter().find(|r| {
                r.program == invocation.program
                    && r.arg.as_deref().is_some_and(|a| invocation.has_arg(a))
            });
            let by_program = || {
                rules
                    .iter()
                    .find(|r| r.program == invocation.program && r.arg.is_none())
            };

            by_arg
                .or_else(by_program)
                .map(|r| r.response.clone())
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn output(&self, invocation: &Invocation) -> Result<ProcessOutput> {
            self.record_call(invocation);
            let response = self.get_response(invocation);
            Ok(response.play().await)
        }

        async fn pipe(&self, producer: &Invocation, consumer: &Invocation) -> Result<PipeOutput> {
            self.record_call(producer);
            self.record_call(consumer);
            let producer_response = self.get_response(producer);
            let consumer_response = self.get_response(consumer);

            Ok(PipeOutput {
                producer: producer_response.play().await,
                consumer: consumer_response.play().await,
            })
        }
    }
}
