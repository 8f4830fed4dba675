//! Command execution abstraction for testability and dry runs
//!
//! Every external process the backup run starts goes through a
//! [`CommandExecutor`]. Swapping the executor is how dry-run mode works:
//! [`DryRunExecutor`] prints the same rendering the real executor would
//! run, so the two outputs are byte-identical.

use super::command::CommandLine;
use anyhow::{Context, Result};
use std::io::Write;
use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Abstraction for command execution, enabling dry runs and mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion, failing on a non-zero exit status
    fn run(&self, command: &CommandLine, timeout: Option<Duration>) -> Result<Output>;
}

/// Pick the executor matching the run mode
pub fn executor_for(dry_run: bool) -> Result<Arc<dyn CommandExecutor>> {
    if dry_run {
        Ok(Arc::new(DryRunExecutor::new()))
    } else {
        Ok(Arc::new(RealExecutor::new()?))
    }
}

/// Default implementation using real subprocess calls
///
/// Owns a single-threaded tokio runtime used to enforce timeouts, so it must
/// not be driven from inside another async runtime.
pub struct RealExecutor {
    runtime: tokio::runtime::Runtime,
}

impl RealExecutor {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start process runtime")?;
        Ok(Self { runtime })
    }
}

impl CommandExecutor for RealExecutor {
    fn run(&self, command: &CommandLine, timeout: Option<Duration>) -> Result<Output> {
        super::command::run_command(&self.runtime, command, timeout)
    }
}

fn success_output(stdout: Vec<u8>) -> Output {
    Output {
        status: std::process::ExitStatus::default(),
        stdout,
        stderr: Vec::new(),
    }
}

/// Prints every command instead of running it
#[derive(Debug, Default, Clone)]
pub struct DryRunExecutor {
    printed: Arc<Mutex<Vec<String>>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed so far, in order
    pub fn printed(&self) -> Vec<String> {
        self.printed.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CommandExecutor for DryRunExecutor {
    fn run(&self, command: &CommandLine, _timeout: Option<Duration>) -> Result<Output> {
        let line = command.to_string();

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line).context("Failed to write dry-run output")?;

        if let Ok(mut printed) = self.printed.lock() {
            printed.push(line);
        }
        Ok(success_output(Vec::new()))
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
            }
        }
    }

    /// Mock executor for testing
    ///
    /// Responses are matched by substring against the rendered command, the
    /// first matching rule wins.
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Rendered commands, in call order
        pub calls: Arc<Mutex<Vec<String>>>,
        rules: Arc<Mutex<Vec<(String, MockResponse)>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for commands containing `pattern`
        pub fn expect(self, pattern: &str, response: MockResponse) -> Self {
            self.rules
                .lock()
                .unwrap()
                .push((pattern.to_string(), response));
            self
        }

        /// Make commands containing `pattern` fail with `stderr`
        pub fn fail_on(self, pattern: &str, stderr: &str) -> Self {
            self.expect(
                pattern,
                MockResponse::Failure {
                    stderr: stderr.to_string(),
                    exit_code: 1,
                },
            )
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of calls containing `pattern`
        pub fn call_count(&self, pattern: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.contains(pattern))
                .count()
        }

        /// Index of the first call containing `pattern`
        pub fn position(&self, pattern: &str) -> Option<usize> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .position(|c| c.contains(pattern))
        }

        fn get_response(&self, line: &str) -> MockResponse {
            self.rules
                .lock()
                .unwrap()
                .iter()
                .find(|(pattern, _)| line.contains(pattern.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_default()
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run(&self, command: &CommandLine, _timeout: Option<Duration>) -> Result<Output> {
            let line = command.to_string();
            self.calls.lock().unwrap().push(line.clone());

            match self.get_response(&line) {
                MockResponse::Success { stdout } => Ok(success_output(stdout.into_bytes())),
                MockResponse::Failure { stderr, exit_code } => {
                    anyhow::bail!("Command failed with exit code {:?}: {}", Some(exit_code), stderr)
                }
                MockResponse::Timeout => anyhow::bail!("Command timed out"),
            }
        }
    }
}
