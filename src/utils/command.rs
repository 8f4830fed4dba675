//! Utilities for running commands with proper error handling and timeouts

use anyhow::{Context, Result};
use std::fmt;
use std::process::{Output, Stdio};
use std::time::Duration;
use tracing::{debug, error};

/// A program invocation with its arguments
///
/// The `Display` rendering is the canonical command string: it is what gets
/// logged and what dry-run mode prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    /// Run a script through `sh -c`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Quote a word for POSIX sh when it contains anything beyond plain characters
pub fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));

    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Run a command to completion, killing it if the timeout expires first
pub fn run_command(
    runtime: &tokio::runtime::Runtime,
    command: &CommandLine,
    timeout: Option<Duration>,
) -> Result<Output> {
    debug!("Running command: {}", command);

    let mut cmd = tokio::process::Command::new(&command.program);
    cmd.args(&command.args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let output = runtime.block_on(async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(output) => output.context(format!("Failed to execute {}", command.program)),
                Err(_) => Err(anyhow::anyhow!("Command timed out after {:?}", limit)),
            },
            None => cmd
                .output()
                .await
                .context(format!("Failed to execute {}", command.program)),
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {}", command);
        error!("Stderr: {}", stderr.trim_end());
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr.trim_end()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim_end());
    }

    Ok(output)
}
