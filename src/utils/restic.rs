//! Restic invocations against the shared repository
//!
//! All hosts write into one repository so restic can deduplicate files that
//! appear on several machines. Each host's snapshots are told apart by a tag
//! carrying the host name.

use super::command::CommandLine;
use super::executor::CommandExecutor;
use crate::config::GlobalConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Operations the backup manager needs from a deduplicating backup tool
pub trait BackupTool {
    /// Make sure the repository exists, initializing it if absent
    fn ensure_repository(&self) -> Result<()>;

    /// Back up everything mounted under `root`, tagged with `host`
    fn backup(&self, host: &str, root: &Path) -> Result<()>;

    /// Forget and prune snapshots tagged `host` older than `days`
    fn prune(&self, host: &str, days: u32) -> Result<()>;

    /// Shared repository location
    fn repository(&self) -> &Path;
}

/// Restic driven through a [`CommandExecutor`]
pub struct Restic {
    repository: PathBuf,
    password_file: PathBuf,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl Restic {
    pub fn new(global: &GlobalConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            repository: global.repository_path(),
            password_file: crate::config::expand_tilde(&global.password_file),
            timeout: Duration::from_secs(global.command_timeout_seconds),
            executor,
        }
    }

    /// Base invocation carrying repository and credentials
    fn command(&self) -> CommandLine {
        CommandLine::new("restic")
            .arg("--repo")
            .arg(self.repository.display().to_string())
            .arg("--password-file")
            .arg(self.password_file.display().to_string())
    }

    pub fn check_command(&self) -> CommandLine {
        self.command().args(["cat", "config"])
    }

    pub fn init_command(&self) -> CommandLine {
        self.command().arg("init")
    }

    pub fn backup_command(&self, host: &str, root: &Path) -> CommandLine {
        self.command()
            .arg("backup")
            .arg("--tag")
            .arg(host)
            .arg(backup_root(root))
    }

    pub fn prune_command(&self, host: &str, days: u32) -> CommandLine {
        self.command()
            .arg("forget")
            .arg("--tag")
            .arg(host)
            .arg("--keep-within")
            .arg(format!("{}d", days))
            .arg("--prune")
    }
}

/// Render the backup root with a trailing separator
fn backup_root(root: &Path) -> String {
    let root = root.display().to_string();
    if root.ends_with('/') {
        root
    } else {
        format!("{}/", root)
    }
}

impl BackupTool for Restic {
    fn ensure_repository(&self) -> Result<()> {
        if self.executor.run(&self.check_command(), Some(self.timeout)).is_ok() {
            return Ok(());
        }

        info!("Initializing restic repository at {:?}", self.repository);
        self.executor
            .run(&self.init_command(), Some(self.timeout))
            .context("Failed to initialize repository")?;
        Ok(())
    }

    fn backup(&self, host: &str, root: &Path) -> Result<()> {
        info!("Calling restic on: {}", backup_root(root));
        let output = self
            .executor
            .run(&self.backup_command(host, root), Some(self.timeout))
            .context("Failed to run restic backup")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            info!("{}", stdout.trim_end());
        }
        Ok(())
    }

    fn prune(&self, host: &str, days: u32) -> Result<()> {
        info!("Pruning snapshots for '{}' older than {} days", host, days);
        self.executor
            .run(&self.prune_command(host, days), Some(self.timeout))
            .context("Failed to prune snapshots")?;
        Ok(())
    }

    fn repository(&self) -> &Path {
        &self.repository
    }
}
