//! SSH transport with sshfs as the local bridge

use super::Connection;
use crate::config::{expand_tilde, Config, Host};
use crate::error::{BackupError, Result};
use crate::utils::command::{quote, CommandLine};
use crate::utils::executor::CommandExecutor;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub struct SshConnection {
    host: String,
    user: String,
    identity_file: Option<PathBuf>,
    keys_loaded: Mutex<bool>,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl SshConnection {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        identity_file: Option<PathBuf>,
        timeout: Duration,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            identity_file,
            keys_loaded: Mutex::new(false),
            timeout,
            executor,
        }
    }

    pub fn for_host(config: &Config, host: &Host, executor: Arc<dyn CommandExecutor>) -> Self {
        Self::new(
            host.address(),
            host.user(&config.global),
            config.global.identity_file.as_deref().map(expand_tilde),
            Duration::from_secs(config.global.command_timeout_seconds),
            executor,
        )
    }

    /// Whether the one-time key load has happened
    pub fn keys_loaded(&self) -> bool {
        self.keys_loaded.lock().map(|l| *l).unwrap_or(false)
    }

    /// Add the identity to the agent, once per connection
    fn ensure_keys(&self) -> anyhow::Result<()> {
        let mut loaded = self
            .keys_loaded
            .lock()
            .map_err(|_| anyhow::anyhow!("key state poisoned"))?;
        if *loaded {
            return Ok(());
        }

        match &self.identity_file {
            Some(identity) => {
                info!("Loading SSH key {:?} for {}", identity, self.endpoint());
                self.executor
                    .run(
                        &CommandLine::new("ssh-add").arg(identity.display().to_string()),
                        Some(self.timeout),
                    )
                    .context("Failed to load SSH key")?;
            }
            None => debug!("No identity file configured, relying on the running agent"),
        }

        *loaded = true;
        Ok(())
    }

    fn ssh(&self, remote_command: &str) -> CommandLine {
        CommandLine::new("ssh")
            .args(["-o", "BatchMode=yes"])
            .arg(self.endpoint())
            .arg(remote_command)
    }

    fn run(&self, command: &CommandLine) -> anyhow::Result<Output> {
        self.executor.run(command, Some(self.timeout))
    }
}

/// Create `path` as a private directory, refusing to touch anything else
/// already sitting at that path.
pub fn ensure_directory_script(path: &Path) -> String {
    let p = quote(&path.display().to_string());
    format!(
        "if [ -e {p} ] && [ ! -d {p} ]; then \
         echo {p} exists and is not a directory >&2; exit 1; fi; \
         mkdir -p {p} && chmod 0700 {p}"
    )
}

/// Run `command` only when `path` is a mount point
pub fn if_mounted_script(path: &Path, command: &str) -> String {
    let p = quote(&path.display().to_string());
    format!("if mountpoint -q {p}; then {command}; fi")
}

impl Connection for SshConnection {
    fn bind(&self, mount_command: &str, remote_path: &Path, local_path: &Path) -> Result<()> {
        let fail = |source: anyhow::Error| BackupError::BindFailure {
            remote: remote_path.to_path_buf(),
            local: local_path.to_path_buf(),
            source,
        };

        self.ensure_keys().map_err(fail)?;

        let remote = format!("{} && {}", ensure_directory_script(remote_path), mount_command);
        self.run(&self.ssh(&remote)).map_err(fail)?;

        let sshfs = CommandLine::new("sshfs")
            .arg(format!("{}:{}", self.endpoint(), remote_path.display()))
            .arg(local_path.display().to_string())
            .args(["-o", "ro"]);
        self.run(&sshfs).map_err(fail)?;

        info!("Bound {}:{:?} to {:?}", self.endpoint(), remote_path, local_path);
        Ok(())
    }

    fn unbind(&self, unmount_command: &str, remote_path: &Path, local_path: &Path) -> Result<()> {
        let fail = |source: anyhow::Error| BackupError::UnbindFailure {
            remote: remote_path.to_path_buf(),
            local: local_path.to_path_buf(),
            source,
        };

        self.ensure_keys().map_err(fail)?;

        // Local bridge goes first so nothing keeps a handle on the remote mount
        let local = if_mounted_script(
            local_path,
            &format!("fusermount -u {}", quote(&local_path.display().to_string())),
        );
        self.run(&CommandLine::shell(local)).map_err(fail)?;

        let remote = if_mounted_script(remote_path, unmount_command);
        self.run(&self.ssh(&remote)).map_err(fail)?;

        info!("Unbound {:?} from {}:{:?}", local_path, self.endpoint(), remote_path);
        Ok(())
    }

    fn execute(&self, command: &str) -> anyhow::Result<Output> {
        self.ensure_keys()?;
        self.run(&self.ssh(command))
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}
