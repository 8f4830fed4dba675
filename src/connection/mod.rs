//! Remote connections: expose a path on a remote host as a local path
//!
//! A connection is owned by one host's backup run and shared by all of that
//! host's snapshots.

pub mod ssh;

use crate::config::{Config, Host, Transport};
use crate::error::Result;
use crate::utils::executor::CommandExecutor;
use std::path::Path;
use std::process::Output;
use std::sync::Arc;

pub use ssh::SshConnection;

/// Transport used to reach a host and bridge its filesystems
pub trait Connection: Send + Sync {
    /// Ensure `remote_path` exists, run `mount_command` on the remote side,
    /// then bridge `remote_path` to `local_path`.
    ///
    /// Nothing is rolled back on failure; callers call [`Connection::unbind`].
    fn bind(&self, mount_command: &str, remote_path: &Path, local_path: &Path) -> Result<()>;

    /// Release the local bridge, then run `unmount_command` remotely.
    ///
    /// Paths that are not currently bound are skipped.
    fn unbind(&self, unmount_command: &str, remote_path: &Path, local_path: &Path) -> Result<()>;

    /// Run a command on the remote host
    fn execute(&self, command: &str) -> anyhow::Result<Output>;

    /// Human readable endpoint, e.g. `root@h1`
    fn endpoint(&self) -> String;
}

/// Build the connection configured for `host`
pub fn connect(
    config: &Config,
    host: &Host,
    executor: Arc<dyn CommandExecutor>,
) -> Box<dyn Connection> {
    match host.transport {
        Transport::Ssh => Box::new(SshConnection::for_host(config, host, executor)),
    }
}
