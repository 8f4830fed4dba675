use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub global: GlobalConfig,

    #[serde(default)]
    pub hosts: Vec<Host>,

    /// Print commands instead of executing them (set from the command line)
    #[serde(skip)]
    pub dry_run: bool,
}

impl Config {
    /// Look up a configured host by name
    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Path to the restic password file
    pub password_file: PathBuf,

    /// Local root under which every host's volumes are mounted
    #[serde(default = "default_mounts")]
    pub mounts: PathBuf,

    /// Root on the remote hosts where snapshots are mounted before bridging
    #[serde(default = "default_remote_mounts")]
    pub remote_mounts: PathBuf,

    /// Shared restic repository (defaults to `<mounts>/.repository`)
    #[serde(default)]
    pub repository: Option<PathBuf>,

    /// Keep snapshots newer than this many days when pruning
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Remote user for hosts that don't set one
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    /// SSH private key added to the agent before the first remote command
    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// Copy-on-write space reserved for each LVM snapshot
    #[serde(default = "default_snapshot_size")]
    pub snapshot_size: String,

    #[serde(default = "default_timeout")]
    pub command_timeout_seconds: u64,

    /// Logging configuration
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl GlobalConfig {
    /// Location of the shared restic repository
    pub fn repository_path(&self) -> PathBuf {
        self.repository
            .clone()
            .unwrap_or_else(|| self.mounts.join(".repository"))
    }

    /// Mount namespace aggregating all volumes of one host
    pub fn host_mounts(&self, host: &str) -> PathBuf {
        self.mounts.join(host)
    }
}

/// A machine whose volumes are backed up
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Host {
    pub name: String,

    /// Network address (defaults to the host name)
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub transport: Transport,

    /// Per-host override of `global.retention_days`
    #[serde(default)]
    pub retention_days: Option<u32>,

    #[serde(default)]
    pub volumes: Vec<Volume>,
}

impl Host {
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.name)
    }

    pub fn user<'a>(&'a self, global: &'a GlobalConfig) -> &'a str {
        self.user.as_deref().unwrap_or(&global.ssh_user)
    }

    pub fn retention_days(&self, global: &GlobalConfig) -> u32 {
        self.retention_days.unwrap_or(global.retention_days)
    }
}

/// One backable unit on a host
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Volume {
    pub name: String,

    /// Volume manager tag, e.g. "lvm"
    #[serde(rename = "type")]
    pub kind: String,

    /// Filesystem on the volume, e.g. "ext4" or "xfs"
    pub filesystem: String,

    /// Origin device path on the remote host
    #[serde(default)]
    pub location: String,
}

impl Volume {
    /// Device the snapshot is taken from
    pub fn origin_device(&self) -> PathBuf {
        if self.location.is_empty() {
            Path::new("/dev/mapper").join(&self.name)
        } else {
            PathBuf::from(&self.location)
        }
    }
}

/// How a host is reached
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Ssh,
}

// Default value functions

fn default_mounts() -> PathBuf { PathBuf::from("/srv/remotebackup") }
fn default_remote_mounts() -> PathBuf { PathBuf::from("/mnt/remotebackup") }
fn default_retention_days() -> u32 { 14 }
fn default_ssh_user() -> String { "root".to_string() }
fn default_snapshot_size() -> String { "5G".to_string() }
fn default_timeout() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
