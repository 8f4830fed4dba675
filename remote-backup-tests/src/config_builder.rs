//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.

use remote_backup::config::{Config, GlobalConfig, Host, Transport, Volume};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    hosts: Vec<Host>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with no hosts
    ///
    /// The password file lives in a fresh temp dir and the mount root is
    /// `<temp>/mounts`, so nothing outside the temp dir is touched.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let password_file = temp_dir.path().join("restic-password");
        fs::write(&password_file, "test-password-123").expect("Failed to write password file");

        let global = GlobalConfig {
            password_file,
            mounts: temp_dir.path().join("mounts"),
            remote_mounts: PathBuf::from("/mnt/remotebackup"),
            repository: None,
            retention_days: 14,
            ssh_user: "root".to_string(),
            identity_file: None,
            snapshot_size: "5G".to_string(),
            command_timeout_seconds: 60,
            log_level: "info".to_string(),
            log_directory: None,
            log_max_files: 5,
        };

        Self {
            temp_dir,
            global,
            hosts: Vec::new(),
            dry_run: false,
        }
    }

    /// Set the mount root
    pub fn with_mounts(mut self, path: &Path) -> Self {
        self.global.mounts = path.to_path_buf();
        self
    }

    /// Set the global retention window
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.global.retention_days = days;
        self
    }

    /// Set the SSH identity loaded once per connection
    pub fn with_identity_file(mut self, path: &Path) -> Self {
        self.global.identity_file = Some(path.to_path_buf());
        self
    }

    /// Mark the built config as a dry run
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Add a host without volumes
    pub fn add_host(mut self, name: &str) -> Self {
        self.hosts.push(Host {
            name: name.to_string(),
            address: None,
            user: None,
            transport: Transport::Ssh,
            retention_days: None,
            volumes: Vec::new(),
        });
        self
    }

    /// Add a volume to an already added host
    pub fn add_volume(mut self, host: &str, name: &str, kind: &str, filesystem: &str) -> Self {
        let host = self.host_mut(host);
        host.volumes.push(Volume {
            name: name.to_string(),
            kind: kind.to_string(),
            filesystem: filesystem.to_string(),
            location: format!("/dev/vg0/{}", name),
        });
        self
    }

    /// Override retention for one host
    pub fn with_host_retention(mut self, host: &str, days: u32) -> Self {
        self.host_mut(host).retention_days = Some(days);
        self
    }

    fn host_mut(&mut self, name: &str) -> &mut Host {
        self.hosts
            .iter_mut()
            .find(|h| h.name == name)
            .unwrap_or_else(|| panic!("Host '{}' must be added first", name))
    }

    /// Build the Config and keep the temp directory alive
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            hosts: self.hosts,
            dry_run: self.dry_run,
        };
        (config, self.temp_dir)
    }

    /// Write the config as `remotebackup.toml` inside the temp dir
    pub fn write(self) -> (PathBuf, Config, TempDir) {
        let (config, temp_dir) = self.persist();
        let path = temp_dir.path().join("remotebackup.toml");
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(&path, toml_str).expect("Failed to write config");
        (path, config, temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
