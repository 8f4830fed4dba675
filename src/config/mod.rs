//! Configuration module for remote-backup
//!
//! Loads the TOML file describing the hosts to back up, their volumes and
//! the shared restic repository.
//!
//! ## Example Usage
//!
//! ```no_run
//! use remote_backup::config;
//!
//! let config = config::load_config("remotebackup.toml")?;
//!
//! for host in &config.hosts {
//!     println!("Host: {}, Volumes: {}", host.name, host.volumes.len());
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, validate_config, ConfigError, Result, MOUNTS_ENV};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
