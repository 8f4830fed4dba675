//! Remote Backup Library
//!
//! Coordinates point-in-time backups of remote hosts: LVM snapshots are
//! created over SSH, bridged to the local machine with sshfs, backed up with
//! restic into one shared repository, then torn down again.

pub mod config;
pub mod connection;
pub mod error;
pub mod managers;
pub mod snapshot;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config, Host, Volume};
pub use error::BackupError;
pub use managers::backup::{BackupManager, HostReport, RunReport, StepFailure};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
