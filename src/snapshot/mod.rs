//! Point-in-time copies of remote volumes
//!
//! A snapshot moves through a fixed lifecycle:
//!
//! ```text
//! Unborn --create--> Created --mount--> Mounted --unmount--> Unmounted
//!                       |                                       |
//!                       +---------------destroy-----------------+--> Destroyed
//! ```
//!
//! Destroying is refused while mounted. Each volume manager provides its own
//! [`Snapshot`] implementation, chosen by the volume's type tag.

pub mod lvm;

use crate::config::{Config, Host, Volume};
use crate::connection::Connection;
use crate::error::{BackupError, Result};
use std::fmt;
use std::str::FromStr;

pub use lvm::LvmSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Unborn,
    Created,
    Mounted,
    Unmounted,
    Destroyed,
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotState::Unborn => "unborn",
            SnapshotState::Created => "created",
            SnapshotState::Mounted => "mounted",
            SnapshotState::Unmounted => "unmounted",
            SnapshotState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

pub trait Snapshot {
    /// Take the point-in-time copy. Only valid once per instance.
    fn create(&mut self) -> Result<()>;

    /// Expose the copy on the remote side and bridge it locally
    fn mount(&mut self) -> Result<()>;

    /// Undo [`Snapshot::mount`]; safe after a partially failed mount
    fn unmount(&mut self) -> Result<()>;

    /// Release the copy; a no-op when it was never created
    fn destroy(&mut self) -> Result<()>;

    fn volume(&self) -> &Volume;

    fn host(&self) -> &Host;

    /// Generated name, set once created
    fn name(&self) -> Option<&str>;

    fn state(&self) -> SnapshotState;
}

/// Volume managers with a snapshot implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeType {
    Lvm,
}

impl FromStr for VolumeType {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lvm" => Ok(VolumeType::Lvm),
            other => Err(BackupError::UnsupportedVolumeType(other.to_string())),
        }
    }
}

/// Filesystems a snapshot knows how to mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystem {
    Ext4,
    Xfs,
}

impl FromStr for FileSystem {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ext4" => Ok(FileSystem::Ext4),
            "xfs" => Ok(FileSystem::Xfs),
            other => Err(BackupError::UnsupportedFileSystem(other.to_string())),
        }
    }
}

/// Build the snapshot implementation registered for the volume's type
pub fn new_snapshot<'a>(
    config: &'a Config,
    conn: &'a dyn Connection,
    host: &'a Host,
    volume: &'a Volume,
) -> Result<Box<dyn Snapshot + 'a>> {
    match volume.kind.parse::<VolumeType>()? {
        VolumeType::Lvm => Ok(Box::new(LvmSnapshot::new(config, conn, host, volume))),
    }
}
