//! Error taxonomy shared by snapshots, connections and the backup manager

use crate::snapshot::SnapshotState;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("unsupported volume type: {0}")]
    UnsupportedVolumeType(String),

    #[error("unsupported filesystem: {0}")]
    UnsupportedFileSystem(String),

    #[error("unable to create mountpoint {path:?}: {source}")]
    UnableToCreateMountPoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bind {remote:?} -> {local:?} failed: {source:#}")]
    BindFailure {
        remote: PathBuf,
        local: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("unbind {remote:?} -> {local:?} failed: {source:#}")]
    UnbindFailure {
        remote: PathBuf,
        local: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create snapshot {name}: {source:#}")]
    SnapshotCreateFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to destroy snapshot {name}: {source:#}")]
    SnapshotDestroyFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot {operation} snapshot of volume '{volume}' while {state}")]
    InvalidTransition {
        volume: String,
        operation: &'static str,
        state: SnapshotState,
    },

    #[error("backup tool {operation} failed: {source:#}")]
    BackupToolFailure {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, BackupError>;
