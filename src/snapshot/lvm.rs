//! LVM-backed snapshots

use super::{FileSystem, Snapshot, SnapshotState};
use crate::config::{Config, Host, Volume};
use crate::connection::Connection;
use crate::error::{BackupError, Result};
use crate::utils::command::quote;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

/// Last timestamp handed out for a snapshot name in this process
static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Creation timestamp for a snapshot name, strictly increasing within the process
///
/// Follows the wall clock in seconds, stepping ahead when two snapshots would
/// otherwise land in the same second.
pub fn next_timestamp() -> i64 {
    let now = Utc::now().timestamp();
    let step = |last: i64| now.max(last + 1);
    match LAST_TIMESTAMP.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(step(last))) {
        Ok(last) | Err(last) => step(last),
    }
}

pub struct LvmSnapshot<'a> {
    config: &'a Config,
    conn: &'a dyn Connection,
    host: &'a Host,
    volume: &'a Volume,
    name: Option<String>,
    state: SnapshotState,
    /// A bind was dispatched and may have left mounts behind
    bind_attempted: bool,
}

impl<'a> LvmSnapshot<'a> {
    pub fn new(
        config: &'a Config,
        conn: &'a dyn Connection,
        host: &'a Host,
        volume: &'a Volume,
    ) -> Self {
        Self {
            config,
            conn,
            host,
            volume,
            name: None,
            state: SnapshotState::Unborn,
            bind_attempted: false,
        }
    }

    /// Snapshot name for a creation time: `<volume>:rb<unix seconds>`
    pub fn snapshot_name(volume: &str, timestamp: i64) -> String {
        format!("{}:rb{}", volume, timestamp)
    }

    /// Local mount point, stable across runs so restic sees the same paths
    pub fn local_mount_point(&self) -> PathBuf {
        self.config
            .global
            .host_mounts(&self.host.name)
            .join(&self.volume.name)
    }

    /// Remote mount point the sshfs bridge reads from
    pub fn remote_mount_point(&self) -> PathBuf {
        self.config.global.remote_mounts.join(&self.volume.name)
    }

    /// Snapshot block device, next to the origin volume
    pub fn device(&self) -> Option<PathBuf> {
        let name = self.name.as_ref()?;
        let origin = self.volume.origin_device();
        let dir = origin.parent().unwrap_or_else(|| Path::new("/dev/mapper"));
        Some(dir.join(name))
    }

    fn invalid(&self, operation: &'static str) -> BackupError {
        BackupError::InvalidTransition {
            volume: self.volume.name.clone(),
            operation,
            state: self.state,
        }
    }

    fn create_local_mount_point(&self, path: &Path) -> Result<()> {
        if self.config.dry_run {
            info!("Creating mountpoint: {:?}", path);
            return Ok(());
        }

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        // Recursive creation accepts an existing directory but not an existing file
        builder
            .create(path)
            .map_err(|source| BackupError::UnableToCreateMountPoint {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Mount command for a snapshot device; journals are never replayed on the frozen copy
pub fn mount_command(filesystem: FileSystem, device: &Path, target: &Path) -> String {
    let options = match filesystem {
        FileSystem::Ext4 => "ro,noload",
        FileSystem::Xfs => "ro,norecovery",
    };
    format!(
        "mount -o {} {} {}",
        options,
        quote(&device.display().to_string()),
        quote(&target.display().to_string())
    )
}

impl Snapshot for LvmSnapshot<'_> {
    fn create(&mut self) -> Result<()> {
        if self.state != SnapshotState::Unborn {
            return Err(self.invalid("create"));
        }

        let name = Self::snapshot_name(&self.volume.name, next_timestamp());
        let command = format!(
            "lvcreate -y -L{} -s -pr -n {} {}",
            quote(&self.config.global.snapshot_size),
            quote(&name),
            quote(&self.volume.origin_device().display().to_string())
        );

        self.conn
            .execute(&command)
            .map_err(|source| BackupError::SnapshotCreateFailure {
                name: name.clone(),
                source,
            })?;

        info!("Created snapshot {} on {}", name, self.host.name);
        self.name = Some(name);
        self.state = SnapshotState::Created;
        Ok(())
    }

    fn mount(&mut self) -> Result<()> {
        if !matches!(self.state, SnapshotState::Created | SnapshotState::Unmounted) {
            return Err(self.invalid("mount"));
        }

        let filesystem: FileSystem = self.volume.filesystem.parse()?;
        let device = self.device().ok_or_else(|| self.invalid("mount"))?;
        let local = self.local_mount_point();
        let remote = self.remote_mount_point();

        self.create_local_mount_point(&local)?;

        let command = mount_command(filesystem, &device, &remote);
        self.bind_attempted = true;
        self.conn.bind(&command, &remote, &local)?;

        self.state = SnapshotState::Mounted;
        Ok(())
    }

    fn unmount(&mut self) -> Result<()> {
        match self.state {
            SnapshotState::Mounted => {}
            SnapshotState::Created | SnapshotState::Unmounted if self.bind_attempted => {}
            SnapshotState::Unborn | SnapshotState::Created | SnapshotState::Unmounted => {
                return Ok(());
            }
            SnapshotState::Destroyed => return Err(self.invalid("unmount")),
        }

        let remote = self.remote_mount_point();
        let command = format!("umount {}", quote(&remote.display().to_string()));
        self.conn.unbind(&command, &remote, &self.local_mount_point())?;

        self.bind_attempted = false;
        self.state = SnapshotState::Unmounted;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        match self.state {
            SnapshotState::Unborn | SnapshotState::Destroyed => return Ok(()),
            SnapshotState::Mounted => return Err(self.invalid("destroy")),
            SnapshotState::Created | SnapshotState::Unmounted => {}
        }

        let device = self.device().ok_or_else(|| self.invalid("destroy"))?;
        let name = self.name.clone().unwrap_or_default();
        let command = format!("lvremove -y {}", quote(&device.display().to_string()));

        self.conn
            .execute(&command)
            .map_err(|source| BackupError::SnapshotDestroyFailure {
                name: name.clone(),
                source,
            })?;

        info!("Destroyed snapshot {} on {}", name, self.host.name);
        self.state = SnapshotState::Destroyed;
        Ok(())
    }

    fn volume(&self) -> &Volume {
        self.volume
    }

    fn host(&self) -> &Host {
        self.host
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn state(&self) -> SnapshotState {
        self.state
    }
}
