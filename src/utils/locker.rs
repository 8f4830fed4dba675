//! File-based locking to serialize restic runs against the shared repository

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive lock guarding one repository
pub struct RepositoryLock {
    lock_path: PathBuf,
}

impl RepositoryLock {
    pub fn new(repository: &Path) -> Self {
        Self {
            lock_path: Self::lock_path(repository),
        }
    }

    /// Run `f` while holding the lock, waiting for other holders to finish
    pub fn with_lock<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create lock directory")?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .context(format!("Failed to open lock file: {:?}", self.lock_path))?;

        let mut lock = RwLock::new(file);
        debug!("Waiting for repository lock: {:?}", self.lock_path);
        let _guard = lock
            .write()
            .context(format!("Failed to lock {:?}", self.lock_path))?;
        info!("Acquired repository lock: {:?}", self.lock_path);

        Ok(f())
    }

    /// Get the lock file path for a repository
    fn lock_path(repository: &Path) -> PathBuf {
        let key: String = repository
            .to_string_lossy()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        std::env::temp_dir().join(format!("remote-backup-{}.lock", key.trim_matches('_')))
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}
