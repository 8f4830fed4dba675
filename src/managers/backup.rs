//! Backup manager - orchestrates snapshot, bridge and restic runs per host

use crate::config::{Config, Host};
use crate::connection::{self, Connection};
use crate::error::BackupError;
use crate::snapshot::{self, Snapshot};
use crate::utils::executor::CommandExecutor;
use crate::utils::locker::RepositoryLock;
use crate::utils::restic::{BackupTool, Restic};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// One failed step of a host backup
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub operation: &'static str,
    pub host: String,
    pub volume: Option<String>,
    pub error: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.volume {
            Some(volume) => write!(
                f,
                "{} {}/{}: {}",
                self.operation, self.host, volume, self.error
            ),
            None => write!(f, "{} {}: {}", self.operation, self.host, self.error),
        }
    }
}

/// Outcome of backing up one host
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostReport {
    pub host: String,
    pub failures: Vec<StepFailure>,
}

impl HostReport {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Log a failure with its context and remember it
    fn record(&mut self, operation: &'static str, volume: Option<&str>, err: impl fmt::Display) {
        let message = format!("{:#}", err);
        error!(
            operation,
            host = %self.host,
            volume = volume.unwrap_or(""),
            error = %message,
            "Backup step failed"
        );
        self.failures.push(StepFailure {
            operation,
            host: self.host.clone(),
            volume: volume.map(str::to_string),
            error: message,
        });
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub hosts: Vec<HostReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.hosts.iter().all(HostReport::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepFailure> {
        self.hosts.iter().flat_map(|h| h.failures.iter())
    }

    pub fn failed_hosts(&self) -> usize {
        self.hosts.iter().filter(|h| !h.is_success()).count()
    }
}

/// Snapshots registered for teardown
///
/// Every snapshot that reached *created* is pushed here. [`ActiveSnapshots::teardown`]
/// unmounts then destroys each one; dropping the set without calling it
/// (e.g. while unwinding) still tears everything down.
struct ActiveSnapshots<'a> {
    snapshots: Vec<Box<dyn Snapshot + 'a>>,
}

impl<'a> ActiveSnapshots<'a> {
    fn new() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }

    fn push(&mut self, snapshot: Box<dyn Snapshot + 'a>) {
        self.snapshots.push(snapshot);
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Snapshot + 'a>> {
        self.snapshots.iter_mut()
    }

    fn teardown(mut self, report: &mut HostReport) {
        for mut snap in self.snapshots.drain(..) {
            teardown_one(snap.as_mut(), Some(&mut *report));
        }
    }
}

impl Drop for ActiveSnapshots<'_> {
    fn drop(&mut self) {
        for mut snap in self.snapshots.drain(..) {
            teardown_one(snap.as_mut(), None);
        }
    }
}

/// Unmount then destroy; a failed unmount of a mounted snapshot leaves the
/// snapshot refusing destruction
fn teardown_one(snap: &mut dyn Snapshot, mut report: Option<&mut HostReport>) {
    let volume = snap.volume().name.clone();

    if let Err(e) = snap.unmount() {
        match report.as_deref_mut() {
            Some(r) => r.record("unmount", Some(&volume), &e),
            None => warn!(volume = %volume, error = %e, "Failed to unmount snapshot"),
        }
    }

    if let Err(e) = snap.destroy() {
        match report.as_deref_mut() {
            Some(r) => r.record("destroy", Some(&volume), &e),
            None => warn!(volume = %volume, error = %e, "Failed to destroy snapshot"),
        }
    }
}

pub struct BackupManager {
    config: Config,
    executor: Arc<dyn CommandExecutor>,
    tool: Box<dyn BackupTool>,
}

impl BackupManager {
    /// Create new backup manager using restic as the backup tool
    pub fn new(config: Config, executor: Arc<dyn CommandExecutor>) -> Self {
        let tool = Box::new(Restic::new(&config.global, executor.clone()));
        Self::with_backup_tool(config, executor, tool)
    }

    /// Create backup manager with a specific backup tool
    pub fn with_backup_tool(
        config: Config,
        executor: Arc<dyn CommandExecutor>,
        tool: Box<dyn BackupTool>,
    ) -> Self {
        Self {
            config,
            executor,
            tool,
        }
    }

    /// Back up every configured host in order
    pub fn backup_all(&self) -> RunReport {
        info!("Starting backup for {} hosts", self.config.hosts.len());
        self.run(self.config.hosts.iter().collect())
    }

    /// Back up the named hosts in configured order
    ///
    /// Each host runs once however often it is named. Unknown names are
    /// reported as failures after the selected hosts.
    pub fn backup_hosts(&self, names: &[String]) -> RunReport {
        let selected: Vec<&Host> = self
            .config
            .hosts
            .iter()
            .filter(|h| names.contains(&h.name))
            .collect();
        let mut report = self.run(selected);

        let mut unknown: Vec<&str> = Vec::new();
        for name in names {
            if self.config.host(name).is_none() && !unknown.contains(&name.as_str()) {
                unknown.push(name);
            }
        }
        for name in unknown {
            let mut missing = HostReport::new(name);
            missing.record("lookup", None, "host not found in configuration");
            report.hosts.push(missing);
        }

        report
    }

    fn run(&self, hosts: Vec<&Host>) -> RunReport {
        let mut report = RunReport::default();

        for host in hosts {
            info!("Backing up: {}", host.name);
            let host_report = self.backup_host(host);
            if !host_report.is_success() {
                warn!(
                    host = %host.name,
                    failures = host_report.failures.len(),
                    "Host finished with failures"
                );
            }
            report.hosts.push(host_report);
        }

        info!(
            "Backup summary: {} succeeded, {} failed",
            report.hosts.len() - report.failed_hosts(),
            report.failed_hosts()
        );
        report
    }

    /// Run the full snapshot, mount, backup, teardown sequence for one host
    ///
    /// No step stops the ones after it. Teardown covers every snapshot that
    /// was created, whatever happened to its mount or to the backup.
    pub fn backup_host(&self, host: &Host) -> HostReport {
        let start = Instant::now();
        let mut report = HostReport::new(&host.name);

        let conn = connection::connect(&self.config, host, self.executor.clone());
        info!(host = %host.name, endpoint = %conn.endpoint(), "Connection ready");

        let mut active = self.create_snapshots(host, conn.as_ref(), &mut report);

        for snap in active.iter_mut() {
            if let Err(e) = snap.mount() {
                report.record("mount", Some(&snap.volume().name), &e);
            }
        }

        self.run_backup_tool(host, &mut report);

        active.teardown(&mut report);

        info!(
            host = %host.name,
            "Backup for host '{}' completed in {:.2}s",
            host.name,
            start.elapsed().as_secs_f64()
        );
        report
    }

    fn create_snapshots<'a>(
        &'a self,
        host: &'a Host,
        conn: &'a dyn Connection,
        report: &mut HostReport,
    ) -> ActiveSnapshots<'a> {
        let mut active = ActiveSnapshots::new();

        for volume in &host.volumes {
            let mut snap = match snapshot::new_snapshot(&self.config, conn, host, volume) {
                Ok(snap) => snap,
                Err(e) => {
                    report.record("instantiate", Some(&volume.name), &e);
                    continue;
                }
            };

            match snap.create() {
                Ok(()) => active.push(snap),
                Err(e) => report.record("create", Some(&volume.name), &e),
            }
        }

        active
    }

    /// Back up and prune the host's mount namespace, holding the repository lock
    ///
    /// The tool runs even when the namespace could not be created, so its own
    /// error for the missing root lands in the report too.
    fn run_backup_tool(&self, host: &Host, report: &mut HostReport) {
        let root = self.config.global.host_mounts(&host.name);

        if !self.config.dry_run {
            if let Err(e) = std::fs::create_dir_all(&root) {
                report.record(
                    "namespace",
                    None,
                    BackupError::UnableToCreateMountPoint {
                        path: root.clone(),
                        source: e,
                    },
                );
            }
        }

        let days = host.retention_days(&self.config.global);
        let lock = RepositoryLock::new(self.tool.repository());

        let locked = lock.with_lock(|| {
            let mut failures = Vec::new();

            if let Err(e) = self.tool.ensure_repository() {
                failures.push(("repository", e));
                return failures;
            }
            if let Err(e) = self.tool.backup(&host.name, &root) {
                failures.push(("backup", e));
            }
            if let Err(e) = self.tool.prune(&host.name, days) {
                failures.push(("prune", e));
            }
            failures
        });

        match locked {
            Ok(failures) => {
                for (operation, source) in failures {
                    report.record(
                        operation,
                        None,
                        BackupError::BackupToolFailure { operation, source },
                    );
                }
            }
            Err(e) => report.record("lock", None, e),
        }
    }
}
