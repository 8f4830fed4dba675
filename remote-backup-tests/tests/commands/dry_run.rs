//! Tests for dry-run mode
//!
//! A dry run prints every command and executes none of them.

use remote_backup::BackupManager;
use std::sync::Arc;
use test_utils::{normalize_timestamps, ConfigBuilder, DryRunExecutor, MockExecutor};

fn builder() -> ConfigBuilder {
    ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", "ext4")
        .add_volume("h1", "v2", "lvm", "xfs")
        .add_host("h2")
}

#[test]
fn test_dry_run_matches_real_commands() {
    let (real_config, _real_dir) = builder().persist();
    let (mut dry_config, _dry_dir) = builder().dry_run().persist();
    // Same paths on both sides so the transcripts are comparable
    dry_config.global = real_config.global.clone();

    let mock = MockExecutor::new();
    BackupManager::new(real_config, Arc::new(mock.clone())).backup_all();

    let dry = DryRunExecutor::new();
    let report = BackupManager::new(dry_config, Arc::new(dry.clone())).backup_all();
    assert!(report.is_success());

    let real: Vec<_> = mock.get_calls().iter().map(|c| normalize_timestamps(c)).collect();
    let printed: Vec<_> = dry.printed().iter().map(|c| normalize_timestamps(c)).collect();
    assert_eq!(real, printed);
}

#[test]
fn test_dry_run_touches_nothing_locally() {
    let (config, _dir) = builder().dry_run().persist();
    let mounts = config.global.mounts.clone();
    let dry = DryRunExecutor::new();

    BackupManager::new(config, Arc::new(dry.clone())).backup_all();

    assert!(!mounts.exists());
    assert!(dry.printed().iter().any(|c| c.contains("lvcreate")));
    assert!(dry.printed().iter().any(|c| c.contains("backup --tag h2")));
}
