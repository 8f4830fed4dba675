//! Tests for the 'run' command
//!
//! The run command snapshots, mounts, backs up and tears down every host.

use remote_backup::config::load_config;
use remote_backup::BackupManager;
use std::sync::Arc;
use test_utils::{
    position_of, unsupported_filesystem_config_toml, ConfigBuilder, MockExecutor, MockResponse,
    TestContext, TestResult,
};

#[test]
fn test_single_ext4_volume_sequence() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", "ext4")
        .persist();
    let host_root = config.global.mounts.join("h1");
    let mock = MockExecutor::new();
    let manager = BackupManager::new(config, Arc::new(mock.clone()));

    let report = manager.backup_all();
    assert!(report.is_success(), "{:?}", report);

    let calls = mock.get_calls();
    let create = position_of(&calls, "lvcreate -y -L5G -s -pr -n v1:rb");
    let mount = position_of(&calls, "mount -o ro,noload /dev/vg0/v1:rb");
    let bridge = position_of(&calls, "sshfs root@h1:/mnt/remotebackup/v1");
    let backup = position_of(&calls, &format!("backup --tag h1 {}/", host_root.display()));
    let prune = position_of(&calls, "forget --tag h1 --keep-within 14d --prune");
    let release = position_of(&calls, "fusermount -u");
    let unmount = position_of(&calls, "then umount /mnt/remotebackup/v1; fi");
    let destroy = position_of(&calls, "lvremove -y /dev/vg0/v1:rb");

    assert!(create < mount);
    assert!(mount < bridge);
    assert!(bridge < backup);
    assert!(backup < prune);
    assert!(prune < release);
    assert!(release < unmount);
    assert!(unmount < destroy);

    assert_eq!(mock.call_count("backup --tag"), 1);
    assert_eq!(mock.call_count("forget --tag"), 1);
    assert!(host_root.join("v1").is_dir());
}

#[test]
fn test_unsupported_filesystem_on_second_host() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", "ext4")
        .add_host("h2")
        .add_volume("h2", "data", "lvm", "btrfs")
        .persist();
    let mock = MockExecutor::new();
    let manager = BackupManager::new(config, Arc::new(mock.clone()));

    let report = manager.backup_all();

    assert_eq!(report.hosts.len(), 2);
    assert!(report.hosts[0].is_success());
    assert!(!report.is_success());
    assert_eq!(report.failed_hosts(), 1);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].operation, "mount");
    assert_eq!(failures[0].host, "h2");
    assert!(failures[0].error.contains("unsupported filesystem"));

    assert_eq!(mock.call_count("/dev/vg0/data:rb /mnt/remotebackup/data"), 0);
    assert_eq!(mock.call_count("sshfs root@h2"), 0);
    assert_eq!(mock.call_count("backup --tag h2"), 1);
    assert_eq!(mock.call_count("lvremove -y /dev/vg0/data:rb"), 1);
}

#[test]
fn test_failing_host_does_not_stop_run() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("down")
        .add_volume("down", "root", "lvm", "ext4")
        .add_host("up")
        .add_volume("up", "root", "lvm", "xfs")
        .persist();
    let mock = MockExecutor::new()
        .fail_on("root@down", "ssh: connect to host down port 22: No route to host");
    let manager = BackupManager::new(config, Arc::new(mock.clone()));

    let report = manager.backup_all();

    assert!(!report.hosts[0].is_success());
    assert!(report.hosts[1].is_success());
    assert_eq!(mock.call_count("sshfs root@up"), 1);
    assert_eq!(mock.call_count("backup --tag down"), 1);
    assert_eq!(mock.call_count("backup --tag up"), 1);
}

#[test]
fn test_teardown_continues_past_stuck_volume() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "busy", "lvm", "ext4")
        .add_volume("h1", "idle", "lvm", "ext4")
        .persist();
    let busy_local = config.global.mounts.join("h1").join("busy");
    let mock = MockExecutor::new().fail_on(
        &format!("fusermount -u {}", busy_local.display()),
        "fusermount: failed to unmount: Device or resource busy",
    );
    let manager = BackupManager::new(config, Arc::new(mock.clone()));

    let report = manager.backup_all();

    let ops: Vec<_> = report.failures().map(|f| (f.operation, f.volume.clone())).collect();
    assert_eq!(
        ops,
        vec![
            ("unmount", Some("busy".to_string())),
            ("destroy", Some("busy".to_string())),
        ]
    );
    // The stuck volume is never removed while still mounted, its sibling is
    assert_eq!(mock.call_count("lvremove -y /dev/vg0/busy:rb"), 0);
    assert_eq!(mock.call_count("lvremove -y /dev/vg0/idle:rb"), 1);
}

#[test]
fn test_selected_hosts_only() {
    let (config, _dir) = ConfigBuilder::new().add_host("a").add_host("b").persist();
    let mock = MockExecutor::new();
    let manager = BackupManager::new(config, Arc::new(mock.clone()));

    let report = manager.backup_hosts(&["b".to_string()]);

    assert_eq!(report.hosts.len(), 1);
    assert_eq!(mock.call_count("backup --tag a"), 0);
    assert_eq!(mock.call_count("backup --tag b"), 1);
}

#[test]
fn test_repository_initialized_when_missing() {
    let (config, _dir) = ConfigBuilder::new().add_host("h1").persist();
    let mock = MockExecutor::new().fail_on("cat config", "Fatal: unable to open config file");
    let manager = BackupManager::new(config, Arc::new(mock.clone()));

    let report = manager.backup_all();

    assert!(report.is_success());
    let calls = mock.get_calls();
    assert!(position_of(&calls, " init") < position_of(&calls, "backup --tag h1"));
}

#[test]
fn test_loaded_config_with_unsupported_filesystem() -> TestResult {
    let ctx = TestContext::new();
    let path = ctx.write_config(unsupported_filesystem_config_toml());
    let config = load_config(&path)?;
    let mock = MockExecutor::new();

    let report = BackupManager::new(config, Arc::new(mock.clone())).backup_all();

    let failed: Vec<_> = report.failures().map(|f| f.to_string()).collect();
    assert_eq!(failed, vec!["mount h2/data: unsupported filesystem: btrfs"]);
    assert_eq!(mock.call_count("lvremove -y /dev/vg1/data:rb"), 1);
    assert!(ctx.mounts().join("h1").join("v1").is_dir());
    Ok(())
}

#[test]
fn test_global_retention_applied() {
    let (config, _dir) = ConfigBuilder::new()
        .with_retention_days(3)
        .add_host("h1")
        .add_host("h2")
        .with_host_retention("h2", 90)
        .persist();
    let mock = MockExecutor::new();

    BackupManager::new(config, Arc::new(mock.clone())).backup_all();

    assert_eq!(mock.call_count("forget --tag h1 --keep-within 3d"), 1);
    assert_eq!(mock.call_count("forget --tag h2 --keep-within 90d"), 1);
}

#[test]
fn test_timed_out_bridge_reported_as_mount_failure() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", "ext4")
        .persist();
    let mock = MockExecutor::new().expect("sshfs", MockResponse::Timeout);

    let report = BackupManager::new(config, Arc::new(mock.clone())).backup_all();

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.operation, "mount");
    assert!(failure.error.contains("timed out"));
    // A half-finished bind is still released before the snapshot goes away
    assert!(mock.position("fusermount").unwrap() < mock.position("lvremove").unwrap());
}

#[test]
fn test_custom_mount_root() {
    let root = tempfile::TempDir::new().unwrap();
    let mounts = root.path().join("srv").join("remotebackup");
    let (config, _dir) = ConfigBuilder::new()
        .with_mounts(&mounts)
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", "xfs")
        .persist();
    let mock = MockExecutor::new();

    let report = BackupManager::new(config, Arc::new(mock.clone())).backup_all();

    assert!(report.is_success());
    assert!(mounts.join("h1").join("v1").is_dir());
    assert_eq!(
        mock.call_count(&format!("backup --tag h1 {}/", mounts.join("h1").display())),
        1
    );
}
