//! Unit tests for snapshot construction and lifecycle over a mocked transport

use remote_backup::connection::connect;
use remote_backup::snapshot::{new_snapshot, SnapshotState};
use remote_backup::BackupError;
use rstest::rstest;
use std::sync::Arc;
use test_utils::{ConfigBuilder, MockExecutor};

#[test]
fn test_unsupported_volume_type() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "pool", "zfs", "ext4")
        .persist();
    let mock = MockExecutor::new();
    let host = &config.hosts[0];
    let conn = connect(&config, host, Arc::new(mock.clone()));

    let result = new_snapshot(&config, conn.as_ref(), host, &host.volumes[0]);

    assert!(matches!(result, Err(BackupError::UnsupportedVolumeType(ref t)) if t == "zfs"));
    assert!(mock.get_calls().is_empty());
}

#[rstest]
#[case("ext4", "mount -o ro,noload")]
#[case("xfs", "mount -o ro,norecovery")]
fn test_mount_options_by_filesystem(#[case] filesystem: &str, #[case] expected: &str) {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", filesystem)
        .persist();
    let mock = MockExecutor::new();
    let host = &config.hosts[0];
    let conn = connect(&config, host, Arc::new(mock.clone()));

    let mut snap = new_snapshot(&config, conn.as_ref(), host, &host.volumes[0]).unwrap();
    snap.create().unwrap();
    snap.mount().unwrap();

    assert_eq!(snap.state(), SnapshotState::Mounted);
    assert_eq!(mock.call_count(expected), 1);
}

#[rstest]
#[case("btrfs")]
#[case("ntfs")]
#[case("")]
fn test_unsupported_filesystem_dispatches_nothing(#[case] filesystem: &str) {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", filesystem)
        .persist();
    let mock = MockExecutor::new();
    let host = &config.hosts[0];
    let conn = connect(&config, host, Arc::new(mock.clone()));

    let mut snap = new_snapshot(&config, conn.as_ref(), host, &host.volumes[0]).unwrap();
    snap.create().unwrap();

    assert!(matches!(snap.mount(), Err(BackupError::UnsupportedFileSystem(_))));
    assert_eq!(mock.call_count("mount -o"), 0);
    assert_eq!(mock.call_count("sshfs"), 0);
}

#[test]
fn test_mount_paths_stable_across_runs() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", "ext4")
        .persist();
    let host = &config.hosts[0];
    let mut sshfs_targets = Vec::new();

    for _ in 0..2 {
        let mock = MockExecutor::new();
        let conn = connect(&config, host, Arc::new(mock.clone()));
        let mut snap = new_snapshot(&config, conn.as_ref(), host, &host.volumes[0]).unwrap();
        snap.create().unwrap();
        snap.mount().unwrap();
        snap.unmount().unwrap();
        snap.destroy().unwrap();

        let calls = mock.get_calls();
        sshfs_targets.push(calls.iter().find(|c| c.starts_with("sshfs")).cloned().unwrap());
    }

    assert_eq!(sshfs_targets[0], sshfs_targets[1]);
    assert!(sshfs_targets[0].ends_with(&format!(
        "{} -o ro",
        config.global.mounts.join("h1").join("v1").display()
    )));
}

#[test]
fn test_dry_run_creates_no_mount_point() {
    let (config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "v1", "lvm", "ext4")
        .dry_run()
        .persist();
    let host = &config.hosts[0];
    let conn = connect(&config, host, Arc::new(MockExecutor::new()));

    let mut snap = new_snapshot(&config, conn.as_ref(), host, &host.volumes[0]).unwrap();
    snap.create().unwrap();
    snap.mount().unwrap();

    assert!(!config.global.mounts.exists());
}
