//! Unit tests for configuration loading and validation

use remote_backup::config::{load_config, ConfigError, Transport, MOUNTS_ENV};
use serial_test::serial;
use std::path::PathBuf;
use test_utils::{minimal_config_toml, ConfigBuilder, TestContext};

#[test]
#[serial]
fn test_load_minimal_config() {
    let ctx = TestContext::new();
    let path = ctx.write_config(minimal_config_toml());

    let config = load_config(&path).unwrap();

    assert_eq!(config.hosts.len(), 1);
    let host = &config.hosts[0];
    assert_eq!(host.name, "h1");
    assert_eq!(host.transport, Transport::Ssh);
    assert_eq!(host.volumes[0].kind, "lvm");
    assert_eq!(host.volumes[0].filesystem, "ext4");
    assert_eq!(config.global.mounts, ctx.mounts());
    assert_eq!(host.retention_days(&config.global), 14);
}

#[test]
#[serial]
fn test_mounts_env_override() {
    let ctx = TestContext::new();
    let path = ctx.write_config(minimal_config_toml());

    std::env::set_var(MOUNTS_ENV, "/var/lib/remotebackup");
    let result = load_config(&path);
    std::env::remove_var(MOUNTS_ENV);

    assert_eq!(result.unwrap().global.mounts, PathBuf::from("/var/lib/remotebackup"));
}

#[test]
#[serial]
fn test_missing_password_file() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "remotebackup.toml",
        "[global]\npassword_file = \"/nonexistent/restic-password\"\n",
    );

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
#[serial]
fn test_duplicate_hosts_rejected() {
    let (path, _config, _dir) = ConfigBuilder::new().add_host("h1").add_host("h1").write();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Duplicate host"));
}

#[test]
#[serial]
fn test_volume_name_with_separator_rejected() {
    let (path, _config, _dir) = ConfigBuilder::new()
        .add_host("h1")
        .add_volume("h1", "../etc", "lvm", "ext4")
        .write();

    assert!(load_config(&path).is_err());
}

#[test]
#[serial]
fn test_unknown_transport_rejected() {
    let ctx = TestContext::new();
    let path = ctx.write_config(
        r#"
[global]
password_file = "{password_file}"

[[hosts]]
name = "h1"
transport = "telnet"
"#,
    );

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
#[serial]
fn test_invalid_toml() {
    let ctx = TestContext::new();
    let path = ctx.create_file("remotebackup.toml", "invalid { toml content");

    assert!(load_config(&path).is_err());
}

#[test]
fn test_nonexistent_file() {
    let result = load_config(std::path::Path::new("/nonexistent/remotebackup.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}
