use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `global.mounts`
pub const MOUNTS_ENV: &str = "REMOTEBACKUP_MOUNTS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&contents)?;

    if let Some(mounts) = std::env::var_os(MOUNTS_ENV).filter(|v| !v.is_empty()) {
        config.global.mounts = PathBuf::from(mounts);
    }

    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
///
/// Volume types and filesystems are left alone here; unsupported ones are
/// reported per volume when a run reaches them.
pub fn validate_config(config: &Config) -> Result<()> {
    if !config.global.password_file.exists() {
        return Err(ConfigError::ValidationError(format!(
            "Password file does not exist: {:?}",
            config.global.password_file
        )));
    }

    validate_snapshot_size(&config.global.snapshot_size)?;

    if config.global.retention_days == 0 {
        return Err(ConfigError::ValidationError(
            "retention_days must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for host in &config.hosts {
        validate_name("host", &host.name)?;
        if !seen.insert(host.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate host: {}",
                host.name
            )));
        }
        validate_host(host)?;
    }

    Ok(())
}

fn validate_host(host: &Host) -> Result<()> {
    if host.retention_days == Some(0) {
        return Err(ConfigError::ValidationError(format!(
            "Host '{}': retention_days must be at least 1",
            host.name
        )));
    }

    // Volume names become mount directories, so they must be unique per host
    let mut seen = HashSet::new();
    for volume in &host.volumes {
        validate_name("volume", &volume.name)?;
        if !seen.insert(volume.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Host '{}': duplicate volume '{}'",
                host.name, volume.name
            )));
        }
    }

    Ok(())
}

/// Accept an LVM size such as `5G`, `512m` or `1.5t`
fn validate_snapshot_size(size: &str) -> Result<()> {
    let number = size.strip_suffix(|c: char| "bBsSkKmMgGtTpPeE".contains(c)).unwrap_or(size);
    let valid = number.starts_with(|c: char| c.is_ascii_digit())
        && number.chars().all(|c| c.is_ascii_digit() || c == '.')
        && number.matches('.').count() <= 1;

    if !valid {
        return Err(ConfigError::ValidationError(format!(
            "Invalid snapshot_size: {:?}",
            size
        )));
    }
    Ok(())
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!("Empty {} name", what)));
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(ConfigError::ValidationError(format!(
            "Invalid {} name: {:?}",
            what, name
        )));
    }
    Ok(())
}
