//! Test context and harness for CLI testing
//!
//! Provides a unified context for setting up and tearing down test environments.

use crate::fixtures::render_config;
use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
}

impl TestContext {
    /// Create a new test context with a temporary directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Mount root used by configs written through this context
    pub fn mounts(&self) -> PathBuf {
        self.temp_dir.path().join("mounts")
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Create a password file with the given content
    pub fn create_password_file(&self, password: &str) -> PathBuf {
        self.create_file("restic-password", password)
    }

    /// Render a fixture template with this context's paths and write it
    pub fn write_config(&self, template: &str) -> PathBuf {
        let password_file = self.create_password_file("test-password");
        let contents = render_config(template, &password_file, &self.mounts());
        self.create_file("remotebackup.toml", &contents)
    }

    /// Read a file from the temp directory
    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.temp_dir.path().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
