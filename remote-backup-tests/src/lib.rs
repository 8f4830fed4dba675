//! Test utilities for remote-backup
//!
//! This crate provides shared test utilities and helper functions for
//! testing the remote-backup application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockExecutor};
//!
//! #[test]
//! fn my_test() {
//!     let (config, _dir) = ConfigBuilder::new()
//!         .add_host("h1")
//!         .add_volume("h1", "root", "lvm", "ext4")
//!         .persist();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::TestContext;

// Re-export types from the main crate for convenience
pub use remote_backup::config::{Config, GlobalConfig, Host, Transport, Volume};

// Re-export mock implementations from the main crate
pub use remote_backup::utils::executor::mock::{MockExecutor, MockResponse};
pub use remote_backup::utils::executor::{CommandExecutor, DryRunExecutor};

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
