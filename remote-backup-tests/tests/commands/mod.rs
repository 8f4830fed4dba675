//! Command tests for remote-backup
//!
//! These tests drive full backup runs against a mocked executor.

mod dry_run;
mod run;
