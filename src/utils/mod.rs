pub mod command;
pub mod locker;
pub mod restic;

// Trait-based abstraction for dry runs and testability
pub mod executor;

pub use command::CommandLine;
pub use executor::{executor_for, CommandExecutor, DryRunExecutor, RealExecutor};
pub use restic::{BackupTool, Restic};
