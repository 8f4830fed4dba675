use anyhow::Result;
use clap::{Parser, Subcommand};
use remote_backup::config::{self, Config};
use remote_backup::managers::logging::{self, LoggingConfig};
use remote_backup::snapshot::{FileSystem, VolumeType};
use remote_backup::utils::executor_for;
use remote_backup::BackupManager;
use std::path::PathBuf;

/// External programs a real run depends on
const REQUIRED_PROGRAMS: [&str; 4] = ["ssh", "sshfs", "fusermount", "restic"];

#[derive(Parser)]
#[command(name = "remote-backup")]
#[command(about = "Snapshot remote volumes and back them up with restic", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "remotebackup.toml")]
    config: PathBuf,

    /// Only show what would be done
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Display the version string
    #[arg(short = 'v', long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up all configured hosts or only the selected ones
    Run {
        /// Host to back up (can be used multiple times)
        #[arg(long = "host")]
        hosts: Vec<String>,
    },

    /// List configured hosts and volumes
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file and required programs
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!(
            "remote-backup v{}\nremote-backup is licensed under the terms of the GPLv3.",
            env!("CARGO_PKG_VERSION")
        );
        return Ok(());
    }

    let mut config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_console_logging();
            tracing::error!(operation = "load_config", error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    config.dry_run = cli.dry_run;

    // Keep the guard alive until exit so file logs are flushed
    let logging_config = LoggingConfig::from_config(
        config.global.log_directory.as_deref(),
        &config.global.log_level,
        config.global.log_max_files,
    );
    let _log_guard = logging::init_logging(&logging_config)?;

    match cli.command.unwrap_or(Commands::Run { hosts: Vec::new() }) {
        Commands::Run { hosts } => handle_run(config, &hosts),
        Commands::List { json } => handle_list(&config, json),
        Commands::Validate => handle_validate(&config),
    }
}

fn handle_run(config: Config, hosts: &[String]) -> Result<()> {
    let executor = executor_for(config.dry_run)?;
    let manager = BackupManager::new(config, executor);

    let report = if hosts.is_empty() {
        manager.backup_all()
    } else {
        manager.backup_hosts(hosts)
    };

    if report.is_success() {
        println!("✓ Backed up {} host(s)", report.hosts.len());
        return Ok(());
    }

    eprintln!("✗ {} of {} host(s) had failures:", report.failed_hosts(), report.hosts.len());
    for failure in report.failures() {
        eprintln!("  {}", failure);
    }
    anyhow::bail!("backup finished with {} failed step(s)", report.failures().count())
}

fn handle_list(config: &Config, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&config.hosts)?);
        return Ok(());
    }

    if config.hosts.is_empty() {
        println!("No hosts configured");
        return Ok(());
    }

    for host in &config.hosts {
        println!(
            "{} ({}@{}, retention {}d)",
            host.name,
            host.user(&config.global),
            host.address(),
            host.retention_days(&config.global)
        );
        for volume in &host.volumes {
            let supported = volume.kind.parse::<VolumeType>().is_ok()
                && volume.filesystem.parse::<FileSystem>().is_ok();
            println!(
                "  {:<16} {:<5} {:<6} {}{}",
                volume.name,
                volume.kind,
                volume.filesystem,
                volume.origin_device().display(),
                if supported { "" } else { "  [unsupported]" }
            );
        }
    }

    Ok(())
}

fn handle_validate(config: &Config) -> Result<()> {
    let mut problems = Vec::new();

    for host in &config.hosts {
        for volume in &host.volumes {
            if let Err(e) = volume.kind.parse::<VolumeType>() {
                problems.push(format!("{}/{}: {}", host.name, volume.name, e));
            }
            if let Err(e) = volume.filesystem.parse::<FileSystem>() {
                problems.push(format!("{}/{}: {}", host.name, volume.name, e));
            }
        }
    }

    for program in REQUIRED_PROGRAMS {
        if which::which(program).is_err() {
            println!("⚠ {} not found in PATH", program);
        }
    }

    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("✗ {}", problem);
        }
        anyhow::bail!("{} configuration problem(s) found", problems.len());
    }

    println!("✓ Configuration is valid ({} host(s))", config.hosts.len());
    Ok(())
}
