//! ld-dock - LDPlayer fleet launcher and window dock
//!
//! Entry point: parses the command line, installs logging, loads the
//! configuration and dispatches to a command.

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ld_dock::commands::{
    DevicesCommand, DockCommand, InstancesCommand, ModifyCommand, RunCommand, ScanCommand,
};
use ld_dock::core::{AppConfig, APP_NAME, VERSION};
use ld_dock::bridge::{InstanceSettings, Resolution};
use ld_dock::dock::WindowId;

/// Launch LDPlayer instances and dock their windows
#[derive(Parser, Debug)]
#[command(name = "ld-dock", version)]
#[command(about = "Launch LDPlayer instances and dock their windows", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured emulator instances
    Instances {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List devices known to the bridge
    Devices,

    /// Change an instance's resource settings
    Modify {
        /// Instance index
        id: u32,
        #[arg(long)]
        cpu: Option<u32>,
        /// Memory in MB
        #[arg(long)]
        memory: Option<u32>,
        /// Screen size as WIDTHxHEIGHT
        #[arg(long)]
        resolution: Option<Resolution>,
        #[arg(long)]
        dpi: Option<u32>,
        #[arg(long)]
        fps: Option<u32>,
        /// New instance title
        #[arg(long)]
        title: Option<String>,
    },

    /// Start instances, wait for their home screen and launch the target app
    Run {
        /// Instances to drive in parallel
        #[arg(long)]
        threads: Option<usize>,
        /// Package launched on every instance
        #[arg(long)]
        package: Option<String>,
        /// Container window handles to dock the instances into
        #[arg(long, value_delimiter = ',')]
        containers: Vec<WindowId>,
    },

    /// List instance windows on the desktop
    Scan {
        /// Instance names to look for (defaults to the running instances)
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Dock instance windows into container windows until Ctrl-C
    Dock {
        /// Container window handles, one per slot
        #[arg(long, value_delimiter = ',', required = true)]
        containers: Vec<WindowId>,
        /// Instance names to dock (defaults to the running instances)
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("{} v{} starting...", APP_NAME, VERSION);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path).await?,
        None => AppConfig::load().await?,
    };

    match cli.command {
        Command::Instances { json } => InstancesCommand { json }.execute(&config).await,
        Command::Devices => DevicesCommand.execute(&config).await,
        Command::Modify {
            id,
            cpu,
            memory,
            resolution,
            dpi,
            fps,
            title,
        } => {
            let settings = InstanceSettings {
                cpu,
                memory_mb: memory,
                resolution,
                dpi,
                fps,
                title,
            };
            ModifyCommand { id, settings }.execute(&config).await
        }
        Command::Run {
            threads,
            package,
            containers,
        } => {
            RunCommand {
                threads,
                package,
                containers,
            }
            .execute(config)
            .await
        }
        Command::Scan { names } => ScanCommand { names }.execute(&config).await,
        Command::Dock { containers, names } => {
            DockCommand { containers, names }.execute(&config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_containers() {
        let cli = Cli::try_parse_from(["ld-dock", "run", "--threads", "3", "--containers", "0x10,32"])
            .unwrap();
        match cli.command {
            Command::Run {
                threads,
                containers,
                package,
            } => {
                assert_eq!(threads, Some(3));
                assert_eq!(containers, vec![WindowId(0x10), WindowId(32)]);
                assert_eq!(package, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_modify() {
        let cli = Cli::try_parse_from(["ld-dock", "--verbose", "modify", "2", "--resolution", "540x960"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Modify { id, resolution, .. } => {
                assert_eq!(id, 2);
                assert_eq!(resolution, Some(Resolution { width: 540, height: 960 }));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_dock_requires_containers() {
        assert!(Cli::try_parse_from(["ld-dock", "dock"]).is_err());
        assert!(Cli::try_parse_from(["ld-dock", "dock", "--containers", "0"]).is_err());
    }
}
