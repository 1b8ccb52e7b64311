//! droid-dex command line entry point
//!
//! Parses arguments, sets up logging and routes to a command.

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use droid_dex::commands::{BuildCommand, SdkCommand};
use droid_dex::core::{APP_NAME, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "droid-dex",
    about = "Convert compiled Android module classes into classes.dex",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the dex step over a project
    Build {
        /// Project file (TOML)
        project: PathBuf,
        /// Dex test outputs instead of production outputs
        #[arg(long)]
        tests: bool,
        /// Print messages as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show the SDK, dx jar and JDK the dex step would use
    Sdk {
        #[arg(long)]
        sdk_path: Option<PathBuf>,
        /// Build target to resolve, e.g. android-19
        #[arg(long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("{} v{} starting...", APP_NAME, VERSION);
    debug!("Parsed CLI arguments: {:?}", cli);

    let result = match cli.command {
        Commands::Build { project, tests, json } => {
            let command = BuildCommand {
                project_path: project,
                config_path: cli.config,
                tests,
                json,
            };
            command.execute().await.map(|summary| summary.success())
        }
        Commands::Sdk { sdk_path, target } => {
            let command = SdkCommand {
                config_path: cli.config,
                sdk_path,
                target,
            };
            command.execute().await.map(|_| true)
        }
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Command execution failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
