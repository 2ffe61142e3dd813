use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Paths;

#[derive(Parser)]
#[command(
    name = "seat-killer",
    version,
    about = "Books a library seat the moment the daily reservations open",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Separate credentials file (school_id / password)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Seat map report
    #[arg(long, global = true, default_value = "seat_report.txt")]
    seat_map: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run today's task: wait for the release instant and book
    Run {
        /// Write Prometheus metrics to this file when the run ends
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },

    /// Show today's task and the computed attack and fallback windows
    Plan,

    /// Log in and send one deliberately invalid booking to probe the service
    Check,

    /// Load and validate the configuration and the seat map
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let paths = Paths {
        config: cli.config,
        credentials: cli.credentials,
        seat_map: cli.seat_map,
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "seat-killer starting");

    match cli.command {
        Commands::Run { metrics_file } => {
            tracing::info!(
                config = %paths.config.display(),
                seat_map = %paths.seat_map.display(),
                metrics_file = ?metrics_file,
                "Starting run command"
            );
            commands::run(&paths, metrics_file.as_deref()).await?;
        }

        Commands::Plan => {
            commands::plan(&paths)?;
        }

        Commands::Check => {
            tracing::info!(config = %paths.config.display(), "Starting check command");
            commands::check(&paths).await?;
        }

        Commands::ValidateConfig => {
            commands::validate_config(&paths)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("seat_killer=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("seat_killer=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
