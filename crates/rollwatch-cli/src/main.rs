use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "rollwatch",
    about = "Watch a fresh deployment and roll it back when it turns out unhealthy",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file (default: ./rollwatch.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log output format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Print the result as JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a deployment and roll back if it is unhealthy.
    Monitor {
        /// Production URL of the deployment
        url: String,
        /// Monitoring window in seconds (overrides rollback.timeout)
        #[arg(short, long)]
        window: Option<u64>,
        /// Report only; never roll back
        #[arg(long)]
        no_rollback: bool,
    },
    /// Roll back to the last stable deployment right away.
    Rollback {
        /// Production URL of the deployment
        url: String,
    },
    /// Probe a deployment once.
    Health {
        /// URL of the deployment
        url: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rollwatch=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = match cli.command {
        Commands::Monitor {
            url,
            window,
            no_rollback,
        } => {
            let overrides = commands::Overrides {
                window_secs: window,
                no_rollback,
            };
            commands::monitor::run(cli.config.as_deref(), &overrides, &url, cli.json).await
        }
        Commands::Rollback { url } => {
            commands::rollback::run(cli.config.as_deref(), &url, cli.json).await
        }
        Commands::Health { url } => {
            commands::health::run(cli.config.as_deref(), &url, cli.json).await
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "rollwatch failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
