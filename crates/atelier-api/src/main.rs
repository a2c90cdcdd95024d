//! Main entry point for the Atelier API gateway

use atelier_api::{config::Config, provisioning::InMemoryProvisioner, server::Server};
use atelier_common::logging::{init_logging_with_format, LogFormat};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "atelier-api", about = "Atelier API gateway", version, author)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Generate example configuration file
    #[arg(long)]
    gen_config: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "ATELIER_API_JSON_LOGS")]
    json_logs: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "{}=info,atelier_auth=info",
        env!("CARGO_BIN_NAME").replace('-', "_")
    );
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_logging_with_format(&args.verbosity, &log_filter, format)?;

    if args.gen_config {
        let example_config = Config::generate_example()?;
        println!("{example_config}");
        return Ok(());
    }

    info!("Starting Atelier API gateway v{}", atelier_api::VERSION);

    let config = Config::load(args.config)?;
    info!(
        "Configuration loaded, binding to {}",
        config.server.bind_address
    );

    let server = Server::new(config, Arc::new(InMemoryProvisioner::new())).await?;

    info!("Atelier API gateway initialized successfully");

    match server.run().await {
        Ok(()) => {
            info!("Atelier API gateway shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Atelier API gateway error: {}", e);
            Err(e.into())
        }
    }
}
