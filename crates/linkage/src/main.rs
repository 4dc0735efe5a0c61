//! Main entry point for the Linkage identity service

use clap::Parser;
use common::config::ConfigLoader;
use common::journal::init_journal;
use linkage::{config::LinkageConfig, metrics, server::Server};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "linkage",
    about = "Contact identity reconciliation service",
    version,
    author
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    gen_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.gen_config {
        println!("{}", LinkageConfig::generate_example()?);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => LinkageConfig::load_from_file(path)?,
        None => LinkageConfig::load(None)?,
    };
    if args.debug {
        config.logging.level = "debug".to_string();
    }

    init_journal(&config.logging)?;
    info!("Starting Linkage v{}", linkage::VERSION);

    metrics::init_metrics(&config.metrics)?;

    let server = Server::new(config).await?;
    info!("Linkage initialized successfully");

    match server.run().await {
        Ok(()) => {
            info!("Linkage shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Linkage error: {}", e);
            Err(e.into())
        }
    }
}
