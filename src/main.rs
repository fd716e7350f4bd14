use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod drive_client;
mod export;
mod metrics_helper;
mod normalize;
mod strava_client;
mod token_provider;

use crate::cli::Cli;
use crate::config::Config;
use crate::export::ExportJob;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();

    let config = match Config::load(args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };
    let days_back = args.days_back.unwrap_or(config.days_back);

    info!("Exporting activities from the last {days_back} days");
    let job = ExportJob::new(&config, days_back);

    match job.run_export().await {
        Ok(()) => metrics_helper::increment_export_success(),
        Err(e) => {
            metrics_helper::increment_export_failure();
            error!("Export failed: {e:#}");
            std::process::exit(1);
        }
    }
}
