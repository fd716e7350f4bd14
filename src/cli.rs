use clap::Parser;
use std::path::PathBuf;

/// Export Strava activities to a JSON document and upload it to Google Drive.
#[derive(Parser)]
#[command(name = "strava-export")]
pub struct Cli {
    /// Number of days to look back for activities
    #[arg(long)]
    pub days_back: Option<i64>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}
