use crate::config::Config;
use crate::drive_client::DriveClient;
use crate::strava_client::StravaClient;
use crate::token_provider::TokenProvider;
use std::path::PathBuf;

mod document;
mod store;
mod sync;

pub use document::{
    ExportDocument, ExportMetadata, Heartrate, Power, SCHEMA_VERSION, Split, Workout,
};

/// One export run: fetch, reconcile against the previous snapshot, persist.
pub struct ExportJob {
    strava: StravaClient,
    drive: DriveClient,
    tokens: TokenProvider,
    days_back: i64,
    export_filename: String,
    local_export_file: PathBuf,
}

impl ExportJob {
    pub fn new(config: &Config, days_back: i64) -> Self {
        Self {
            strava: StravaClient::new(),
            drive: DriveClient::new(),
            tokens: TokenProvider::new(
                config.strava_credentials_file.clone(),
                config.storage_credentials_file.clone(),
            ),
            days_back,
            export_filename: config.export_filename.clone(),
            local_export_file: config.local_export_file.clone(),
        }
    }
}
