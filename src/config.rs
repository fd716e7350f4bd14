use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Runtime configuration, passed into the export job at construction.
///
/// Loaded from a JSON file with env var overrides. A missing config file
/// falls back to defaults; a malformed one is a hard error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Retention window in days; also the fetch horizon on a fresh export.
    pub days_back: i64,
    /// Name of the export blob in the remote store.
    pub export_filename: String,
    /// Local copy of the export document, written before upload.
    pub local_export_file: PathBuf,
    /// Credential file for the activity API.
    pub strava_credentials_file: PathBuf,
    /// Credential file for the storage API.
    pub storage_credentials_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("strava-export");
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("strava-export");

        Self {
            days_back: 90,
            export_filename: "strava_export.json".to_string(),
            local_export_file: data_dir.join("strava_export.json"),
            strava_credentials_file: config_dir.join("strava_token.json"),
            storage_credentials_file: config_dir.join("drive_token.json"),
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            warn!(
                "Config file not found at {}, using default settings",
                path.display()
            );
            Self::default()
        };

        if let Ok(days_back) = std::env::var("STRAVA_EXPORT_DAYS_BACK") {
            config.days_back = days_back
                .parse()
                .context("STRAVA_EXPORT_DAYS_BACK is not an integer")?;
        }
        if let Ok(filename) = std::env::var("STRAVA_EXPORT_FILENAME") {
            config.export_filename = filename;
        }

        Ok(config)
    }

    /// Default config file path: `<config dir>/strava-export/config.json`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("strava-export")
            .join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Serializes tests that read or write the override env vars
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.days_back, 90);
        assert_eq!(config.export_filename, "strava_export.json");
        assert!(
            config
                .strava_credentials_file
                .to_string_lossy()
                .contains("strava_token.json")
        );
    }

    #[test]
    fn test_load_no_file_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.json");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.days_back, 90);
    }

    #[test]
    fn test_load_from_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"{{"days_back": 30, "export_filename": "custom.json"}}"#
        )
        .unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.days_back, 30);
        assert_eq!(config.export_filename, "custom.json");
        // Unspecified fields keep their defaults
        assert!(
            config
                .storage_credentials_file
                .to_string_lossy()
                .contains("drive_token.json")
        );
    }

    #[test]
    fn test_env_var_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(file, r#"{{"days_back": 30}}"#).unwrap();

        unsafe { std::env::set_var("STRAVA_EXPORT_DAYS_BACK", "7") };

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.days_back, 7);

        unsafe { std::env::remove_var("STRAVA_EXPORT_DAYS_BACK") };
    }

    #[test]
    fn test_invalid_json_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(file, r#"{{"days_back": ["#).unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("failed to parse config file")
        );
    }
}
