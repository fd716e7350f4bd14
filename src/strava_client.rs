use crate::metrics_helper;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;

const ENDPOINT: &str = "https://www.strava.com/api/v3";

#[derive(Debug)]
pub enum ApiError {
    Http(StatusCode),
    Network(reqwest_middleware::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Http(status) => write!(f, "HTTP {status}"),
            ApiError::Network(e) => write!(f, "Network error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Summary record from the activity list endpoint. Carries just enough to
/// decide whether the full detail record needs to be fetched.
#[derive(Debug, Deserialize, Clone)]
pub struct RawActivity {
    pub id: u64,
    pub name: String,
}

/// Full activity record from the per-activity endpoint, including laps.
#[derive(Debug, Deserialize, Clone)]
pub struct RawActivityDetail {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub start_date: DateTime<Utc>,
    pub start_date_local: Option<DateTime<Utc>>,
    pub distance: Option<f64>,
    pub elapsed_time: i64,
    pub moving_time: i64,
    pub total_elevation_gain: Option<f64>,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_watts: Option<f64>,
    pub suffer_score: Option<f64>,
    pub description: Option<String>,
    pub device_name: Option<String>,
    pub gear_id: Option<String>,
    pub laps: Option<Vec<RawLap>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawLap {
    pub split: i64,
    pub distance: Option<f64>,
    pub elapsed_time: i64,
    pub moving_time: i64,
    pub average_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_watts: Option<f64>,
}

pub struct StravaClient {
    client: ClientWithMiddleware,
}

impl Default for StravaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StravaClient {
    pub fn new() -> Self {
        // Create client with retry middleware
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self { client }
    }

    /// List activity summaries with `start_date` in the given unix-second
    /// range. Strava treats `after` as exclusive of the given second, so an
    /// activity starting exactly at the boundary second may be missed;
    /// callers pass the watermark unchanged and rely on id dedup downstream.
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        before: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RawActivity>, ApiError> {
        let path = format!("{ENDPOINT}/athlete/activities");

        let response = self
            .client
            .get(path)
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[
                ("after", after.to_string()),
                ("before", before.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                metrics_helper::increment_strava_api_failure();
                ApiError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics_helper::increment_strava_api_failure();
            return Err(ApiError::Http(status));
        }

        let activities = response.json::<Vec<RawActivity>>().await.map_err(|e| {
            metrics_helper::increment_strava_api_failure();
            ApiError::Network(reqwest_middleware::Error::Reqwest(e))
        })?;

        metrics_helper::increment_strava_api_success();
        Ok(activities)
    }

    /// Fetch the full detail record for one activity, laps included.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<RawActivityDetail, ApiError> {
        let path = format!("{ENDPOINT}/activities/{activity_id}");

        let response = self
            .client
            .get(path)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| {
                metrics_helper::increment_strava_api_failure();
                ApiError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics_helper::increment_strava_api_failure();
            return Err(ApiError::Http(status));
        }

        let detail = response.json::<RawActivityDetail>().await.map_err(|e| {
            metrics_helper::increment_strava_api_failure();
            ApiError::Network(reqwest_middleware::Error::Reqwest(e))
        })?;

        metrics_helper::increment_strava_api_success();
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_deserializes_with_absent_optional_fields() {
        let json = r#"{
            "id": 987654321,
            "name": "Morning Run",
            "type": "Run",
            "start_date": "2024-01-05T08:30:00Z",
            "elapsed_time": 1800,
            "moving_time": 1750
        }"#;

        let detail: RawActivityDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.id, 987654321);
        assert_eq!(detail.activity_type, "Run");
        assert!(detail.distance.is_none());
        assert!(detail.average_heartrate.is_none());
        assert!(detail.laps.is_none());
    }

    #[test]
    fn test_lap_deserializes() {
        let json = r#"{
            "split": 1,
            "distance": 1000.0,
            "elapsed_time": 300,
            "moving_time": 295,
            "average_speed": 3.3,
            "average_heartrate": 151.2,
            "max_heartrate": 160.0
        }"#;

        let lap: RawLap = serde_json::from_str(json).unwrap();
        assert_eq!(lap.split, 1);
        assert!(lap.average_watts.is_none());
    }
}
