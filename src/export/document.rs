use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SCHEMA_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub split_number: i64,
    pub distance_meters: f64,
    pub elapsed_time_seconds: f64,
    pub moving_time_seconds: f64,
    pub average_speed_mps: f64,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_watts: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartrate {
    pub average: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Power {
    pub average_watts: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub workout_type: String,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date_local: Option<DateTime<Utc>>,
    pub distance_meters: f64,
    pub elapsed_time_seconds: f64,
    pub moving_time_seconds: f64,
    pub total_elevation_gain_meters: f64,
    pub average_speed_mps: f64,
    pub max_speed_mps: f64,
    pub description: Option<String>,
    pub device_name: Option<String>,
    pub gear_id: Option<String>,
    pub heartrate: Heartrate,
    pub power: Power,
    pub relative_effort: Option<f64>,
    pub splits: Vec<Split>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub schema_version: String,
    pub exported_at: DateTime<Utc>,
}

/// The persisted export artifact: regenerated metadata plus the workout
/// collection, unique by id and sorted by start date descending before
/// every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub workouts: Vec<Workout>,
}

impl ExportDocument {
    pub fn new_empty(now: DateTime<Utc>) -> Self {
        Self {
            metadata: ExportMetadata {
                schema_version: SCHEMA_VERSION.to_string(),
                exported_at: now,
            },
            workouts: Vec::new(),
        }
    }

    /// Most recent `start_date` across all stored workouts. Re-scans every
    /// entry rather than trusting stored metadata, so out-of-order upstream
    /// backfills cannot poison the fetch horizon.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.workouts.iter().map(|w| w.start_date).max()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workouts.iter().any(|w| w.id == id)
    }

    /// Append incoming workouts whose id is not already present.
    /// First-seen-wins: a stored workout is never overwritten by a fresh
    /// fetch of the same id. Returns (added, skipped as duplicate).
    pub fn merge_new(&mut self, incoming: Vec<Workout>) -> (usize, usize) {
        let mut seen: HashSet<String> = self.workouts.iter().map(|w| w.id.clone()).collect();
        let mut added = 0;
        let mut skipped = 0;

        for workout in incoming {
            if seen.insert(workout.id.clone()) {
                self.workouts.push(workout);
                added += 1;
            } else {
                skipped += 1;
            }
        }

        (added, skipped)
    }

    /// Drop every workout strictly older than the cutoff. Returns the
    /// number removed.
    pub fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.workouts.len();
        self.workouts.retain(|w| w.start_date >= cutoff);
        before - self.workouts.len()
    }

    pub fn sort_by_start_date_desc(&mut self) {
        self.workouts
            .sort_by(|a, b| b.start_date.cmp(&a.start_date));
    }

    /// Regenerate metadata. Prior metadata is never carried over.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.metadata = ExportMetadata {
            schema_version: SCHEMA_VERSION.to_string(),
            exported_at: now,
        };
    }
}
