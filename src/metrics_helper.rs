use metrics::{counter, gauge};

/// Error/Reliability Metrics - Success/Failure pairs
pub fn increment_strava_api_success() {
    counter!("strava_api_total", "result" => "success").increment(1);
}

pub fn increment_strava_api_failure() {
    counter!("strava_api_total", "result" => "failure").increment(1);
}

pub fn increment_drive_api_success() {
    counter!("drive_api_total", "result" => "success").increment(1);
}

pub fn increment_drive_api_failure() {
    counter!("drive_api_total", "result" => "failure").increment(1);
}

pub fn increment_export_success() {
    counter!("export_total", "result" => "success").increment(1);
}

pub fn increment_export_failure() {
    counter!("export_total", "result" => "failure").increment(1);
}

/// Business Logic Metrics
pub fn increment_workouts_fetched_new(count: u64) {
    counter!("workouts_fetched_new").increment(count);
}

pub fn increment_workouts_skipped_duplicate(count: u64) {
    counter!("workouts_skipped_duplicate").increment(count);
}

pub fn increment_workouts_pruned_stale(count: u64) {
    counter!("workouts_pruned_stale").increment(count);
}

pub fn increment_fetch_windows_skipped() {
    counter!("fetch_windows_skipped").increment(1);
}

/// Resource Usage Metrics
pub fn record_export_size_bytes(size_bytes: u64) {
    gauge!("export_size_bytes").set(size_bytes as f64);
}

pub fn set_export_workout_count(count: u64) {
    gauge!("export_workout_count").set(count as f64);
}
