use crate::export::{Heartrate, Power, Split, Workout};
use crate::strava_client::{RawActivityDetail, RawLap};

/// Map a raw activity detail record onto the canonical workout shape.
///
/// Distance/speed/elevation fields absent upstream become a usable 0.0;
/// biometric fields (heartrate, power, relative effort) stay absent, since
/// a missing sensor reading is unknown rather than zero.
pub fn normalize(detail: &RawActivityDetail) -> Workout {
    let splits = detail
        .laps
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(normalize_lap)
        .collect();

    Workout {
        id: detail.id.to_string(),
        name: detail.name.clone(),
        workout_type: detail.activity_type.clone(),
        start_date: detail.start_date,
        start_date_local: detail.start_date_local,
        distance_meters: detail.distance.unwrap_or(0.0),
        elapsed_time_seconds: detail.elapsed_time as f64,
        moving_time_seconds: detail.moving_time as f64,
        total_elevation_gain_meters: detail.total_elevation_gain.unwrap_or(0.0),
        average_speed_mps: detail.average_speed.unwrap_or(0.0),
        max_speed_mps: detail.max_speed.unwrap_or(0.0),
        description: detail.description.clone(),
        device_name: detail.device_name.clone(),
        gear_id: detail.gear_id.clone(),
        heartrate: Heartrate {
            average: detail.average_heartrate,
            max: detail.max_heartrate,
        },
        power: Power {
            average_watts: detail.average_watts,
        },
        relative_effort: detail.suffer_score,
        splits,
    }
}

fn normalize_lap(lap: &RawLap) -> Split {
    Split {
        split_number: lap.split,
        distance_meters: lap.distance.unwrap_or(0.0),
        elapsed_time_seconds: lap.elapsed_time as f64,
        moving_time_seconds: lap.moving_time as f64,
        average_speed_mps: lap.average_speed.unwrap_or(0.0),
        average_heartrate: lap.average_heartrate,
        max_heartrate: lap.max_heartrate,
        average_watts: lap.average_watts,
    }
}
