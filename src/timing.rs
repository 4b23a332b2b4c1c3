//! Adaptive green and pedestrian durations.
//!
//! Formula: below the low volume threshold the minimum time is used, above the
//! high threshold the maximum, and in between a linear interpolation truncated
//! to whole seconds.

use crate::light::{LightConfig, ZoneId};
use std::collections::HashMap;

/// Per-zone vehicle counts keyed by vehicle type, as reported by detection.
pub type VehicleCounts = HashMap<ZoneId, HashMap<String, u32>>;
/// Per-zone pedestrian counts.
pub type PedestrianCounts = HashMap<ZoneId, u32>;

pub const GREEN_VOLUME_LOW: f64 = 2.0;
pub const GREEN_VOLUME_HIGH: f64 = 20.0;
pub const PEDESTRIAN_VOLUME_LOW: f64 = 2.0;
pub const PEDESTRIAN_VOLUME_HIGH: f64 = 15.0;

pub const VEHICLE_WEIGHTS: [(&str, f64); 5] = [
    ("car", 1.0),
    ("truck", 2.0),
    ("bus", 2.0),
    ("motorcycle", 0.5),
    ("bicycle", 0.3),
];
pub const DEFAULT_VEHICLE_WEIGHT: f64 = 1.0;

pub fn vehicle_weight(vehicle_type: &str) -> f64 {
    let vehicle_type = vehicle_type.to_lowercase();
    VEHICLE_WEIGHTS
        .iter()
        .find(|(name, _)| *name == vehicle_type)
        .map(|(_, weight)| *weight)
        .unwrap_or(DEFAULT_VEHICLE_WEIGHT)
}

pub fn weighted_volume(counts: &HashMap<String, u32>) -> f64 {
    counts
        .iter()
        .map(|(vehicle_type, count)| f64::from(*count) * vehicle_weight(vehicle_type))
        .sum()
}

/// Map `volume` onto `[min_secs, max_secs]` between the `low` and `high` thresholds.
pub fn interpolate(volume: f64, low: f64, high: f64, min_secs: u32, max_secs: u32) -> u32 {
    if volume <= low {
        return min_secs;
    }
    if volume >= high {
        return max_secs;
    }
    let factor = (volume - low) / (high - low);
    let span = f64::from(max_secs) - f64::from(min_secs);
    (f64::from(min_secs) + factor * span) as u32
}

/// Green time for the light about to take the phase.
///
/// With adaptive mode off the maximum is used so every approach gets a full
/// fixed-time slot. A zone with no data falls back to the minimum.
pub fn adaptive_green_duration(
    config: &LightConfig,
    adaptive_mode: bool,
    traffic: &VehicleCounts,
) -> u32 {
    if !adaptive_mode {
        return config.max_green_time;
    }
    match traffic.get(&config.zone_id) {
        Some(counts) => interpolate(
            weighted_volume(counts),
            GREEN_VOLUME_LOW,
            GREEN_VOLUME_HIGH,
            config.min_green_time,
            config.max_green_time,
        ),
        None => config.min_green_time,
    }
}

/// Pedestrian crossing time for an intersection, using `sample` (the first
/// member light) for the min/max window.
///
/// Pedestrians are summed over every reported zone in the system, not only
/// the zones of this intersection.
pub fn adaptive_pedestrian_duration(
    sample: &LightConfig,
    adaptive_mode: bool,
    pedestrians: &PedestrianCounts,
) -> u32 {
    if !adaptive_mode {
        return sample.pedestrian_max_time;
    }
    let total: u64 = pedestrians.values().map(|count| u64::from(*count)).sum();
    interpolate(
        total as f64,
        PEDESTRIAN_VOLUME_LOW,
        PEDESTRIAN_VOLUME_HIGH,
        sample.pedestrian_min_time,
        sample.pedestrian_max_time,
    )
}
