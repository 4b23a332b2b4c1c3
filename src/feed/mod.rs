//! Detection input boundary.
//!
//! The detection pipeline is external. One [`DetectionFrame`] carries what it
//! reported for a single cycle, and [`apply_frame`] hands it to the controller
//! in the order the driver loop expects: counts first, then emergency reports,
//! then the accident report.

use crate::controller::Controller;
use crate::light::ZoneId;
use crate::timing::{PedestrianCounts, VehicleCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

pub mod scripted;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub vehicle_counts: VehicleCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pedestrian_counts: Option<PedestrianCounts>,
    /// Emergency vehicle presence per zone; zones not listed are not reported.
    #[serde(default)]
    pub emergency_zones: BTreeMap<ZoneId, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accident: Option<AccidentReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccidentReport {
    pub detected: bool,
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
}

pub trait DetectionFeed {
    /// Next cycle's detections, or `None` when the feed has nothing new.
    fn next_frame(&mut self) -> Option<DetectionFrame>;
}

impl DetectionFeed for Box<dyn DetectionFeed + Send> {
    fn next_frame(&mut self) -> Option<DetectionFrame> {
        (**self).next_frame()
    }
}

/// Feed used when no detection source is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleFeed;

impl DetectionFeed for IdleFeed {
    fn next_frame(&mut self) -> Option<DetectionFrame> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub emergencies_granted: usize,
    pub accident_changed: bool,
}

pub fn apply_frame(controller: &mut Controller, frame: DetectionFrame, now: Instant) -> FrameOutcome {
    let mut outcome = FrameOutcome::default();
    controller.update_traffic_data(frame.vehicle_counts, frame.pedestrian_counts);

    for (zone, present) in &frame.emergency_zones {
        if controller.report_emergency_vehicle_at(zone, *present, now) {
            outcome.emergencies_granted += 1;
        }
    }

    if let Some(accident) = frame.accident {
        outcome.accident_changed =
            controller.report_accident_at(accident.detected, accident.zone_id.as_deref(), now);
    }

    debug!(
        emergencies = outcome.emergencies_granted,
        accident_changed = outcome.accident_changed,
        "Detection frame applied"
    );
    outcome
}
