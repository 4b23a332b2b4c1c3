//! Emergency-vehicle priority and accident override.
//!
//! Accident override is system-wide and outranks everything: while any
//! accident zone is reported every light stays red. Emergency priority is
//! scoped to the intersection owning the reporting zone.

use crate::controller::{Controller, find_light_mut};
use crate::intersection::Emergency;
use crate::light::{LightState, ZoneId};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

impl Controller {
    pub fn report_emergency_vehicle(&mut self, zone_id: &str, is_present: bool) -> bool {
        self.report_emergency_vehicle_at(zone_id, is_present, Instant::now())
    }

    /// Report whether an emergency vehicle is in `zone_id`.
    ///
    /// Returns true only when priority was newly granted. A vehicle leaving
    /// starts the clearance buffer; the override ends in a later tick.
    pub fn report_emergency_vehicle_at(
        &mut self,
        zone_id: &str,
        is_present: bool,
        now: Instant,
    ) -> bool {
        if zone_id.is_empty() {
            return false;
        }
        let Some(light_id) = self.light_for_zone(zone_id).map(|l| l.id().to_string()) else {
            return false;
        };
        let Some(index) = self.intersection_index_for_light(&light_id) else {
            return false;
        };

        let intersection = &mut self.intersections[index];
        if is_present {
            if intersection.emergency_active() {
                return false;
            }
            intersection.emergency = Emergency::Active {
                zone: zone_id.to_string(),
                since: now,
            };
            intersection.pedestrian_phase_active = false;
            intersection.active_phase = Some(light_id.clone());
            warn!(
                intersection = %intersection.id(),
                zone = %zone_id,
                light = %light_id,
                "Emergency vehicle priority granted"
            );
            if self.accident_detected {
                debug!(zone = %zone_id, "Accident override in force, priority deferred");
            } else {
                self.apply_emergency_priority(index, now);
            }
            return true;
        }

        if let Emergency::Active { zone, .. } = &intersection.emergency {
            let zone = zone.clone();
            info!(
                intersection = %intersection.id(),
                zone = %zone,
                "Emergency vehicle cleared, buffer started"
            );
            intersection.emergency = Emergency::Clearing { zone, since: now };
        }
        false
    }

    /// Report accident status, optionally for a specific zone.
    ///
    /// Returns true when accident mode was entered or fully cleared.
    pub fn report_accident(&mut self, accident_detected: bool, zone_id: Option<&str>) -> bool {
        self.report_accident_at(accident_detected, zone_id, Instant::now())
    }

    pub fn report_accident_at(
        &mut self,
        accident_detected: bool,
        zone_id: Option<&str>,
        now: Instant,
    ) -> bool {
        if accident_detected {
            if let Some(zone) = zone_id {
                self.accident_zones.insert(zone.to_string());
            }
            let rising = !self.accident_detected;
            self.accident_detected = true;
            self.force_all_red(now);
            if rising {
                warn!(zone = ?zone_id, "Accident detected, all signals held red");
            }
            return rising;
        }

        if let Some(zone) = zone_id {
            self.accident_zones.remove(zone);
        }
        if self.accident_zones.is_empty() && self.accident_detected {
            self.accident_detected = false;
            info!("Accident cleared, normal operation resumes");
            self.reapply_emergency_priorities(now);
            return true;
        }
        false
    }

    /// Zones currently holding the accident override.
    pub fn accident_zone_ids(&self) -> Vec<ZoneId> {
        self.accident_zones.iter().cloned().collect()
    }

    /// Release intersections whose clearance buffer has run out. The buffer
    /// length comes from the first member light of the intersection.
    pub(crate) fn expire_emergency_buffers(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for intersection in &mut self.intersections {
            let Emergency::Clearing { since, .. } = intersection.emergency else {
                continue;
            };
            let buffer_secs = intersection
                .light_ids()
                .first()
                .and_then(|id| self.lights.iter().find(|l| l.id() == id))
                .map(|l| l.config().emergency_buffer_time)
                .unwrap_or(crate::light::DEFAULT_EMERGENCY_BUFFER_SECS);
            if now.saturating_duration_since(since) >= Duration::from_secs(u64::from(buffer_secs))
            {
                info!(intersection = %intersection.id(), "Emergency override ended");
                intersection.emergency = Emergency::Inactive;
                changed = true;
            }
        }
        changed
    }

    fn apply_emergency_priority(&mut self, index: usize, now: Instant) {
        let intersection = &self.intersections[index];
        let Some(priority) = intersection.active_phase.clone() else {
            return;
        };
        for member in intersection.light_ids() {
            let Some(light) = find_light_mut(&mut self.lights, member) else {
                continue;
            };
            if *member == priority {
                let duration = light.config().max_green_time;
                light.set_state_at(LightState::Green, duration, now);
            } else {
                light.set_state_at(LightState::Red, 0, now);
            }
        }
    }

    fn reapply_emergency_priorities(&mut self, now: Instant) {
        let pending: Vec<usize> = self
            .intersections
            .iter()
            .enumerate()
            .filter(|(_, i)| matches!(i.emergency, Emergency::Active { .. }))
            .map(|(index, _)| index)
            .collect();
        for index in pending {
            self.apply_emergency_priority(index, now);
        }
    }
}
