//! Signal controller: owns every light and intersection and runs the tick.
//!
//! The controller is a plain value driven by synchronous calls. It never
//! spawns threads or sleeps; callers that share it across threads must
//! serialize access themselves.

use crate::error::ControllerError;
use crate::intersection::{Intersection, IntersectionId};
use crate::light::{Light, LightConfig, LightId, LightState, ZoneId};
use crate::timing::{
    PedestrianCounts, VehicleCounts, adaptive_green_duration, adaptive_pedestrian_duration,
};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Controller {
    pub(crate) lights: Vec<Light>,
    pub(crate) intersections: Vec<Intersection>,
    zone_index: HashMap<ZoneId, LightId>,
    pub(crate) adaptive_mode: bool,
    last_adaptive_mode: bool,
    pub(crate) adaptive_mode_changed: bool,
    pub(crate) accident_detected: bool,
    pub(crate) accident_zones: BTreeSet<ZoneId>,
    last_traffic_data: VehicleCounts,
    last_pedestrian_data: PedestrianCounts,
}

/// Inputs the duration formulas read during one tick.
struct TimingInputs<'a> {
    adaptive_mode: bool,
    traffic: &'a VehicleCounts,
    pedestrians: &'a PedestrianCounts,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            lights: Vec::new(),
            intersections: Vec::new(),
            zone_index: HashMap::new(),
            adaptive_mode: true,
            last_adaptive_mode: true,
            adaptive_mode_changed: false,
            accident_detected: false,
            accident_zones: BTreeSet::new(),
            last_traffic_data: VehicleCounts::new(),
            last_pedestrian_data: PedestrianCounts::new(),
        }
    }

    pub fn add_traffic_light(&mut self, config: LightConfig) -> Result<(), ControllerError> {
        self.add_traffic_light_at(config, Instant::now())
    }

    /// Register a light, replacing any light with the same id. The new light starts red.
    pub fn add_traffic_light_at(
        &mut self,
        config: LightConfig,
        now: Instant,
    ) -> Result<(), ControllerError> {
        config.validate()?;
        let light = Light::new_at(config, now);
        match self.lights.iter_mut().find(|l| l.id() == light.id()) {
            Some(existing) => {
                debug!(light = %light.id(), "Replacing traffic light");
                *existing = light;
            }
            None => {
                debug!(light = %light.id(), zone = %light.config().zone_id, "Adding traffic light");
                self.lights.push(light);
            }
        }
        self.rebuild_zone_index();
        Ok(())
    }

    pub fn create_intersection(
        &mut self,
        intersection_id: &str,
        light_ids: &[&str],
    ) -> Result<(), ControllerError> {
        self.create_intersection_at(intersection_id, light_ids, Instant::now())
    }

    /// Group known lights into an intersection. Unknown and repeated ids are
    /// dropped; the first remaining light starts green, the rest red.
    pub fn create_intersection_at(
        &mut self,
        intersection_id: &str,
        light_ids: &[&str],
        now: Instant,
    ) -> Result<(), ControllerError> {
        let mut members: Vec<LightId> = Vec::with_capacity(light_ids.len());
        for id in light_ids {
            if self.light(id).is_none() {
                warn!(intersection = %intersection_id, light = %id, "Ignoring unknown light");
                continue;
            }
            if !members.iter().any(|m| m == id) {
                members.push(id.to_string());
            }
        }
        if members.is_empty() {
            return Err(ControllerError::Configuration(format!(
                "no valid traffic lights for intersection {intersection_id}"
            )));
        }

        for member in &members {
            if let Some(other) = self
                .intersections
                .iter()
                .find(|i| i.id() != intersection_id && i.contains(member))
            {
                warn!(
                    light = %member,
                    intersection = %intersection_id,
                    other = %other.id(),
                    "Light is shared between intersections"
                );
            }
        }

        let mut intersection = Intersection::new(intersection_id.to_string(), members);
        for (index, member) in intersection.light_ids().iter().enumerate() {
            if let Some(light) = find_light_mut(&mut self.lights, member) {
                if index == 0 {
                    let duration = light.config().min_green_time;
                    light.set_state_at(LightState::Green, duration, now);
                } else {
                    light.set_state_at(LightState::Red, 0, now);
                }
            }
        }
        let first = intersection.light_ids()[0].clone();
        intersection.activate_phase(first, now);

        info!(
            intersection = %intersection_id,
            lights = ?intersection.light_ids(),
            "Intersection created"
        );
        match self
            .intersections
            .iter_mut()
            .find(|i| i.id() == intersection_id)
        {
            Some(existing) => *existing = intersection,
            None => self.intersections.push(intersection),
        }
        Ok(())
    }

    /// Remove a light that is not part of any intersection.
    pub fn remove_traffic_light(&mut self, light_id: &str) -> bool {
        if let Some(intersection) = self.intersections.iter().find(|i| i.contains(light_id)) {
            warn!(
                light = %light_id,
                intersection = %intersection.id(),
                "Refusing to remove light used by an intersection"
            );
            return false;
        }
        let before = self.lights.len();
        self.lights.retain(|light| light.id() != light_id);
        if self.lights.len() == before {
            return false;
        }
        self.rebuild_zone_index();
        true
    }

    /// Remove an intersection; its lights stay registered.
    pub fn remove_intersection(&mut self, intersection_id: &str) -> bool {
        let before = self.intersections.len();
        self.intersections.retain(|i| i.id() != intersection_id);
        self.intersections.len() != before
    }

    pub fn light(&self, light_id: &str) -> Option<&Light> {
        find_light(&self.lights, light_id)
    }

    /// Lights in registration order.
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn intersection(&self, intersection_id: &str) -> Option<&Intersection> {
        self.intersections.iter().find(|i| i.id() == intersection_id)
    }

    /// Intersections in creation order.
    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    pub fn intersection_ids(&self) -> Vec<IntersectionId> {
        self.intersections
            .iter()
            .map(|i| i.id().to_string())
            .collect()
    }

    /// Store the latest detection counts. Pedestrian counts are only replaced
    /// when a non-empty map is supplied.
    pub fn update_traffic_data(
        &mut self,
        vehicle_counts: VehicleCounts,
        pedestrian_counts: Option<PedestrianCounts>,
    ) {
        self.last_traffic_data = vehicle_counts;
        if let Some(pedestrians) = pedestrian_counts.filter(|p| !p.is_empty()) {
            self.last_pedestrian_data = pedestrians;
            for intersection in &mut self.intersections {
                if !intersection.pedestrian_phase_active {
                    intersection.pedestrian_phase_complete = false;
                }
            }
        }
    }

    pub fn last_traffic_data(&self) -> &VehicleCounts {
        &self.last_traffic_data
    }

    pub fn last_pedestrian_data(&self) -> &PedestrianCounts {
        &self.last_pedestrian_data
    }

    pub fn toggle_adaptive_mode(&mut self) -> bool {
        self.adaptive_mode = !self.adaptive_mode;
        self.adaptive_mode_changed = true;
        info!(adaptive = self.adaptive_mode, "Adaptive mode toggled");
        self.adaptive_mode
    }

    pub fn adaptive_mode(&self) -> bool {
        self.adaptive_mode
    }

    pub fn adaptive_mode_changed(&self) -> bool {
        self.adaptive_mode_changed
    }

    pub fn accident_detected(&self) -> bool {
        self.accident_detected
    }

    pub fn accident_zones(&self) -> &BTreeSet<ZoneId> {
        &self.accident_zones
    }

    /// Adaptive green time the given light would receive now.
    pub fn adaptive_green_duration(&self, light_id: &str) -> Option<u32> {
        let light = self.light(light_id)?;
        Some(adaptive_green_duration(
            light.config(),
            self.adaptive_mode,
            &self.last_traffic_data,
        ))
    }

    /// Adaptive pedestrian time the given intersection would receive now.
    pub fn adaptive_pedestrian_duration(&self, intersection_id: &str) -> Option<u32> {
        let intersection = self.intersection(intersection_id)?;
        let sample = self.light(intersection.light_ids().first()?)?;
        Some(adaptive_pedestrian_duration(
            sample.config(),
            self.adaptive_mode,
            &self.last_pedestrian_data,
        ))
    }

    pub fn update_all_lights(&mut self) -> bool {
        self.update_all_lights_at(Instant::now())
    }

    /// Run one controller tick. Returns true if any light transitioned or any
    /// intersection advanced its phase.
    pub fn update_all_lights_at(&mut self, now: Instant) -> bool {
        self.adaptive_mode_changed = self.adaptive_mode != self.last_adaptive_mode;
        self.last_adaptive_mode = self.adaptive_mode;

        if self.accident_detected {
            self.force_all_red(now);
            return false;
        }

        let mut changed = self.expire_emergency_buffers(now);

        for light in &mut self.lights {
            if light.update_at(now) {
                changed = true;
            }
        }

        let timing = TimingInputs {
            adaptive_mode: self.adaptive_mode,
            traffic: &self.last_traffic_data,
            pedestrians: &self.last_pedestrian_data,
        };
        for intersection in &mut self.intersections {
            if intersection.emergency_active() {
                continue;
            }
            if advance_intersection(intersection, &mut self.lights, &timing, now) {
                changed = true;
            }
        }

        changed
    }

    pub(crate) fn force_all_red(&mut self, now: Instant) {
        for light in &mut self.lights {
            if light.state() != LightState::Red {
                light.set_state_at(LightState::Red, 0, now);
            }
        }
    }

    /// First registered light watching `zone_id`.
    pub fn light_for_zone(&self, zone_id: &str) -> Option<&Light> {
        let light_id = self.zone_index.get(zone_id)?;
        self.light(light_id)
    }

    pub(crate) fn intersection_index_for_light(&self, light_id: &str) -> Option<usize> {
        self.intersections.iter().position(|i| i.contains(light_id))
    }

    pub(crate) fn clear(&mut self) {
        self.lights.clear();
        self.intersections.clear();
        self.zone_index.clear();
    }

    fn rebuild_zone_index(&mut self) {
        self.zone_index.clear();
        for light in &self.lights {
            self.zone_index
                .entry(light.config().zone_id.clone())
                .or_insert_with(|| light.id().to_string());
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn find_light<'a>(lights: &'a [Light], light_id: &str) -> Option<&'a Light> {
    lights.iter().find(|light| light.id() == light_id)
}

pub(crate) fn find_light_mut<'a>(lights: &'a mut [Light], light_id: &str) -> Option<&'a mut Light> {
    lights.iter_mut().find(|light| light.id() == light_id)
}

fn advance_intersection(
    intersection: &mut Intersection,
    lights: &mut [Light],
    timing: &TimingInputs<'_>,
    now: Instant,
) -> bool {
    let Some(active_id) = intersection.active_phase.clone() else {
        return initialize_phase(intersection, lights, now);
    };
    let Some(active_state) = find_light(lights, &active_id).map(Light::state) else {
        warn!(
            intersection = %intersection.id(),
            light = %active_id,
            "Active phase refers to a missing light"
        );
        return false;
    };

    if intersection.pedestrian_phase_active {
        // The phase lasts until the member with the longest crossing window is done.
        let crossing = intersection.light_ids().iter().any(|id| {
            find_light(lights, id).map(Light::state) == Some(LightState::Pedestrian)
        });
        if crossing {
            return false;
        }
        intersection.pedestrian_phase_active = false;
        intersection.pedestrian_phase_complete = true;
        debug!(intersection = %intersection.id(), "Pedestrian phase finished");
        let next = intersection.next_index(&active_id);
        return start_green(intersection, lights, next, timing, now);
    }

    if active_state != LightState::Red {
        return false;
    }

    let next = intersection.next_index(&active_id);
    if next == 0 {
        // Wrapping starts a new cycle, which always opens with a pedestrian phase.
        intersection.pedestrian_phase_complete = false;
        return start_pedestrian_phase(intersection, lights, timing, now);
    }
    start_green(intersection, lights, next, timing, now)
}

fn initialize_phase(intersection: &mut Intersection, lights: &mut [Light], now: Instant) -> bool {
    let Some(first) = intersection.light_ids().first().cloned() else {
        return false;
    };
    let Some(light) = find_light_mut(lights, &first) else {
        warn!(intersection = %intersection.id(), light = %first, "Cannot initialize phase");
        return false;
    };
    let duration = light.config().min_green_time;
    light.set_state_at(LightState::Green, duration, now);
    intersection.activate_phase(first, now);
    intersection.pedestrian_phase_active = false;
    intersection.pedestrian_phase_complete = false;
    debug!(intersection = %intersection.id(), "Phase initialized");
    true
}

fn start_green(
    intersection: &mut Intersection,
    lights: &mut [Light],
    index: usize,
    timing: &TimingInputs<'_>,
    now: Instant,
) -> bool {
    let Some(next_id) = intersection.light_ids().get(index).cloned() else {
        return false;
    };
    let Some(light) = find_light_mut(lights, &next_id) else {
        warn!(intersection = %intersection.id(), light = %next_id, "Next phase light missing");
        return false;
    };
    let duration = adaptive_green_duration(light.config(), timing.adaptive_mode, timing.traffic);
    light.set_state_at(LightState::Green, duration, now);
    debug!(
        intersection = %intersection.id(),
        light = %next_id,
        green_secs = light.current_duration(),
        "Phase advanced"
    );
    intersection.activate_phase(next_id, now);
    true
}

fn start_pedestrian_phase(
    intersection: &mut Intersection,
    lights: &mut [Light],
    timing: &TimingInputs<'_>,
    now: Instant,
) -> bool {
    let sample = intersection
        .light_ids()
        .first()
        .and_then(|id| find_light(lights, id));
    let Some(sample) = sample else {
        warn!(intersection = %intersection.id(), "No sample light for pedestrian timing");
        return false;
    };
    let duration =
        adaptive_pedestrian_duration(sample.config(), timing.adaptive_mode, timing.pedestrians);

    for member in intersection.light_ids() {
        if let Some(light) = find_light_mut(lights, member) {
            light.set_state_at(LightState::Pedestrian, duration, now);
        }
    }
    intersection.pedestrian_phase_active = true;
    info!(
        intersection = %intersection.id(),
        pedestrian_secs = duration,
        "Pedestrian phase started"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quick_light(id: &str) -> LightConfig {
        LightConfig {
            min_green_time: 2,
            max_green_time: 4,
            yellow_duration: 1,
            pedestrian_min_time: 1,
            pedestrian_max_time: 2,
            emergency_buffer_time: 2,
            ..LightConfig::new(id, id.to_uppercase(), format!("zone-{id}"))
        }
    }

    fn two_way(now: Instant) -> Result<Controller, ControllerError> {
        let mut controller = Controller::new();
        controller.add_traffic_light_at(quick_light("a"), now)?;
        controller.add_traffic_light_at(quick_light("b"), now)?;
        controller.create_intersection_at("main", &["a", "b"], now)?;
        Ok(controller)
    }

    fn state(controller: &Controller, id: &str) -> Option<LightState> {
        controller.light(id).map(Light::state)
    }

    #[test]
    fn create_intersection_starts_first_light_green() -> Result<(), ControllerError> {
        let now = Instant::now();
        let controller = two_way(now)?;

        assert_eq!(state(&controller, "a"), Some(LightState::Green));
        assert_eq!(state(&controller, "b"), Some(LightState::Red));
        let intersection = controller.intersection("main").ok_or_else(|| {
            ControllerError::Configuration("intersection missing".to_string())
        })?;
        assert_eq!(intersection.active_phase(), Some("a"));
        Ok(())
    }

    #[test]
    fn create_intersection_without_known_lights_fails() {
        let mut controller = Controller::new();
        let result = controller.create_intersection("ghost", &["nope"]);
        assert!(matches!(result, Err(ControllerError::Configuration(_))));
    }

    #[test]
    fn create_intersection_drops_unknown_and_duplicate_ids() -> Result<(), ControllerError> {
        let now = Instant::now();
        let mut controller = Controller::new();
        controller.add_traffic_light_at(quick_light("a"), now)?;
        controller.add_traffic_light_at(quick_light("b"), now)?;
        controller.create_intersection_at("main", &["b", "x", "a", "b"], now)?;

        let ids = controller
            .intersection("main")
            .map(|i| i.light_ids().to_vec())
            .unwrap_or_default();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
        Ok(())
    }

    #[test]
    fn tick_without_expiry_changes_nothing() -> Result<(), ControllerError> {
        let start = Instant::now();
        let mut controller = two_way(start)?;
        let phase_start = controller.intersection("main").and_then(|i| i.phase_start_time());

        assert!(!controller.update_all_lights_at(start + Duration::from_secs(1)));

        let intersection = controller.intersection("main");
        assert_eq!(intersection.and_then(|i| i.active_phase()), Some("a"));
        assert_eq!(intersection.and_then(|i| i.phase_start_time()), phase_start);
        Ok(())
    }

    #[test]
    fn red_active_light_hands_over_to_next() -> Result<(), ControllerError> {
        let start = Instant::now();
        let mut controller = two_way(start)?;

        assert!(controller.update_all_lights_at(start + Duration::from_secs(2)));
        assert_eq!(state(&controller, "a"), Some(LightState::Yellow));
        assert_eq!(state(&controller, "b"), Some(LightState::Red));

        assert!(controller.update_all_lights_at(start + Duration::from_secs(3)));
        assert_eq!(state(&controller, "a"), Some(LightState::Red));
        assert_eq!(state(&controller, "b"), Some(LightState::Green));
        assert_eq!(
            controller.intersection("main").and_then(|i| i.active_phase()),
            Some("b")
        );
        Ok(())
    }

    #[test]
    fn adaptive_timing_drives_next_green() -> Result<(), ControllerError> {
        let start = Instant::now();
        let mut controller = Controller::new();
        let wide = |id: &str| LightConfig {
            min_green_time: 16,
            max_green_time: 60,
            ..quick_light(id)
        };
        controller.add_traffic_light_at(wide("a"), start)?;
        controller.add_traffic_light_at(wide("b"), start)?;
        controller.create_intersection_at("main", &["a", "b"], start)?;
        controller.update_traffic_data(
            HashMap::from([(
                "zone-b".to_string(),
                HashMap::from([("car".to_string(), 10)]),
            )]),
            None,
        );

        controller.update_all_lights_at(start + Duration::from_secs(16));
        controller.update_all_lights_at(start + Duration::from_secs(17));

        assert_eq!(controller.light("b").map(Light::current_duration), Some(35));
        assert_eq!(controller.adaptive_green_duration("b"), Some(35));
        Ok(())
    }

    #[test]
    fn fixed_mode_uses_max_green() -> Result<(), ControllerError> {
        let start = Instant::now();
        let mut controller = two_way(start)?;
        assert!(!controller.toggle_adaptive_mode());

        controller.update_all_lights_at(start + Duration::from_secs(2));
        controller.update_all_lights_at(start + Duration::from_secs(3));

        assert_eq!(controller.light("b").map(Light::current_duration), Some(4));
        Ok(())
    }

    #[test]
    fn adaptive_mode_change_is_one_shot() -> Result<(), ControllerError> {
        let start = Instant::now();
        let mut controller = two_way(start)?;

        controller.toggle_adaptive_mode();
        assert!(controller.adaptive_mode_changed());

        controller.update_all_lights_at(start);
        assert!(controller.adaptive_mode_changed());

        controller.update_all_lights_at(start);
        assert!(!controller.adaptive_mode_changed());
        Ok(())
    }

    #[test]
    fn uninitialized_intersection_starts_first_light() -> Result<(), ControllerError> {
        let start = Instant::now();
        let mut controller = two_way(start)?;
        controller.intersections[0].reset_phase();
        controller.force_all_red(start);

        assert!(controller.update_all_lights_at(start + Duration::from_secs(1)));
        assert_eq!(state(&controller, "a"), Some(LightState::Green));
        assert_eq!(controller.light("a").map(Light::current_duration), Some(2));
        Ok(())
    }

    #[test]
    fn remove_light_refuses_intersection_members() -> Result<(), ControllerError> {
        let now = Instant::now();
        let mut controller = two_way(now)?;
        controller.add_traffic_light_at(quick_light("c"), now)?;

        assert!(!controller.remove_traffic_light("a"));
        assert!(controller.remove_traffic_light("c"));
        assert!(!controller.remove_traffic_light("c"));

        assert!(controller.remove_intersection("main"));
        assert!(controller.remove_traffic_light("a"));
        Ok(())
    }

    #[test]
    fn duplicate_zone_resolves_to_first_light() -> Result<(), ControllerError> {
        let now = Instant::now();
        let mut controller = Controller::new();
        controller.add_traffic_light_at(LightConfig::new("first", "First", "shared"), now)?;
        controller.add_traffic_light_at(LightConfig::new("second", "Second", "shared"), now)?;

        assert_eq!(controller.light_for_zone("shared").map(Light::id), Some("first"));

        assert!(controller.remove_traffic_light("first"));
        assert_eq!(controller.light_for_zone("shared").map(Light::id), Some("second"));
        Ok(())
    }

    #[test]
    fn pedestrian_counts_only_replace_when_present() -> Result<(), ControllerError> {
        let now = Instant::now();
        let mut controller = two_way(now)?;
        controller.update_traffic_data(
            VehicleCounts::new(),
            Some(PedestrianCounts::from([("cross".to_string(), 7)])),
        );
        controller.update_traffic_data(VehicleCounts::new(), None);
        controller.update_traffic_data(VehicleCounts::new(), Some(PedestrianCounts::new()));

        assert_eq!(controller.last_pedestrian_data().get("cross"), Some(&7));
        Ok(())
    }
}
