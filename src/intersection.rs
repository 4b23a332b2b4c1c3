use crate::light::{LightId, ZoneId};
use std::time::Instant;

pub type IntersectionId = String;

/// Emergency-vehicle override state of one intersection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Emergency {
    #[default]
    Inactive,
    /// Vehicle present in `zone`; priority light held since `since`.
    Active { zone: ZoneId, since: Instant },
    /// Vehicle gone; clearance buffer counting from `since`.
    Clearing { zone: ZoneId, since: Instant },
}

/// An ordered group of lights sharing a single active phase.
#[derive(Debug, Clone)]
pub struct Intersection {
    id: IntersectionId,
    light_ids: Vec<LightId>,
    pub(crate) active_phase: Option<LightId>,
    pub(crate) phase_start_time: Option<Instant>,
    pub(crate) pedestrian_phase_active: bool,
    pub(crate) pedestrian_phase_complete: bool,
    pub(crate) emergency: Emergency,
}

impl Intersection {
    pub(crate) fn new(id: IntersectionId, light_ids: Vec<LightId>) -> Self {
        Self {
            id,
            light_ids,
            active_phase: None,
            phase_start_time: None,
            pedestrian_phase_active: false,
            pedestrian_phase_complete: false,
            emergency: Emergency::Inactive,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Member lights in cycle order.
    pub fn light_ids(&self) -> &[LightId] {
        &self.light_ids
    }

    pub fn contains(&self, light_id: &str) -> bool {
        self.light_ids.iter().any(|id| id == light_id)
    }

    pub fn position_of(&self, light_id: &str) -> Option<usize> {
        self.light_ids.iter().position(|id| id == light_id)
    }

    /// Member after `light_id` in cycle order, wrapping to the first.
    pub fn next_index(&self, light_id: &str) -> usize {
        match self.position_of(light_id) {
            Some(index) => (index + 1) % self.light_ids.len(),
            None => 0,
        }
    }

    pub fn active_phase(&self) -> Option<&str> {
        self.active_phase.as_deref()
    }

    pub fn phase_start_time(&self) -> Option<Instant> {
        self.phase_start_time
    }

    pub fn pedestrian_phase_active(&self) -> bool {
        self.pedestrian_phase_active
    }

    pub fn pedestrian_phase_complete(&self) -> bool {
        self.pedestrian_phase_complete
    }

    pub fn emergency(&self) -> &Emergency {
        &self.emergency
    }

    pub fn emergency_active(&self) -> bool {
        !matches!(self.emergency, Emergency::Inactive)
    }

    pub fn emergency_buffer_active(&self) -> bool {
        matches!(self.emergency, Emergency::Clearing { .. })
    }

    pub fn emergency_vehicle_zone(&self) -> Option<&str> {
        match &self.emergency {
            Emergency::Active { zone, .. } | Emergency::Clearing { zone, .. } => Some(zone),
            Emergency::Inactive => None,
        }
    }

    pub fn emergency_start_time(&self) -> Option<Instant> {
        match self.emergency {
            Emergency::Active { since, .. } | Emergency::Clearing { since, .. } => Some(since),
            Emergency::Inactive => None,
        }
    }

    pub(crate) fn activate_phase(&mut self, light_id: LightId, now: Instant) {
        self.active_phase = Some(light_id);
        self.phase_start_time = Some(now);
    }

    #[cfg(test)]
    pub(crate) fn reset_phase(&mut self) {
        self.active_phase = None;
        self.phase_start_time = None;
        self.pedestrian_phase_active = false;
        self.pedestrian_phase_complete = false;
    }
}
