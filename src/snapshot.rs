use crate::controller::Controller;
use crate::intersection::IntersectionId;
use crate::light::{LightId, LightState};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LightInfo {
    pub id: LightId,
    pub name: String,
    pub state: LightState,
    pub is_active: bool,
    pub remaining_seconds: u64,
    pub is_pedestrian_phase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IntersectionInfo {
    pub id: IntersectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_phase: Option<LightId>,
    pub lights: Vec<LightInfo>,
    pub is_pedestrian_phase: bool,
    pub is_emergency_active: bool,
    pub is_accident_mode: bool,
    pub is_adaptive_mode: bool,
    pub adaptive_mode_changed: bool,
}

impl IntersectionInfo {
    pub fn light(&self, light_id: &str) -> Option<&LightInfo> {
        self.lights.iter().find(|l| l.id == light_id)
    }
}

/// Per-light record for drawing signal markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LightStatus {
    pub id: LightId,
    pub name: String,
    pub state: LightState,
    pub remaining_seconds: u64,
    pub position: (i32, i32),
}

impl Controller {
    /// Render/log-ready view of every intersection, in creation order.
    pub fn get_intersections_info(&self) -> Vec<IntersectionInfo> {
        self.intersections
            .iter()
            .map(|intersection| {
                let active = intersection.active_phase();
                let is_pedestrian_phase = intersection.pedestrian_phase_active();
                let lights = intersection
                    .light_ids()
                    .iter()
                    .filter_map(|id| self.light(id))
                    .map(|light| LightInfo {
                        id: light.id().to_string(),
                        name: light.config().name.clone(),
                        state: light.state(),
                        is_active: active == Some(light.id()),
                        remaining_seconds: light.time_remaining().as_secs(),
                        is_pedestrian_phase,
                    })
                    .collect();
                IntersectionInfo {
                    id: intersection.id().to_string(),
                    active_phase: active.map(str::to_string),
                    lights,
                    is_pedestrian_phase,
                    is_emergency_active: intersection.emergency_active(),
                    is_accident_mode: self.accident_detected,
                    is_adaptive_mode: self.adaptive_mode,
                    adaptive_mode_changed: self.adaptive_mode_changed,
                }
            })
            .collect()
    }

    pub fn get_light_states(&self) -> Vec<LightStatus> {
        self.lights
            .iter()
            .map(|light| LightStatus {
                id: light.id().to_string(),
                name: light.config().name.clone(),
                state: light.state(),
                remaining_seconds: light.time_remaining().as_secs(),
                position: light.config().position,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::light::LightConfig;
    use serde_json::json;
    use std::time::{Duration, Instant};

    #[test]
    fn intersection_info_serializes_flat_records() -> Result<(), ControllerError> {
        let now = Instant::now();
        let mut controller = Controller::new();
        controller.add_traffic_light_at(LightConfig::new("a", "North", "z1"), now)?;
        controller.add_traffic_light_at(LightConfig::new("b", "South", "z2"), now)?;
        controller.create_intersection_at("main", &["a", "b"], now)?;
        controller.update_all_lights_at(now + Duration::from_secs(6));

        let info = controller.get_intersections_info();
        let value = serde_json::to_value(&info)?;

        assert_eq!(
            value,
            json!([{
                "id": "main",
                "active_phase": "a",
                "lights": [
                    {
                        "id": "a",
                        "name": "North",
                        "state": "GREEN",
                        "is_active": true,
                        "remaining_seconds": 10,
                        "is_pedestrian_phase": false
                    },
                    {
                        "id": "b",
                        "name": "South",
                        "state": "RED",
                        "is_active": false,
                        "remaining_seconds": 0,
                        "is_pedestrian_phase": false
                    }
                ],
                "is_pedestrian_phase": false,
                "is_emergency_active": false,
                "is_accident_mode": false,
                "is_adaptive_mode": true,
                "adaptive_mode_changed": false
            }])
        );
        Ok(())
    }

    #[test]
    fn light_states_carry_render_position() -> Result<(), ControllerError> {
        let mut controller = Controller::new();
        controller.add_traffic_light(LightConfig {
            position: (120, 340),
            ..LightConfig::new("a", "North", "z1")
        })?;

        let states = controller.get_light_states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].position, (120, 340));
        assert_eq!(states[0].state, LightState::Red);
        Ok(())
    }
}
