//! Single signal head and its timing state machine.
//!
//! A [`Light`] only knows its own timers. Which light in an intersection holds
//! the phase is decided by the controller.

use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub type LightId = String;
pub type ZoneId = String;

pub const DEFAULT_MIN_GREEN_SECS: u32 = 16;
pub const DEFAULT_MAX_GREEN_SECS: u32 = 60;
pub const DEFAULT_YELLOW_SECS: u32 = 3;
pub const DEFAULT_PEDESTRIAN_MIN_SECS: u32 = 10;
pub const DEFAULT_PEDESTRIAN_MAX_SECS: u32 = 30;
pub const DEFAULT_EMERGENCY_BUFFER_SECS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightState {
    Red,
    Yellow,
    Green,
    Pedestrian,
}

impl LightState {
    pub fn as_str(self) -> &'static str {
        match self {
            LightState::Red => "RED",
            LightState::Yellow => "YELLOW",
            LightState::Green => "GREEN",
            LightState::Pedestrian => "PEDESTRIAN",
        }
    }
}

/// Static parameters of one light, as persisted in the light configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightConfig {
    pub id: LightId,
    pub name: String,
    /// Detection zone feeding this light's approach.
    pub zone_id: ZoneId,
    #[serde(default = "default_min_green")]
    pub min_green_time: u32,
    #[serde(default = "default_max_green")]
    pub max_green_time: u32,
    #[serde(default = "default_yellow")]
    pub yellow_duration: u32,
    #[serde(default = "default_pedestrian_min")]
    pub pedestrian_min_time: u32,
    #[serde(default = "default_pedestrian_max")]
    pub pedestrian_max_time: u32,
    #[serde(default = "default_emergency_buffer")]
    pub emergency_buffer_time: u32,
    /// Render position in frame coordinates; not used by the controller.
    #[serde(default)]
    pub position: (i32, i32),
}

fn default_min_green() -> u32 {
    DEFAULT_MIN_GREEN_SECS
}

fn default_max_green() -> u32 {
    DEFAULT_MAX_GREEN_SECS
}

fn default_yellow() -> u32 {
    DEFAULT_YELLOW_SECS
}

fn default_pedestrian_min() -> u32 {
    DEFAULT_PEDESTRIAN_MIN_SECS
}

fn default_pedestrian_max() -> u32 {
    DEFAULT_PEDESTRIAN_MAX_SECS
}

fn default_emergency_buffer() -> u32 {
    DEFAULT_EMERGENCY_BUFFER_SECS
}

impl LightConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            zone_id: zone_id.into(),
            min_green_time: DEFAULT_MIN_GREEN_SECS,
            max_green_time: DEFAULT_MAX_GREEN_SECS,
            yellow_duration: DEFAULT_YELLOW_SECS,
            pedestrian_min_time: DEFAULT_PEDESTRIAN_MIN_SECS,
            pedestrian_max_time: DEFAULT_PEDESTRIAN_MAX_SECS,
            emergency_buffer_time: DEFAULT_EMERGENCY_BUFFER_SECS,
            position: (0, 0),
        }
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.id.trim().is_empty() {
            return Err(ControllerError::Validation("light id is empty".to_string()));
        }
        if self.zone_id.trim().is_empty() {
            return Err(ControllerError::Validation(format!(
                "light {} has an empty zone_id",
                self.id
            )));
        }
        if self.min_green_time > self.max_green_time {
            return Err(ControllerError::Validation(format!(
                "light {}: min_green_time {} exceeds max_green_time {}",
                self.id, self.min_green_time, self.max_green_time
            )));
        }
        if self.pedestrian_min_time > self.pedestrian_max_time {
            return Err(ControllerError::Validation(format!(
                "light {}: pedestrian_min_time {} exceeds pedestrian_max_time {}",
                self.id, self.pedestrian_min_time, self.pedestrian_max_time
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Light {
    config: LightConfig,
    state: LightState,
    last_state_change: Instant,
    current_duration: u32,
    time_remaining: Duration,
    pedestrian_duration: u32,
}

impl Light {
    pub fn new(config: LightConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    pub fn new_at(config: LightConfig, now: Instant) -> Self {
        let pedestrian_duration = config.pedestrian_min_time;
        Self {
            config,
            state: LightState::Red,
            last_state_change: now,
            current_duration: 0,
            time_remaining: Duration::ZERO,
            pedestrian_duration,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    pub fn state(&self) -> LightState {
        self.state
    }

    pub fn last_state_change(&self) -> Instant {
        self.last_state_change
    }

    /// Seconds allotted to the present state.
    pub fn current_duration(&self) -> u32 {
        self.current_duration
    }

    pub fn time_remaining(&self) -> Duration {
        self.time_remaining
    }

    pub fn pedestrian_duration(&self) -> u32 {
        self.pedestrian_duration
    }

    pub fn set_state(&mut self, state: LightState, duration_secs: u32) {
        self.set_state_at(state, duration_secs, Instant::now());
    }

    /// Enter `state`. `duration_secs` is clamped into the configured window for
    /// green and pedestrian phases and ignored for yellow and red.
    pub fn set_state_at(&mut self, state: LightState, duration_secs: u32, now: Instant) {
        let config = &self.config;
        self.current_duration = match state {
            LightState::Green => bound(duration_secs, config.min_green_time, config.max_green_time),
            LightState::Yellow => config.yellow_duration,
            LightState::Pedestrian => {
                bound(duration_secs, config.pedestrian_min_time, config.pedestrian_max_time)
            }
            LightState::Red => 0,
        };
        if state == LightState::Pedestrian {
            self.pedestrian_duration = self.current_duration;
        }
        self.state = state;
        self.last_state_change = now;
        self.time_remaining = Duration::from_secs(u64::from(self.current_duration));
    }

    pub fn update(&mut self) -> bool {
        self.update_at(Instant::now())
    }

    /// Age the current state. Returns true when the light changed state.
    pub fn update_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_state_change);
        let allotted = match self.state {
            LightState::Green | LightState::Pedestrian => self.current_duration,
            LightState::Yellow => self.config.yellow_duration,
            LightState::Red => {
                self.time_remaining = Duration::ZERO;
                return false;
            }
        };
        let allotted = Duration::from_secs(u64::from(allotted));

        if elapsed >= allotted {
            match self.state {
                LightState::Green => self.set_state_at(LightState::Yellow, 0, now),
                LightState::Yellow | LightState::Pedestrian => {
                    self.set_state_at(LightState::Red, 0, now)
                }
                LightState::Red => {}
            }
            return true;
        }

        self.time_remaining = allotted.saturating_sub(elapsed);
        false
    }
}

/// Clamp into `[min, max]`, letting `min` win when the window is inverted.
fn bound(value: u32, min: u32, max: u32) -> u32 {
    value.min(max).max(min)
}
