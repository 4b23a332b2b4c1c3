pub mod config;
pub mod controller;
pub mod error;
pub mod feed;
pub mod intersection;
pub mod light;
pub mod persistence;
pub mod preemption;
pub mod runner;
pub mod snapshot;
pub mod state;
pub mod timing;

pub use controller::Controller;
pub use error::ControllerError;
pub use intersection::{Emergency, Intersection, IntersectionId};
pub use light::{Light, LightConfig, LightId, LightState, ZoneId};
