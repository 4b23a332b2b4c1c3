//! JSON light configuration file.
//!
//! Only static configuration is persisted; timers and phase state start fresh
//! after every load.

use crate::controller::Controller;
use crate::error::ControllerError;
use crate::intersection::IntersectionId;
use crate::light::{LightConfig, LightId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightConfigFile {
    #[serde(default)]
    pub traffic_lights: Vec<LightConfig>,
    /// Intersection id to member light ids in cycle order, in file order.
    #[serde(default)]
    pub intersections: IndexMap<IntersectionId, Vec<LightId>>,
}

impl LightConfigFile {
    fn validate(&self) -> Result<(), ControllerError> {
        let mut seen = HashSet::new();
        for light in &self.traffic_lights {
            light.validate()?;
            if !seen.insert(light.id.as_str()) {
                return Err(ControllerError::Validation(format!(
                    "duplicate light id {}",
                    light.id
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub lights_loaded: usize,
    pub intersections_loaded: usize,
    pub skipped_intersections: Vec<IntersectionId>,
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<LightConfigFile, ControllerError> {
    let contents = std::fs::read_to_string(path)?;
    let file: LightConfigFile = serde_json::from_str(&contents)?;
    Ok(file)
}

/// Write `file` as 4-space indented JSON through a temporary sibling file.
pub fn write_config_file(
    path: impl AsRef<Path>,
    file: &LightConfigFile,
) -> Result<(), ControllerError> {
    let path = path.as_ref();
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    file.serialize(&mut serializer)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    if let Err(err) = std::fs::write(&temp_path, &buffer) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(err.into());
    }
    if let Err(err) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".temp");
    PathBuf::from(name)
}

impl Controller {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ControllerError> {
        let mut controller = Controller::new();
        controller.load_configuration(path)?;
        Ok(controller)
    }

    /// Static configuration of every light and intersection.
    pub fn to_config_file(&self) -> LightConfigFile {
        let traffic_lights = self.lights.iter().map(|l| l.config().clone()).collect();
        let intersections = self
            .intersections
            .iter()
            .map(|i| (i.id().to_string(), i.light_ids().to_vec()))
            .collect();
        LightConfigFile {
            traffic_lights,
            intersections,
        }
    }

    pub fn save_configuration(&self, path: impl AsRef<Path>) -> Result<(), ControllerError> {
        let path = path.as_ref();
        write_config_file(path, &self.to_config_file())?;
        info!(
            path = %path.display(),
            lights = self.lights.len(),
            intersections = self.intersections.len(),
            "Light configuration saved"
        );
        Ok(())
    }

    pub fn load_configuration(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<LoadReport, ControllerError> {
        let path = path.as_ref();
        let file = read_config_file(path)?;
        let report = self.apply_config_file_at(&file, Instant::now())?;
        info!(
            path = %path.display(),
            lights = report.lights_loaded,
            intersections = report.intersections_loaded,
            skipped = report.skipped_intersections.len(),
            "Light configuration loaded"
        );
        Ok(report)
    }

    /// Replace every light and intersection with the contents of `file`.
    ///
    /// The file is fully validated before anything is cleared. Intersections
    /// with no known lights are skipped rather than failing the load.
    pub fn apply_config_file_at(
        &mut self,
        file: &LightConfigFile,
        now: Instant,
    ) -> Result<LoadReport, ControllerError> {
        file.validate()?;

        self.clear();
        for config in &file.traffic_lights {
            self.add_traffic_light_at(config.clone(), now)?;
        }

        let mut report = LoadReport {
            lights_loaded: file.traffic_lights.len(),
            ..LoadReport::default()
        };
        for (intersection_id, members) in &file.intersections {
            let members: Vec<&str> = members.iter().map(String::as_str).collect();
            match self.create_intersection_at(intersection_id, &members, now) {
                Ok(()) => report.intersections_loaded += 1,
                Err(err) => {
                    warn!(
                        intersection = %intersection_id,
                        error = %err,
                        "Skipping intersection"
                    );
                    report.skipped_intersections.push(intersection_id.clone());
                }
            }
        }
        Ok(report)
    }
}
