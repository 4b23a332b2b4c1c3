use signal_control::persistence::read_config_file;
use signal_control::{Controller, ControllerError, LightConfig, LightState};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(label: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    Ok(std::env::temp_dir().join(format!("signal-roundtrip-{label}-{unique}")))
}

fn light(id: &str, min_green: u32, max_green: u32) -> LightConfig {
    LightConfig {
        min_green_time: min_green,
        max_green_time: max_green,
        yellow_duration: 4,
        pedestrian_min_time: 12,
        pedestrian_max_time: 25,
        emergency_buffer_time: 8,
        position: (min_green as i32 * 10, max_green as i32),
        ..LightConfig::new(id, format!("{id} approach"), format!("zone-{id}"))
    }
}

#[test]
fn save_then_load_preserves_configuration() -> Result<(), Box<dyn std::error::Error>> {
    let dir = temp_dir("full")?;
    let path = dir.join("nested").join("lights.json");

    let mut original = Controller::new();
    original.add_traffic_light(light("west", 12, 45))?;
    original.add_traffic_light(light("east", 20, 70))?;
    original.add_traffic_light(light("south", 18, 50))?;
    original.create_intersection("zeta", &["south", "west"])?;
    original.create_intersection("alpha", &["east", "west", "south"])?;
    original.save_configuration(&path)?;

    let mut restored = Controller::new();
    let report = restored.load_configuration(&path)?;
    let _ = fs::remove_dir_all(&dir);

    assert_eq!(report.lights_loaded, 3);
    assert_eq!(report.intersections_loaded, 2);
    assert!(report.skipped_intersections.is_empty());
    assert_eq!(restored.to_config_file(), original.to_config_file());
    assert_eq!(
        restored.intersection_ids(),
        vec!["zeta".to_string(), "alpha".to_string()]
    );
    let alpha = restored
        .intersection("alpha")
        .ok_or_else(|| ControllerError::Configuration("alpha missing".to_string()))?;
    assert_eq!(alpha.light_ids(), ["east", "west", "south"]);
    assert_eq!(
        restored.light("east").map(|l| l.config().clone()),
        Some(light("east", 20, 70))
    );
    Ok(())
}

#[test]
fn saved_file_is_readable_and_leaves_no_temp_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = temp_dir("temp")?;
    let path = dir.join("lights.json");

    let mut controller = Controller::new();
    controller.add_traffic_light(light("north", 16, 60))?;
    controller.create_intersection("main", &["north"])?;
    controller.save_configuration(&path)?;

    let file = read_config_file(&path)?;
    let text = fs::read_to_string(&path)?;
    let temp_exists = dir.join("lights.json.temp").exists();
    let _ = fs::remove_dir_all(&dir);

    assert!(!temp_exists);
    assert!(text.contains("\n    \"traffic_lights\""));
    assert_eq!(file.traffic_lights.len(), 1);
    assert_eq!(file.intersections.len(), 1);
    assert_eq!(file.intersections.get("main"), Some(&vec!["north".to_string()]));
    Ok(())
}

#[test]
fn loading_resets_runtime_state() -> Result<(), Box<dyn std::error::Error>> {
    let dir = temp_dir("reset")?;
    let path = dir.join("lights.json");

    let mut controller = Controller::new();
    controller.add_traffic_light(light("a", 16, 60))?;
    controller.add_traffic_light(light("b", 16, 60))?;
    controller.create_intersection("main", &["a", "b"])?;
    controller.save_configuration(&path)?;

    assert!(controller.report_emergency_vehicle("zone-b", true));
    assert_eq!(controller.light("b").map(|l| l.state()), Some(LightState::Green));

    let result = controller.load_configuration(&path);
    let _ = fs::remove_dir_all(&dir);
    result?;

    let main = controller
        .intersection("main")
        .ok_or_else(|| ControllerError::Configuration("main missing".to_string()))?;
    assert!(!main.emergency_active());
    assert_eq!(main.active_phase(), Some("a"));
    assert_eq!(controller.light("a").map(|l| l.state()), Some(LightState::Green));
    assert_eq!(controller.light("b").map(|l| l.state()), Some(LightState::Red));
    Ok(())
}

#[test]
fn invalid_file_keeps_existing_configuration() -> Result<(), Box<dyn std::error::Error>> {
    let dir = temp_dir("invalid")?;
    fs::create_dir_all(&dir)?;
    let path = dir.join("lights.json");
    fs::write(
        &path,
        r#"{"traffic_lights": [{"id": "a", "name": "A", "zone_id": "z"}, {"id": "a", "name": "A2", "zone_id": "z2"}], "intersections": {}}"#,
    )?;

    let mut controller = Controller::new();
    controller.add_traffic_light(light("keep", 16, 60))?;
    controller.create_intersection("main", &["keep"])?;

    let result = controller.load_configuration(&path);
    let _ = fs::remove_dir_all(&dir);

    assert!(matches!(result, Err(ControllerError::Validation(_))));
    assert!(controller.light("keep").is_some());
    assert_eq!(controller.intersection_ids(), vec!["main".to_string()]);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
    let path = temp_dir("missing")?.join("lights.json");
    let result = Controller::from_file(&path);
    assert!(matches!(result, Err(ControllerError::Io(_))));
    Ok(())
}
