use signal_control::config;
use signal_control::controller::Controller;
use signal_control::feed::scripted::ScriptedFeed;
use signal_control::feed::{DetectionFeed, IdleFeed};
use signal_control::runner::spawn_tick_thread;
use signal_control::state::{SignalState, SnapshotRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        app = %config.app.name,
        config_path = config::DEFAULT_CONFIG_PATH,
        "signal-control starting"
    );

    let lights_path = config.lights_path();
    let mut controller = Controller::from_file(lights_path)?;
    if controller.adaptive_mode() != config.adaptive_mode() {
        controller.toggle_adaptive_mode();
    }
    tracing::info!(
        path = %lights_path.display(),
        lights = controller.lights().len(),
        intersections = controller.intersections().len(),
        adaptive = controller.adaptive_mode(),
        "Light configuration ready"
    );

    let feed = build_feed(&config);
    let state = Arc::new(RwLock::new(SignalState::new()));
    let snapshots = match state.read() {
        Ok(guard) => guard.subscribe_snapshots(),
        Err(_) => return Err("state lock poisoned before start".into()),
    };
    let event_log = tokio::spawn(log_snapshot_events(snapshots));

    let stop = Arc::new(AtomicBool::new(false));
    let tick_handle = spawn_tick_thread(
        controller,
        feed,
        Arc::clone(&state),
        config.tick_interval(),
        Arc::clone(&stop),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    stop.store(true, Ordering::Relaxed);

    match tokio::task::spawn_blocking(move || tick_handle.join()).await? {
        Ok(controller) => tracing::info!(
            accident = controller.accident_detected(),
            "Controller stopped"
        ),
        Err(_) => tracing::error!("Tick thread panicked"),
    }
    event_log.abort();

    Ok(())
}

fn build_feed(config: &config::Config) -> Box<dyn DetectionFeed + Send> {
    match config.script_path() {
        Some(path) => match ScriptedFeed::from_path(path, config.loop_script()) {
            Ok(feed) => {
                tracing::info!(
                    path = %path.display(),
                    frames = feed.len(),
                    looping = config.loop_script(),
                    "Detection script loaded"
                );
                Box::new(feed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load detection script, running idle");
                Box::new(IdleFeed)
            }
        },
        None => {
            tracing::info!("No detection script configured, running idle");
            Box::new(IdleFeed)
        }
    }
}

/// Log mode changes seen in published snapshots, the way a telemetry sink would.
async fn log_snapshot_events(mut snapshots: watch::Receiver<Option<SnapshotRecord>>) {
    let mut emergency = false;
    let mut accident = false;

    while snapshots.changed().await.is_ok() {
        let latest = snapshots.borrow_and_update().clone();
        let Some(record) = latest else {
            continue;
        };
        let timestamp = record.timestamp_rfc3339().unwrap_or_default();

        if let Some(adaptive) = record.adaptive_mode_changed() {
            let mode = if adaptive { "Adaptive" } else { "Fixed" };
            tracing::info!(%timestamp, "Traffic light mode changed to {}", mode);
        }
        if record.any_emergency() != emergency {
            emergency = record.any_emergency();
            tracing::info!(%timestamp, active = emergency, "Emergency priority");
        }
        if record.accident_mode() != accident {
            accident = record.accident_mode();
            tracing::info!(%timestamp, active = accident, "Accident mode");
        }
        if record.changed {
            for intersection in &record.intersections {
                tracing::debug!(
                    %timestamp,
                    intersection = %intersection.id,
                    active = ?intersection.active_phase,
                    pedestrian = intersection.is_pedestrian_phase,
                    "Signal state changed"
                );
            }
            for light in &record.lights {
                tracing::debug!(
                    light = %light.id,
                    state = light.state.as_str(),
                    remaining = light.remaining_seconds,
                    "Light state"
                );
            }
        }
    }
}
