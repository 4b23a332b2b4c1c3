//! Tick loop that owns the controller.
//!
//! The controller is moved into a single thread so every call into it is
//! serialized; everything else only sees published snapshots.

use crate::controller::Controller;
use crate::error::ControllerError;
use crate::feed::{DetectionFeed, apply_frame};
use crate::state::{SignalState, SnapshotRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tracing::{info, warn};

/// Apply the next detection frame, tick the controller and publish the result.
pub fn run_tick<F>(
    controller: &mut Controller,
    feed: &mut F,
    state: &Arc<RwLock<SignalState>>,
    now: Instant,
) -> Result<bool, ControllerError>
where
    F: DetectionFeed + ?Sized,
{
    if let Some(frame) = feed.next_frame() {
        apply_frame(controller, frame, now);
    }
    let changed = controller.update_all_lights_at(now);

    let record = SnapshotRecord {
        captured_at: SystemTime::now(),
        changed,
        intersections: controller.get_intersections_info(),
        lights: controller.get_light_states(),
    };
    let mut guard = state.write().map_err(|_| ControllerError::StateLock)?;
    guard.publish(record)?;
    Ok(changed)
}

/// Run ticks every `interval` until `stop` is set, then hand the controller back.
pub fn spawn_tick_thread<F>(
    mut controller: Controller,
    mut feed: F,
    state: Arc<RwLock<SignalState>>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<Controller>
where
    F: DetectionFeed + Send + 'static,
{
    std::thread::spawn(move || {
        if controller.intersections().is_empty() {
            warn!("Tick thread started with no intersections configured");
        }
        info!(
            interval_ms = interval.as_millis(),
            intersections = controller.intersections().len(),
            "Signal tick thread started"
        );

        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(e) = run_tick(&mut controller, &mut feed, &state, cycle_start) {
                warn!("Error running signal tick: {}", e);
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }

        info!("Signal tick thread stopped");
        controller
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100).min(remaining);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}
