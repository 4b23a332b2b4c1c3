use crate::error::ControllerError;
use crate::snapshot::{IntersectionInfo, LightStatus};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;

/// Controller output captured after one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub captured_at: SystemTime,
    /// Whether the tick that produced this record changed any light or phase.
    pub changed: bool,
    pub intersections: Vec<IntersectionInfo>,
    pub lights: Vec<LightStatus>,
}

impl SnapshotRecord {
    pub fn timestamp_rfc3339(&self) -> Option<String> {
        OffsetDateTime::from(self.captured_at).format(&Rfc3339).ok()
    }

    pub fn any_emergency(&self) -> bool {
        self.intersections.iter().any(|i| i.is_emergency_active)
    }

    pub fn accident_mode(&self) -> bool {
        self.intersections.iter().any(|i| i.is_accident_mode)
    }

    pub fn adaptive_mode_changed(&self) -> Option<bool> {
        self.intersections
            .iter()
            .find(|i| i.adaptive_mode_changed)
            .map(|i| i.is_adaptive_mode)
    }
}

/// Latest published controller output, shared with render and log consumers.
#[derive(Debug)]
pub struct SignalState {
    snapshot: Option<SnapshotRecord>,
    snapshot_tx: watch::Sender<Option<SnapshotRecord>>,
    ticks: u64,
}

impl SignalState {
    pub fn new() -> Self {
        let (snapshot_tx, _snapshot_rx) = watch::channel(None);
        Self {
            snapshot: None,
            snapshot_tx,
            ticks: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&SnapshotRecord> {
        self.snapshot.as_ref()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<SnapshotRecord>> {
        self.snapshot_tx.subscribe()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn publish(&mut self, snapshot: SnapshotRecord) -> Result<(), ControllerError> {
        self.ticks += 1;
        self.snapshot = Some(snapshot.clone());
        self.snapshot_tx
            .send(Some(snapshot))
            .map_err(|_| ControllerError::WatchSend)
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}
