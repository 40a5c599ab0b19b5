//! State shared between the detection loop and the API threads.
//!
//! The detection loop is the sole writer of runtime state. Everything the
//! API may read lives in one [`Snapshot`] behind a single mutex; control
//! operations that must not interleave with a frame step travel through a
//! guarded command queue and are executed by the loop between steps.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::state::RuntimeState;
use crate::store::Region;

/// Control signals accepted from outside the detection loop. Each is
/// idempotent and safe to enqueue at any time, including mid-frame.
#[derive(Clone, Debug)]
pub enum Command {
    /// Capture/replace the classifier's reference frame now.
    CaptureReference,
    /// Replace the configured regions and persist them.
    SaveRegions(Vec<Region>),
    /// Reset all region states without recapturing the reference.
    ResetStates,
}

/// Read-only view published by the detection loop after each frame.
#[derive(Clone, Default)]
pub struct Snapshot {
    /// Latest rendered frame, JPEG-encoded for the preview stream.
    pub rendered_jpeg: Option<Arc<Vec<u8>>>,
    /// Region configuration + analytics as currently persisted.
    pub regions: Vec<Region>,
    /// Confirmed runtime state per region.
    pub runtime: Vec<RuntimeState>,
    /// False while the active classifier is awaiting calibration.
    pub calibrated: bool,
}

/// The single mutual-exclusion boundary between loop and API.
#[derive(Default)]
pub struct SharedState {
    snapshot: Mutex<Snapshot>,
    commands: Mutex<VecDeque<Command>>,
    shutdown: AtomicBool,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish the post-frame snapshot. Called by the loop only.
    pub fn publish(&self, snapshot: Snapshot) {
        let mut guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn latest_jpeg(&self) -> Option<Arc<Vec<u8>>> {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .rendered_jpeg
            .clone()
    }

    /// Enqueue a control signal for the loop's next step.
    pub fn push_command(&self, command: Command) {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(command);
    }

    /// Drain pending control signals. Called by the loop between frames.
    pub fn drain_commands(&self) -> Vec<Command> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
