//! Debounced seat state tracking.
//!
//! Raw per-frame occupancy signals are noisy: a detector can miss a person
//! for a frame or two, or briefly hallucinate one. The engine only flips a
//! seat's confirmed status after the raw signal has disagreed with it
//! continuously for the dwell window, and emits a [`Transition`] carrying
//! the time spent in the state being closed out.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::SeatStatus;

/// Minimum continuous disagreement before a confirmed status flips.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(3);

/// A confirmed status change for one region.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub region_id: String,
    pub from: SeatStatus,
    pub to: SeatStatus,
    /// Instant the transition was confirmed.
    pub at: SystemTime,
    /// Time spent in `from`, measured from the previous confirmed change.
    pub duration: Duration,
}

impl Transition {
    pub fn duration_minutes(&self) -> f64 {
        self.duration.as_secs_f64() / 60.0
    }
}

/// Per-region runtime state. Owned exclusively by the [`StateEngine`].
#[derive(Clone, Debug)]
struct DetectionState {
    confirmed: SeatStatus,
    last_change: SystemTime,
    /// Start of an unconfirmed disagreement window, if one is open.
    pending_since: Option<SystemTime>,
}

impl DetectionState {
    fn new(now: SystemTime) -> Self {
        Self {
            confirmed: SeatStatus::Available,
            last_change: now,
            pending_since: None,
        }
    }
}

/// Read-only view of one region's runtime state, for status queries.
#[derive(Clone, Debug, Serialize)]
pub struct RuntimeState {
    pub id: String,
    pub status: SeatStatus,
    /// Seconds since the last confirmed change.
    pub in_state_secs: u64,
    /// Whether an unconfirmed disagreement window is open.
    pub pending: bool,
    /// Epoch seconds of the last confirmed change.
    pub last_change_epoch_s: u64,
}

/// Debounce/state engine over all configured regions.
pub struct StateEngine {
    dwell: Duration,
    states: HashMap<String, DetectionState>,
    /// Preserves region declaration order for snapshots.
    order: Vec<String>,
}

impl StateEngine {
    pub fn new(dwell: Duration) -> Self {
        Self {
            dwell,
            states: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Rebuild runtime state for a new region list. Existing states are
    /// dropped: a reconfiguration invalidates any pending window.
    pub fn configure<'a, I>(&mut self, ids: I, now: SystemTime)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.states.clear();
        self.order.clear();
        for id in ids {
            if self.states.contains_key(id) {
                continue;
            }
            self.states.insert(id.to_string(), DetectionState::new(now));
            self.order.push(id.to_string());
        }
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    pub fn region_count(&self) -> usize {
        self.order.len()
    }

    /// Feed one raw occupancy signal for one region.
    ///
    /// Returns a [`Transition`] only when the signal has disagreed with the
    /// confirmed status continuously for at least the dwell window. A signal
    /// agreeing with the confirmed status cancels any pending window.
    pub fn observe(
        &mut self,
        region_id: &str,
        raw_occupied: bool,
        now: SystemTime,
    ) -> Option<Transition> {
        let state = self.states.get_mut(region_id)?;
        let raw = SeatStatus::from_occupied(raw_occupied);

        if raw == state.confirmed {
            state.pending_since = None;
            return None;
        }

        let pending_since = *state.pending_since.get_or_insert(now);
        let disagreement = now.duration_since(pending_since).unwrap_or_default();
        if disagreement < self.dwell {
            return None;
        }

        let duration = now.duration_since(state.last_change).unwrap_or_default();
        let transition = Transition {
            region_id: region_id.to_string(),
            from: state.confirmed,
            to: raw,
            at: now,
            duration,
        };
        state.confirmed = raw;
        state.last_change = now;
        state.pending_since = None;
        Some(transition)
    }

    /// Force every region back to `available` and clear pending windows.
    ///
    /// Used when the classifier's baseline changes (a new reference frame is
    /// captured): any pre-reset pending signal is stale. Idempotent; the
    /// latest call's `now` wins.
    pub fn recalibrate(&mut self, now: SystemTime) {
        for state in self.states.values_mut() {
            state.confirmed = SeatStatus::Available;
            state.last_change = now;
            state.pending_since = None;
        }
    }

    /// Confirmed status of one region, if configured.
    pub fn confirmed(&self, region_id: &str) -> Option<SeatStatus> {
        self.states.get(region_id).map(|s| s.confirmed)
    }

    /// Snapshot of all regions in declaration order.
    pub fn snapshot(&self, now: SystemTime) -> Vec<RuntimeState> {
        self.order
            .iter()
            .filter_map(|id| {
                let state = self.states.get(id)?;
                Some(RuntimeState {
                    id: id.clone(),
                    status: state.confirmed,
                    in_state_secs: now
                        .duration_since(state.last_change)
                        .unwrap_or_default()
                        .as_secs(),
                    pending: state.pending_since.is_some(),
                    last_change_epoch_s: state
                        .last_change
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs(),
                })
            })
            .collect()
    }
}
