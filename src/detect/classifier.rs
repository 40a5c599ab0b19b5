use std::collections::HashMap;

use anyhow::Result;

use crate::frame::Frame;
use crate::store::Region;

/// Outcome of evaluating one frame against the configured regions.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluation {
    /// The strategy has no baseline yet (background subtraction before the
    /// first reference capture). Not an error: surfaced to consumers as
    /// "awaiting calibration" instead of a guessed occupancy.
    Uncalibrated,
    /// Raw occupancy signal per region id.
    Occupancy(HashMap<String, bool>),
}

impl Evaluation {
    pub fn occupancy(&self) -> Option<&HashMap<String, bool>> {
        match self {
            Evaluation::Uncalibrated => None,
            Evaluation::Occupancy(map) => Some(map),
        }
    }
}

/// A seat occupancy classification strategy.
///
/// `evaluate` must not mutate regions or any debounce state; it only maps a
/// frame to raw per-region signals. Strategies that need a baseline override
/// `capture_reference` and `is_calibrated`; for the rest the defaults make
/// calibration a no-op.
pub trait Classifier: Send {
    /// Strategy identifier, used in logs and the status endpoint.
    fn name(&self) -> &'static str;

    /// Produce the raw occupancy signal for every region in `regions`.
    fn evaluate(&mut self, frame: &Frame, regions: &[Region]) -> Result<Evaluation>;

    /// Replace the strategy's reference baseline with the given frame.
    fn capture_reference(&mut self, frame: &Frame) {
        let _ = frame;
    }

    fn is_calibrated(&self) -> bool {
        true
    }
}
