use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::model::DetectionBackend;
use crate::detect::result::LabeledDetection;
use crate::frame::Frame;

/// Scriptable backend for tests and stub deployments.
///
/// Detections queued with `push_detections` are returned one batch per
/// frame; an empty queue reads as an empty scene.
#[derive(Default)]
pub struct StubBackend {
    queued: VecDeque<Vec<LabeledDetection>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_detections(&mut self, detections: Vec<LabeledDetection>) {
        self.queued.push_back(detections);
    }
}

impl DetectionBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<LabeledDetection>> {
        Ok(self.queued.pop_front().unwrap_or_default())
    }
}
