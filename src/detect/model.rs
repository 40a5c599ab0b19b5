//! Model-inference strategy.
//!
//! Runs one object-detection pass per frame through a pluggable
//! [`DetectionBackend`] and maps accepted boxes onto regions. Degenerate
//! whole-frame boxes are discarded by an area filter before they can touch
//! any occupancy decision, and labels carrying the "empty" keyword count as
//! vacancy rather than presence.

use std::collections::HashMap;

use anyhow::Result;

use crate::detect::classifier::{Classifier, Evaluation};
use crate::detect::result::LabeledDetection;
use crate::frame::Frame;
use crate::store::Region;

/// Object-detection backend contract.
///
/// Implementations run inference over a frame and return labeled boxes in
/// normalized coordinates. They must not mutate regions or hold onto the
/// frame beyond the call.
pub trait DetectionBackend: Send {
    fn name(&self) -> &'static str;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LabeledDetection>>;

    /// Optional warm-up hook (model load sanity pass).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ModelSettings {
    /// Detections below this confidence are discarded.
    pub min_confidence: f32,
    /// Boxes covering at least this fraction of the frame are discarded
    /// regardless of confidence (wall/whole-frame glitches).
    pub max_area_fraction: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.35,
            max_area_fraction: 0.70,
        }
    }
}

pub struct ModelClassifier {
    backend: Box<dyn DetectionBackend>,
    settings: ModelSettings,
}

impl ModelClassifier {
    pub fn new(backend: Box<dyn DetectionBackend>, settings: ModelSettings) -> Self {
        Self { backend, settings }
    }

    fn accepts(&self, detection: &LabeledDetection) -> bool {
        detection.confidence >= self.settings.min_confidence
            && detection.area_fraction() < self.settings.max_area_fraction
    }
}

impl Classifier for ModelClassifier {
    fn name(&self) -> &'static str {
        "model"
    }

    fn evaluate(&mut self, frame: &Frame, regions: &[Region]) -> Result<Evaluation> {
        let detections = self.backend.detect(frame)?;
        let presences: Vec<&LabeledDetection> = detections
            .iter()
            .filter(|d| self.accepts(d) && !d.indicates_empty())
            .collect();

        let mut occupancy = HashMap::with_capacity(regions.len());
        for region in regions {
            let occupied = presences.iter().any(|d| d.overlaps(&region.bounds));
            occupancy.insert(region.id.clone(), occupied);
        }
        Ok(Evaluation::Occupancy(occupancy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;
    use crate::store::RegionBounds;
    use image::RgbImage;
    use std::time::SystemTime;

    fn frame() -> Frame {
        Frame::new(RgbImage::new(320, 240), SystemTime::now())
    }

    fn region(id: &str, x: f32, y: f32, w: f32, h: f32) -> Region {
        Region::new(id, RegionBounds { x, y, w, h })
    }

    fn detection(label: &str, confidence: f32, x: f32, y: f32, w: f32, h: f32) -> LabeledDetection {
        LabeledDetection {
            label: label.to_string(),
            confidence,
            x,
            y,
            w,
            h,
        }
    }

    fn classifier_with(detections: Vec<LabeledDetection>) -> ModelClassifier {
        let mut backend = StubBackend::new();
        backend.push_detections(detections);
        ModelClassifier::new(Box::new(backend), ModelSettings::default())
    }

    #[test]
    fn person_box_marks_overlapping_region() {
        let mut classifier = classifier_with(vec![detection(
            "person_sitting",
            0.9,
            0.1,
            0.1,
            0.2,
            0.3,
        )]);
        let regions = vec![
            region("seat-1", 0.0, 0.0, 0.4, 0.5),
            region("seat-2", 0.6, 0.0, 0.4, 0.5),
        ];
        let result = classifier.evaluate(&frame(), &regions).unwrap();
        let map = result.occupancy().unwrap();
        assert_eq!(map["seat-1"], true);
        assert_eq!(map["seat-2"], false);
    }

    #[test]
    fn empty_label_does_not_mark_occupied() {
        let mut classifier =
            classifier_with(vec![detection("empty-seat", 0.95, 0.1, 0.1, 0.2, 0.3)]);
        let regions = vec![region("seat-1", 0.0, 0.0, 0.4, 0.5)];
        let result = classifier.evaluate(&frame(), &regions).unwrap();
        assert_eq!(result.occupancy().unwrap()["seat-1"], false);
    }

    #[test]
    fn giant_box_never_contributes() {
        // 0.85 x 0.85 = 72% of the frame, maximum confidence.
        let mut classifier =
            classifier_with(vec![detection("person", 1.0, 0.05, 0.05, 0.85, 0.85)]);
        let regions = vec![region("seat-1", 0.1, 0.1, 0.3, 0.3)];
        let result = classifier.evaluate(&frame(), &regions).unwrap();
        assert_eq!(result.occupancy().unwrap()["seat-1"], false);
    }

    #[test]
    fn low_confidence_is_discarded() {
        let mut classifier = classifier_with(vec![detection("person", 0.2, 0.1, 0.1, 0.2, 0.3)]);
        let regions = vec![region("seat-1", 0.0, 0.0, 0.4, 0.5)];
        let result = classifier.evaluate(&frame(), &regions).unwrap();
        assert_eq!(result.occupancy().unwrap()["seat-1"], false);
    }

    #[test]
    fn no_detections_reads_all_available() {
        let mut classifier = classifier_with(vec![]);
        let regions = vec![
            region("seat-1", 0.0, 0.0, 0.4, 0.5),
            region("seat-2", 0.6, 0.0, 0.4, 0.5),
        ];
        let result = classifier.evaluate(&frame(), &regions).unwrap();
        let map = result.occupancy().unwrap();
        assert!(map.values().all(|occupied| !occupied));
    }
}
