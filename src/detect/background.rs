//! Background-subtraction strategy.
//!
//! A single grayscale, blurred reference frame is the baseline. Each frame
//! is preprocessed the same way, differenced against the reference,
//! thresholded into a binary mask, and dilated to merge small clusters; a
//! region reads as occupied when enough mask pixels land inside its crop.
//! The reference is replaced wholesale on every capture, never partially
//! mutated.

use std::collections::HashMap;

use anyhow::Result;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::detect::classifier::{Classifier, Evaluation};
use crate::frame::Frame;
use crate::store::Region;

#[derive(Clone, Copy, Debug)]
pub struct BackgroundSettings {
    /// Per-pixel absolute difference above which a pixel counts as changed.
    pub diff_threshold: u8,
    /// Changed-pixel count above which a region reads as occupied.
    pub pixel_threshold: u32,
    /// Dilation radius merging nearby changed pixels.
    pub dilate_radius: u8,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            diff_threshold: 25,
            pixel_threshold: 2000,
            dilate_radius: 2,
        }
    }
}

pub struct BackgroundClassifier {
    settings: BackgroundSettings,
    reference: Option<GrayImage>,
}

impl BackgroundClassifier {
    pub fn new(settings: BackgroundSettings) -> Self {
        Self {
            settings,
            reference: None,
        }
    }

    fn difference_mask(&self, reference: &GrayImage, current: &GrayImage) -> GrayImage {
        let threshold = self.settings.diff_threshold;
        let mask = GrayImage::from_fn(current.width(), current.height(), |x, y| {
            let a = reference.get_pixel(x, y)[0];
            let b = current.get_pixel(x, y)[0];
            if a.abs_diff(b) > threshold {
                image::Luma([255u8])
            } else {
                image::Luma([0u8])
            }
        });
        if self.settings.dilate_radius == 0 {
            mask
        } else {
            dilate(&mask, Norm::LInf, self.settings.dilate_radius)
        }
    }
}

impl Classifier for BackgroundClassifier {
    fn name(&self) -> &'static str {
        "background"
    }

    fn evaluate(&mut self, frame: &Frame, regions: &[Region]) -> Result<Evaluation> {
        let Some(reference) = self.reference.as_ref() else {
            return Ok(Evaluation::Uncalibrated);
        };

        let current = frame.grayscale_blurred();
        if reference.dimensions() != current.dimensions() {
            // Frame geometry changed under us; the baseline is stale and a
            // recapture is required.
            return Ok(Evaluation::Uncalibrated);
        }

        let mask = self.difference_mask(reference, &current);
        let mut occupancy = HashMap::with_capacity(regions.len());
        for region in regions {
            let rect = region.bounds.to_pixels(mask.width(), mask.height());
            let mut changed = 0u32;
            for y in rect.y..rect.y + rect.h {
                for x in rect.x..rect.x + rect.w {
                    if mask.get_pixel(x, y)[0] != 0 {
                        changed += 1;
                    }
                }
            }
            occupancy.insert(region.id.clone(), changed > self.settings.pixel_threshold);
        }
        Ok(Evaluation::Occupancy(occupancy))
    }

    fn capture_reference(&mut self, frame: &Frame) {
        self.reference = Some(frame.grayscale_blurred());
    }

    fn is_calibrated(&self) -> bool {
        self.reference.is_some()
    }
}
