#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::model::DetectionBackend;
use crate::detect::result::LabeledDetection;
use crate::frame::Frame;

/// Tract-based ONNX backend.
///
/// Loads a local detection model and decodes its output into labeled boxes.
/// Expects the common exported-detector layout: rows of
/// `(cx, cy, w, h, confidence, class)` in either pixel or normalized
/// coordinates. No network I/O; disk access is limited to model loading.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        labels: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            labels,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let pixels = frame.image.as_raw();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn label_for(&self, class_index: usize) -> String {
        self.labels
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| format!("class-{class_index}"))
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<LabeledDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let flat: Vec<f32> = values.iter().copied().collect();
        if flat.len() % 6 != 0 {
            return Err(anyhow!(
                "model output length {} is not divisible into (cx, cy, w, h, conf, class) rows",
                flat.len()
            ));
        }

        let mut detections = Vec::new();
        for row in flat.chunks_exact(6) {
            let (cx, cy, w, h, confidence, class) =
                (row[0], row[1], row[2], row[3], row[4], row[5]);
            if !confidence.is_finite() || confidence <= 0.0 {
                continue;
            }
            // Pixel-coordinate exports are normalized against the model
            // input size; already-normalized exports pass through.
            let (sx, sy) = if cx > 1.5 || cy > 1.5 || w > 1.5 || h > 1.5 {
                (1.0 / self.width as f32, 1.0 / self.height as f32)
            } else {
                (1.0, 1.0)
            };
            let w = w * sx;
            let h = h * sy;
            detections.push(LabeledDetection {
                label: self.label_for(class.max(0.0) as usize),
                confidence,
                x: (cx * sx - w / 2.0).max(0.0),
                y: (cy * sy - h / 2.0).max(0.0),
                w,
                h,
            });
        }
        Ok(detections)
    }
}

impl DetectionBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LabeledDetection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }
}
