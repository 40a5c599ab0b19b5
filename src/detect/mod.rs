//! Occupancy classification strategies.
//!
//! Two interchangeable strategies implement [`Classifier`]:
//! - [`BackgroundClassifier`]: pixel differencing against a captured
//!   reference frame (stateful, needs calibration).
//! - [`ModelClassifier`]: object detection via a pluggable
//!   [`DetectionBackend`] (stateless per frame).
//!
//! Callers are agnostic to which strategy is active.

mod background;
pub mod backends;
mod classifier;
mod model;
mod result;

pub use background::{BackgroundClassifier, BackgroundSettings};
pub use classifier::{Classifier, Evaluation};
pub use model::{DetectionBackend, ModelClassifier, ModelSettings};
pub use result::LabeledDetection;
