//! Seat occupancy monitor.
//!
//! This crate implements the core of a camera-based seat monitoring system:
//!
//! 1. A detection loop ingests frames from a camera source.
//! 2. An occupancy classifier (background subtraction or model inference)
//!    produces a raw per-region signal.
//! 3. A debounce engine confirms state changes only after the signal has
//!    persisted for a minimum dwell time.
//! 4. Confirmed transitions are appended to a flat history log and mirrored
//!    onto the persisted region document with duration accounting.
//! 5. An annotated frame and the seat state are exposed over HTTP.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (HTTP cameras, synthetic stub)
//! - `detect`: classifier strategies and detection backends
//! - `state`: debounce/state engine
//! - `store`: region configuration + analytics document
//! - `history`: append-only transition log
//! - `render`: frame annotation
//! - `shared`: loop/API mutual-exclusion boundary
//! - `api`: control/status HTTP layer
//! - `config`: daemon configuration (file + environment)

use std::fmt;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub mod api;
pub mod config;
pub mod detect;
pub mod frame;
pub mod history;
pub mod ingest;
pub mod render;
pub mod shared;
pub mod state;
pub mod store;

pub use detect::{
    BackgroundClassifier, BackgroundSettings, Classifier, DetectionBackend, Evaluation,
    LabeledDetection, ModelClassifier, ModelSettings,
};
pub use frame::Frame;
pub use history::HistoryLog;
pub use ingest::{CameraConfig, CameraSource};
pub use shared::{Command, SharedState, Snapshot};
pub use state::{StateEngine, Transition};
pub use store::{Region, RegionBounds, RegionStore};

/// Confirmed occupancy status of one region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    #[default]
    Available,
    Occupied,
}

impl SeatStatus {
    pub fn from_occupied(occupied: bool) -> Self {
        if occupied {
            SeatStatus::Occupied
        } else {
            SeatStatus::Available
        }
    }

    pub fn is_occupied(self) -> bool {
        matches!(self, SeatStatus::Occupied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Occupied => "occupied",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conforming region id is a short local identifier, safe to embed in the
/// CSV log and in URLs.
///
/// Allowed: "1", "seat-4", "window_left". Disallowed: whitespace, commas,
/// path separators.
pub fn validate_region_id(region_id: &str) -> Result<()> {
    // Compile once for hot paths.
    static REGION_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = REGION_ID_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap());

    if !re.is_match(region_id) {
        return Err(anyhow!(
            "region id must match ^[A-Za-z0-9][A-Za-z0-9_-]{{0,63}}$"
        ));
    }
    Ok(())
}
