//! Region configuration store.
//!
//! The store owns the JSON document of record for all monitored regions:
//! identity, normalized bounds, confirmed status, and accumulated analytics.
//! It is loaded once at startup and rewritten wholesale on every save,
//! confirmed transition, and recalibration. Documents written by older
//! versions (or by the calibration front-end) may omit the analytics
//! fields; those are defaulted on load rather than rejected.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::Transition;
use crate::{validate_region_id, SeatStatus};

/// Normalized region rectangle, components as fractions of the frame size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Pixel-space rectangle clamped to a concrete frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl RegionBounds {
    /// Normalize to fractions in `0..=1`.
    ///
    /// Documents produced by the original calibration tool carry percent
    /// values; any component above 1.5 marks the whole rectangle as percent.
    pub fn normalized(self) -> Self {
        let scale = if self.x > 1.5 || self.y > 1.5 || self.w > 1.5 || self.h > 1.5 {
            0.01
        } else {
            1.0
        };
        let x = (self.x * scale).clamp(0.0, 1.0);
        let y = (self.y * scale).clamp(0.0, 1.0);
        let w = (self.w * scale).clamp(0.0, 1.0 - x);
        let h = (self.h * scale).clamp(0.0, 1.0 - y);
        Self { x, y, w, h }
    }

    /// Project onto a frame of the given size. Always at least 1x1.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let n = self.normalized();
        let x = ((n.x * width as f32) as u32).min(width.saturating_sub(1));
        let y = ((n.y * height as f32) as u32).min(height.saturating_sub(1));
        let w = ((n.w * width as f32) as u32)
            .max(1)
            .min(width.saturating_sub(x).max(1));
        let h = ((n.h * height as f32) as u32)
            .max(1)
            .min(height.saturating_sub(y).max(1));
        PixelRect { x, y, w, h }
    }

    /// Whether two normalized rectangles overlap with positive area.
    pub fn intersects(&self, other: &RegionBounds) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        a.x < b.x + b.w && b.x < a.x + a.w && a.y < b.y + b.h && b.y < a.y + a.h
    }
}

/// One entry in a region's append-only occupancy history.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyEvent {
    pub timestamp: DateTime<Utc>,
    pub status: OccupancyMark,
}

/// What an occupancy history entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyMark {
    Available,
    Occupied,
    ResetBackground,
}

impl From<SeatStatus> for OccupancyMark {
    fn from(status: SeatStatus) -> Self {
        match status {
            SeatStatus::Available => OccupancyMark::Available,
            SeatStatus::Occupied => OccupancyMark::Occupied,
        }
    }
}

/// A configured monitored region with accumulated analytics.
///
/// Field names follow the persisted document (the calibration front-end
/// reads and writes the same file).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    #[serde(flatten)]
    pub bounds: RegionBounds,
    #[serde(default)]
    pub status: SeatStatus,
    #[serde(default = "epoch_start")]
    pub last_status_change: DateTime<Utc>,
    #[serde(default)]
    pub available_minutes: f64,
    #[serde(default)]
    pub occupied_minutes: f64,
    #[serde(default)]
    pub occupancy_history: Vec<OccupancyEvent>,
}

fn epoch_start() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl Region {
    pub fn new(id: impl Into<String>, bounds: RegionBounds) -> Self {
        Self {
            id: id.into(),
            bounds: bounds.normalized(),
            status: SeatStatus::Available,
            last_status_change: epoch_start(),
            available_minutes: 0.0,
            occupied_minutes: 0.0,
            occupancy_history: Vec::new(),
        }
    }

    /// Normalize a loaded or posted region in place. Idempotent.
    fn canonicalize(&mut self) {
        self.bounds = self.bounds.normalized();
    }
}

/// Owner of the region document of record.
pub struct RegionStore {
    path: PathBuf,
    regions: Vec<Region>,
}

impl RegionStore {
    /// Load the store, or start empty when the document does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let regions = if path.exists() {
            load_regions(&path)?
        } else {
            Vec::new()
        };
        Ok(Self { path, regions })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Replace the configured regions (save-configuration control signal).
    ///
    /// Incoming regions are validated, canonicalized, and persisted; the
    /// previous list is discarded wholesale.
    pub fn replace(&mut self, mut incoming: Vec<Region>) -> Result<()> {
        for region in &mut incoming {
            validate_region_id(&region.id)?;
            region.canonicalize();
        }
        self.regions = incoming;
        self.save()
    }

    /// Rewrite the backing document. Idempotent full overwrite; written to a
    /// sibling temp file first so readers never observe a torn document.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.regions)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json)
            .with_context(|| format!("write region document {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace region document {}", self.path.display()))?;
        Ok(())
    }

    /// Mirror a confirmed transition onto the document: credit the closed
    /// status' minutes counter, append the history entry, update the current
    /// status, and rewrite the file.
    pub fn apply_transition(&mut self, transition: &Transition, at: DateTime<Utc>) -> Result<()> {
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.id == transition.region_id)
            .ok_or_else(|| anyhow!("unknown region '{}'", transition.region_id))?;

        let minutes = transition.duration_minutes();
        match transition.from {
            SeatStatus::Available => region.available_minutes += minutes,
            SeatStatus::Occupied => region.occupied_minutes += minutes,
        }
        region.occupancy_history.push(OccupancyEvent {
            timestamp: at,
            status: transition.to.into(),
        });
        region.status = transition.to;
        region.last_status_change = at;
        self.save()
    }

    /// Force all regions to `available` (recalibration / reset control
    /// signals). With `mark_recalibration`, each region's history gains a
    /// reset marker entry, as the original document format records.
    pub fn reset_all(&mut self, at: DateTime<Utc>, mark_recalibration: bool) -> Result<()> {
        for region in &mut self.regions {
            region.status = SeatStatus::Available;
            region.last_status_change = at;
            if mark_recalibration {
                region.occupancy_history.push(OccupancyEvent {
                    timestamp: at,
                    status: OccupancyMark::ResetBackground,
                });
            }
        }
        self.save()
    }
}

fn load_regions(path: &Path) -> Result<Vec<Region>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read region document {}", path.display()))?;
    let mut regions: Vec<Region> = serde_json::from_str(&raw)
        .with_context(|| format!("parse region document {}", path.display()))?;
    for region in &mut regions {
        validate_region_id(&region.id)?;
        region.canonicalize();
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store_in(dir: &tempfile::TempDir) -> RegionStore {
        RegionStore::open(dir.path().join("seat_config.json")).expect("open store")
    }

    #[test]
    fn missing_document_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.is_empty());
    }

    #[test]
    fn defaults_missing_analytics_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seat_config.json");
        // Document shape produced by the original calibration tool: percent
        // bounds, no analytics fields.
        fs::write(
            &path,
            r#"[{"id": "seat-1", "x": 10.0, "y": 20.0, "w": 30.0, "h": 40.0}]"#,
        )
        .unwrap();

        let store = RegionStore::open(&path).unwrap();
        let region = &store.regions()[0];
        assert_eq!(region.status, SeatStatus::Available);
        assert_eq!(region.available_minutes, 0.0);
        assert_eq!(region.occupied_minutes, 0.0);
        assert!(region.occupancy_history.is_empty());
        assert_eq!(region.last_status_change, DateTime::UNIX_EPOCH);
        // Percent values are normalized into fractions.
        assert!((region.bounds.x - 0.1).abs() < 1e-6);
        assert!((region.bounds.h - 0.4).abs() < 1e-6);
    }

    #[test]
    fn round_trip_is_field_for_field_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let mut region = Region::new(
            "seat-1",
            RegionBounds {
                x: 0.1,
                y: 0.2,
                w: 0.25,
                h: 0.25,
            },
        );
        region.available_minutes = 12.5;
        region.occupancy_history.push(OccupancyEvent {
            timestamp: Utc::now(),
            status: OccupancyMark::Occupied,
        });
        store.replace(vec![region]).unwrap();
        let first = store.regions().to_vec();

        // Reload twice: defaulting must be idempotent.
        let reloaded = RegionStore::open(store.path()).unwrap();
        assert_eq!(reloaded.regions(), first.as_slice());
        reloaded.save().unwrap();
        let again = RegionStore::open(store.path()).unwrap();
        assert_eq!(again.regions(), first.as_slice());
    }

    #[test]
    fn transition_credits_closed_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store
            .replace(vec![Region::new(
                "seat-1",
                RegionBounds {
                    x: 0.0,
                    y: 0.0,
                    w: 0.5,
                    h: 0.5,
                },
            )])
            .unwrap();

        let now = Utc::now();
        let transition = Transition {
            region_id: "seat-1".to_string(),
            from: SeatStatus::Available,
            to: SeatStatus::Occupied,
            at: std::time::SystemTime::now(),
            duration: Duration::from_secs(90),
        };
        store.apply_transition(&transition, now).unwrap();

        let region = &store.regions()[0];
        assert!((region.available_minutes - 1.5).abs() < 1e-9);
        assert_eq!(region.occupied_minutes, 0.0);
        assert_eq!(region.status, SeatStatus::Occupied);
        assert_eq!(region.last_status_change, now);
        assert_eq!(region.occupancy_history.len(), 1);
        assert_eq!(
            region.occupancy_history[0].status,
            OccupancyMark::Occupied
        );
    }

    #[test]
    fn reset_marks_history_and_forces_available() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let mut region = Region::new(
            "seat-1",
            RegionBounds {
                x: 0.0,
                y: 0.0,
                w: 0.5,
                h: 0.5,
            },
        );
        region.status = SeatStatus::Occupied;
        store.replace(vec![region]).unwrap();

        let now = Utc::now();
        store.reset_all(now, true).unwrap();
        let region = &store.regions()[0];
        assert_eq!(region.status, SeatStatus::Available);
        assert_eq!(region.last_status_change, now);
        assert_eq!(
            region.occupancy_history.last().unwrap().status,
            OccupancyMark::ResetBackground
        );
    }

    #[test]
    fn rejects_malformed_region_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let region = Region::new(
            "seat one",
            RegionBounds {
                x: 0.0,
                y: 0.0,
                w: 0.5,
                h: 0.5,
            },
        );
        assert!(store.replace(vec![region]).is_err());
    }

    #[test]
    fn pixel_projection_is_clamped() {
        let bounds = RegionBounds {
            x: 0.9,
            y: 0.9,
            w: 0.5,
            h: 0.5,
        };
        let rect = bounds.to_pixels(640, 480);
        assert!(rect.x + rect.w <= 640);
        assert!(rect.y + rect.h <= 480);
        assert!(rect.w >= 1 && rect.h >= 1);
    }
}
