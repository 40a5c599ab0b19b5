//! Append-only transition history.
//!
//! Confirmed transitions are mirrored to a flat CSV file, one immutable row
//! per event. The file is the download artifact served by the API, so it is
//! created with its header as soon as anything wants it. The log is the only
//! writer; a failed append is reported to the caller and must be swallowed
//! there (a transition that fails to log still takes effect in runtime
//! state).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::SeatStatus;

pub const HISTORY_HEADER: &str = "Date,Time,Seat ID,Status,Duration (Minutes)";

/// Region id recorded for whole-system reset rows.
pub const RESET_REGION_ID: &str = "ALL";
const RESET_STATUS: &str = "RESET (Background Captured)";

/// Append-only CSV history log.
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with its header row when missing.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        fs::write(&self.path, format!("{HISTORY_HEADER}\n"))
            .with_context(|| format!("create history log {}", self.path.display()))
    }

    /// Append one transition row: the status being closed out and the time
    /// spent in it.
    pub fn record(
        &self,
        region_id: &str,
        closed_status: SeatStatus,
        duration_minutes: f64,
    ) -> Result<()> {
        self.record_at(Local::now(), region_id, closed_status.as_str(), duration_minutes)
    }

    /// Append the whole-system reset marker written on reference capture.
    pub fn record_reset(&self) -> Result<()> {
        self.record_at(Local::now(), RESET_REGION_ID, RESET_STATUS, 0.0)
    }

    pub(crate) fn record_at(
        &self,
        now: DateTime<Local>,
        region_id: &str,
        status: &str,
        duration_minutes: f64,
    ) -> Result<()> {
        self.ensure_exists()?;
        let row = format!(
            "{},{},{},{},{:.2}\n",
            now.format("%Y-%m-%d"),
            now.format("%H:%M:%S"),
            region_id,
            status,
            duration_minutes
        );
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open history log {}", self.path.display()))?;
        file.write_all(row.as_bytes())
            .with_context(|| format!("append history log {}", self.path.display()))
    }
}
