use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_REGIONS_PATH: &str = "seat_config.json";
const DEFAULT_HISTORY_PATH: &str = "seat_analytics.csv";
const DEFAULT_API_ADDR: &str = "127.0.0.1:8700";
const DEFAULT_CAMERA_URL: &str = "stub://seat_camera";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DWELL_SECS: u64 = 3;
const DEFAULT_DIFF_THRESHOLD: u8 = 25;
const DEFAULT_PIXEL_THRESHOLD: u32 = 2000;
const DEFAULT_MAX_BOX_AREA: f32 = 0.70;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.35;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    regions_path: Option<String>,
    history_path: Option<String>,
    api: Option<ApiConfigFile>,
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    strategy: Option<String>,
    dwell_secs: Option<u64>,
    diff_threshold: Option<u8>,
    pixel_threshold: Option<u32>,
    max_box_area: Option<f32>,
    min_confidence: Option<f32>,
    model_path: Option<String>,
    model_labels: Option<Vec<String>>,
}

/// Which occupancy classifier the daemon runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Background,
    Model,
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "background" => Ok(Strategy::Background),
            "model" => Ok(Strategy::Model),
            other => Err(anyhow!(
                "unknown detection strategy '{}'; expected 'background' or 'model'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub regions_path: String,
    pub history_path: String,
    pub api_addr: String,
    pub camera: CameraSettings,
    pub detection: DetectionSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub strategy: Strategy,
    pub dwell: Duration,
    pub diff_threshold: u8,
    pub pixel_threshold: u32,
    pub max_box_area: f32,
    pub min_confidence: f32,
    pub model_path: Option<String>,
    pub model_labels: Vec<String>,
}

impl MonitorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SEATMON_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let regions_path = file
            .regions_path
            .unwrap_or_else(|| DEFAULT_REGIONS_PATH.to_string());
        let history_path = file
            .history_path
            .unwrap_or_else(|| DEFAULT_HISTORY_PATH.to_string());
        let api_addr = file
            .api
            .as_ref()
            .and_then(|api| api.addr.clone())
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let detection_file = file.detection.unwrap_or_default();
        let strategy = match detection_file.strategy.as_deref() {
            Some(value) => value.parse()?,
            None => Strategy::Background,
        };
        let detection = DetectionSettings {
            strategy,
            dwell: Duration::from_secs(detection_file.dwell_secs.unwrap_or(DEFAULT_DWELL_SECS)),
            diff_threshold: detection_file
                .diff_threshold
                .unwrap_or(DEFAULT_DIFF_THRESHOLD),
            pixel_threshold: detection_file
                .pixel_threshold
                .unwrap_or(DEFAULT_PIXEL_THRESHOLD),
            max_box_area: detection_file.max_box_area.unwrap_or(DEFAULT_MAX_BOX_AREA),
            min_confidence: detection_file
                .min_confidence
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            model_path: detection_file.model_path,
            model_labels: detection_file.model_labels.unwrap_or_default(),
        };
        Ok(Self {
            regions_path,
            history_path,
            api_addr,
            camera,
            detection,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("SEATMON_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("SEATMON_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(path) = std::env::var("SEATMON_REGIONS_PATH") {
            if !path.trim().is_empty() {
                self.regions_path = path;
            }
        }
        if let Ok(path) = std::env::var("SEATMON_HISTORY_PATH") {
            if !path.trim().is_empty() {
                self.history_path = path;
            }
        }
        if let Ok(strategy) = std::env::var("SEATMON_STRATEGY") {
            if !strategy.trim().is_empty() {
                self.detection.strategy = strategy.parse()?;
            }
        }
        if let Ok(dwell) = std::env::var("SEATMON_DWELL_SECS") {
            let seconds: u64 = dwell
                .parse()
                .map_err(|_| anyhow!("SEATMON_DWELL_SECS must be an integer number of seconds"))?;
            self.detection.dwell = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }
        if self.detection.dwell.is_zero() {
            return Err(anyhow!("detection dwell must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.detection.max_box_area)
            || self.detection.max_box_area == 0.0
        {
            return Err(anyhow!("detection max_box_area must be within (0, 1]"));
        }
        if !(0.0..1.0).contains(&self.detection.min_confidence) {
            return Err(anyhow!("detection min_confidence must be within [0, 1)"));
        }
        if self.detection.strategy == Strategy::Model && self.detection.model_path.is_none() {
            return Err(anyhow!("model strategy requires detection.model_path"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
