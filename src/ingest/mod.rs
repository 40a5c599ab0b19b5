//! Frame ingestion sources.
//!
//! Sources produce [`Frame`](crate::frame::Frame) values for the detection
//! loop:
//! - `stub://` synthetic scenes (tests, demos)
//! - HTTP MJPEG / single-JPEG cameras (feature: ingest-http)
//!
//! The ingest layer decimates to the configured target rate; it does not
//! buffer frames. Reconnection after a failed read is driven by the loop:
//! `connect` is safe to call again on a live source.

mod http;
mod stub;

use anyhow::{anyhow, Result};

use crate::frame::Frame;
#[cfg(feature = "ingest-http")]
use http::HttpCamera;
use stub::SyntheticCamera;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Source URL. Supported schemes: `stub://` always; `http(s)://` with
    /// the ingest-http feature.
    pub url: String,
    /// Target frame rate; faster sources are decimated.
    pub target_fps: u32,
    /// Frame width (synthetic sources).
    pub width: u32,
    /// Frame height (synthetic sources).
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://seat_camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-http")]
    Http(HttpCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        if config.url.starts_with("http://") || config.url.starts_with("https://") {
            #[cfg(feature = "ingest-http")]
            {
                return Ok(Self {
                    backend: CameraBackend::Http(HttpCamera::new(config)?),
                });
            }
            #[cfg(not(feature = "ingest-http"))]
            {
                return Err(anyhow!(
                    "http camera sources require the ingest-http feature"
                ));
            }
        }
        Err(anyhow!(
            "unsupported camera url '{}'; expected stub:// or http(s)://",
            config.url
        ))
    }

    /// Connect (or reconnect) to the source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.connect(),
        }
    }

    /// Capture the next frame, decimated to the target rate.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-http")]
            CameraBackend::Http(source) => source.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_scheme() {
        let config = CameraConfig {
            url: "rtsp://camera-1/stream".to_string(),
            ..CameraConfig::default()
        };
        assert!(CameraSource::new(config).is_err());
    }

    #[test]
    fn synthetic_source_produces_frames() {
        let mut source = CameraSource::new(CameraConfig {
            width: 320,
            height: 240,
            ..CameraConfig::default()
        })
        .unwrap();
        source.connect().unwrap();

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert!(source.is_healthy());
        assert_eq!(source.stats().frames_captured, 1);
    }
}
