//! Synthetic camera for tests and demos.
//!
//! Generates a flat "room" with a block that appears and disappears every
//! 50 frames, so the background strategy has something to detect once a
//! reference frame is captured.

use std::time::SystemTime;

use anyhow::Result;
use image::{Rgb, RgbImage};

use super::{CameraConfig, CameraStats};
use crate::frame::Frame;

const SCENE_PERIOD: u64 = 50;
const FLOOR_SHADE: u8 = 70;
const OCCUPANT_SHADE: u8 = 210;

pub(crate) struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    pub(crate) fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!("camera: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let occupied_phase = (self.frame_count / SCENE_PERIOD) % 2 == 1;

        let width = self.config.width.max(1);
        let height = self.config.height.max(1);
        let mut image = RgbImage::from_pixel(width, height, Rgb([FLOOR_SHADE; 3]));

        if occupied_phase {
            // Block roughly in the center-left of the scene.
            let x0 = width / 8;
            let x1 = width / 2;
            let y0 = height / 4;
            let y1 = (height * 3) / 4;
            for y in y0..y1 {
                for x in x0..x1 {
                    image.put_pixel(x, y, Rgb([OCCUPANT_SHADE; 3]));
                }
            }
        }

        Ok(Frame::new(image, SystemTime::now()))
    }

    pub(crate) fn is_healthy(&self) -> bool {
        true
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}
