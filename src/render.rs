//! Frame annotation.
//!
//! Purely presentational: draws region boxes colored by confirmed status and
//! a status banner strip across the top. Holds no state; the detection loop
//! feeds it the confirmed snapshot each frame.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::store::PixelRect;
use crate::SeatStatus;

pub const BANNER_HEIGHT: u32 = 28;

const COLOR_AVAILABLE: Rgb<u8> = Rgb([0, 200, 70]);
const COLOR_OCCUPIED: Rgb<u8> = Rgb([220, 40, 40]);
const COLOR_AWAITING: Rgb<u8> = Rgb([235, 160, 0]);

/// What the banner strip reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Banner {
    /// Background strategy with no reference frame captured yet.
    AwaitingCalibration,
    Monitoring { occupied: usize, total: usize },
}

/// One region box to draw.
#[derive(Clone, Copy, Debug)]
pub struct Overlay {
    pub rect: PixelRect,
    pub status: SeatStatus,
}

fn status_color(status: SeatStatus) -> Rgb<u8> {
    match status {
        SeatStatus::Available => COLOR_AVAILABLE,
        SeatStatus::Occupied => COLOR_OCCUPIED,
    }
}

fn banner_color(banner: &Banner) -> Rgb<u8> {
    match banner {
        Banner::AwaitingCalibration => COLOR_AWAITING,
        Banner::Monitoring { occupied, .. } if *occupied > 0 => COLOR_OCCUPIED,
        Banner::Monitoring { .. } => COLOR_AVAILABLE,
    }
}

/// Produce the annotated frame: region boxes plus the banner strip.
pub fn annotate(image: &RgbImage, overlays: &[Overlay], banner: &Banner) -> RgbImage {
    let mut out = image.clone();

    for overlay in overlays {
        let color = status_color(overlay.status);
        let rect = Rect::at(overlay.rect.x as i32, overlay.rect.y as i32)
            .of_size(overlay.rect.w.max(1), overlay.rect.h.max(1));
        draw_hollow_rect_mut(&mut out, rect, color);
        // Second pass one pixel in for a 2px border.
        if overlay.rect.w > 4 && overlay.rect.h > 4 {
            let inner = Rect::at(overlay.rect.x as i32 + 1, overlay.rect.y as i32 + 1)
                .of_size(overlay.rect.w - 2, overlay.rect.h - 2);
            draw_hollow_rect_mut(&mut out, inner, color);
        }
    }

    let banner_h = BANNER_HEIGHT.min(out.height());
    if banner_h > 0 {
        draw_filled_rect_mut(
            &mut out,
            Rect::at(0, 0).of_size(out.width(), banner_h),
            banner_color(banner),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RgbImage {
        RgbImage::from_pixel(200, 150, Rgb([10, 10, 10]))
    }

    #[test]
    fn banner_reflects_occupancy() {
        let annotated = annotate(
            &base(),
            &[],
            &Banner::Monitoring {
                occupied: 1,
                total: 2,
            },
        );
        assert_eq!(*annotated.get_pixel(100, 5), COLOR_OCCUPIED);

        let annotated = annotate(
            &base(),
            &[],
            &Banner::Monitoring {
                occupied: 0,
                total: 2,
            },
        );
        assert_eq!(*annotated.get_pixel(100, 5), COLOR_AVAILABLE);

        let annotated = annotate(&base(), &[], &Banner::AwaitingCalibration);
        assert_eq!(*annotated.get_pixel(100, 5), COLOR_AWAITING);
    }

    #[test]
    fn overlay_draws_status_colored_border() {
        let overlay = Overlay {
            rect: PixelRect {
                x: 20,
                y: 40,
                w: 60,
                h: 50,
            },
            status: SeatStatus::Occupied,
        };
        let annotated = annotate(
            &base(),
            &[overlay],
            &Banner::Monitoring {
                occupied: 1,
                total: 1,
            },
        );
        // Border pixels carry the status color; the interior is untouched.
        assert_eq!(*annotated.get_pixel(20, 40), COLOR_OCCUPIED);
        assert_eq!(*annotated.get_pixel(21, 41), COLOR_OCCUPIED);
        assert_eq!(*annotated.get_pixel(50, 65), Rgb([10, 10, 10]));
    }

    #[test]
    fn source_image_is_not_mutated() {
        let image = base();
        let _ = annotate(&image, &[], &Banner::AwaitingCalibration);
        assert_eq!(*image.get_pixel(0, 0), Rgb([10, 10, 10]));
    }
}
