//! Object-fit "cover" placement: scale an image uniformly until it covers the
//! target rectangle, center it, and clip whatever falls outside.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::debug;

use super::color::blend_pixel;
use super::grid::CellRect;

/// Where a bitmap lands relative to the canvas, before clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Natural size was unusable, so the image is stretched to the target.
    pub stretched: bool,
}

impl CoverPlacement {
    pub fn compute(natural_width: u32, natural_height: u32, target: CellRect) -> Self {
        let (x, y) = (target.x as f64, target.y as f64);
        let (w, h) = (target.width as f64, target.height as f64);

        if natural_width == 0 || natural_height == 0 || target.height == 0 {
            return CoverPlacement {
                x,
                y,
                width: w,
                height: h,
                stretched: true,
            };
        }

        let ir = natural_width as f64 / natural_height as f64;
        let cr = w / h;

        if ir > cr {
            // Wider than the target: match heights, center horizontally
            let width = h * ir;
            CoverPlacement {
                x: x + (w - width) / 2.0,
                y,
                width,
                height: h,
                stretched: false,
            }
        } else {
            // Taller or equal: match widths, center vertically
            let height = w / ir;
            CoverPlacement {
                x,
                y: y + (h - height) / 2.0,
                width: w,
                height,
                stretched: false,
            }
        }
    }

    /// Region of the source, in source pixels, that ends up inside the
    /// target once the overflow is clipped. Always at least one pixel.
    fn source_window(
        &self,
        natural_width: u32,
        natural_height: u32,
        target: CellRect,
    ) -> SourceWindow {
        if self.stretched {
            return SourceWindow {
                x: 0,
                y: 0,
                width: natural_width,
                height: natural_height,
            };
        }

        let visible = |natural: u32, shown: u32, drawn: f64| -> (u32, u32) {
            let span = (natural as f64 * shown as f64 / drawn).round() as u32;
            let span = span.clamp(1, natural);
            ((natural - span) / 2, span)
        };
        let (x, width) = visible(natural_width, target.width, self.width);
        let (y, height) = visible(natural_height, target.height, self.height);
        SourceWindow {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceWindow {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Composites `image` over `target` on the canvas using cover placement.
/// Nothing is drawn outside `target`.
pub fn draw_cover(canvas: &mut RgbaImage, image: &RgbaImage, target: CellRect) {
    if target.width == 0 || target.height == 0 {
        return;
    }
    if image.width() == 0 || image.height() == 0 {
        debug!("Skipping empty bitmap for cell at ({}, {})", target.x, target.y);
        return;
    }

    let placement = CoverPlacement::compute(image.width(), image.height(), target);
    let window = placement.source_window(image.width(), image.height(), target);

    // Only the visible window is resampled, so the cost is bounded by the cell
    let visible = imageops::crop_imm(image, window.x, window.y, window.width, window.height);
    let scaled = if (window.width, window.height) == (target.width, target.height) {
        visible.to_image()
    } else {
        imageops::resize(&*visible, target.width, target.height, FilterType::Lanczos3)
    };

    for py in 0..target.height {
        let cy = target.y.saturating_add(py);
        if cy >= canvas.height() {
            break;
        }
        for px in 0..target.width {
            let cx = target.x.saturating_add(px);
            if cx >= canvas.width() {
                break;
            }
            let src = *scaled.get_pixel(px, py);
            blend_pixel(canvas.get_pixel_mut(cx, cy), src, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn rect(x: u32, y: u32, width: u32, height: u32) -> CellRect {
        CellRect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn test_matching_aspect_fills_exactly() {
        let p = CoverPlacement::compute(800, 800, rect(12, 12, 352, 352));
        assert_eq!(
            p,
            CoverPlacement {
                x: 12.0,
                y: 12.0,
                width: 352.0,
                height: 352.0,
                stretched: false
            }
        );
    }

    #[test]
    fn test_wide_image_centers_horizontally() {
        let target = rect(0, 0, 100, 50);
        let p = CoverPlacement::compute(400, 100, target);
        let ir = 4.0;
        assert_eq!(p.height, 50.0);
        assert_eq!(p.width, 50.0 * ir);
        assert_eq!(p.x, (100.0 - 50.0 * ir) / 2.0);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_tall_image_centers_vertically() {
        let target = rect(10, 20, 100, 100);
        let p = CoverPlacement::compute(50, 200, target);
        let ir = 0.25;
        assert_eq!(p.width, 100.0);
        assert_eq!(p.height, 100.0 / ir);
        assert_eq!(p.y, 20.0 + (100.0 - 100.0 / ir) / 2.0);
        assert_eq!(p.x, 10.0);
    }

    #[test]
    fn test_zero_size_falls_back_to_stretch() {
        let p = CoverPlacement::compute(0, 10, rect(5, 5, 40, 20));
        assert!(p.stretched);
        assert_eq!((p.x, p.y, p.width, p.height), (5.0, 5.0, 40.0, 20.0));
    }

    #[test]
    fn test_draw_cover_crops_sides_and_clips() {
        // Left half red, right half blue; the center of a square crop shows both
        let mut image = RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255]));
        for y in 0..100 {
            for x in 100..200 {
                image.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let mut canvas = RgbaImage::from_pixel(120, 120, Rgba([0, 255, 0, 255]));
        draw_cover(&mut canvas, &image, rect(10, 10, 100, 100));

        let left = canvas.get_pixel(20, 60);
        let right = canvas.get_pixel(100, 60);
        assert!(left.0[0] > 240 && left.0[2] < 15, "left {:?}", left);
        assert!(right.0[2] > 240 && right.0[0] < 15, "right {:?}", right);

        // Outside the target stays untouched
        assert_eq!(canvas.get_pixel(5, 60), &Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.get_pixel(112, 60), &Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.get_pixel(60, 115), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_source_window_keeps_center() {
        let target = rect(0, 0, 100, 100);
        let wide = CoverPlacement::compute(400, 100, target);
        assert_eq!(
            wide.source_window(400, 100, target),
            SourceWindow {
                x: 150,
                y: 0,
                width: 100,
                height: 100
            }
        );

        let stretched = CoverPlacement::compute(0, 10, target);
        assert_eq!(stretched.source_window(0, 10, target).height, 10);
    }

    #[test]
    fn test_draw_cover_extreme_aspect_stays_bounded() {
        // A one pixel wide strip: only its middle rows are visible
        let mut image = RgbaImage::from_pixel(1, 40_000, Rgba([255, 0, 0, 255]));
        for y in 19_990..20_010 {
            image.put_pixel(0, y, Rgba([0, 0, 255, 255]));
        }
        let target = rect(8, 8, 352, 352);
        let window = CoverPlacement::compute(1, 40_000, target).source_window(1, 40_000, target);
        assert_eq!(window.width, 1);
        assert_eq!(window.height, 1);
        assert_eq!(window.y, 19_999);

        let mut canvas = RgbaImage::from_pixel(368, 368, Rgba([0, 255, 0, 255]));
        draw_cover(&mut canvas, &image, target);
        assert_eq!(canvas.get_pixel(8, 8), &Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.get_pixel(359, 359), &Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.get_pixel(4, 100), &Rgba([0, 255, 0, 255]));
    }
}
