//! Unit conversions between the three coordinate spaces the engine touches:
//! physical millimeters (stamp geometry), page points (origin bottom-left,
//! Y up), and device pixels (origin top-left, Y down).

use crate::types::{Rect, Size};

/// 72 points per inch, 25.4 mm per inch.
pub const PT_PER_MM: f32 = 72.0 / 25.4;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

pub fn pt_to_mm(pt: f32) -> f32 {
    pt / PT_PER_MM
}

/// Axis-aligned box in device pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PxBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PxBox {
    /// Width floored at one device pixel to avoid degenerate empty regions.
    pub fn width(&self) -> i32 {
        (self.right - self.left).max(1)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(1)
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

/// Mapping from one page's point space onto one rendered bitmap.
///
/// The two scale factors are independent; a non-square pixel density is
/// tolerated and must never be collapsed into a single factor.
#[derive(Debug, Clone, Copy)]
pub struct RasterMap {
    pub px_per_pt_x: f32,
    pub px_per_pt_y: f32,
    pub bitmap_width: u32,
    pub bitmap_height: u32,
}

impl RasterMap {
    pub fn new(bitmap_width: u32, bitmap_height: u32, page_size: Size) -> Self {
        let page_w = page_size.width.to_f32().max(1.0);
        let page_h = page_size.height.to_f32().max(1.0);
        Self {
            px_per_pt_x: bitmap_width as f32 / page_w,
            px_per_pt_y: bitmap_height as f32 / page_h,
            bitmap_width,
            bitmap_height,
        }
    }

    pub fn x_px(&self, x_pt: f32) -> f32 {
        x_pt * self.px_per_pt_x
    }

    /// Page-space Y (bottom-up) to bitmap Y (top-down).
    pub fn y_px(&self, y_pt: f32) -> f32 {
        self.bitmap_height as f32 - y_pt * self.px_per_pt_y
    }

    /// Map a page-point box to pixel bounds. The Y flip uses the bitmap
    /// height; getting this wrong shows up as vertically mirrored stamps.
    pub fn box_to_px(&self, rect: Rect) -> PxBox {
        let x = rect.x.to_f32();
        let y = rect.y.to_f32();
        let w = rect.width.to_f32();
        let h = rect.height.to_f32();
        let left = (x * self.px_per_pt_x).round() as i32;
        let right = ((x + w) * self.px_per_pt_x).round() as i32;
        let top = self.bitmap_height as i32 - ((y + h) * self.px_per_pt_y).round() as i32;
        let bottom = self.bitmap_height as i32 - (y * self.px_per_pt_y).round() as i32;
        PxBox {
            left,
            top,
            right,
            bottom,
        }
    }
}
