//! Resolution of millimeter stamp geometry into page-point boxes.
//!
//! Rotation pivots on the box center in both backends. The page-point space
//! is Y-up; bitmap space is Y-down, so the same counter-clockwise visual
//! rotation needs a negated angle once expressed in pixels.

use crate::stamp::Geometry;
use crate::types::{Pt, Rect};
use crate::units::mm_to_pt;

/// A stamp box in page points plus its rotation pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBox {
    pub rect: Rect,
    /// Degrees counter-clockwise in page space.
    pub rotation_deg: f32,
    pub pivot: (Pt, Pt),
}

pub fn resolve_box(geometry: &Geometry) -> ResolvedBox {
    let rect = Rect {
        x: Pt::from_f32(mm_to_pt(geometry.x_mm)),
        y: Pt::from_f32(mm_to_pt(geometry.y_mm)),
        width: Pt::from_f32(mm_to_pt(geometry.width_mm)),
        height: Pt::from_f32(mm_to_pt(geometry.height_mm)),
    };
    ResolvedBox {
        rect,
        rotation_deg: geometry.rotation_deg,
        pivot: rect.center(),
    }
}

/// Page-space rotation expressed for a Y-down pixel grid.
pub fn raster_rotation_deg(rotation_deg: f32) -> f32 {
    -rotation_deg
}
