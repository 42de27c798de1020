//! Placement grid for full-page tiled stamps.
//!
//! Placements are computed in whichever device unit the backend draws in
//! (points for the vector path, pixels for the raster path); only the pitch
//! and phase arrive pre-converted. The grid is deliberately inflated well
//! past the page bounds so a rotated sprite anchored outside the page still
//! covers the corners it sweeps across.

/// Smallest accepted pitch in device units. A tiny spacing would otherwise
/// explode the placement count.
pub const MIN_PITCH: f32 = 4.0;

/// Anchor points for one page, in the caller's device units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlacement {
    pub x: f32,
    pub y: f32,
}

/// Enumerates sprite anchors over an inflated grid.
///
/// `origin` supplies only the grid phase: it is reduced modulo one pitch
/// period, so moving a stamp by a full period yields the identical grid.
pub fn tile_placements(
    page_width: f32,
    page_height: f32,
    pitch_x: f32,
    pitch_y: f32,
    origin_x: f32,
    origin_y: f32,
) -> Vec<TilePlacement> {
    let pitch_x = pitch_x.max(MIN_PITCH);
    let pitch_y = pitch_y.max(MIN_PITCH);
    let phase_x = origin_x.rem_euclid(pitch_x);
    let phase_y = origin_y.rem_euclid(pitch_y);

    let nx = (page_width / pitch_x).ceil() as i32;
    let ny = (page_height / pitch_y).ceil() as i32;

    let mut placements = Vec::with_capacity(((3 * nx + 1) * (3 * ny + 1)).max(0) as usize);
    for iy in -ny..=2 * ny {
        for ix in -nx..=2 * nx {
            placements.push(TilePlacement {
                x: phase_x + ix as f32 * pitch_x,
                y: phase_y + iy as f32 * pitch_y,
            });
        }
    }
    placements
}

#[cfg(test)]
mod tests {
    use super::*;

    // A4 in points.
    const PAGE_W: f32 = 595.276;
    const PAGE_H: f32 = 841.89;

    #[test]
    fn grid_is_inflated_past_the_naive_count() {
        // 120mm pitch = 340.157pt. Naive grid would be ceil(595/340) *
        // ceil(842/340) = 2 * 3 = 6 placements; the inflated grid covers
        // corners swept by rotated sprites.
        let pitch = 340.157;
        let placements = tile_placements(PAGE_W, PAGE_H, pitch, pitch, 50.0, 50.0);
        let nx = (PAGE_W / pitch).ceil() as i32; // 2
        let ny = (PAGE_H / pitch).ceil() as i32; // 3
        assert_eq!(placements.len(), ((3 * nx + 1) * (3 * ny + 1)) as usize);
        assert!(placements.len() > (nx * ny) as usize);
    }

    #[test]
    fn phase_is_reduced_to_one_period() {
        let a = tile_placements(PAGE_W, PAGE_H, 100.0, 100.0, 30.0, 70.0);
        let b = tile_placements(PAGE_W, PAGE_H, 100.0, 100.0, 330.0, -30.0);
        assert_eq!(a, b);
        for p in &a {
            // Every anchor sits on the same lattice.
            assert!(((p.x - 30.0) / 100.0).fract().abs() < 1e-4);
        }
    }

    #[test]
    fn grid_extends_beyond_every_page_edge() {
        let placements = tile_placements(PAGE_W, PAGE_H, 170.0, 170.0, 10.0, 10.0);
        assert!(placements.iter().any(|p| p.x < 0.0));
        assert!(placements.iter().any(|p| p.y < 0.0));
        assert!(placements.iter().any(|p| p.x > PAGE_W));
        assert!(placements.iter().any(|p| p.y > PAGE_H));
    }

    #[test]
    fn interior_probe_points_are_near_some_anchor() {
        let pitch = 150.0;
        let placements = tile_placements(PAGE_W, PAGE_H, pitch, pitch, 42.0, 17.0);
        let radius = pitch * std::f32::consts::SQRT_2 / 2.0 + 1.0;
        for (px, py) in [(0.0, 0.0), (PAGE_W, 0.0), (0.0, PAGE_H), (PAGE_W, PAGE_H), (PAGE_W / 2.0, PAGE_H / 2.0)] {
            let covered = placements
                .iter()
                .any(|p| ((p.x - px).powi(2) + (p.y - py).powi(2)).sqrt() <= radius);
            assert!(covered, "probe ({px}, {py}) uncovered");
        }
    }

    #[test]
    fn tiny_pitch_is_floored_and_terminates() {
        let placements = tile_placements(100.0, 100.0, 0.001, 0.0, 0.0, 0.0);
        // Floor at MIN_PITCH: n = ceil(100/4) = 25 per axis.
        assert_eq!(placements.len(), 76 * 76);
    }
}
