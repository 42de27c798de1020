//! Backend-agnostic per-page draw plan.
//!
//! The preview and document paths must place stamps identically, so page
//! filtering, geometry resolution, and text layout all happen once here. The
//! two compositors only interpret the resulting plan: the vector backend as
//! content-stream operators, the raster backend as pixmap composites.

use crate::geometry::{self, ResolvedBox};
use crate::layout::{self, LineRun};
use crate::stamp::{StampKind, StampSet, TextStamp};
use crate::font::FontVariant;

/// One drawable stamp on one page. Positions inside are in page points;
/// text line runs are in box-local points.
#[derive(Debug)]
pub enum PlannedStamp<'a> {
    Image {
        data: &'a [u8],
        resolved: ResolvedBox,
    },
    BoxedText {
        style: &'a TextStamp,
        resolved: ResolvedBox,
        variant: FontVariant,
        lines: Vec<LineRun>,
        /// Conventional alpha for the rectangle fill and border, already
        /// converted from the model's inverted `box_opacity`.
        fill_alpha: f32,
    },
    TiledText {
        style: &'a TextStamp,
        variant: FontVariant,
        angle_deg: f32,
        pitch_x_pt: f32,
        pitch_y_pt: f32,
        origin_x_pt: f32,
        origin_y_pt: f32,
        fill_alpha: f32,
    },
}

/// Builds the draw plan for one 0-based page index, in paint order. Stamps
/// whose page range excludes the page contribute nothing.
pub fn build_page_plan<'a>(stamps: &'a StampSet, page_index: usize) -> Vec<PlannedStamp<'a>> {
    let mut plan = Vec::new();
    for (_, stamp) in stamps.iter() {
        if !stamp.page_range.applicable(page_index) {
            continue;
        }
        let resolved = geometry::resolve_box(&stamp.geometry);
        match &stamp.kind {
            StampKind::Image { data } => {
                plan.push(PlannedStamp::Image {
                    data: data.as_slice(),
                    resolved,
                });
            }
            StampKind::Text(style) if style.tiling.enabled => {
                plan.push(PlannedStamp::TiledText {
                    style,
                    variant: FontVariant::pick(style.bold, style.italic),
                    angle_deg: style.tiling.angle_deg,
                    pitch_x_pt: crate::units::mm_to_pt(style.tiling.spacing_x_mm),
                    pitch_y_pt: crate::units::mm_to_pt(style.tiling.spacing_y_mm),
                    origin_x_pt: resolved.rect.x.to_f32(),
                    origin_y_pt: resolved.rect.y.to_f32(),
                    fill_alpha: (1.0 - style.box_opacity).clamp(0.0, 1.0),
                });
            }
            StampKind::Text(style) => {
                let variant = FontVariant::pick(style.bold, style.italic);
                let lines = layout::layout_box_text(
                    &style.content,
                    variant,
                    style.font_size,
                    resolved.rect.width.to_f32(),
                    resolved.rect.height.to_f32(),
                    crate::units::mm_to_pt(style.padding_mm),
                );
                plan.push(PlannedStamp::BoxedText {
                    style,
                    resolved,
                    variant,
                    lines,
                    fill_alpha: (1.0 - style.box_opacity).clamp(0.0, 1.0),
                });
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamp::{PageRange, Stamp};

    #[test]
    fn page_filter_and_paint_order() {
        let mut set = StampSet::new();
        let mut early = Stamp::text("FIRST");
        early.page_range = PageRange::new(1, 2);
        set.insert(early);
        let mut late = Stamp::text("SECOND");
        late.page_range = PageRange::new(2, 4);
        set.insert(late);

        assert_eq!(build_page_plan(&set, 0).len(), 1);
        let page2 = build_page_plan(&set, 1);
        assert_eq!(page2.len(), 2);
        let PlannedStamp::BoxedText { style, .. } = &page2[0] else {
            panic!("expected boxed text");
        };
        assert_eq!(style.content, "FIRST");
        assert_eq!(build_page_plan(&set, 4).len(), 0);
    }

    #[test]
    fn box_opacity_inversion_happens_at_the_plan_boundary() {
        let mut stamp = Stamp::text("SEAL");
        if let StampKind::Text(text) = &mut stamp.kind {
            text.box_opacity = 0.3;
        }
        let mut set = StampSet::new();
        set.insert(stamp);
        let plan = build_page_plan(&set, 0);
        let PlannedStamp::BoxedText { fill_alpha, .. } = &plan[0] else {
            panic!("expected boxed text");
        };
        assert!((fill_alpha - 0.7).abs() < 1e-6);
    }

    #[test]
    fn tiling_takes_over_the_text_stamp() {
        let mut stamp = Stamp::text("CONFIDENTIAL");
        if let StampKind::Text(text) = &mut stamp.kind {
            text.tiling.enabled = true;
            text.tiling.spacing_x_mm = 60.0;
        }
        let mut set = StampSet::new();
        set.insert(stamp);
        let plan = build_page_plan(&set, 0);
        let PlannedStamp::TiledText {
            pitch_x_pt,
            origin_x_pt,
            ..
        } = &plan[0]
        else {
            panic!("expected tiled text");
        };
        assert!((pitch_x_pt - crate::units::mm_to_pt(60.0)).abs() < 0.01);
        assert!((origin_x_pt - crate::units::mm_to_pt(50.0)).abs() < 0.01);
    }
}
