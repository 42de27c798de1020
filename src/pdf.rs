//! Vector compositor: turns a page's draw plan into PDF content-stream
//! operators plus the resource manifest the merge pipeline needs to attach
//! them to a real document.
//!
//! Numbers are formatted through the same milli-point quantization as the
//! rest of the crate so a given plan always serializes to identical bytes.

use crate::error::Result;
use crate::font::FontVariant;
use crate::layout;
use crate::plan::PlannedStamp;
use crate::tile;
use crate::types::{Color, Size};

/// A decoded image ready to become an XObject. `rgb` is tightly packed
/// 3-byte pixels; `alpha` is a one-byte-per-pixel soft mask, present only
/// when the source had partial transparency.
#[derive(Debug, Clone)]
pub struct OverlayImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

/// One `/ca`+`/CA` constant-alpha graphics state, keyed by its milli value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaState {
    pub alpha_milli: u16,
}

impl AlphaState {
    pub fn resource_name(&self) -> String {
        format!("GS{}", self.alpha_milli)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha_milli as f32 / 1000.0
    }
}

/// Everything needed to graft one page's stamps onto a document: the content
/// operators and the resources they reference.
#[derive(Debug)]
pub struct OverlayPage {
    pub content: String,
    pub fonts: Vec<FontVariant>,
    pub images: Vec<OverlayImage>,
    pub alpha_states: Vec<AlphaState>,
}

struct Emitter {
    out: String,
    fonts: Vec<FontVariant>,
    images: Vec<OverlayImage>,
    alpha_states: Vec<AlphaState>,
    alpha_fills: bool,
}

/// Serializes the plan in paint order. Returns `None` for an empty plan so
/// untouched pages pass through the merge unchanged.
pub fn build_overlay_page(
    plan: &[PlannedStamp<'_>],
    page_size: Size,
    alpha_fills: bool,
) -> Result<Option<OverlayPage>> {
    if plan.is_empty() {
        return Ok(None);
    }
    let mut emitter = Emitter {
        out: String::new(),
        fonts: Vec::new(),
        images: Vec::new(),
        alpha_states: Vec::new(),
        alpha_fills,
    };
    for stamp in plan {
        match stamp {
            PlannedStamp::Image { data, resolved } => emitter.emit_image(data, resolved),
            PlannedStamp::BoxedText {
                style,
                resolved,
                variant,
                lines,
                fill_alpha,
            } => emitter.emit_boxed_text(style, resolved, *variant, lines, *fill_alpha),
            PlannedStamp::TiledText {
                style,
                variant,
                angle_deg,
                pitch_x_pt,
                pitch_y_pt,
                origin_x_pt,
                origin_y_pt,
                fill_alpha,
            } => emitter.emit_tiled_text(
                style,
                *variant,
                *angle_deg,
                (*pitch_x_pt, *pitch_y_pt),
                (*origin_x_pt, *origin_y_pt),
                *fill_alpha,
                page_size,
            ),
        }
    }
    Ok(Some(OverlayPage {
        content: emitter.out,
        fonts: emitter.fonts,
        images: emitter.images,
        alpha_states: emitter.alpha_states,
    }))
}

impl Emitter {
    /// translate(pivot) then rotate, as one cm matrix.
    fn push_pivot_rotation(&mut self, cx: f32, cy: f32, rotation_deg: f32) {
        let theta = rotation_deg.to_radians();
        let cos = libm::cosf(theta);
        let sin = libm::sinf(theta);
        self.out.push_str(&format!(
            "{} {} {} {} {} {} cm\n",
            fmt(cos),
            fmt(sin),
            fmt(-sin),
            fmt(cos),
            fmt(cx),
            fmt(cy)
        ));
    }

    fn push_alpha(&mut self, alpha: f32) {
        if !self.alpha_fills {
            return;
        }
        let milli = ((alpha * 1000.0).round() as i32).clamp(0, 1000) as u16;
        if milli == 1000 {
            return;
        }
        let state = AlphaState { alpha_milli: milli };
        if !self.alpha_states.contains(&state) {
            self.alpha_states.push(state);
        }
        self.out
            .push_str(&format!("/{} gs\n", state.resource_name()));
    }

    fn use_font(&mut self, variant: FontVariant) {
        if !self.fonts.contains(&variant) {
            self.fonts.push(variant);
        }
    }

    fn push_text_line(&mut self, variant: FontVariant, size: f32, x: f32, y: f32, text: &str) {
        self.use_font(variant);
        let (encoded, replaced) = encode_pdf_text(text);
        if replaced > 0 {
            log::warn!(
                "replaced {} unencodable character(s) in stamp text",
                replaced
            );
        }
        self.out.push_str("BT\n");
        self.out
            .push_str(&format!("/{} {} Tf\n", variant.resource_name(), fmt(size)));
        self.out.push_str(&format!("{} {} Td\n", fmt(x), fmt(y)));
        self.out.push_str(&format!("({}) Tj\n", encoded));
        self.out.push_str("ET\n");
    }

    /// A stamp whose bytes fail to decode is skipped with a warning; one bad
    /// asset must not abort the rest of the page.
    fn emit_image(&mut self, data: &[u8], resolved: &crate::geometry::ResolvedBox) {
        let decoded = match image::load_from_memory(data) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(e) => {
                log::warn!("skipping image stamp: decode failed: {}", e);
                return;
            }
        };
        let (width, height) = decoded.dimensions();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        let mut has_alpha = false;
        for pixel in decoded.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            if pixel.0[3] != 255 {
                has_alpha = true;
            }
            alpha.push(pixel.0[3]);
        }
        let name = format!("Im{}", self.images.len());
        self.images.push(OverlayImage {
            name: name.clone(),
            width,
            height,
            rgb,
            alpha: has_alpha.then_some(alpha),
        });

        let (cx, cy) = resolved.pivot;
        let w = resolved.rect.width.to_f32();
        let h = resolved.rect.height.to_f32();
        self.out.push_str("q\n");
        self.push_pivot_rotation(cx.to_f32(), cy.to_f32(), resolved.rotation_deg);
        self.out.push_str(&format!(
            "1 0 0 1 {} {} cm\n",
            fmt(-w / 2.0),
            fmt(-h / 2.0)
        ));
        // Image space is the unit square.
        self.out
            .push_str(&format!("{} 0 0 {} 0 0 cm\n", fmt(w), fmt(h)));
        self.out.push_str(&format!("/{} Do\n", name));
        self.out.push_str("Q\n");
    }

    fn emit_boxed_text(
        &mut self,
        style: &crate::stamp::TextStamp,
        resolved: &crate::geometry::ResolvedBox,
        variant: FontVariant,
        lines: &[layout::LineRun],
        fill_alpha: f32,
    ) {
        let (cx, cy) = resolved.pivot;
        let w = resolved.rect.width.to_f32();
        let h = resolved.rect.height.to_f32();

        self.out.push_str("q\n");
        self.push_pivot_rotation(cx.to_f32(), cy.to_f32(), resolved.rotation_deg);
        self.out.push_str(&format!(
            "1 0 0 1 {} {} cm\n",
            fmt(-w / 2.0),
            fmt(-h / 2.0)
        ));
        // The alpha state stays in effect for the text as well.
        self.push_alpha(fill_alpha);
        self.out.push_str(&fill_color(style.fill_color));
        self.out.push_str(&stroke_color(style.border_color));
        self.out
            .push_str(&format!("{} w\n", fmt(style.border_width_pt)));
        self.out
            .push_str(&format!("0 0 {} {} re\nB\n", fmt(w), fmt(h)));

        self.out.push_str(&fill_color(style.text_color));
        for line in lines {
            self.push_text_line(variant, style.font_size, line.x, line.baseline_y, &line.text);
        }
        self.out.push_str("Q\n");
    }

    fn emit_tiled_text(
        &mut self,
        style: &crate::stamp::TextStamp,
        variant: FontVariant,
        angle_deg: f32,
        pitch: (f32, f32),
        origin: (f32, f32),
        fill_alpha: f32,
        page_size: Size,
    ) {
        let placements = tile::tile_placements(
            page_size.width.to_f32(),
            page_size.height.to_f32(),
            pitch.0,
            pitch.1,
            origin.0,
            origin.1,
        );
        let (natural_w, natural_h, runs) =
            layout::layout_natural(&style.content, variant, style.font_size);
        for placement in placements {
            self.out.push_str("q\n");
            self.push_pivot_rotation(placement.x, placement.y, angle_deg);
            // Center the block on the placement, like the raster sprite blit.
            self.out.push_str(&format!(
                "1 0 0 1 {} {} cm\n",
                fmt(-natural_w / 2.0),
                fmt(-natural_h / 2.0)
            ));
            self.push_alpha(fill_alpha);
            self.out.push_str(&fill_color(style.text_color));
            for run in &runs {
                self.push_text_line(
                    variant,
                    style.font_size,
                    run.x,
                    run.baseline_y,
                    &run.text,
                );
            }
            self.out.push_str("Q\n");
        }
    }
}

fn fill_color(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn stroke_color(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

/// Escapes a line for a literal PDF string. Characters outside the printable
/// ASCII range are replaced with '?'; the count comes back for logging.
fn encode_pdf_text(input: &str) -> (String, usize) {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            ' '..='~' => out.push(ch),
            _ => {
                out.push('?');
                replaced += 1;
            }
        }
    }
    (out, replaced)
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let milli = (value as f64 * 1000.0).round();
    let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::build_page_plan;
    use crate::stamp::{Stamp, StampKind, StampSet};

    fn overlay_for(stamp: Stamp, alpha_fills: bool) -> OverlayPage {
        let mut set = StampSet::new();
        set.insert(stamp);
        let plan = build_page_plan(&set, 0);
        build_overlay_page(&plan, Size::a4(), alpha_fills)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn number_formatting_is_milli_quantized() {
        assert_eq!(fmt(0.0), "0");
        assert_eq!(fmt(141.732), "141.732");
        assert_eq!(fmt(1.5), "1.5");
        assert_eq!(fmt(-0.25), "-0.25");
        assert_eq!(fmt(2.0), "2");
    }

    #[test]
    fn number_formatting_handles_out_of_range_values() {
        // Magnitudes past the fixed-point range must clamp, not panic.
        assert_eq!(fmt(3.0e9), "3000000000");
        assert_eq!(fmt(-3.0e9), "-3000000000");
        assert_eq!(fmt(f32::MAX), format_milli(i64::MAX));
        assert_eq!(fmt(f32::NAN), "0");
        assert_eq!(fmt(f32::INFINITY), "0");
    }

    #[test]
    fn text_escaping_replaces_unencodable_chars() {
        let (encoded, replaced) = encode_pdf_text("a(b)\\c é");
        assert_eq!(encoded, "a\\(b\\)\\\\c ?");
        assert_eq!(replaced, 1);
    }

    #[test]
    fn empty_plan_produces_no_overlay() {
        let result = build_overlay_page(&[], Size::a4(), true).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn boxed_text_emits_rect_at_the_converted_box() {
        let mut stamp = Stamp::text("APPROVED");
        stamp.geometry.width_mm = 100.0;
        stamp.geometry.height_mm = 50.0;
        let overlay = overlay_for(stamp, true);
        // 100mm x 50mm box in points.
        assert!(overlay.content.contains("0 0 283.465 141.732 re\nB\n"));
        // Pivot translation at the box center: x=50mm + 50mm.
        assert!(overlay.content.contains("283.464 212.598 cm"));
        assert!(overlay.content.contains("(APPROVED) Tj"));
        assert_eq!(overlay.fonts, vec![FontVariant::HelveticaBold]);
    }

    #[test]
    fn rotation_emits_a_cos_sin_matrix() {
        let mut stamp = Stamp::text("X");
        stamp.geometry.rotation_deg = 90.0;
        let overlay = overlay_for(stamp, true);
        // cos 90 = 0, sin 90 = 1.
        assert!(overlay.content.contains("0 1 -1 0 "));
    }

    #[test]
    fn alpha_state_is_deduplicated_and_named_by_milli() {
        let mut stamp = Stamp::text("SEAL");
        if let StampKind::Text(text) = &mut stamp.kind {
            text.box_opacity = 0.3;
        }
        let overlay = overlay_for(stamp, true);
        assert_eq!(overlay.alpha_states, vec![AlphaState { alpha_milli: 700 }]);
        assert!(overlay.content.contains("/GS700 gs"));
    }

    #[test]
    fn opaque_fills_capability_suppresses_alpha_states() {
        let mut stamp = Stamp::text("SEAL");
        if let StampKind::Text(text) = &mut stamp.kind {
            text.box_opacity = 0.3;
        }
        let overlay = overlay_for(stamp, false);
        assert!(overlay.alpha_states.is_empty());
        assert!(!overlay.content.contains(" gs\n"));
    }

    #[test]
    fn image_stamp_registers_an_xobject() {
        // 1x1 opaque PNG.
        let mut png = Vec::new();
        {
            use image::ImageEncoder;
            let encoder = image::codecs::png::PngEncoder::new(&mut png);
            encoder
                .write_image(&[10u8, 20, 30, 255], 1, 1, image::ExtendedColorType::Rgba8)
                .unwrap();
        }
        let overlay = overlay_for(Stamp::image(png), true);
        assert_eq!(overlay.images.len(), 1);
        let img = &overlay.images[0];
        assert_eq!((img.width, img.height), (1, 1));
        assert_eq!(img.rgb, vec![10, 20, 30]);
        assert!(img.alpha.is_none());
        assert!(overlay.content.contains("/Im0 Do"));
    }

    #[test]
    fn garbage_image_bytes_are_skipped_not_fatal() {
        let mut set = StampSet::new();
        set.insert(Stamp::image(vec![0xde, 0xad, 0xbe, 0xef]));
        set.insert(Stamp::text("STILL HERE"));
        let plan = build_page_plan(&set, 0);
        let overlay = build_overlay_page(&plan, Size::a4(), true)
            .unwrap()
            .unwrap();
        assert!(overlay.images.is_empty());
        assert!(!overlay.content.contains(" Do"));
        assert!(overlay.content.contains("(STILL HERE) Tj"));
    }

    #[test]
    fn tiled_text_repeats_the_string_per_placement() {
        let mut stamp = Stamp::text("DRAFT");
        if let StampKind::Text(text) = &mut stamp.kind {
            text.tiling.enabled = true;
            text.tiling.spacing_x_mm = 120.0;
            text.tiling.spacing_y_mm = 120.0;
        }
        let overlay = overlay_for(stamp, true);
        let draws = overlay.content.matches("(DRAFT) Tj").count();
        // 120mm pitch = 340.157pt on A4: nx = 2, ny = 3 so the inflated grid
        // is 7 x 10 anchors.
        assert_eq!(draws, 70);
        // Far more than a naive page/pitch grid would produce.
        assert!(draws > 6);
    }

    #[test]
    fn tiled_text_centers_the_block_on_each_placement() {
        let mut stamp = Stamp::text("DRAFT");
        if let StampKind::Text(text) = &mut stamp.kind {
            text.tiling.enabled = true;
            text.tiling.spacing_x_mm = 120.0;
            text.tiling.spacing_y_mm = 120.0;
        }
        let overlay = overlay_for(stamp, true);
        // Every placement carries the same half-block back-translation the
        // raster backend applies when it blits the sprite centered.
        let (w, h, _) = layout::layout_natural("DRAFT", FontVariant::HelveticaBold, 28.0);
        let centering = format!("1 0 0 1 {} {} cm\n", fmt(-w / 2.0), fmt(-h / 2.0));
        assert_eq!(overlay.content.matches(&centering).count(), 70);
    }
}

