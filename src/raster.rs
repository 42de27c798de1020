//! Raster compositor: draws a page's plan onto a transparent overlay and
//! alpha-composites it over the rendered page bitmap.
//!
//! A failing stamp is skipped with a warning instead of aborting the whole
//! preview. Text here keeps the
//! preview path's documented quirk: the box rectangle is drawn axis-aligned
//! regardless of rotation, while the text is rendered to its own page-sized
//! layer and that layer is rotated as a whole. Rotating the rectangle too
//! would look closer to the vector output but blurs the border through
//! resampling.

use crate::error::{Result, StampError};
use crate::font::FontVariant;
use crate::geometry::{raster_rotation_deg, ResolvedBox};
use crate::layout::{self, LineRun};
use crate::plan::PlannedStamp;
use crate::stamp::TextStamp;
use crate::tile;
use crate::types::{Color, Size};
use crate::units::RasterMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

/// Margin in device pixels around a tiling sprite so anti-aliased edges
/// survive the rotation.
const SPRITE_MARGIN_PX: u32 = 2;

/// Composites the plan over `page` and returns the stamped bitmap. The page
/// bitmap's dimensions define the pixel density.
pub fn render_preview(
    page: &Pixmap,
    plan: &[PlannedStamp<'_>],
    page_size: Size,
) -> Result<Pixmap> {
    let map = RasterMap::new(page.width(), page.height(), page_size);
    let mut overlay = Pixmap::new(page.width(), page.height())
        .ok_or_else(|| StampError::Raster("failed to allocate overlay surface".to_string()))?;

    for stamp in plan {
        let drawn = match stamp {
            PlannedStamp::Image { data, resolved } => draw_image(&mut overlay, &map, data, resolved),
            PlannedStamp::BoxedText {
                style,
                resolved,
                variant,
                lines,
                fill_alpha,
            } => draw_boxed_text(&mut overlay, &map, style, resolved, *variant, lines, *fill_alpha),
            PlannedStamp::TiledText {
                style,
                variant,
                angle_deg,
                pitch_x_pt,
                pitch_y_pt,
                origin_x_pt,
                origin_y_pt,
                fill_alpha,
            } => draw_tiled_text(
                &mut overlay,
                &map,
                style,
                *variant,
                *angle_deg,
                (*pitch_x_pt, *pitch_y_pt),
                (*origin_x_pt, *origin_y_pt),
                *fill_alpha,
            ),
        };
        if let Err(err) = drawn {
            log::warn!("skipping stamp in preview: {}", err);
        }
    }

    let mut out = page.clone();
    out.draw_pixmap(
        0,
        0,
        overlay.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(out)
}

fn draw_image(
    overlay: &mut Pixmap,
    map: &RasterMap,
    data: &[u8],
    resolved: &ResolvedBox,
) -> Result<()> {
    let px = map.box_to_px(resolved.rect);
    let target_w = px.width() as u32;
    let target_h = px.height() as u32;

    let decoded = image::load_from_memory(data)
        .map_err(|e| StampError::Raster(format!("image decode failed: {}", e)))?
        .to_rgba8();
    let resized = image::imageops::resize(
        &decoded,
        target_w,
        target_h,
        image::imageops::FilterType::Triangle,
    );
    let sprite = rgba_to_pixmap(resized.as_raw(), target_w, target_h)?;

    let (cx, cy) = px.center();
    let transform = Transform::from_rotate_at(
        raster_rotation_deg(resolved.rotation_deg),
        cx as f32,
        cy as f32,
    );
    overlay.draw_pixmap(
        cx - target_w as i32 / 2,
        cy - target_h as i32 / 2,
        sprite.as_ref(),
        &bilinear_paint(),
        transform,
        None,
    );
    Ok(())
}

fn draw_boxed_text(
    overlay: &mut Pixmap,
    map: &RasterMap,
    style: &TextStamp,
    resolved: &ResolvedBox,
    variant: FontVariant,
    lines: &[LineRun],
    fill_alpha: f32,
) -> Result<()> {
    let px = map.box_to_px(resolved.rect);
    let rect = tiny_skia::Rect::from_xywh(
        px.left as f32,
        px.top as f32,
        px.width() as f32,
        px.height() as f32,
    )
    .ok_or_else(|| StampError::Raster("degenerate stamp box".to_string()))?;

    // Rectangle and border stay axis-aligned whatever the rotation.
    overlay.fill_rect(
        rect,
        &solid_paint(style.fill_color, fill_alpha),
        Transform::identity(),
        None,
    );
    let border_px = (style.border_width_pt * map.px_per_pt_x).round().max(1.0);
    let border_path = PathBuilder::from_rect(rect);
    overlay.stroke_path(
        &border_path,
        &solid_paint(style.border_color, fill_alpha),
        &Stroke {
            width: border_px,
            ..Stroke::default()
        },
        Transform::identity(),
        None,
    );

    // Text goes on its own layer, fully opaque, rotated as a whole.
    let mut draw_text = || -> Result<()> {
        let mut text_layer = Pixmap::new(overlay.width(), overlay.height())
            .ok_or_else(|| StampError::Raster("failed to allocate text surface".to_string()))?;
        let size_px = style.font_size * map.px_per_pt_y;
        let font = load_variant_font(variant)?;
        for line in lines {
            let x = px.left as f32 + line.x * map.px_per_pt_x;
            let baseline = px.bottom as f32 - line.baseline_y * map.px_per_pt_y;
            draw_text_run(
                &mut text_layer,
                &font,
                variant,
                &line.text,
                size_px,
                x,
                baseline,
                style.text_color,
                1.0,
            );
        }
        let transform = Transform::from_rotate_at(
            raster_rotation_deg(resolved.rotation_deg),
            overlay.width() as f32 / 2.0,
            overlay.height() as f32 / 2.0,
        );
        overlay.draw_pixmap(0, 0, text_layer.as_ref(), &bilinear_paint(), transform, None);
        Ok(())
    };
    if let Err(err) = draw_text() {
        log::warn!("stamp text not rendered in preview: {}", err);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn draw_tiled_text(
    overlay: &mut Pixmap,
    map: &RasterMap,
    style: &TextStamp,
    variant: FontVariant,
    angle_deg: f32,
    pitch_pt: (f32, f32),
    origin_pt: (f32, f32),
    fill_alpha: f32,
) -> Result<()> {
    let font = load_variant_font(variant)?;
    let size_px = style.font_size * map.px_per_pt_y;
    let (natural_w_pt, natural_h_pt, runs) =
        layout::layout_natural(&style.content, variant, style.font_size);
    let sprite_w = (natural_w_pt * map.px_per_pt_x).ceil() as u32 + 2 * SPRITE_MARGIN_PX;
    let sprite_h = (natural_h_pt * map.px_per_pt_y).ceil() as u32 + 2 * SPRITE_MARGIN_PX;

    let mut sprite = Pixmap::new(sprite_w.max(1), sprite_h.max(1))
        .ok_or_else(|| StampError::Raster("failed to allocate sprite surface".to_string()))?;
    let sprite_px_h = sprite.height() as f32;
    for run in &runs {
        draw_text_run(
            &mut sprite,
            &font,
            variant,
            &run.text,
            size_px,
            SPRITE_MARGIN_PX as f32 + run.x * map.px_per_pt_x,
            sprite_px_h - SPRITE_MARGIN_PX as f32 - run.baseline_y * map.px_per_pt_y,
            style.text_color,
            fill_alpha,
        );
    }

    // Rotate once with an expanded bound, then blit everywhere.
    let rotated = rotate_expand(&sprite, raster_rotation_deg(angle_deg))?;

    let placements = tile::tile_placements(
        overlay.width() as f32,
        overlay.height() as f32,
        pitch_pt.0 * map.px_per_pt_x,
        pitch_pt.1 * map.px_per_pt_y,
        map.x_px(origin_pt.0),
        map.y_px(origin_pt.1),
    );
    for placement in placements {
        overlay.draw_pixmap(
            placement.x.round() as i32 - rotated.width() as i32 / 2,
            placement.y.round() as i32 - rotated.height() as i32 / 2,
            rotated.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
    Ok(())
}

/// Rotates a pixmap about its center into a bound big enough for the whole
/// rotated extent.
fn rotate_expand(sprite: &Pixmap, angle_deg: f32) -> Result<Pixmap> {
    if angle_deg == 0.0 {
        return Ok(sprite.clone());
    }
    let theta = angle_deg.to_radians();
    let (sin, cos) = (libm::sinf(theta).abs(), libm::cosf(theta).abs());
    let w = sprite.width() as f32;
    let h = sprite.height() as f32;
    let out_w = (w * cos + h * sin).ceil().max(1.0) as u32;
    let out_h = (w * sin + h * cos).ceil().max(1.0) as u32;

    let mut out = Pixmap::new(out_w, out_h)
        .ok_or_else(|| StampError::Raster("failed to allocate rotation surface".to_string()))?;
    let transform =
        Transform::from_rotate_at(angle_deg, out_w as f32 / 2.0, out_h as f32 / 2.0);
    out.draw_pixmap(
        (out_w as i32 - sprite.width() as i32) / 2,
        (out_h as i32 - sprite.height() as i32) / 2,
        sprite.as_ref(),
        &bilinear_paint(),
        transform,
        None,
    );
    Ok(out)
}

fn rgba_to_pixmap(rgba: &[u8], width: u32, height: u32) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| StampError::Raster("failed to allocate image surface".to_string()))?;
    let dst = pixmap.data_mut();
    for (src_px, dst_px) in rgba.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn solid_paint<'a>(color: Color, alpha: f32) -> Paint<'a> {
    let rgba = color.to_rgba8(alpha);
    let mut paint = Paint::default();
    paint.set_color(tiny_skia::Color::from_rgba8(
        rgba[0], rgba[1], rgba[2], rgba[3],
    ));
    paint.anti_alias = true;
    paint
}

fn bilinear_paint() -> PixmapPaint {
    PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    }
}

/// Fills one line of glyph outlines at `size_px` with the baseline at
/// (`x`, `baseline_y`) in pixel space. Advances use the same metric tables
/// as the layout engine so centering matches the vector output; the font
/// file supplies outlines only.
#[allow(clippy::too_many_arguments)]
fn draw_text_run(
    target: &mut Pixmap,
    font_data: &[u8],
    variant: FontVariant,
    text: &str,
    size_px: f32,
    x: f32,
    baseline_y: f32,
    color: Color,
    alpha: f32,
) {
    let Ok(face) = Face::parse(font_data, 0) else {
        return;
    };
    let scale = size_px / face.units_per_em() as f32;
    let paint = solid_paint(color, alpha);
    let mut pen_x = x;
    for ch in text.chars() {
        let advance = variant.char_width_milliem(ch) as f32 * size_px / 1000.0;
        if !ch.is_whitespace() {
            if let Some(glyph) = face.glyph_index(ch) {
                if let Some(path) = outline_glyph(&face, glyph, pen_x, baseline_y, scale) {
                    target.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
        }
        pen_x += advance;
    }
}

fn outline_glyph(
    face: &Face<'_>,
    glyph: GlyphId,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
) -> Option<tiny_skia::Path> {
    let mut builder = GlyphPathBuilder::new(origin_x, origin_y, scale);
    face.outline_glyph(glyph, &mut builder)?;
    builder.finish()
}

/// Font units are Y-up; the pixmap is Y-down, so Y is mirrored about the
/// baseline.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<tiny_skia::Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(
            self.origin_x + x1 * self.scale,
            self.origin_y - y1 * self.scale,
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            self.origin_x + x1 * self.scale,
            self.origin_y - y1 * self.scale,
            self.origin_x + x2 * self.scale,
            self.origin_y - y2 * self.scale,
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

static FONT_CACHE: OnceLock<Mutex<HashMap<FontVariant, Option<Arc<Vec<u8>>>>>> = OnceLock::new();

/// Loads a system font standing in for the requested Helvetica face.
fn load_variant_font(variant: FontVariant) -> Result<Arc<Vec<u8>>> {
    let cache = FONT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Ok(guard) = cache.lock() {
        if let Some(entry) = guard.get(&variant) {
            return entry.clone().ok_or_else(|| missing_font_error(variant));
        }
    }
    let loaded = load_font_from_disk(variant);
    if let Ok(mut guard) = cache.lock() {
        guard.insert(variant, loaded.clone());
    }
    loaded.ok_or_else(|| missing_font_error(variant))
}

fn missing_font_error(variant: FontVariant) -> StampError {
    StampError::Raster(format!(
        "no usable system font for {}",
        variant.postscript_name()
    ))
}

fn load_font_from_disk(variant: FontVariant) -> Option<Arc<Vec<u8>>> {
    for dir in system_font_dirs() {
        for name in font_file_candidates(variant) {
            if let Some(path) = find_file(&dir, name, 4) {
                if let Ok(bytes) = std::fs::read(&path) {
                    if Face::parse(&bytes, 0).is_ok() {
                        return Some(Arc::new(bytes));
                    }
                }
            }
        }
    }
    None
}

fn find_file(dir: &PathBuf, name: &str, depth: u32) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().is_some_and(|f| f == name) {
            return Some(path);
        }
    }
    if depth > 0 {
        for sub in subdirs {
            if let Some(found) = find_file(&sub, name, depth - 1) {
                return Some(found);
            }
        }
    }
    None
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
    }

    if let Ok(extra) = std::env::var("PAGESTAMP_FONT_DIR") {
        for path in std::env::split_paths(&extra) {
            if !path.as_os_str().is_empty() {
                dirs.push(path);
            }
        }
    }

    dirs
}

fn font_file_candidates(variant: FontVariant) -> &'static [&'static str] {
    match variant {
        FontVariant::Helvetica => &[
            "Helvetica.ttf",
            "arial.ttf",
            "Arial.ttf",
            "LiberationSans-Regular.ttf",
            "DejaVuSans.ttf",
            "NotoSans-Regular.ttf",
        ],
        FontVariant::HelveticaBold => &[
            "Helvetica-Bold.ttf",
            "arialbd.ttf",
            "Arial Bold.ttf",
            "LiberationSans-Bold.ttf",
            "DejaVuSans-Bold.ttf",
            "NotoSans-Bold.ttf",
        ],
        FontVariant::HelveticaOblique => &[
            "Helvetica-Oblique.ttf",
            "ariali.ttf",
            "Arial Italic.ttf",
            "LiberationSans-Italic.ttf",
            "DejaVuSans-Oblique.ttf",
            "NotoSans-Italic.ttf",
        ],
        FontVariant::HelveticaBoldOblique => &[
            "Helvetica-BoldOblique.ttf",
            "arialbi.ttf",
            "Arial Bold Italic.ttf",
            "LiberationSans-BoldItalic.ttf",
            "DejaVuSans-BoldOblique.ttf",
            "NotoSans-BoldItalic.ttf",
        ],
    }
}
