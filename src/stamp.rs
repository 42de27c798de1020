//! The stamp data model and the session-owned stamp arena.
//!
//! A [`Stamp`] is value-like: cloning one yields a deep, independent copy
//! (including the image byte buffer), so editor-side duplication never
//! aliases pixel data. The arena hands out stable [`StampId`]s and keeps the
//! paint order (z-order) as a separate id sequence, so reorder, duplicate,
//! and delete never invalidate ids held elsewhere.

use crate::error::{Result, StampError};
use crate::types::Color;
use serde::{Deserialize, Serialize};

/// Inclusive 1-based page range. `applicable` is the single predicate shared
/// by the preview and apply paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub from: u32,
    pub to: u32,
}

impl PageRange {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    pub fn single(page: u32) -> Self {
        Self { from: page, to: page }
    }

    pub fn applicable(&self, page_index_0based: usize) -> bool {
        let idx = page_index_0based as u64;
        (self.from as u64).saturating_sub(1) <= idx && idx <= (self.to as u64).saturating_sub(1)
    }

    pub fn validate(&self, page_count: u32) -> Result<()> {
        if self.from < 1 || self.from > self.to || self.to > page_count {
            return Err(StampError::InvalidPageRange {
                from: self.from,
                to: self.to,
                page_count,
            });
        }
        Ok(())
    }
}

/// Box geometry in millimeters from the page's bottom-left corner.
/// Rotation is in degrees, counter-clockwise positive, pivoting on the box
/// center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    pub rotation_deg: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x_mm: 50.0,
            y_mm: 50.0,
            width_mm: 50.0,
            height_mm: 30.0,
            rotation_deg: 0.0,
        }
    }
}

/// Full-page repetition of the rendered text at a fixed pitch. When enabled,
/// the stamp's box origin still supplies the grid phase offset, but the box
/// width/height/fill/border are ignored for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tiling {
    pub enabled: bool,
    pub spacing_x_mm: f32,
    pub spacing_y_mm: f32,
    pub angle_deg: f32,
}

impl Default for Tiling {
    fn default() -> Self {
        Self {
            enabled: false,
            spacing_x_mm: 60.0,
            spacing_y_mm: 60.0,
            angle_deg: 45.0,
        }
    }
}

/// Styled text content.
///
/// `box_opacity` keeps the original tool's inverted sense: 0 is a fully
/// opaque rectangle fill, 1 is fully transparent. Conversion to conventional
/// alpha (`1 - box_opacity`) happens only at the render boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStamp {
    pub content: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub fill_color: Color,
    pub border_color: Color,
    pub text_color: Color,
    pub box_opacity: f32,
    pub border_width_pt: f32,
    pub padding_mm: f32,
    pub tiling: Tiling,
}

impl Default for TextStamp {
    fn default() -> Self {
        Self {
            content: "APPROVED".to_string(),
            font_size: 28.0,
            bold: true,
            italic: false,
            fill_color: Color::WHITE,
            border_color: Color::BLACK,
            text_color: Color::BLACK,
            box_opacity: 0.0,
            border_width_pt: 1.0,
            padding_mm: 3.0,
            tiling: Tiling::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StampKind {
    /// Encoded image bytes (PNG or JPEG). Transparency, if any, comes from
    /// the source format; there is no separate mask.
    Image {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    Text(TextStamp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub kind: StampKind,
    pub geometry: Geometry,
    pub page_range: PageRange,
}

impl Stamp {
    pub fn image(data: Vec<u8>) -> Self {
        Self {
            kind: StampKind::Image { data },
            geometry: Geometry::default(),
            page_range: PageRange::single(1),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: StampKind::Text(TextStamp {
                content: content.into(),
                ..TextStamp::default()
            }),
            geometry: Geometry::default(),
            page_range: PageRange::single(1),
        }
    }

    /// Input validation performed before any compositing work starts.
    pub fn validate(&self, page_count: u32) -> Result<()> {
        self.page_range.validate(page_count)?;
        if !(self.geometry.width_mm > 0.0) || !(self.geometry.height_mm > 0.0) {
            return Err(StampError::InvalidStamp(format!(
                "box size must be positive, found {}x{} mm",
                self.geometry.width_mm, self.geometry.height_mm
            )));
        }
        match &self.kind {
            StampKind::Image { data } => {
                if data.is_empty() {
                    return Err(StampError::InvalidStamp(
                        "image stamp has no image data".to_string(),
                    ));
                }
            }
            StampKind::Text(text) => {
                if !(text.font_size > 0.0) {
                    return Err(StampError::InvalidStamp(format!(
                        "font size must be positive, found {}",
                        text.font_size
                    )));
                }
                if text.tiling.enabled
                    && (!(text.tiling.spacing_x_mm > 0.0) || !(text.tiling.spacing_y_mm > 0.0))
                {
                    return Err(StampError::InvalidStamp(format!(
                        "tile spacing must be positive, found {}x{} mm",
                        text.tiling.spacing_x_mm, text.tiling.spacing_y_mm
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Stable handle to a stamp in a [`StampSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StampId(u64);

/// Ordered collection of stamps. Later entries paint on top of earlier ones
/// on pages where both apply.
#[derive(Debug, Clone, Default)]
pub struct StampSet {
    next_id: u64,
    entries: Vec<(StampId, Stamp)>,
}

impl StampSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends on top of the z-order.
    pub fn insert(&mut self, stamp: Stamp) -> StampId {
        let id = StampId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, stamp));
        id
    }

    pub fn get(&self, id: StampId) -> Option<&Stamp> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, stamp)| stamp)
    }

    pub fn get_mut(&mut self, id: StampId) -> Option<&mut Stamp> {
        self.entries
            .iter_mut()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, stamp)| stamp)
    }

    pub fn remove(&mut self, id: StampId) -> Option<Stamp> {
        let pos = self.entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        Some(self.entries.remove(pos).1)
    }

    /// Deep copy placed on top of the z-order; the copy owns its own image
    /// buffer, so editing one never touches the other.
    pub fn duplicate(&mut self, id: StampId) -> Option<StampId> {
        let copy = self.get(id)?.clone();
        Some(self.insert(copy))
    }

    /// Moves `id` to `new_index` in the z-order. Ids stay valid throughout.
    pub fn reorder(&mut self, id: StampId, new_index: usize) -> bool {
        let Some(pos) = self.entries.iter().position(|(entry_id, _)| *entry_id == id) else {
            return false;
        };
        let entry = self.entries.remove(pos);
        let clamped = new_index.min(self.entries.len());
        self.entries.insert(clamped, entry);
        true
    }

    /// Stamps in paint order.
    pub fn iter(&self) -> impl Iterator<Item = (StampId, &Stamp)> {
        self.entries.iter().map(|(id, stamp)| (*id, stamp))
    }

    pub fn validate(&self, page_count: u32) -> Result<()> {
        for (_, stamp) in self.iter() {
            stamp.validate(page_count)?;
        }
        Ok(())
    }
}

/// Text-safe representation for image bytes in persisted templates.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
