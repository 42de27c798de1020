//! pagestamp overlays user-defined stamps (images or styled text, optionally
//! tiled across the page) onto PDF documents. One declarative stamp
//! description drives two renderers: a raster compositor for interactive
//! previews over page bitmaps, and a vector compositor that grafts
//! resolution-independent overlays onto the final document, with optional
//! password protection and permission flags.
//!
//! ```no_run
//! use pagestamp::{Stamp, StampSet, Stamper};
//!
//! let mut stamps = StampSet::new();
//! stamps.insert(Stamp::text("APPROVED"));
//! let stamper = Stamper::builder().build();
//! let source = std::fs::read("contract.pdf")?;
//! let stamped = stamper.apply_all(&source, &stamps, None)?;
//! std::fs::write("contract-stamped.pdf", stamped)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod font;
mod geometry;
mod layout;
mod merge;
mod pdf;
mod plan;
mod raster;
mod security;
mod stamp;
mod template;
mod tile;
mod types;
mod units;

pub use error::{Result, StampError};
pub use font::FontVariant;
pub use pdf::{AlphaState, OverlayImage, OverlayPage};
pub use security::{Restrictions, Security};
pub use stamp::{Geometry, PageRange, Stamp, StampId, StampKind, StampSet, TextStamp, Tiling};
pub use template::{from_json, to_json};
pub use types::{Color, Pt, Rect, Size};

pub use tiny_skia::Pixmap;

/// Interactive previews only render this many pages; applying stamps to the
/// document has no such bound.
pub const PREVIEW_PAGE_LIMIT: usize = 10;

/// The compositing engine. Stateless apart from capability toggles, so one
/// instance can serve many documents.
#[derive(Debug, Clone)]
pub struct Stamper {
    alpha_fills: bool,
}

#[derive(Debug, Clone)]
pub struct StamperBuilder {
    alpha_fills: bool,
}

impl StamperBuilder {
    /// When disabled, the vector backend renders fills and strokes fully
    /// opaque instead of emitting constant-alpha graphics states, for
    /// consumers that cannot handle transparency. The raster preview always
    /// blends.
    pub fn alpha_fills(mut self, enabled: bool) -> Self {
        self.alpha_fills = enabled;
        self
    }

    pub fn build(self) -> Stamper {
        Stamper {
            alpha_fills: self.alpha_fills,
        }
    }
}

impl Default for Stamper {
    fn default() -> Self {
        Stamper::builder().build()
    }
}

impl Stamper {
    pub fn builder() -> StamperBuilder {
        StamperBuilder { alpha_fills: true }
    }

    /// Composites the stamps applicable to `page_index` (0-based) over the
    /// rendered page bitmap. `page_size` is the page's size in points; the
    /// bitmap's dimensions define the pixel density.
    pub fn render_preview(
        &self,
        page: &Pixmap,
        page_index: usize,
        stamps: &StampSet,
        page_size: Size,
    ) -> Result<Pixmap> {
        if page_index >= PREVIEW_PAGE_LIMIT {
            return Err(StampError::PreviewUnavailable {
                page_index,
                limit: PREVIEW_PAGE_LIMIT,
            });
        }
        let plan = plan::build_page_plan(stamps, page_index);
        raster::render_preview(page, &plan, page_size)
    }

    /// Builds the vector overlay for one page without touching a document.
    /// Returns `None` when no stamp applies to the page.
    pub fn build_overlay(
        &self,
        stamps: &StampSet,
        page_index: usize,
        page_size: Size,
    ) -> Result<Option<OverlayPage>> {
        let plan = plan::build_page_plan(stamps, page_index);
        pdf::build_overlay_page(&plan, page_size, self.alpha_fills)
    }

    /// Applies every stamp to the whole document and returns the finished
    /// bytes. With `security`, the output is encrypted and carries the
    /// configured permission flags; validation failures abort before any
    /// page is processed.
    pub fn apply_all(
        &self,
        pdf_bytes: &[u8],
        stamps: &StampSet,
        security: Option<&Security>,
    ) -> Result<Vec<u8>> {
        merge::apply_all(pdf_bytes, stamps, security, self.alpha_fills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_bounded() {
        let stamper = Stamper::default();
        let page = Pixmap::new(10, 10).unwrap();
        let err = stamper
            .render_preview(&page, PREVIEW_PAGE_LIMIT, &StampSet::new(), Size::a4())
            .unwrap_err();
        assert!(matches!(err, StampError::PreviewUnavailable { .. }));

        let ok = stamper.render_preview(&page, PREVIEW_PAGE_LIMIT - 1, &StampSet::new(), Size::a4());
        assert!(ok.is_ok());
    }

    #[test]
    fn build_overlay_is_none_for_untouched_pages() {
        let stamper = Stamper::default();
        let mut stamps = StampSet::new();
        let mut stamp = Stamp::text("DRAFT");
        stamp.page_range = PageRange::new(1, 1);
        stamps.insert(stamp);

        assert!(stamper
            .build_overlay(&stamps, 0, Size::a4())
            .unwrap()
            .is_some());
        assert!(stamper
            .build_overlay(&stamps, 1, Size::a4())
            .unwrap()
            .is_none());
    }
}
