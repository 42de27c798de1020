//! Base-14 Helvetica family selection and text measurement.
//!
//! Both compositors must agree on line widths or centered text drifts between
//! the preview and the final document. Measurement therefore never consults a
//! font file: the standard AFM advance widths for the four Helvetica variants
//! are compiled in, and the raster backend only uses real font files for
//! glyph outlines, not metrics.

/// One of the four base-14 Helvetica faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontVariant {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
}

impl FontVariant {
    pub fn pick(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontVariant::Helvetica,
            (true, false) => FontVariant::HelveticaBold,
            (false, true) => FontVariant::HelveticaOblique,
            (true, true) => FontVariant::HelveticaBoldOblique,
        }
    }

    /// PostScript base font name for the PDF font dictionary.
    pub fn postscript_name(&self) -> &'static str {
        match self {
            FontVariant::Helvetica => "Helvetica",
            FontVariant::HelveticaBold => "Helvetica-Bold",
            FontVariant::HelveticaOblique => "Helvetica-Oblique",
            FontVariant::HelveticaBoldOblique => "Helvetica-BoldOblique",
        }
    }

    /// Resource dictionary key, stable across pages.
    pub fn resource_name(&self) -> &'static str {
        match self {
            FontVariant::Helvetica => "F1",
            FontVariant::HelveticaBold => "F2",
            FontVariant::HelveticaOblique => "F3",
            FontVariant::HelveticaBoldOblique => "F4",
        }
    }

    pub const ALL: [FontVariant; 4] = [
        FontVariant::Helvetica,
        FontVariant::HelveticaBold,
        FontVariant::HelveticaOblique,
        FontVariant::HelveticaBoldOblique,
    ];

    fn widths(&self) -> &'static [u16; 95] {
        // Oblique faces share the upright metrics.
        match self {
            FontVariant::Helvetica | FontVariant::HelveticaOblique => &HELVETICA_WIDTHS,
            FontVariant::HelveticaBold | FontVariant::HelveticaBoldOblique => {
                &HELVETICA_BOLD_WIDTHS
            }
        }
    }

    /// Advance width for one char in 1/1000 em units. Characters outside the
    /// printable ASCII range fall back to the lowercase-letter width; the
    /// operator emitter replaces them with '?' anyway.
    pub fn char_width_milliem(&self, ch: char) -> u16 {
        let code = ch as u32;
        if (0x20..=0x7e).contains(&code) {
            self.widths()[(code - 0x20) as usize]
        } else {
            556
        }
    }

    /// Width of a single-line string at `size` points.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let milliem: u64 = text
            .chars()
            .map(|ch| self.char_width_milliem(ch) as u64)
            .sum();
        milliem as f32 * size / 1000.0
    }
}

/// AFM advance widths for Helvetica, chars 0x20..=0x7e.
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20-0x2f
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30-0x3f
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40-0x4f
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50-0x5f
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60-0x6f
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70-0x7e
];

/// AFM advance widths for Helvetica-Bold, chars 0x20..=0x7e.
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20-0x2f
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30-0x3f
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40-0x4f
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50-0x5f
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60-0x6f
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70-0x7e
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_selection() {
        assert_eq!(FontVariant::pick(false, false), FontVariant::Helvetica);
        assert_eq!(FontVariant::pick(true, false), FontVariant::HelveticaBold);
        assert_eq!(
            FontVariant::pick(false, true),
            FontVariant::HelveticaOblique
        );
        assert_eq!(
            FontVariant::pick(true, true),
            FontVariant::HelveticaBoldOblique
        );
    }

    #[test]
    fn known_afm_widths() {
        assert_eq!(FontVariant::Helvetica.char_width_milliem(' '), 278);
        assert_eq!(FontVariant::Helvetica.char_width_milliem('A'), 667);
        assert_eq!(FontVariant::HelveticaBold.char_width_milliem('A'), 722);
        assert_eq!(FontVariant::Helvetica.char_width_milliem('0'), 556);
        // Oblique shares upright metrics.
        assert_eq!(
            FontVariant::HelveticaOblique.char_width_milliem('m'),
            FontVariant::Helvetica.char_width_milliem('m')
        );
    }

    #[test]
    fn text_width_scales_with_size() {
        // "AV" in regular Helvetica: 667 + 667 = 1334 milliem.
        let w10 = FontVariant::Helvetica.text_width("AV", 10.0);
        assert!((w10 - 13.34).abs() < 1e-3);
        let w20 = FontVariant::Helvetica.text_width("AV", 20.0);
        assert!((w20 - 2.0 * w10).abs() < 1e-3);
    }

    #[test]
    fn non_ascii_falls_back() {
        assert_eq!(FontVariant::Helvetica.char_width_milliem('é'), 556);
    }
}
