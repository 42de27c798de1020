//! Text layout for boxed stamps and tiling sprites.
//!
//! All positions here are in box-local points: X grows right from the box's
//! left edge, Y grows up from the box's bottom edge. Backends apply the box
//! transform on top.

use crate::font::FontVariant;

/// Line height multiplier applied to the font size.
pub const LEADING_FACTOR: f32 = 1.2;

/// One positioned line of text. `baseline_y` is measured up from the box
/// bottom edge.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRun {
    pub text: String,
    pub x: f32,
    pub baseline_y: f32,
}

/// Greedy word wrap. Hard line breaks are always honored; a word wider than
/// `max_width` on a line of its own is split by characters so no line ever
/// exceeds the limit when the limit fits at least one character.
pub fn wrap_text(text: &str, variant: FontVariant, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for hard_line in text.split('\n') {
        wrap_hard_line(hard_line, variant, size, max_width, &mut lines);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn wrap_hard_line(
    hard_line: &str,
    variant: FontVariant,
    size: f32,
    max_width: f32,
    out: &mut Vec<String>,
) {
    let words: Vec<&str> = hard_line.split_whitespace().collect();
    if words.is_empty() {
        out.push(String::new());
        return;
    }
    let mut current = String::new();
    for word in words {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if variant.text_width(&candidate, size) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if variant.text_width(word, size) <= max_width {
            current = word.to_string();
        } else {
            // Word alone overflows: split by characters.
            current = split_long_word(word, variant, size, max_width, out);
        }
    }
    out.push(current);
}

/// Pushes full chunks of `word` onto `out` and returns the trailing partial
/// chunk to continue the current line with.
fn split_long_word(
    word: &str,
    variant: FontVariant,
    size: f32,
    max_width: f32,
    out: &mut Vec<String>,
) -> String {
    let mut chunk = String::new();
    for ch in word.chars() {
        let mut candidate = chunk.clone();
        candidate.push(ch);
        if !chunk.is_empty() && variant.text_width(&candidate, size) > max_width {
            out.push(std::mem::take(&mut chunk));
            chunk.push(ch);
        } else {
            chunk = candidate;
        }
    }
    chunk
}

/// Lays out `text` inside a `box_width` x `box_height` point box with
/// `padding` on every side.
///
/// The block is vertically centered but never starts below the padding line.
/// Drawing stops at the first line whose baseline would fall below the
/// padding, dropping the rest silently. Each line is horizontally centered,
/// clamped left at the padding.
pub fn layout_box_text(
    text: &str,
    variant: FontVariant,
    size: f32,
    box_width: f32,
    box_height: f32,
    padding: f32,
) -> Vec<LineRun> {
    let content_width = (box_width - 2.0 * padding).max(0.0);
    let lines = wrap_text(text, variant, size, content_width);
    let leading = LEADING_FACTOR * size;
    let n = lines.len();
    let start_y = ((box_height - leading * n as f32) / 2.0).max(padding);

    let mut runs = Vec::with_capacity(n);
    for (i, line) in lines.into_iter().enumerate() {
        let baseline_y = start_y + leading * (n - 1 - i) as f32;
        if baseline_y < padding {
            break;
        }
        let line_width = variant.text_width(&line, size);
        let x = ((box_width - line_width) / 2.0).max(padding);
        runs.push(LineRun {
            text: line,
            x,
            baseline_y,
        });
    }
    runs
}

/// Natural size of a text block with no wrapping (hard breaks only), used to
/// size the tiling sprite. Returns (width, height) in points along with the
/// positioned lines, laid out top line first with the block's bottom-left at
/// the origin.
pub fn layout_natural(
    text: &str,
    variant: FontVariant,
    size: f32,
) -> (f32, f32, Vec<LineRun>) {
    let lines: Vec<&str> = text.split('\n').collect();
    let leading = LEADING_FACTOR * size;
    let n = lines.len();
    let width = lines
        .iter()
        .map(|line| variant.text_width(line, size))
        .fold(0.0f32, f32::max);
    let height = leading * n as f32;

    let runs = lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| LineRun {
            text: line.to_string(),
            x: 0.0,
            baseline_y: leading * (n - 1 - i) as f32,
        })
        .collect();
    (width, height, runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FONT: FontVariant = FontVariant::Helvetica;

    #[test]
    fn short_text_stays_on_one_line() {
        let lines = wrap_text("OK", FONT, 12.0, 500.0);
        assert_eq!(lines, vec!["OK".to_string()]);
    }

    #[test]
    fn hard_breaks_are_honored() {
        let lines = wrap_text("TOP\nBOTTOM", FONT, 12.0, 500.0);
        assert_eq!(lines, vec!["TOP".to_string(), "BOTTOM".to_string()]);
    }

    #[test]
    fn greedy_wrap_fills_each_line() {
        // Each "aa" is 2*556 milliem = 11.12pt at 10pt; "aa aa" = 25.02pt.
        let lines = wrap_text("aa aa aa", FONT, 10.0, 26.0);
        assert_eq!(lines, vec!["aa aa".to_string(), "aa".to_string()]);
    }

    #[test]
    fn wrap_is_idempotent() {
        let once = wrap_text("one two three four five", FONT, 10.0, 40.0);
        let again = wrap_text(&once.join("\n"), FONT, 10.0, 40.0);
        assert_eq!(once, again);
    }

    #[test]
    fn overlong_word_splits_by_characters() {
        // 'a' is 5.56pt at 10pt, so 3 chars fit in 17pt.
        let lines = wrap_text("aaaaaaa", FONT, 10.0, 17.0);
        assert_eq!(
            lines,
            vec!["aaa".to_string(), "aaa".to_string(), "a".to_string()]
        );
        for line in &lines {
            assert!(FONT.text_width(line, 10.0) <= 17.0);
        }
    }

    #[test]
    fn block_is_vertically_centered() {
        // One line of 10pt text in a 100pt-tall box: leading 12,
        // start_y = (100-12)/2 = 44.
        let runs = layout_box_text("HI", FONT, 10.0, 200.0, 100.0, 5.0);
        assert_eq!(runs.len(), 1);
        assert!((runs[0].baseline_y - 44.0).abs() < 1e-4);
    }

    #[test]
    fn overfull_block_pins_to_padding_and_keeps_every_baseline_above_it() {
        // Five 10pt lines need 60pt of leading; the box is only 30pt tall.
        // Centering would go negative, so start_y clamps to the padding and
        // the block overflows the top rather than the bottom.
        let runs = layout_box_text("a\nb\nc\nd\ne", FONT, 10.0, 200.0, 30.0, 8.0);
        assert_eq!(runs.len(), 5);
        // start_y = max((30-60)/2, 8) = 8; baselines 56, 44, 32, 20, 8.
        assert!((runs[4].baseline_y - 8.0).abs() < 1e-4);
        for run in &runs {
            assert!(run.baseline_y >= 8.0 - 1e-6);
        }
    }

    #[test]
    fn horizontal_centering_clamps_at_padding() {
        // Wide line in a narrow box: x pins to the padding.
        let runs = layout_box_text("WWWWWWWW", FONT, 28.0, 60.0, 100.0, 3.0);
        for run in &runs {
            assert!(run.x >= 3.0 - 1e-6);
        }
        // Narrow line in a wide box: centered.
        let runs = layout_box_text("i", FONT, 10.0, 200.0, 100.0, 3.0);
        let lw = FONT.text_width("i", 10.0);
        assert!((runs[0].x - (200.0 - lw) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn natural_layout_size() {
        let (w, h, runs) = layout_natural("AV\nA", FONT, 10.0);
        assert!((w - FONT.text_width("AV", 10.0)).abs() < 1e-4);
        assert!((h - 24.0).abs() < 1e-4);
        assert_eq!(runs.len(), 2);
        assert!((runs[0].baseline_y - 12.0).abs() < 1e-4);
        assert!((runs[1].baseline_y - 0.0).abs() < 1e-4);
    }
}
