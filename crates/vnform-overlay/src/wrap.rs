//! Word-wrap sized against the embedded font's own advance widths (§4.7:
//! width estimation uses the font's advance widths, not a fixed-width
//! assumption).

use ttf_parser::Face;

fn advance(face: &Face, units_per_em: f32, font_size: f32, ch: char) -> f32 {
    face.glyph_index(ch)
        .and_then(|gid| face.glyph_hor_advance(gid))
        .map(|w| w as f32 / units_per_em * font_size)
        .unwrap_or(font_size * 0.5)
}

/// Greedily wraps `text` into lines no wider than `max_width` points at
/// `font_size`. A single word wider than `max_width` is still emitted
/// whole on its own line rather than being split mid-word.
pub fn wrap_text(face: &Face, font_size: f32, max_width: f32, text: &str) -> Vec<String> {
    let units_per_em = face.units_per_em() as f32;
    let space_width = advance(face, units_per_em, font_size, ' ');

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0f32;

    for word in text.split_whitespace() {
        let word_width: f32 = word.chars().map(|c| advance(face, units_per_em, font_size, c)).sum();
        let candidate_width = if current.is_empty() { word_width } else { current_width + space_width + word_width };

        if !current.is_empty() && candidate_width > max_width {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_width += space_width;
        }
        current.push_str(word);
        current_width += word_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::discover_font;

    #[test]
    fn long_text_wraps_into_multiple_lines() {
        let Ok(font) = discover_font("Helvetica") else { return };
        let Ok(face) = font.face() else { return };
        let text = "Nguyen Van A so 12 duong Le Loi phuong Ben Nghe quan 1 thanh pho Ho Chi Minh";
        let lines = wrap_text(&face, 12.0, 120.0, text);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(!line.is_empty());
        }
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let Ok(font) = discover_font("Helvetica") else { return };
        let Ok(face) = font.face() else { return };
        let lines = wrap_text(&face, 12.0, 400.0, "Nguyen Van A");
        assert_eq!(lines, vec!["Nguyen Van A".to_string()]);
    }

    #[test]
    fn empty_text_yields_single_empty_line() {
        let Ok(font) = discover_font("Helvetica") else { return };
        let Ok(face) = font.face() else { return };
        assert_eq!(wrap_text(&face, 12.0, 400.0, ""), vec!["".to_string()]);
    }
}
