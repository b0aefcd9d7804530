//! A 5x7 bitmap font for card labels.
//!
//! Glyphs are 35-bit masks written top row first, leftmost column as the
//! highest bit of each row. Lowercase letters render as capitals and German
//! umlauts fold to their base letter.

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Horizontal advance in dots, including one dot of spacing.
pub const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

const LETTERS: [u64; 26] = [
    0b01110_10001_10001_11111_10001_10001_10001, // A
    0b11110_10001_10001_11110_10001_10001_11110, // B
    0b01110_10001_10000_10000_10000_10001_01110, // C
    0b11100_10010_10001_10001_10001_10010_11100, // D
    0b11111_10000_10000_11110_10000_10000_11111, // E
    0b11111_10000_10000_11110_10000_10000_10000, // F
    0b01110_10001_10000_10111_10001_10001_01111, // G
    0b10001_10001_10001_11111_10001_10001_10001, // H
    0b01110_00100_00100_00100_00100_00100_01110, // I
    0b00111_00010_00010_00010_00010_10010_01100, // J
    0b10001_10010_10100_11000_10100_10010_10001, // K
    0b10000_10000_10000_10000_10000_10000_11111, // L
    0b10001_11011_10101_10101_10001_10001_10001, // M
    0b10001_10001_11001_10101_10011_10001_10001, // N
    0b01110_10001_10001_10001_10001_10001_01110, // O
    0b11110_10001_10001_11110_10000_10000_10000, // P
    0b01110_10001_10001_10001_10101_10010_01101, // Q
    0b11110_10001_10001_11110_10100_10010_10001, // R
    0b01111_10000_10000_01110_00001_00001_11110, // S
    0b11111_00100_00100_00100_00100_00100_00100, // T
    0b10001_10001_10001_10001_10001_10001_01110, // U
    0b10001_10001_10001_10001_10001_01010_00100, // V
    0b10001_10001_10001_10101_10101_10101_01010, // W
    0b10001_10001_01010_00100_01010_10001_10001, // X
    0b10001_10001_10001_01010_00100_00100_00100, // Y
    0b11111_00001_00010_00100_01000_10000_11111, // Z
];

const DIGITS: [u64; 10] = [
    0b01110_10001_10011_10101_11001_10001_01110,
    0b00100_01100_00100_00100_00100_00100_01110,
    0b01110_10001_00001_00010_00100_01000_11111,
    0b11111_00010_00100_00010_00001_10001_01110,
    0b00010_00110_01010_10010_11111_00010_00010,
    0b11111_10000_11110_00001_00001_10001_01110,
    0b00110_01000_10000_11110_10001_10001_01110,
    0b11111_00001_00010_00100_01000_01000_01000,
    0b01110_10001_10001_01110_10001_10001_01110,
    0b01110_10001_10001_01111_00001_00010_01100,
];

/// Bitmap for `c`, or `None` for whitespace and characters without a glyph.
pub fn glyph(c: char) -> Option<u64> {
    let c = fold(c);
    match c {
        'A'..='Z' => Some(LETTERS[(c as u8 - b'A') as usize]),
        '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
        '.' => Some(0b00000_00000_00000_00000_00000_01100_01100),
        ',' => Some(0b00000_00000_00000_00000_01100_00100_01000),
        ':' => Some(0b00000_01100_01100_00000_01100_01100_00000),
        '!' => Some(0b00100_00100_00100_00100_00100_00000_00100),
        '?' => Some(0b01110_10001_00001_00010_00100_00000_00100),
        '-' => Some(0b00000_00000_00000_11111_00000_00000_00000),
        '&' => Some(0b01100_10010_10100_01000_10101_10010_01101),
        '\'' => Some(0b01100_00100_01000_00000_00000_00000_00000),
        '/' => Some(0b00000_00001_00010_00100_01000_10000_00000),
        '(' => Some(0b00010_00100_01000_01000_01000_00100_00010),
        ')' => Some(0b01000_00100_00010_00010_00010_00100_01000),
        _ => None,
    }
}

/// Whether the dot at `row`, `col` of `bits` is set.
pub fn dot(bits: u64, row: u32, col: u32) -> bool {
    if row >= GLYPH_HEIGHT || col >= GLYPH_WIDTH {
        return false;
    }
    let shift = (GLYPH_HEIGHT - 1 - row) * GLYPH_WIDTH + (GLYPH_WIDTH - 1 - col);
    (bits >> shift) & 1 == 1
}

fn fold(c: char) -> char {
    match c {
        'ä' | 'Ä' => 'A',
        'ö' | 'Ö' => 'O',
        'ü' | 'Ü' => 'U',
        'ß' => 'S',
        '–' | '—' => '-',
        '’' | '‘' => '\'',
        other => other.to_ascii_uppercase(),
    }
}

/// Width in dots of `text` laid out on one line with `spacing` extra dots
/// between characters.
pub fn text_width(text: &str, spacing: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    n * GLYPH_ADVANCE - 1 + (n - 1) * spacing
}

/// Greedy word wrap so that no line is wider than `max_dots`. A single word
/// wider than the limit gets a line of its own.
pub fn wrap(text: &str, max_dots: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if text_width(&candidate, 0) <= max_dots {
            line = candidate;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_dots_read_top_left_first() {
        let l = glyph('L').unwrap();
        assert!(dot(l, 0, 0));
        assert!(!dot(l, 0, 4));
        assert!(dot(l, 6, 4));
        let t = glyph('T').unwrap();
        assert!((0..5).all(|c| dot(t, 0, c)));
        assert!(dot(t, 6, 2) && !dot(t, 6, 0));
    }

    #[test]
    fn test_folding() {
        assert_eq!(glyph('ü'), glyph('U'));
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('—'), glyph('-'));
        assert_eq!(glyph(' '), None);
    }

    #[test]
    fn test_default_card_text_is_covered() {
        for record in terra_config::CardRecord::defaults() {
            for c in [record.title, record.subtitle, record.text].concat().chars() {
                assert!(c.is_whitespace() || glyph(c).is_some(), "no glyph for {c:?}");
            }
        }
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "Aktuelle Gedanken, Learnings und Updates rund um meine Arbeit.";
        let lines = wrap(text, 66);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 0) <= 66 || !line.contains(' '), "{line} too wide");
        }
        assert_eq!(lines.join(" "), text);
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("", 0), 0);
        assert_eq!(text_width("A", 4), 5);
        assert_eq!(text_width("AB", 4), 15);
    }
}
