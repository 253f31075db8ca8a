//! Glyph sources for challenge rendering.
//!
//! A TrueType font is preferred. When it cannot be loaded the renderer
//! falls back to a built-in 5x7 bitmap face, so rendering never fails
//! for lack of a font.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

/// Pixel height of TrueType glyphs
const FONT_PX: f32 = 30.0;

/// Each bitmap cell is drawn as a square of this many pixels
const BITMAP_SCALE: u32 = 4;

const BITMAP_WIDTH: u32 = 5;

/// Where glyph shapes come from
pub enum GlyphSet {
    /// Outline font loaded from disk
    Truetype(FontVec),
    /// Built-in bitmap face
    Bitmap,
}

impl GlyphSet {
    /// Load the preferred font, falling back to the bitmap face.
    pub fn load(font_path: &str) -> Self {
        match read_font(Path::new(font_path)) {
            Ok(font) => {
                tracing::info!(font_path = %font_path, "Loaded CAPTCHA font");
                Self::Truetype(font)
            }
            Err(e) => {
                tracing::warn!(
                    font_path = %font_path,
                    error = %e,
                    "CAPTCHA font unavailable, using built-in glyphs"
                );
                Self::Bitmap
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Bitmap)
    }

    /// Draw a single character with its top-left corner at (x, y).
    /// Anything outside the canvas is clipped.
    pub fn draw(&self, canvas: &mut RgbImage, ch: char, x: i32, y: i32, color: Rgb<u8>) {
        match self {
            Self::Truetype(font) => {
                let mut buf = [0u8; 4];
                draw_text_mut(canvas, color, x, y, PxScale::from(FONT_PX), font, ch.encode_utf8(&mut buf));
            }
            Self::Bitmap => {
                let rows = bitmap(ch).unwrap_or(UNKNOWN);
                for (row, bits) in rows.iter().enumerate() {
                    for col in 0..BITMAP_WIDTH {
                        if bits & (1 << (BITMAP_WIDTH - 1 - col)) == 0 {
                            continue;
                        }
                        let px = x + (col * BITMAP_SCALE) as i32;
                        let py = y + (row as u32 * BITMAP_SCALE) as i32;
                        draw_filled_rect_mut(
                            canvas,
                            Rect::at(px, py).of_size(BITMAP_SCALE, BITMAP_SCALE),
                            color,
                        );
                    }
                }
            }
        }
    }
}

/// Errors acquiring the preferred font
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("cannot read font file: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a usable font: {0}")]
    Parse(#[from] ab_glyph::InvalidFont),
}

fn read_font(path: &Path) -> Result<FontVec, FontError> {
    let bytes = std::fs::read(path)?;
    Ok(FontVec::try_from_vec(bytes)?)
}

/// Drawn for characters outside the bitmap face ('?')
const UNKNOWN: [u8; 7] = [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04];

/// 5x7 rows, most significant of the low five bits is the leftmost column.
fn bitmap(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        'b' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E],
        'c' => [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
        'd' => [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        'g' => [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'h' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11],
        'i' => [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
        'j' => [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C],
        'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        'l' => [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        'p' => [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
        'q' => [0x00, 0x00, 0x0D, 0x13, 0x0F, 0x01, 0x01],
        'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        'u' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
        'v' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'w' => [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A],
        'x' => [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
        'y' => [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'z' => [0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashnotes_common::constants::CHALLENGE_ALPHABET;

    #[test]
    fn test_bitmap_covers_alphabet() {
        for &b in CHALLENGE_ALPHABET {
            let rows = bitmap(b as char).unwrap_or_else(|| panic!("no glyph for {}", b as char));
            assert!(rows.iter().any(|r| *r != 0), "blank glyph for {}", b as char);
            assert!(rows.iter().all(|r| *r < 0x20));
        }
    }

    #[test]
    fn test_missing_font_falls_back() {
        let glyphs = GlyphSet::load("/nonexistent/fonts/missing.ttf");
        assert!(glyphs.is_fallback());
    }

    #[test]
    fn test_garbage_font_falls_back() {
        let path = std::env::temp_dir().join("gatehouse-not-a-font.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();
        let glyphs = GlyphSet::load(path.to_str().unwrap());
        assert!(glyphs.is_fallback());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bitmap_draw_marks_pixels_and_clips() {
        let mut canvas = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        GlyphSet::Bitmap.draw(&mut canvas, 'H', 0, 0, Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(5, 0), Rgb([255, 255, 255]));

        // Mostly off-canvas, must not panic
        GlyphSet::Bitmap.draw(&mut canvas, 'W', 35, 30, Rgb([0, 0, 0]));
        GlyphSet::Bitmap.draw(&mut canvas, 'W', -10, -10, Rgb([0, 0, 0]));
    }
}
