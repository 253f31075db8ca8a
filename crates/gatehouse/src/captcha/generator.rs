//! CAPTCHA text generation and image rendering.

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use rand::Rng;
use std::io::Cursor;

use flashnotes_common::constants::CHALLENGE_ALPHABET;

use super::glyphs::GlyphSet;
use crate::config::CaptchaConfig;

/// Left margin of the first character
const TEXT_LEFT: i32 = 12;
/// Horizontal advance per character
const CHAR_STEP: i32 = 22;
/// Maximum horizontal jitter either side
const X_JITTER: i32 = 2;
/// Maximum downward offset from the top edge
const Y_OFFSET_MAX: i32 = 12;
/// Upper bound of each glyph colour channel, keeps text dark on white
const GLYPH_CHANNEL_MAX: u8 = 120;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// A freshly generated challenge
pub struct Challenge {
    /// The answer text
    pub text: String,
    /// PNG-encoded image of `text`
    pub png: Vec<u8>,
}

/// Generate `length` characters drawn uniformly, with replacement, from
/// the 62-symbol alphabet.
pub fn generate_text<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| CHALLENGE_ALPHABET[rng.random_range(0..CHALLENGE_ALPHABET.len())] as char)
        .collect()
}

/// CAPTCHA generator service
pub struct CaptchaGenerator {
    text_length: usize,
    width: u32,
    height: u32,
    noise_dots: u32,
    glyphs: GlyphSet,
}

impl CaptchaGenerator {
    pub fn new(config: &CaptchaConfig) -> Self {
        Self::with_glyphs(config, GlyphSet::load(&config.font_path))
    }

    pub fn with_glyphs(config: &CaptchaConfig, glyphs: GlyphSet) -> Self {
        Self {
            text_length: config.text_length,
            width: config.width,
            height: config.height,
            noise_dots: config.noise_dots,
            glyphs,
        }
    }

    /// Generate a new challenge: text plus its rendered image
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Result<Challenge> {
        let text = generate_text(rng, self.text_length);
        let png = self.render_image(&text, rng)?;
        Ok(Challenge { text, png })
    }

    /// Render `text` onto a fresh canvas and encode it as PNG.
    ///
    /// Characters advance by a fixed step with a little horizontal jitter
    /// and a random drop from the top edge, each in its own dark colour.
    /// Single-pixel dots of arbitrary colour are scattered on top.
    pub fn render_image<R: Rng>(&self, text: &str, rng: &mut R) -> Result<Vec<u8>> {
        let mut canvas = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        for (i, ch) in text.chars().enumerate() {
            let x = TEXT_LEFT
                .saturating_add(CHAR_STEP.saturating_mul(i as i32))
                .saturating_add(rng.random_range(-X_JITTER..=X_JITTER));
            let y = rng.random_range(0..=Y_OFFSET_MAX);
            let color = Rgb([
                rng.random_range(0..=GLYPH_CHANNEL_MAX),
                rng.random_range(0..=GLYPH_CHANNEL_MAX),
                rng.random_range(0..=GLYPH_CHANNEL_MAX),
            ]);
            self.glyphs.draw(&mut canvas, ch, x, y, color);
        }

        if self.width > 0 && self.height > 0 {
            for _ in 0..self.noise_dots {
                let x = rng.random_range(0..self.width);
                let y = rng.random_range(0..self.height);
                canvas.put_pixel(x, y, Rgb([rng.random(), rng.random(), rng.random()]));
            }
        }

        let mut png = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode CAPTCHA image")?;

        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn generator() -> CaptchaGenerator {
        CaptchaGenerator::with_glyphs(&CaptchaConfig::default(), GlyphSet::Bitmap)
    }

    #[test]
    fn test_generate_text_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for length in [0, 1, 6, 40] {
            let text = generate_text(&mut rng, length);
            assert_eq!(text.chars().count(), length);
            assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_generate_text_is_seedable() {
        let a = generate_text(&mut StdRng::seed_from_u64(42), 6);
        let b = generate_text(&mut StdRng::seed_from_u64(42), 6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_text_reaches_every_class() {
        let mut rng = StdRng::seed_from_u64(1);
        let text = generate_text(&mut rng, 2000);
        assert!(text.chars().any(|c| c.is_ascii_uppercase()));
        assert!(text.chars().any(|c| c.is_ascii_lowercase()));
        assert!(text.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_challenge_entropy() {
        let bits = 6.0 * (CHALLENGE_ALPHABET.len() as f64).log2();
        assert!((bits - 35.7).abs() < 0.05);
    }

    #[test]
    fn test_rendered_size_independent_of_text() {
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(3);
        for text in ["", "a", "Ab3dE9", "WWWWWWWWWWWWWWWWWWWW"] {
            let png = generator.render_image(text, &mut rng).unwrap();
            let decoded = image::load_from_memory(&png).unwrap();
            assert_eq!(decoded.width(), 160);
            assert_eq!(decoded.height(), 60);
        }
    }

    #[test]
    fn test_glyphs_are_dark() {
        let generator = CaptchaGenerator::with_glyphs(
            &CaptchaConfig {
                noise_dots: 0,
                ..Default::default()
            },
            GlyphSet::Bitmap,
        );
        let mut rng = StdRng::seed_from_u64(9);
        let png = generator.render_image("HHHHHH", &mut rng).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();

        let inked: Vec<_> = decoded.pixels().filter(|p| **p != BACKGROUND).collect();
        assert!(!inked.is_empty());
        assert!(inked.iter().all(|p| p.0.iter().all(|c| *c <= GLYPH_CHANNEL_MAX)));
    }

    #[test]
    fn test_generate_pairs_text_and_image() {
        let generator = generator();
        let challenge = generator.generate(&mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(challenge.text.len(), 6);
        assert!(image::load_from_memory(&challenge.png).is_ok());
    }
}
