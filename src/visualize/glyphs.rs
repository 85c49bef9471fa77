//! Bitmap text rendering for finding labels.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

const GLYPH_SIZE: u32 = 8;

/// Pixel scale applied to the 8x8 glyphs.
pub const TEXT_SCALE: u32 = 2;
/// Rendered text height in pixels.
pub const TEXT_HEIGHT: u32 = GLYPH_SIZE * TEXT_SCALE;

/// Width in pixels of `text` when rendered with [`draw_text`].
pub fn text_width(text: &str) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * TEXT_SCALE
}

/// Draw `text` with its top-left corner at `(x, y)`. Pixels outside the
/// image are skipped; characters without a glyph render as `?`.
pub fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let (width, height) = img.dimensions();
    let step = (GLYPH_SIZE * TEXT_SCALE) as i32;

    for (i, c) in text.chars().enumerate() {
        let glyph = BASIC_FONTS
            .get(c)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        let origin_x = x + i as i32 * step;

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..TEXT_SCALE {
                    for dx in 0..TEXT_SCALE {
                        let px = origin_x + (col * TEXT_SCALE + dx) as i32;
                        let py = y + (row as u32 * TEXT_SCALE + dy) as i32;
                        if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                            img.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}
