//! Bitmap text rendering.
//!
//! Text is drawn with the 8x8 `font8x8` glyphs scaled up to a fixed 32 px
//! cell, always in opaque black. Size and color are service-wide constants,
//! not per-request options.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};

/// Rendered cell size in pixels (glyph advance and line height).
pub const FONT_SIZE: u32 = 32;

/// Color of rendered text.
pub const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

const GLYPH_SIZE: u32 = 8;
const SCALE: u32 = FONT_SIZE / GLYPH_SIZE;

/// Look up a glyph; characters outside the font render as `?`.
fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Draw `text` with its top-left corner at (`x`, `y`).
///
/// `\n` starts a new line at the original `x`. Pixels falling outside the
/// image are clipped, so any coordinates (including negative ones) are valid.
pub fn draw_text(canvas: &mut RgbaImage, text: &str, x: i64, y: i64) {
    for (line_index, line) in text.split('\n').enumerate() {
        let line_y = y + line_index as i64 * FONT_SIZE as i64;
        for (column, c) in line.trim_end_matches('\r').chars().enumerate() {
            let glyph_x = x + column as i64 * FONT_SIZE as i64;
            draw_glyph(canvas, glyph(c), glyph_x, line_y);
        }
    }
}

fn draw_glyph(canvas: &mut RgbaImage, rows: [u8; 8], x: i64, y: i64) {
    for (row, bits) in rows.iter().enumerate() {
        for bit in 0..GLYPH_SIZE {
            // Bit 0 is the leftmost pixel
            if bits & (1u8 << bit) == 0 {
                continue;
            }
            let block_x = x + (bit * SCALE) as i64;
            let block_y = y + (row as u32 * SCALE) as i64;
            fill_block(canvas, block_x, block_y);
        }
    }
}

fn fill_block(canvas: &mut RgbaImage, x: i64, y: i64) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let x_range = x.max(0)..(x + SCALE as i64).min(width);
    let y_range = y.max(0)..(y + SCALE as i64).min(height);

    for py in y_range {
        for px in x_range.clone() {
            canvas.put_pixel(px as u32, py as u32, TEXT_COLOR);
        }
    }
}
