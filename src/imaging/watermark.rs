//! Text watermark rendering.
//!
//! Glyphs come from the `font8x8` bitmap font and are scaled up by nearest
//! neighbour, so no font file is needed at runtime. A watermark is rendered
//! once into a transparent tile (text, rotation, margin), then the tile is
//! alpha-blended onto the image, either repeated across it or once at the
//! top-left corner.

use super::params::WatermarkParams;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

const GLYPH_CELL: u32 = 8;

/// Pixel scale of one glyph bit for a font size in points.
pub fn glyph_scale(font_size: u32, dpi: u32) -> u32 {
    let pixels = font_size as u64 * dpi as u64 / 72;
    (pixels / GLYPH_CELL as u64).clamp(1, u32::MAX as u64) as u32
}

fn glyph_rows(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Unrotated size of `glyphs` glyphs at `scale`, with one bit-width of spacing
/// between glyphs and none after the last.
fn text_extent(glyphs: usize, scale: u32) -> (u64, u64) {
    let scale = scale as u64;
    let cell = GLYPH_CELL as u64 * scale;
    let count = glyphs.max(1) as u64;
    let width = count.saturating_mul(cell).saturating_add((count - 1).saturating_mul(scale));
    (width, cell)
}

/// Upper bound of the tile [`render_tile`] produces, computed without
/// allocating. A rotated `w × h` block never needs more than `w + h` per side.
pub fn tile_extent(params: &WatermarkParams) -> (u64, u64) {
    let scale = glyph_scale(params.font_size, params.dpi);
    let (w, h) = text_extent(params.text.chars().count(), scale);
    let (w, h) = if params.rotate.rem_euclid(360) == 0 {
        (w, h)
    } else {
        let side = w.saturating_add(h);
        (side, side)
    };
    let pad = 2 * params.margin as u64;
    (w.saturating_add(pad), h.saturating_add(pad))
}

/// Draw `text` on a transparent canvas sized to fit it exactly.
///
/// `None` when the canvas does not fit in `u32` coordinates.
fn draw_text(text: &str, scale: u32, color: Rgba<u8>) -> Option<RgbaImage> {
    let glyphs: Vec<[u8; 8]> = text.chars().map(glyph_rows).collect();
    let (width, height) = text_extent(glyphs.len(), scale);
    let width = u32::try_from(width).ok()?;
    let cell = u32::try_from(height).ok()?;
    let mut canvas = RgbaImage::new(width, cell);

    let step = cell as u64 + scale as u64;
    for (index, rows) in glyphs.iter().enumerate() {
        let origin_x = index as u64 * step;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_CELL {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                // inside the canvas, so it fits in u32
                let x0 = (origin_x + col as u64 * scale as u64) as u32;
                let y0 = row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        canvas.put_pixel(x0 + dx, y0 + dy, color);
                    }
                }
            }
        }
    }
    Some(canvas)
}

/// Rotate by `degrees`, growing the canvas so no corner is clipped.
fn rotate_expanded(image: &RgbaImage, degrees: i32) -> RgbaImage {
    let turn = degrees.rem_euclid(360);
    if turn == 0 {
        return image.clone();
    }
    let theta = (turn as f32).to_radians();
    let (w, h) = (image.width() as f32, image.height() as f32);
    // tolerate sin/cos rounding at right angles
    let bound = |v: f32| (v - 1e-3).ceil().max(1.0) as u32;
    let bound_w = bound(w * theta.cos().abs() + h * theta.sin().abs());
    let bound_h = bound(w * theta.sin().abs() + h * theta.cos().abs());

    let side = bound_w.max(bound_h).max(image.width()).max(image.height());
    let mut square = RgbaImage::new(side, side);
    let offset = |outer: u32, inner: u32| (outer - inner) / 2;
    imageops::replace(
        &mut square,
        image,
        offset(side, image.width()) as i64,
        offset(side, image.height()) as i64,
    );
    let rotated = rotate_about_center(&square, theta, Interpolation::Bilinear, Rgba([0, 0, 0, 0]));
    imageops::crop_imm(
        &rotated,
        offset(side, bound_w),
        offset(side, bound_h),
        bound_w,
        bound_h,
    )
    .to_image()
}

/// Render the watermark tile: coloured text at the requested opacity,
/// rotated, with `margin` transparent pixels on every side.
///
/// Callers bound the size with [`tile_extent`] first. `None` when a side
/// would not fit in `u32`.
pub fn render_tile(params: &WatermarkParams) -> Option<RgbaImage> {
    let alpha = (params.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let color = Rgba([params.color.r, params.color.g, params.color.b, alpha]);
    let text = draw_text(&params.text, glyph_scale(params.font_size, params.dpi), color)?;
    let rotated = rotate_expanded(&text, params.rotate);

    let pad = params.margin.checked_mul(2)?;
    let mut tile = RgbaImage::new(
        rotated.width().checked_add(pad)?,
        rotated.height().checked_add(pad)?,
    );
    imageops::replace(&mut tile, &rotated, params.margin as i64, params.margin as i64);
    Some(tile)
}

/// Blend `tile` onto `canvas`, repeated over the whole canvas or once at the origin.
pub fn composite(canvas: &mut RgbaImage, tile: &RgbaImage, replicate: bool) {
    if !replicate {
        imageops::overlay(canvas, tile, 0, 0);
        return;
    }
    let (step_x, step_y) = (tile.width().max(1), tile.height().max(1));
    for y in (0..canvas.height()).step_by(step_y as usize) {
        for x in (0..canvas.width()).step_by(step_x as usize) {
            imageops::overlay(canvas, tile, x as i64, y as i64);
        }
    }
}
