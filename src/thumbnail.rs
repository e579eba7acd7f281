use std::f32::consts::PI;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};

use crate::error::Result;

/// Size of the "no thumbnail" placeholder (square)
pub const PLACEHOLDER_SIZE: u32 = 128;

/// Size of the placeholder shown for potions missing from the index
pub const UNKNOWN_POTION_SIZE: u32 = 150;

const PLACEHOLDER_BACKGROUND: Rgba<u8> = Rgba([15, 15, 40, 255]);
const DOT_COLORS: [Rgba<u8>; 2] = [Rgba([0x00, 0x00, 0xaa, 255]), Rgba([0x8b, 0x5e, 0x3c, 255])];
const DOT_COUNT: u32 = 12;

/// 5x7 bitmap of a question mark, one row per byte, high bit on the left
const QUESTION_MARK: [u8; 7] = [
    0b01110, 0b10001, 0b00001, 0b00110, 0b00100, 0b00000, 0b00100,
];

/// Remove a leading `data:image/<type>;base64,` header if present.
pub fn strip_data_uri(payload: &str) -> &str {
    if payload.starts_with("data:image/") {
        if let Some(pos) = payload.rfind(";base64,") {
            return &payload[pos + ";base64,".len()..];
        }
    }
    payload
}

/// Decode an embedded base64 thumbnail.
///
/// Invalid base64 is an error. Bytes that are not a decodable image give
/// `Ok(None)` so the caller can drop the file without reporting it.
pub fn decode_thumbnail(payload: &str) -> Result<Option<DynamicImage>> {
    let cleaned: String = strip_data_uri(payload)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(cleaned.as_bytes())?;

    match image::load_from_memory(&bytes) {
        Ok(img) => Ok(Some(img)),
        Err(e) => {
            log::debug!("thumbnail bytes are not an image: {}", e);
            Ok(None)
        }
    }
}

/// Scale an image to fit a `size` x `size` square, keeping its aspect ratio.
pub fn fit_to_size(img: &DynamicImage, size: u32) -> DynamicImage {
    img.resize(size, size, FilterType::Lanczos3)
}

/// Placeholder for records without a thumbnail: a ring of dots
/// alternating between two colours on a dark background.
pub fn placeholder_thumbnail(size: u32) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(size, size, PLACEHOLDER_BACKGROUND);

    let center = size as f32 / 2.0;
    let radius = size as f32 * 0.35;
    let dot_radius = size as f32 * 0.04;

    for i in 0..DOT_COUNT {
        let angle = 2.0 * PI * i as f32 / DOT_COUNT as f32;
        let cx = center + radius * angle.cos();
        let cy = center + radius * angle.sin();
        fill_circle(&mut canvas, cx, cy, dot_radius, DOT_COLORS[(i % 2) as usize]);
    }

    DynamicImage::ImageRgba8(canvas)
}

/// Placeholder for potions that no scanned vibe file provides:
/// a red question mark on black.
pub fn unknown_potion_placeholder(size: u32) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255]));
    let red = Rgba([255, 0, 0, 255]);

    // glyph takes half the canvas height
    let cell = (size / 2 / QUESTION_MARK.len() as u32).max(1);
    let glyph_w = cell * 5;
    let glyph_h = cell * QUESTION_MARK.len() as u32;
    let left = size.saturating_sub(glyph_w) / 2;
    let top = size.saturating_sub(glyph_h) / 2;

    for (row, bits) in QUESTION_MARK.iter().enumerate() {
        for col in 0..5u32 {
            if bits & (0b10000 >> col) == 0 {
                continue;
            }
            let x0 = left + col * cell;
            let y0 = top + row as u32 * cell;
            for y in y0..(y0 + cell).min(size) {
                for x in x0..(x0 + cell).min(size) {
                    canvas.put_pixel(x, y, red);
                }
            }
        }
    }

    DynamicImage::ImageRgba8(canvas)
}

fn fill_circle(canvas: &mut RgbaImage, cx: f32, cy: f32, r: f32, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let x_min = (cx - r).floor().max(0.0) as u32;
    let y_min = (cy - r).floor().max(0.0) as u32;
    let x_max = ((cx + r).ceil() as u32).min(w.saturating_sub(1));
    let y_max = ((cy + r).ceil() as u32).min(h.saturating_sub(1));

    for y in y_min..=y_max {
        for x in x_min..=x_max {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r * r {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}
