//! PNG encoding for overlay canvases.
//!
//! Flux overlays are built from a handful of gradient colors plus large
//! transparent areas, so most canvases fit an indexed palette:
//! - **Indexed PNG (color type 3)** when the canvas has ≤256 unique colors
//! - **RGBA PNG (color type 6)** otherwise
//!
//! `create_png_auto` picks the mode; `create_png` always writes RGBA.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;

use crate::gradient::Color;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Canvases at least this many pixels wide-times-high collect colors in parallel
const PARALLEL_THRESHOLD: usize = 64 * 64;

enum PixelLayout<'a> {
    Rgba(&'a [u8]),
    Indexed { palette: &'a [Color], indices: &'a [u8] },
}

impl PixelLayout<'_> {
    fn color_type(&self) -> u8 {
        match self {
            PixelLayout::Rgba(_) => 6,
            PixelLayout::Indexed { .. } => 3,
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelLayout::Rgba(_) => 4,
            PixelLayout::Indexed { .. } => 1,
        }
    }

    fn data(&self) -> &[u8] {
        match self {
            PixelLayout::Rgba(pixels) => pixels,
            PixelLayout::Indexed { indices, .. } => indices,
        }
    }
}

/// Encode RGBA pixels, choosing indexed mode when the palette fits.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    check_len(pixels.len(), width, height, 4)?;

    match extract_palette(pixels) {
        Some((palette, indices)) => encode(
            width,
            height,
            PixelLayout::Indexed {
                palette: &palette,
                indices: &indices,
            },
        ),
        None => encode(width, height, PixelLayout::Rgba(pixels)),
    }
}

/// Encode RGBA pixels as a color type 6 PNG.
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    check_len(pixels.len(), width, height, 4)?;
    encode(width, height, PixelLayout::Rgba(pixels))
}

fn check_len(len: usize, width: usize, height: usize, bpp: usize) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("cannot encode a {}x{} image", width, height));
    }
    if len != width * height * bpp {
        return Err(format!(
            "expected {} bytes for {}x{}, got {}",
            width * height * bpp,
            width,
            height,
            len
        ));
    }
    Ok(())
}

/// Palette and per-pixel indices, or `None` past 256 colors.
fn extract_palette(pixels: &[u8]) -> Option<(Vec<Color>, Vec<u8>)> {
    let pixel_count = pixels.len() / 4;

    let unique: Vec<Color> = if pixel_count >= PARALLEL_THRESHOLD {
        let chunk = (pixel_count / rayon::current_num_threads()).max(256) * 4;
        let mut merged: Vec<Color> = pixels
            .par_chunks(chunk)
            .map(distinct_colors)
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        // Keep first-seen order stable across thread counts
        let mut seen = HashMap::with_capacity(MAX_PALETTE_SIZE);
        merged.retain(|c| seen.insert(*c, ()).is_none());
        merged
    } else {
        distinct_colors(pixels)?
    };

    if unique.len() > MAX_PALETTE_SIZE {
        return None;
    }

    let index_of: HashMap<Color, u8> = unique.iter().enumerate().map(|(i, c)| (*c, i as u8)).collect();
    let indices: Vec<u8> = pixels
        .par_chunks_exact(4)
        .map(|p| index_of.get(&Color::new(p[0], p[1], p[2], p[3])).copied().unwrap_or(0))
        .collect();

    Some((unique, indices))
}

/// Colors of `pixels` in first-seen order; `None` once there are too many.
fn distinct_colors(pixels: &[u8]) -> Option<Vec<Color>> {
    let mut seen: HashMap<Color, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut order = Vec::new();
    for p in pixels.chunks_exact(4) {
        let color = Color::new(p[0], p[1], p[2], p[3]);
        if seen.insert(color, ()).is_none() {
            if order.len() == MAX_PALETTE_SIZE {
                return None;
            }
            order.push(color);
        }
    }
    Some(order)
}

fn encode(width: usize, height: usize, layout: PixelLayout<'_>) -> Result<Vec<u8>, String> {
    let mut png = Vec::with_capacity(layout.data().len() / 4 + 1024);
    png.extend_from_slice(&PNG_SIGNATURE);

    // IHDR: dimensions, bit depth 8, color type, deflate, no filter, no interlace
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.extend_from_slice(&[8, layout.color_type(), 0, 0, 0]);
    write_chunk(&mut png, b"IHDR", &ihdr);

    if let PixelLayout::Indexed { palette, .. } = &layout {
        let plte: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
        write_chunk(&mut png, b"PLTE", &plte);

        if palette.iter().any(|c| c.a < 255) {
            let trns: Vec<u8> = palette.iter().map(|c| c.a).collect();
            write_chunk(&mut png, b"tRNS", &trns);
        }
    }

    let idat = deflate_scanlines(layout.data(), width * layout.bytes_per_pixel(), height)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Prefix every row with filter byte 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&raw)?;
    encoder.finish()
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
