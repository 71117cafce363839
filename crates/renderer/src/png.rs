//! Minimal PNG writer for RGBA tiles.
//!
//! Tiles rendered through a colormap LUT rarely exceed 256 distinct colors,
//! so [`encode_png`] first tries an indexed image (color type 3) with a
//! `tRNS` alpha table and only falls back to truecolor-with-alpha (color
//! type 6) when the palette overflows.

use crate::encode::EncodeError;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Write;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

const MAX_PALETTE_SIZE: usize = 256;

/// Below this many pixels, palette extraction runs on one thread.
const PARALLEL_THRESHOLD: usize = 4096;

const COLOR_TYPE_INDEXED: u8 = 3;
const COLOR_TYPE_RGBA: u8 = 6;

/// A palette of at most 256 RGBA entries plus one index byte per pixel.
#[derive(Debug, Clone)]
pub struct IndexedImage {
    pub palette: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

#[inline(always)]
fn pack(px: &[u8]) -> u32 {
    u32::from_le_bytes([px[0], px[1], px[2], px[3]])
}

/// Encode RGBA pixels, choosing indexed or truecolor output.
pub fn encode_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, EncodeError> {
    check_len(pixels, width, height)?;
    match quantize(pixels) {
        Some(image) => encode_indexed(&image, width, height),
        None => encode_rgba(pixels, width, height),
    }
}

/// A fully transparent tile.
pub fn transparent_png(width: usize, height: usize) -> Result<Vec<u8>, EncodeError> {
    encode_png(&vec![0u8; width * height * 4], width, height)
}

/// Build an exact palette if the image has at most 256 distinct colors.
pub fn quantize(pixels: &[u8]) -> Option<IndexedImage> {
    if pixels.len() / 4 >= PARALLEL_THRESHOLD {
        quantize_parallel(pixels)
    } else {
        quantize_sequential(pixels)
    }
}

fn quantize_sequential(pixels: &[u8]) -> Option<IndexedImage> {
    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for px in pixels.chunks_exact(4) {
        let key = pack(px);
        let idx = match lookup.get(&key) {
            Some(&idx) => idx,
            None => {
                if palette.len() == MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push([px[0], px[1], px[2], px[3]]);
                lookup.insert(key, idx);
                idx
            }
        };
        indices.push(idx);
    }

    Some(IndexedImage { palette, indices })
}

/// Distinct colors are collected per chunk in parallel, merged, then every
/// pixel is mapped to its index in a second parallel pass.
fn quantize_parallel(pixels: &[u8]) -> Option<IndexedImage> {
    let chunk_pixels = (pixels.len() / 4 / rayon::current_num_threads()).max(256);

    let per_chunk: Vec<Option<HashSet<u32>>> = pixels
        .par_chunks(chunk_pixels * 4)
        .map(|chunk| {
            let mut seen = HashSet::with_capacity(MAX_PALETTE_SIZE);
            for px in chunk.chunks_exact(4) {
                seen.insert(pack(px));
                if seen.len() > MAX_PALETTE_SIZE {
                    return None;
                }
            }
            Some(seen)
        })
        .collect();

    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    for seen in per_chunk {
        for key in seen? {
            if lookup.contains_key(&key) {
                continue;
            }
            if palette.len() == MAX_PALETTE_SIZE {
                return None;
            }
            lookup.insert(key, palette.len() as u8);
            palette.push(key.to_le_bytes());
        }
    }

    let indices = pixels
        .par_chunks_exact(4)
        .map(|px| lookup.get(&pack(px)).copied().unwrap_or(0))
        .collect();

    Some(IndexedImage { palette, indices })
}

/// Write an indexed PNG. `tRNS` is only emitted when some entry is not opaque.
pub fn encode_indexed(
    image: &IndexedImage,
    width: usize,
    height: usize,
) -> Result<Vec<u8>, EncodeError> {
    if image.indices.len() != width * height {
        return Err(EncodeError::InvalidBuffer {
            expected: width * height,
            actual: image.indices.len(),
        });
    }

    let mut png = start_png(width, height, COLOR_TYPE_INDEXED);

    let plte: Vec<u8> = image.palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if image.palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = image.palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(&image.indices, width, height, 1)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Write a truecolor-with-alpha PNG.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, EncodeError> {
    check_len(pixels, width, height)?;
    let mut png = start_png(width, height, COLOR_TYPE_RGBA);
    let idat = deflate_scanlines(pixels, width, height, 4)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn check_len(pixels: &[u8], width: usize, height: usize) -> Result<(), EncodeError> {
    let expected = width * height * 4;
    if pixels.len() != expected {
        return Err(EncodeError::InvalidBuffer {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

/// Signature plus IHDR, 8 bits per sample, no interlace.
fn start_png(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut png = Vec::with_capacity(width * height + 128);
    png.extend_from_slice(&SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);
    write_chunk(&mut png, b"IHDR", &ihdr);
    png
}

/// Prefix every scanline with filter type 0 and zlib-compress.
fn deflate_scanlines(
    data: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>, EncodeError> {
    let stride = width * bytes_per_pixel;
    let mut raw = Vec::with_capacity(height * (stride + 1));
    for row in data.chunks_exact(stride.max(1)).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(kind);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
