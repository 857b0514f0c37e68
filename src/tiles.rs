//! 2bpp planar background graphics.
//!
//! A tile is 16 bytes: eight rows of bitplane 0 followed by eight rows of
//! bitplane 1, most significant bit leftmost. Decoding yields 2-bit pixel
//! values; a palette slot offset (`slot * 4`) is applied when tiles are laid
//! out on a sheet.

use crate::{
    common::{ColorRGB, PixelValue, PALETTE_SIZE},
    error::{CodecError, CodecResult},
};

pub const TILE_BYTES: usize = 0x10;

pub type TilePixels = [[PixelValue; 8]; 8];

pub fn decode_tile(raw: &[u8; TILE_BYTES]) -> TilePixels {
    let mut tile: TilePixels = [[0; 8]; 8];
    for y in 0..8 {
        for x in 0..8 {
            let c0 = (raw[y] >> (7 - x)) & 1;
            let c1 = (raw[y + 8] >> (7 - x)) & 1;
            tile[y][x] = c0 | (c1 << 1);
        }
    }
    tile
}

/// Decodes every complete tile in a graphics bank.
pub fn decode_all(gfx: &[u8]) -> Vec<TilePixels> {
    gfx.chunks_exact(TILE_BYTES)
        .map(|raw| decode_tile(raw.try_into().unwrap()))
        .collect()
}

/// One tile placed on a sheet, with the sub-palette it is drawn with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SheetTile {
    pub tile: usize,
    pub palette_slot: u8,
}

/// Pixels holding palette indices (0-31), row-major.
#[derive(Clone, Debug)]
pub struct IndexedImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl IndexedImage {
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    pub fn to_rgb(&self, colors: &[ColorRGB; PALETTE_SIZE]) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&p| colors[p as usize % PALETTE_SIZE])
            .collect()
    }
}

/// Lays tiles out left-to-right, top-to-bottom, `width` tiles per row. The
/// last row is padded with blank tiles.
pub fn assemble_sheet<I>(gfx: &[u8], tiles: I, width: usize) -> CodecResult<IndexedImage>
where
    I: IntoIterator<Item = SheetTile>,
{
    assert!(width > 0, "sheet width must be at least one tile");
    let decoded = decode_all(gfx);
    let mut placed: Vec<(TilePixels, u8)> = vec![];
    for t in tiles {
        let pixels = decoded.get(t.tile).ok_or_else(|| {
            CodecError::Format(format!(
                "tile 0x{:X} out of range ({} tiles in bank)",
                t.tile,
                decoded.len()
            ))
        })?;
        placed.push((*pixels, t.palette_slot * 4));
    }
    while placed.len() % width != 0 || placed.is_empty() {
        placed.push(([[0; 8]; 8], 0));
    }

    let rows = placed.len() / width;
    let mut image = IndexedImage {
        width: width * 8,
        height: rows * 8,
        pixels: vec![0; width * 8 * rows * 8],
    };
    for (i, (pixels, offset)) in placed.iter().enumerate() {
        let x0 = (i % width) * 8;
        let y0 = (i / width) * 8;
        for y in 0..8 {
            for x in 0..8 {
                image.pixels[(y0 + y) * image.width + x0 + x] = pixels[y][x] + offset;
            }
        }
    }
    Ok(image)
}

/// Every tile of the bank in order, drawn with sub-palette `slot`.
pub fn bank_sheet(gfx: &[u8], slot: u8, width: usize) -> CodecResult<IndexedImage> {
    let n = gfx.len() / TILE_BYTES;
    assemble_sheet(
        gfx,
        (0..n).map(|tile| SheetTile {
            tile,
            palette_slot: slot,
        }),
        width,
    )
}
