//! Palette strings: the run-based form palettes take both in ROM and in the
//! editable `palettes.json` files.
//!
//! A full palette is 32 master-palette indices (eight sub-palettes of four).
//! A palette string overlays a contiguous run of those indices starting at
//! `start`. Slots not covered by any string keep the background value.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    common::{ColorIdx, ColorRGB, MASTER_PALETTE_SIZE, PALETTE_SIZE},
    error::{CodecError, CodecResult},
    reader::ByteReader,
};

/// Fill value for slots no string covers, as the game sees it.
pub const BACKGROUND: ColorIdx = 0x0F;
/// Fill value used while editing, marking slots that belong to no string.
pub const HOLE: ColorIdx = 0x0D;

pub type Palette = [ColorIdx; PALETTE_SIZE];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PaletteString {
    pub start: u8,
    pub data: Vec<ColorIdx>,
}

/// Overlays each string, in list order, onto a palette filled with `background`.
/// Later strings overwrite earlier ones where they overlap.
pub fn expand(strings: &[PaletteString], background: ColorIdx) -> CodecResult<Palette> {
    let mut pal = [background; PALETTE_SIZE];
    for s in strings {
        let start = s.start as usize;
        if start + s.data.len() > PALETTE_SIZE {
            return Err(CodecError::Format(format!(
                "palette string at 0x{:02X} with {} entries runs past the end of the palette",
                s.start,
                s.data.len()
            )));
        }
        pal[start..start + s.data.len()].copy_from_slice(&s.data);
    }
    Ok(pal)
}

/// Splits a palette into strings, using `mask` as the run terminator. Slots
/// holding `mask` are not emitted.
pub fn compress(pal: &[ColorIdx], mask: ColorIdx) -> Vec<PaletteString> {
    let mut strings = vec![];
    let mut run: Vec<ColorIdx> = vec![];
    let mut start = 0;
    for (i, &c) in pal.iter().enumerate() {
        if c == mask {
            if !run.is_empty() {
                strings.push(PaletteString {
                    start: start as u8,
                    data: std::mem::take(&mut run),
                });
            }
            start = i + 1;
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        strings.push(PaletteString {
            start: start as u8,
            data: run,
        });
    }
    strings
}

/// Reads a ROM palette string list. Each entry is introduced by a non-zero
/// byte (the high byte of the PPU address) and the list ends at a 0x00.
///
/// Entry layout: `start`, then a control byte. If bit 6 of the control byte
/// is set, the next byte is repeated `control & 0x3F` times; otherwise
/// `control & 0x7F` literal bytes follow.
pub fn read_rom_strings(reader: &mut ByteReader) -> CodecResult<Vec<PaletteString>> {
    let mut strings = vec![];
    loop {
        if reader.read_u8()? == 0 {
            break;
        }
        let start = reader.read_u8()?;
        let n = reader.read_u8()? & 0x7F;
        let data = if n & 0x40 != 0 {
            vec![reader.read_u8()?; (n & 0x3F) as usize]
        } else {
            reader.read_n(n as usize)?.to_vec()
        };
        strings.push(PaletteString { start, data });
    }
    Ok(strings)
}

/// The console's fixed 64-colour table. Loaded once and shared by reference.
#[derive(Clone)]
pub struct MasterPalette {
    colors: [ColorRGB; MASTER_PALETTE_SIZE],
}

impl MasterPalette {
    /// Parses 64 big-endian RGB triples. Trailing data (e.g. emphasis
    /// variants in 512-entry `.pal` files) is ignored.
    pub fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        if data.len() < MASTER_PALETTE_SIZE * 3 {
            return Err(CodecError::Format(format!(
                "master palette has {} bytes, expected at least {}",
                data.len(),
                MASTER_PALETTE_SIZE * 3
            )));
        }
        let mut colors = [[0; 3]; MASTER_PALETTE_SIZE];
        for (i, c) in colors.iter_mut().enumerate() {
            c.copy_from_slice(&data[i * 3..i * 3 + 3]);
        }
        Ok(MasterPalette { colors })
    }

    pub fn load(path: &Path) -> CodecResult<Self> {
        let data = std::fs::read(path).map_err(|source| CodecError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_bytes(&data)
    }

    /// Only the low 6 bits of the index are significant, as on the PPU.
    pub fn resolve(&self, idx: ColorIdx) -> ColorRGB {
        self.colors[(idx & 0x3F) as usize]
    }

    pub fn resolve_u32(&self, idx: ColorIdx) -> u32 {
        let [r, g, b] = self.resolve(idx);
        (r as u32) << 16 | (g as u32) << 8 | b as u32
    }

    /// Converts a palette to RGB. Slot 0 of every sub-palette shows the
    /// universal background colour (slot 0 of the first sub-palette).
    pub fn resolve_palette(&self, pal: &Palette) -> [ColorRGB; PALETTE_SIZE] {
        let mut out = [[0; 3]; PALETTE_SIZE];
        for (i, c) in out.iter_mut().enumerate() {
            *c = if i & 3 == 0 {
                self.resolve(pal[0])
            } else {
                self.resolve(pal[i])
            };
        }
        out
    }
}
