//! Macro structures: reusable blocks of metatiles that ROM rooms are built
//! from. Only needed during extraction; rooms are saved as flat tilemaps.

use crate::{common::MetatileIdx, error::CodecResult, reader::ByteReader};

const END_OF_STRUCT: u8 = 0xFF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructRow {
    /// Columns to skip from the placement origin.
    pub x_offset: u8,
    pub tiles: Vec<MetatileIdx>,
}

/// Rows of a structure, top to bottom.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Structure {
    pub rows: Vec<StructRow>,
}

/// Reads one structure. Each row begins with a byte holding the column
/// offset in its high nibble and the tile count in its low nibble (0 meaning
/// 16); the structure ends at 0xFF.
pub fn read_structure(reader: &mut ByteReader) -> CodecResult<Structure> {
    let mut rows = vec![];
    loop {
        let n = reader.read_u8()?;
        if n == END_OF_STRUCT {
            return Ok(Structure { rows });
        }
        let count = match n & 0xF {
            0 => 0x10,
            k => k as usize,
        };
        rows.push(StructRow {
            x_offset: n >> 4,
            tiles: reader.read_n(count)?.to_vec(),
        });
    }
}
