//! One room: a 16x15 grid of metatiles, a palette selector per cell, and the
//! room's objects.
//!
//! In ROM a room is a list of structure placements followed by its object
//! records. The editor always saves rooms as a flat tilemap + attribute
//! table + object records, which the external compressor then packs.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    bitfield,
    common::{
        AttrValue, MetatileIdx, ATTRS_SIZE, ATTR_TABLE_SIZE, BLANK_METATILE, ROOM_HEIGHT,
        ROOM_WIDTH, TILEMAP_SIZE,
    },
    error::{CodecError, CodecResult},
    object::{self, ObjectInstance},
    reader::ByteReader,
    schema::SchemaTable,
    state::MetatileTable,
    structs::Structure,
    tiles::SheetTile,
};

const END_OF_ROOM: u8 = 0xFF;
const SKIP: u8 = 0xFE;
const OBJECTS: u8 = 0xFD;
const END_OF_OBJECTS: u8 = 0xFF;

mod base64_array {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(bytes: &[u8; N], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'d, D: Deserializer<'d>, const N: usize>(d: D) -> Result<[u8; N], D::Error> {
        let text = String::deserialize(d)?;
        let bytes = STANDARD.decode(text).map_err(de::Error::custom)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| de::Error::invalid_length(len, &format!("{} bytes", N).as_str()))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Room {
    #[serde(with = "base64_array")]
    pub tilemap: [MetatileIdx; TILEMAP_SIZE],
    /// One selector per cell of a 16x16 grid (the last row is off-screen);
    /// only the top-left..bottom-right of each 2x2 block reaches the game.
    #[serde(with = "base64_array")]
    pub attrs: [AttrValue; ATTRS_SIZE],
    pub objs: Vec<ObjectInstance>,
}

impl Default for Room {
    fn default() -> Self {
        Room {
            tilemap: [BLANK_METATILE; TILEMAP_SIZE],
            attrs: [0; ATTRS_SIZE],
            objs: vec![],
        }
    }
}

impl Room {
    /// Rebuilds a room from its ROM encoding.
    pub fn read_rom(
        reader: &mut ByteReader,
        structs: &[Structure],
        types: &SchemaTable,
    ) -> CodecResult<Room> {
        let base_pal = reader.read_u8()?;
        let mut room = Room {
            attrs: [base_pal & 3; ATTRS_SIZE],
            ..Room::default()
        };

        loop {
            let pos = reader.read_u8()?;
            match pos {
                END_OF_ROOM => break,
                SKIP => continue,
                OBJECTS => {
                    room.objs = object::read_objects(reader, types, END_OF_OBJECTS, (0, 0))?;
                    break;
                }
                _ => {}
            }
            let struct_idx = reader.read_u8()? as usize;
            let pal = reader.read_u8()?;
            let structure = structs.get(struct_idx).ok_or_else(|| {
                CodecError::Format(format!(
                    "room references structure 0x{:02X}, only {} defined",
                    struct_idx,
                    structs.len()
                ))
            })?;
            room.stamp(structure, (pos & 0xF) as usize, (pos >> 4) as usize, pal, base_pal);
        }
        Ok(room)
    }

    /// Draws a structure with its top-left at (`x0`, `y0`), clipped to the
    /// room. Attributes change only where `pal` differs from the room's base.
    /// Only the low two bits of a palette byte select a sub-palette.
    fn stamp(&mut self, structure: &Structure, x0: usize, y0: usize, pal: u8, base_pal: u8) {
        for (dy, row) in structure.rows.iter().enumerate() {
            let y = y0 + dy;
            if y >= ROOM_HEIGHT {
                break;
            }
            let first = x0 + row.x_offset as usize;
            for (x, &tile) in (first..ROOM_WIDTH).zip(&row.tiles) {
                let i = y * ROOM_WIDTH + x;
                self.tilemap[i] = tile;
                if pal != base_pal {
                    self.attrs[i] = pal & 3;
                }
            }
        }
    }

    /// Every attribute must be a palette selector, 0 to 3.
    pub fn check_attrs(&self) -> CodecResult<()> {
        match self.attrs.iter().position(|&a| a > 3) {
            Some(i) => Err(CodecError::Format(format!(
                "attribute {} at ({}, {}) is not a palette selector",
                self.attrs[i],
                i % ROOM_WIDTH,
                i / ROOM_WIDTH
            ))),
            None => Ok(()),
        }
    }

    /// Packs each aligned 2x2 block of attributes into one byte:
    /// top-left in bits 0-1, top-right 2-3, bottom-left 4-5, bottom-right 6-7.
    pub fn attr_table(&self) -> [u8; ATTR_TABLE_SIZE] {
        let mut out = [0; ATTR_TABLE_SIZE];
        for row in (0..0x10).step_by(2) {
            for col in (0..0x10).step_by(2) {
                let i = row * 0x10 + col;
                out[row / 2 * 8 + col / 2] = bitfield::pack([
                    (self.attrs[i], 0, 2),
                    (self.attrs[i + 1], 2, 2),
                    (self.attrs[i + 0x10], 4, 2),
                    (self.attrs[i + 0x11], 6, 2),
                ]);
            }
        }
        out
    }

    /// The uncompressed byte stream handed to the compressor: tilemap,
    /// attribute table, object records, 0xFF.
    pub fn encode(&self, types: &SchemaTable) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(TILEMAP_SIZE + ATTR_TABLE_SIZE + 1);
        out.extend_from_slice(&self.tilemap);
        out.extend_from_slice(&self.attr_table());
        for obj in &self.objs {
            out.extend(object::encode(obj, types)?);
        }
        out.push(END_OF_OBJECTS);
        Ok(out)
    }

    /// 8x8 tiles of the room laid out for a 32-tile-wide sheet, each tagged
    /// with its cell's sub-palette.
    pub fn sheet_tiles(&self, metatiles: &MetatileTable) -> Vec<SheetTile> {
        let mut tiles = Vec::with_capacity(TILEMAP_SIZE * 4);
        for row in 0..ROOM_HEIGHT {
            for half in [0..2, 2..4] {
                for col in 0..ROOM_WIDTH {
                    let i = row * ROOM_WIDTH + col;
                    let mt = metatiles.get(self.tilemap[i]);
                    for corner in half.clone() {
                        tiles.push(SheetTile {
                            tile: mt[corner] as usize,
                            palette_slot: self.attrs[i] & 3,
                        });
                    }
                }
            }
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::tests::local_types, structs::StructRow};

    fn structs() -> Vec<Structure> {
        vec![
            Structure {
                rows: vec![
                    StructRow { x_offset: 0, tiles: vec![1, 2] },
                    StructRow { x_offset: 1, tiles: vec![3] },
                ],
            },
            Structure {
                rows: vec![StructRow { x_offset: 0, tiles: vec![9; 4] }; 3],
            },
        ]
    }

    #[test]
    fn stamps_structures() {
        let rom = [
            0x01, // base palette
            0x23, 0x00, 0x01, // struct 0 at (3, 2), same palette
            0xFE, // skip
            0x5E, 0x01, 0x02, // struct 1 at (14, 5), palette 2
            0xFF,
        ];
        let room = Room::read_rom(&mut ByteReader::new(&rom), &structs(), &local_types()).unwrap();
        assert_eq!(room.tilemap[2 * 16 + 3], 1);
        assert_eq!(room.tilemap[2 * 16 + 4], 2);
        assert_eq!(room.tilemap[3 * 16 + 4], 3);
        assert_eq!(room.tilemap[3 * 16 + 3], 0xFF);
        assert_eq!(room.attrs[2 * 16 + 3], 1);
        // clipped at the right edge
        assert_eq!(room.tilemap[5 * 16 + 14], 9);
        assert_eq!(room.tilemap[5 * 16 + 15], 9);
        assert_eq!(room.tilemap[6 * 16], 0xFF);
        assert_eq!(room.attrs[7 * 16 + 15], 2);
        assert_eq!(room.attrs[8 * 16 + 15], 1);
        assert!(room.objs.is_empty());
    }

    #[test]
    fn clips_at_bottom_row() {
        let rom = [0x00, 0xD0, 0x01, 0x00, 0xFF];
        let room = Room::read_rom(&mut ByteReader::new(&rom), &structs(), &local_types()).unwrap();
        assert_eq!(room.tilemap[13 * 16], 9);
        assert_eq!(room.tilemap[14 * 16], 9);
        assert_eq!(room.attrs[15 * 16], 0);
    }

    #[test]
    fn reads_trailing_objects() {
        let rom = [0x00, 0xFD, 0x02, 0x04, 0x33, 0xFF];
        let room = Room::read_rom(&mut ByteReader::new(&rom), &structs(), &local_types()).unwrap();
        assert_eq!(room.objs.len(), 2);
        assert_eq!(room.objs[1].prop("dest"), Some(0x33));
    }

    #[test]
    fn unknown_structure_is_format_error() {
        let rom = [0x00, 0x00, 0x07, 0x00, 0xFF];
        let r = Room::read_rom(&mut ByteReader::new(&rom), &structs(), &local_types());
        assert!(matches!(r, Err(CodecError::Format(_))));
    }

    #[test]
    fn attribute_downsampling() {
        let mut room = Room::default();
        room.attrs[0x22] = 0;
        room.attrs[0x23] = 1;
        room.attrs[0x32] = 2;
        room.attrs[0x33] = 3;
        let table = room.attr_table();
        assert_eq!(table[1 * 8 + 1], 0xE4);
        assert_eq!(table[0], 0);
    }

    #[test]
    fn encoded_size() {
        let types = local_types();
        let mut room = Room::default();
        for name in ["enemy", "door", "elevator"] {
            room.objs.push(ObjectInstance::new(types.get(name).unwrap()));
        }
        let bytes = room.encode(&types).unwrap();
        assert_eq!(bytes.len(), 240 + 64 + (3 + 1 + 2) + 1);
        assert_eq!(&bytes[..240], &[0xFF; 240]);
        assert_eq!(bytes[240 + 64], 0x01);
        assert_eq!(*bytes.last().unwrap(), 0xFF);
    }

    #[test]
    fn json_uses_base64() {
        let mut room = Room::default();
        room.tilemap[0] = 0x00;
        let json = serde_json::to_value(&room).unwrap();
        assert!(json["tilemap"].as_str().unwrap().starts_with("AP//"));
        let back: Room = serde_json::from_value(json).unwrap();
        assert_eq!(back, room);

        let bad = serde_json::json!({"tilemap": "AAAA", "attrs": "AAAA", "objs": []});
        assert!(serde_json::from_value::<Room>(bad).is_err());
    }

    #[test]
    fn sheet_tiles_split_metatile_halves() {
        let mut metatiles = MetatileTable::default();
        for corner in 0..4 {
            metatiles.set_corner(0x05, corner, 0x10 + corner as u8).unwrap();
        }
        let mut room = Room::default();
        room.tilemap[1] = 0x05;
        room.attrs[1] = 2;
        let tiles = room.sheet_tiles(&metatiles);
        assert_eq!(tiles.len(), 240 * 4);
        assert_eq!(tiles[2], SheetTile { tile: 0x10, palette_slot: 2 });
        assert_eq!(tiles[3].tile, 0x11);
        assert_eq!(tiles[32 + 2].tile, 0x12);
        assert_eq!(tiles[32 + 3].tile, 0x13);
        assert_eq!(tiles[0].tile, 0xFF);
    }
}
