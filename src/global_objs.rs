//! World-spanning objects (items and other special objects placed by map
//! position rather than by room).
//!
//! ROM layout: a list of rows, each `row, next_row_ptr(u16)`, where
//! `next_row_ptr == 0xFFFF` marks the last row. Each row is a list of
//! columns, each `col, next_col_offset`, where `0xFF` marks the last column.
//! Each column is a list of object records terminated by 0x00.

use std::fmt::Write;

use hashbrown::HashMap;
use itertools::Itertools;
use log::warn;

use crate::{
    asm::hex_bytes,
    error::CodecResult,
    object::{self, ObjectInstance},
    reader::ByteReader,
    schema::SchemaTable,
};

const LAST_ROW: u16 = 0xFFFF;
const LAST_COL: u8 = 0xFF;
const END_OF_COL: u8 = 0x00;

/// Reads the table sequentially. Rows and columns are expected in ascending
/// order; data that isn't is read as-is (with a warning), so re-encoding it
/// would reorder it.
pub fn read_rom(reader: &mut ByteReader, types: &SchemaTable) -> CodecResult<Vec<ObjectInstance>> {
    let mut objs = vec![];
    let mut last_row: Option<u8> = None;
    loop {
        let row = reader.read_u8()?;
        let next_row = reader.read_u16()?;
        if last_row.is_some_and(|r| r >= row) {
            warn!("Global object row {:02X} is out of order", row);
        }
        last_row = Some(row);

        let mut last_col: Option<u8> = None;
        loop {
            let col = reader.read_u8()?;
            let next_col = reader.read_u8()?;
            if last_col.is_some_and(|c| c >= col) {
                warn!("Global object column {:02X} in row {:02X} is out of order", col, row);
            }
            last_col = Some(col);
            objs.extend(object::read_objects(reader, types, END_OF_COL, (col, row))?);
            if next_col == LAST_COL {
                break;
            }
        }
        if next_row == LAST_ROW {
            break;
        }
    }
    Ok(objs)
}

/// Rows (ascending) with their occupied columns (ascending).
fn sorted_rows(objs: &[ObjectInstance]) -> Vec<(u8, Vec<u8>)> {
    objs.iter()
        .map(|o| o.room())
        .unique()
        .map(|(col, row)| (row, col))
        .sorted()
        .chunk_by(|&(row, _)| row)
        .into_iter()
        .map(|(row, cells)| (row, cells.map(|(_, col)| col).collect()))
        .collect()
}

/// Emits the table as assembly, with labels standing in for the row
/// pointers and column offsets. The engine walks rows and columns in
/// ascending order, so they are sorted here regardless of list order.
/// Objects within one room keep their list order.
pub fn to_asm(objs: &[ObjectInstance], types: &SchemaTable) -> CodecResult<String> {
    let mut same_room: HashMap<(u8, u8), Vec<&ObjectInstance>> = HashMap::new();
    for obj in objs {
        same_room.entry(obj.room()).or_default().push(obj);
    }
    let rows = sorted_rows(objs);

    let mut asm = String::new();
    writeln!(asm, "SpecItmsTbl:").unwrap();
    for (row_i, (row, cols)) in rows.iter().enumerate() {
        writeln!(asm, "@y{:02X}:", row).unwrap();
        writeln!(asm, "    .byte ${:02X}", row).unwrap();
        match rows.get(row_i + 1) {
            Some((next_row, _)) => writeln!(asm, "    .word @y{:02X}", next_row).unwrap(),
            None => writeln!(asm, "    .word ${:04X}", LAST_ROW).unwrap(),
        }
        for (col_i, col) in cols.iter().enumerate() {
            writeln!(asm, "    @@x{:02X}:", col).unwrap();
            match cols.get(col_i + 1) {
                Some(next_col) => writeln!(
                    asm,
                    "        .byte ${:02X}, @@x{:02X} - @@x{:02X}",
                    col, next_col, col
                )
                .unwrap(),
                None => writeln!(asm, "        .byte ${:02X}, ${:02X}", col, LAST_COL).unwrap(),
            }
            for obj in &same_room[&(*col, *row)] {
                writeln!(asm, "        .byte {}", hex_bytes(&object::encode(obj, types)?)).unwrap();
            }
            writeln!(asm, "        .byte ${:02X}", END_OF_COL).unwrap();
        }
    }
    Ok(asm)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schema::tests::global_types as types;

    fn item_at(room: (u16, u16), kind: u8) -> ObjectInstance {
        ObjectInstance {
            obj_type: "item".to_string(),
            x: room.0 * 0x100 + 0x38,
            y: room.1 * 0x100 + 0x58,
            props: vec![("kind".to_string(), kind)],
        }
    }

    #[test]
    fn reads_nested_rows_and_columns() {
        let rom = [
            0x02, 0x34, 0x12, // row 2
            0x05, 0x06, 0x52, 0x31, 0x04, 0x10, 0x00, // col 5: item, elevator
            0x07, 0xFF, 0x12, 0x00, 0x00, // col 7: item
            0x09, 0xFF, 0xFF, // row 9, last
            0x01, 0xFF, 0x00, // col 1: empty
            0xEE,
        ];
        let mut r = ByteReader::new(&rom);
        let objs = read_rom(&mut r, &types()).unwrap();
        assert_eq!(r.position(), rom.len() - 1);
        assert_eq!(objs.len(), 3);
        assert_eq!((objs[0].x, objs[0].y), (0x538, 0x258));
        assert_eq!(objs[0].prop("kind"), Some(1));
        assert_eq!(objs[1].obj_type, "elevator");
        assert_eq!((objs[1].x, objs[1].y), (0x580, 0x283));
        assert_eq!(objs[2].room(), (7, 2));
    }

    #[test]
    fn emits_rows_and_columns_sorted() {
        let objs = vec![item_at((2, 1), 0), item_at((1, 1), 1), item_at((1, 0), 2)];
        let asm = to_asm(&objs, &types()).unwrap();
        let labels: Vec<&str> = asm
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with('@') && l.ends_with(':'))
            .collect();
        assert_eq!(labels, ["@y00:", "@@x01:", "@y01:", "@@x01:", "@@x02:"]);
        assert!(asm.contains("    .word @y01\n"));
        assert!(asm.contains("    .word $FFFF\n"));
        assert!(asm.contains("        .byte $01, @@x02 - @@x01\n"));
        assert!(asm.contains("        .byte $02, $FF\n"));
    }

    #[test]
    fn emitted_bytes_match_rom_records() {
        let objs = vec![item_at((3, 4), 5)];
        let asm = to_asm(&objs, &types()).unwrap();
        assert_eq!(
            asm,
            "SpecItmsTbl:\n\
             @y04:\n    .byte $04\n    .word $FFFF\n\
             \x20   @@x03:\n        .byte $03, $FF\n\
             \x20       .byte $52, $35\n\
             \x20       .byte $00\n"
        );
    }

    #[test]
    fn unsorted_rom_rows_are_reordered() {
        let rom = [
            0x03, 0x00, 0x80, 0x01, 0xFF, 0x52, 0x30, 0x00, // row 3
            0x01, 0xFF, 0xFF, 0x01, 0xFF, 0x52, 0x31, 0x00, // row 1
        ];
        let objs = read_rom(&mut ByteReader::new(&rom), &types()).unwrap();
        assert_eq!(objs[0].room(), (1, 3));
        let asm = to_asm(&objs, &types()).unwrap();
        assert!(asm.find("@y01:").unwrap() < asm.find("@y03:").unwrap());
    }
}
