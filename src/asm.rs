use std::fmt::Write;

use itertools::Itertools;

use crate::palette::PaletteString;

/// `$0F, $22, $12`
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("${:02X}", b)).join(", ")
}

/// One label per palette, with identical palettes sharing a body.
pub fn palettes_to_asm(palettes: &[Vec<PaletteString>]) -> String {
    let mut unique: Vec<(&Vec<PaletteString>, Vec<usize>)> = vec![];
    for (i, pal) in palettes.iter().enumerate() {
        match unique.iter_mut().find(|(p, _)| *p == pal) {
            Some((_, idxs)) => idxs.push(i),
            None => unique.push((pal, vec![i])),
        }
    }

    let mut asm = String::new();
    for (pal, idxs) in unique {
        for i in idxs {
            writeln!(asm, "Palette{:02X}:", i).unwrap();
        }
        for s in pal {
            writeln!(asm, "    PPUString $3F{:02X}, \\", s.start).unwrap();
            writeln!(asm, "        {}", hex_bytes(&s.data)).unwrap();
        }
        writeln!(asm, "    PPUStringEnd\n").unwrap();
    }
    asm
}

pub fn room_ptrs_and_incbins(area: &str, room_count: usize) -> String {
    let mut asm = String::from("RmPtrTbl:\n");
    for i in 0..room_count {
        writeln!(asm, "    .word Room{:02X}", i).unwrap();
    }
    asm.push('\n');
    for i in 0..room_count {
        writeln!(asm, "Room{:02X}: .incbin \"data/{}/rooms/{:02X}.bin\"", i, area, i).unwrap();
    }
    asm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formatting() {
        assert_eq!(hex_bytes(&[0x0F, 0xA0, 0x01]), "$0F, $A0, $01");
        assert_eq!(hex_bytes(&[]), "");
    }

    #[test]
    fn shared_palettes_share_labels() {
        let a = vec![PaletteString { start: 0, data: vec![0x0F, 0x22] }];
        let b = vec![
            PaletteString { start: 0x10, data: vec![0x30] },
            PaletteString { start: 0x14, data: vec![0x0F, 0x16] },
        ];
        let asm = palettes_to_asm(&[a.clone(), b, a]);
        assert_eq!(
            asm,
            "Palette00:\nPalette02:\n    PPUString $3F00, \\\n        $0F, $22\n    PPUStringEnd\n\n\
             Palette01:\n    PPUString $3F10, \\\n        $30\n    PPUString $3F14, \\\n        $0F, $16\n    PPUStringEnd\n\n"
        );
    }

    #[test]
    fn room_table() {
        let asm = room_ptrs_and_incbins("kraid", 2);
        assert_eq!(
            asm,
            "RmPtrTbl:\n    .word Room00\n    .word Room01\n\n\
             Room00: .incbin \"data/kraid/rooms/00.bin\"\n\
             Room01: .incbin \"data/kraid/rooms/01.bin\"\n"
        );
    }
}
