use anyhow::{ensure, Context, Result};
use log::info;
use std::{
    fmt::Display,
    ops::{Add, AddAssign},
    path::{Path, PathBuf},
};

use crate::{
    common::{METATILE_COUNT, WORLD_MAP_SIZE},
    global_objs,
    palette::{self, PaletteString},
    persist::{load_schemas, save_project, DEFAULT_AREA_NAMES},
    reader::ByteReader,
    room::Room,
    schema::SchemaTable,
    state::{Area, EditorState, GlobalConfig, MetatileTable, WorldMap},
    structs::{read_structure, Structure},
};

// CPU addresses (bank + $8000-$FFFF window) and file offsets are easy to mix
// up, so each gets its own type.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct FileAddr(u32);

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct CpuAddr(u32);

macro_rules! impl_add {
    ($target_type:ident, $other_type:ident) => {
        impl Add<$other_type> for $target_type {
            type Output = $target_type;

            fn add(self, other: $other_type) -> Self {
                $target_type(self.0 + other)
            }
        }

        impl AddAssign<$other_type> for $target_type {
            fn add_assign(&mut self, other: $other_type) {
                self.0 += other;
            }
        }
    };
}

impl_add!(FileAddr, u32);
impl_add!(CpuAddr, u32);

impl Display for FileAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl Display for CpuAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:02X}:{:04X}", self.bank(), self.0 & 0xFFFF)
    }
}

const INES_HEADER_SIZE: u32 = 0x10;
const BANK_SIZE: u32 = 0x4000;
const FIXED_BANK: u32 = 7;

impl CpuAddr {
    fn from_bank_offset(bank: u8, offset: u16) -> Self {
        Self((bank as u32) << 16 | offset as u32)
    }

    fn bank(self) -> u8 {
        (self.0 >> 16) as u8
    }
}

impl TryFrom<CpuAddr> for FileAddr {
    type Error = anyhow::Error;

    fn try_from(addr: CpuAddr) -> Result<Self> {
        let offset = addr.0 & 0xFFFF;
        // The lower half of the address space is RAM and registers.
        ensure!(offset >= 0x8000, "{} does not point into ROM", addr);
        // $C000-$FFFF always shows the last bank.
        let bank = if offset >= 0xC000 {
            FIXED_BANK
        } else {
            addr.bank() as u32
        };
        Ok(FileAddr(INES_HEADER_SIZE + bank * BANK_SIZE + (offset & (BANK_SIZE - 1))))
    }
}

const WORLD_MAP_ADDR: CpuAddr = CpuAddr(0x00A53E);

// Per-bank tables, at the same offsets in every area bank.
const PALETTE_PTR_TABLE: u16 = 0x9560;
const PALETTE_COUNT: u32 = 0x1C;
const GLOBAL_OBJS_PTR: u16 = 0x9598;
const ROOM_PTR_TABLE_PTR: u16 = 0x959A;
const STRUCT_PTR_TABLE_PTR: u16 = 0x959C;
const METATILES_PTR: u16 = 0x959E;
const ROM_METATILE_COUNT: usize = 0x40;

struct AreaConstants {
    name: &'static str,
    bank: u8,
    struct_count: u32,
    room_count: u32,
}

const AREAS: [AreaConstants; 5] = [
    AreaConstants {
        name: "brinstar",
        bank: 1,
        struct_count: 0x32,
        room_count: 0x2F,
    },
    AreaConstants {
        name: "norfair",
        bank: 2,
        struct_count: 0x31,
        room_count: 0x2E,
    },
    AreaConstants {
        name: "tourian",
        bank: 3,
        struct_count: 0x20,
        room_count: 0x15,
    },
    AreaConstants {
        name: "kraid",
        bank: 4,
        struct_count: 0x27,
        room_count: 0x25,
    },
    AreaConstants {
        name: "ridley",
        bank: 5,
        struct_count: 0x1D,
        room_count: 0x2A,
    },
];

struct Rom {
    data: Vec<u8>,
}

impl Rom {
    fn new(data: Vec<u8>) -> Self {
        Rom { data }
    }

    fn read_u16(&self, addr: CpuAddr) -> Result<u16> {
        let bytes = self.read_n(addr, 2)?;
        Ok(bytes[0] as u16 | (bytes[1] as u16) << 8)
    }

    fn read_n(&self, addr: CpuAddr, n: usize) -> Result<&[u8]> {
        let file_addr = FileAddr::try_from(addr)?;
        let start = file_addr.0 as usize;
        ensure!(
            start + n <= self.data.len(),
            "read of {} bytes at {} ({}) is past the end of the ROM",
            n,
            addr,
            file_addr
        );
        Ok(&self.data[start..start + n])
    }

    /// A reader over everything from `addr` to the end of the file.
    fn reader(&self, addr: CpuAddr) -> Result<ByteReader> {
        let file_addr = FileAddr::try_from(addr)?;
        let start = file_addr.0 as usize;
        ensure!(start < self.data.len(), "{} ({}) is past the end of the ROM", addr, file_addr);
        Ok(ByteReader::new(&self.data[start..]))
    }

    /// Follows a 16-bit pointer; the target lies in the pointer's own bank.
    fn read_ptr(&self, addr: CpuAddr) -> Result<CpuAddr> {
        Ok(CpuAddr::from_bank_offset(addr.bank(), self.read_u16(addr)?))
    }

    fn read_table_entry(&self, table: CpuAddr, i: u32) -> Result<CpuAddr> {
        self.read_ptr(table + i * 2)
    }
}

struct Importer<'a> {
    rom: Rom,
    local_obj_types: &'a SchemaTable,
    global_obj_types: &'a SchemaTable,
}

/// Extracts every area from a ROM image into `project_dir`, which must
/// already hold the object schema files. Existing `bg.chr` files are kept.
pub fn import_rom(
    rom_path: &Path,
    project_dir: &Path,
    global_config_path: PathBuf,
    global_config: GlobalConfig,
) -> Result<EditorState> {
    info!("Importing from ROM at {}", rom_path.display());
    let rom_bytes = std::fs::read(rom_path)
        .with_context(|| format!("Could not read {}", rom_path.display()))?;
    let (local_obj_types, global_obj_types) = load_schemas(project_dir)?;

    let importer = Importer {
        rom: Rom::new(rom_bytes),
        local_obj_types: &local_obj_types,
        global_obj_types: &global_obj_types,
    };
    let world_map = importer.load_world_map()?;
    let mut areas = vec![];
    for constants in &AREAS {
        let mut area = importer
            .load_area(constants)
            .with_context(|| format!("Importing {}", constants.name))?;
        let gfx_path = project_dir.join(constants.name).join("bg.chr");
        if gfx_path.exists() {
            let gfx = std::fs::read(&gfx_path)
                .with_context(|| format!("Could not read {}", gfx_path.display()))?;
            area.gfx = Some(gfx);
        }
        areas.push(area);
    }

    let mut state = EditorState {
        global_config_path,
        global_config,
        project_dir: project_dir.to_owned(),
        area_names: DEFAULT_AREA_NAMES.iter().map(|s| s.to_string()).collect(),
        areas,
        local_obj_types,
        global_obj_types,
        world_map,
        world_map_modified: true,
        undo_stack: vec![],
        redo_stack: vec![],
    };
    save_project(&mut state)?;
    Ok(state)
}

impl<'a> Importer<'a> {
    fn load_world_map(&self) -> Result<WorldMap> {
        let data = self.rom.read_n(WORLD_MAP_ADDR, WORLD_MAP_SIZE)?;
        Ok(WorldMap::from_bytes(data)?)
    }

    fn load_area(&self, constants: &AreaConstants) -> Result<Area> {
        let bank = constants.bank;
        let at = |offset: u16| CpuAddr::from_bank_offset(bank, offset);
        info!("Importing {} from bank {}", constants.name, bank);

        let palettes = self.load_palettes(at(PALETTE_PTR_TABLE))?;
        let metatiles = self.load_metatiles(self.rom.read_ptr(at(METATILES_PTR))?)?;
        let structs = self.load_structs(
            self.rom.read_ptr(at(STRUCT_PTR_TABLE_PTR))?,
            constants.struct_count,
        )?;
        let rooms = self.load_rooms(
            self.rom.read_ptr(at(ROOM_PTR_TABLE_PTR))?,
            constants.room_count,
            &structs,
        )?;
        let global_objs_addr = self.rom.read_ptr(at(GLOBAL_OBJS_PTR))?;
        let global_objs = global_objs::read_rom(&mut self.rom.reader(global_objs_addr)?, self.global_obj_types)
            .with_context(|| format!("Reading global objects at {}", global_objs_addr))?;

        Ok(Area {
            modified: true,
            name: constants.name.to_string(),
            palettes,
            metatiles,
            rooms,
            global_objs,
            gfx: None,
        })
    }

    fn load_palettes(&self, table: CpuAddr) -> Result<Vec<Vec<PaletteString>>> {
        (0..PALETTE_COUNT)
            .map(|i| {
                let addr = self.rom.read_table_entry(table, i)?;
                palette::read_rom_strings(&mut self.rom.reader(addr)?)
                    .with_context(|| format!("Reading palette {:02X} at {}", i, addr))
            })
            .collect()
    }

    /// Only the first 0x40 metatiles are stored per area; the rest of the
    /// table stays blank.
    fn load_metatiles(&self, addr: CpuAddr) -> Result<MetatileTable> {
        let mut data = self.rom.read_n(addr, ROM_METATILE_COUNT * 4)?.to_vec();
        data.resize(METATILE_COUNT * 4, 0xFF);
        Ok(MetatileTable::from_bytes(&data)?)
    }

    fn load_structs(&self, table: CpuAddr, count: u32) -> Result<Vec<Structure>> {
        (0..count)
            .map(|i| {
                let addr = self.rom.read_table_entry(table, i)?;
                read_structure(&mut self.rom.reader(addr)?)
                    .with_context(|| format!("Reading structure {:02X} at {}", i, addr))
            })
            .collect()
    }

    fn load_rooms(&self, table: CpuAddr, count: u32, structs: &[Structure]) -> Result<Vec<Room>> {
        (0..count)
            .map(|i| {
                let addr = self.rom.read_table_entry(table, i)?;
                Room::read_rom(&mut self.rom.reader(addr)?, structs, self.local_obj_types)
                    .with_context(|| format!("Reading room {:02X} at {}", i, addr))
            })
            .collect()
    }
}
