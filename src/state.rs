use anyhow::{Context, Result};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    common::{
        MetatileIdx, RoomIdx, TileIdx, BLANK_METATILE, METATILE_COUNT, METATILE_DATA_SIZE, NO_ROOM,
        WORLD_MAP_SIZE, WORLD_MAP_WIDTH,
    },
    error::{CodecError, CodecResult},
    message::Message,
    object::ObjectInstance,
    palette::PaletteString,
    room::Room,
    schema::SchemaTable,
};

/// Four tile indices per metatile: top-left, top-right, bottom-left,
/// bottom-right. Entry 0xFF is fixed blank (all corners 0xFF).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetatileTable {
    entries: [[TileIdx; 4]; METATILE_COUNT],
}

impl Default for MetatileTable {
    fn default() -> Self {
        MetatileTable {
            entries: [[0xFF; 4]; METATILE_COUNT],
        }
    }
}

impl MetatileTable {
    /// Reads the 0x3FC content bytes of `metatiles.bin`; anything after them
    /// is padding.
    pub fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        if data.len() < METATILE_DATA_SIZE {
            return Err(CodecError::Format(format!(
                "metatile data has {} bytes, expected at least {}",
                data.len(),
                METATILE_DATA_SIZE
            )));
        }
        let mut table = MetatileTable::default();
        for (entry, raw) in table
            .entries
            .iter_mut()
            .zip(data[..METATILE_DATA_SIZE].chunks_exact(4))
        {
            entry.copy_from_slice(raw);
        }
        Ok(table)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.entries.iter().flatten().copied().collect();
        out[METATILE_DATA_SIZE..].fill(0xFF);
        out
    }

    pub fn get(&self, idx: MetatileIdx) -> [TileIdx; 4] {
        self.entries[idx as usize]
    }

    pub fn set_corner(&mut self, idx: MetatileIdx, corner: usize, tile: TileIdx) -> CodecResult<()> {
        if idx == BLANK_METATILE || corner >= 4 {
            return Err(CodecError::Format(format!(
                "metatile {:02X} corner {} is not editable",
                idx, corner
            )));
        }
        self.entries[idx as usize][corner] = tile;
        Ok(())
    }
}

/// 32x32 grid of room indices shared by all areas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldMap {
    cells: Vec<RoomIdx>,
}

impl Default for WorldMap {
    fn default() -> Self {
        WorldMap {
            cells: vec![NO_ROOM; WORLD_MAP_SIZE],
        }
    }
}

impl WorldMap {
    pub fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        if data.len() != WORLD_MAP_SIZE {
            return Err(CodecError::Format(format!(
                "world map has {} bytes, expected {}",
                data.len(),
                WORLD_MAP_SIZE
            )));
        }
        Ok(WorldMap {
            cells: data.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> RoomIdx {
        self.cells[y * WORLD_MAP_WIDTH + x]
    }

    pub fn set(&mut self, x: usize, y: usize, room: RoomIdx) -> CodecResult<()> {
        if x >= WORLD_MAP_WIDTH || y >= WORLD_MAP_WIDTH {
            return Err(CodecError::Format(format!("map cell ({}, {}) out of range", x, y)));
        }
        self.cells[y * WORLD_MAP_WIDTH + x] = room;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Area {
    pub modified: bool,
    pub name: String,
    pub palettes: Vec<Vec<PaletteString>>,
    pub metatiles: MetatileTable,
    pub rooms: Vec<Room>,
    pub global_objs: Vec<ObjectInstance>,
    /// Background tile graphics (`bg.chr`), only needed for rendering.
    pub gfx: Option<Vec<u8>>,
}

fn default_compressor() -> String {
    "lzsa".to_string()
}

fn default_compressor_args() -> Vec<String> {
    ["-f", "1", "-r"].iter().map(|s| s.to_string()).collect()
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GlobalConfig {
    #[serde(skip_serializing, skip_deserializing)]
    pub modified: bool,
    pub project_dir: Option<PathBuf>,
    #[serde(default = "default_compressor")]
    pub compressor: String,
    /// Arguments placed before the input and output paths.
    #[serde(default = "default_compressor_args")]
    pub compressor_args: Vec<String>,
    /// Defaults to `palette.pal` in the project directory.
    #[serde(default)]
    pub master_palette: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            modified: false,
            project_dir: None,
            compressor: default_compressor(),
            compressor_args: default_compressor_args(),
            master_palette: None,
        }
    }
}

#[derive(Debug)]
pub struct EditorState {
    pub global_config_path: PathBuf,
    pub global_config: GlobalConfig,

    // Project data:
    pub project_dir: PathBuf,
    pub area_names: Vec<String>,
    pub areas: Vec<Area>,
    pub local_obj_types: SchemaTable,
    pub global_obj_types: SchemaTable,
    pub world_map: WorldMap,
    pub world_map_modified: bool,

    // Edit history:
    pub undo_stack: Vec<Message>,
    pub redo_stack: Vec<Message>,
}

impl EditorState {
    pub fn area(&self, area: usize) -> Result<&Area> {
        self.areas
            .get(area)
            .with_context(|| format!("area {} out of range", area))
    }

    pub fn area_mut(&mut self, area: usize) -> Result<&mut Area> {
        self.areas
            .get_mut(area)
            .with_context(|| format!("area {} out of range", area))
    }

    pub fn area_idx(&self, name: &str) -> Result<usize> {
        self.area_names
            .iter()
            .position(|n| n == name)
            .with_context(|| format!("unknown area `{}`", name))
    }
}

pub fn get_global_config_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("", "", "M1LevelEditor")
        .context("Unable to open global config directory.")?;
    let config_dir = project_dirs.config_dir();
    let config_path = config_dir.join("config.json");
    Ok(config_path)
}
