use std::{
    fs,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use json_pretty_compact::PrettyCompactFormatter;
use log::{error, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Serializer;

use crate::{
    asm,
    compress::Compressor,
    error::{CodecError, CodecResult},
    global_objs,
    object::ObjectInstance,
    palette::{self, MasterPalette, BACKGROUND},
    room::Room,
    schema::SchemaTable,
    state::{Area, EditorState, GlobalConfig, MetatileTable, WorldMap},
    tiles::{self, IndexedImage},
};

pub const DEFAULT_AREA_NAMES: [&str; 5] = ["brinstar", "norfair", "tourian", "kraid", "ridley"];

const SHEET_WIDTH: usize = 0x10;
const ROOM_SHEET_WIDTH: usize = 0x20;

fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    info!("Saving {}", path.display());
    let formatter = PrettyCompactFormatter::new();
    let mut data_bytes = vec![];
    let mut ser = Serializer::with_formatter(&mut data_bytes, formatter);
    data.serialize(&mut ser)?;
    write_file(path, &data_bytes)?;
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    info!("Loading {}", path.display());
    let data_bytes = read_file(path)?;
    let data: T = serde_json::from_slice(&data_bytes)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(data)
}

fn read_file(path: &Path) -> CodecResult<Vec<u8>> {
    fs::read(path).map_err(|source| CodecError::Io {
        path: path.to_owned(),
        source,
    })
}

fn write_file(path: &Path, data: &[u8]) -> CodecResult<()> {
    let io_err = |source| CodecError::Io {
        path: path.to_owned(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, data).map_err(io_err)
}

/// Missing config files are not an error: defaults are used until the first
/// save.
pub fn load_global_config(path: &Path) -> Result<GlobalConfig> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(GlobalConfig::default());
    }
    load_json(path)
}

pub fn save_global_config(state: &mut EditorState) -> Result<()> {
    if state.global_config.modified {
        save_json(&state.global_config_path, &state.global_config)?;
        state.global_config.modified = false;
    }
    Ok(())
}

/// Object schemas are inputs to every project; they are never written back.
pub fn load_schemas(project_dir: &Path) -> Result<(SchemaTable, SchemaTable)> {
    let local = load_json(&project_dir.join("local_obj_types.json"))?;
    let global = load_json(&project_dir.join("global_obj_types.json"))?;
    Ok((local, global))
}

fn load_objects(path: &Path, types: &SchemaTable) -> Result<Vec<ObjectInstance>> {
    let mut objs: Vec<ObjectInstance> = load_json(path)?;
    for obj in &mut objs {
        types
            .get(&obj.obj_type)
            .and_then(|schema| obj.conform(schema))
            .with_context(|| format!("In {}", path.display()))?;
    }
    Ok(objs)
}

fn load_area(project_dir: &Path, name: &str, local_types: &SchemaTable, global_types: &SchemaTable) -> Result<Area> {
    let dir = project_dir.join(name);
    let rooms_path = dir.join("rooms.json");
    let mut rooms: Vec<Room> = load_json(&rooms_path)?;
    for (i, room) in rooms.iter_mut().enumerate() {
        let context = || format!("In {} room {:02X}", rooms_path.display(), i);
        room.check_attrs().with_context(context)?;
        for obj in &mut room.objs {
            local_types
                .get(&obj.obj_type)
                .and_then(|schema| obj.conform(schema))
                .with_context(context)?;
        }
    }
    let gfx_path = dir.join("bg.chr");
    let gfx = if gfx_path.exists() {
        Some(read_file(&gfx_path)?)
    } else {
        None
    };
    Ok(Area {
        modified: false,
        name: name.to_string(),
        palettes: load_json(&dir.join("palettes.json"))?,
        metatiles: MetatileTable::from_bytes(&read_file(&dir.join("metatiles.bin"))?)?,
        rooms,
        global_objs: load_objects(&dir.join("global_objs.json"), global_types)?,
        gfx,
    })
}

fn save_area(project_dir: &Path, area: &mut Area) -> Result<()> {
    if !area.modified {
        return Ok(());
    }
    let dir = project_dir.join(&area.name);
    save_json(&dir.join("palettes.json"), &area.palettes)?;
    let metatiles_path = dir.join("metatiles.bin");
    info!("Saving {}", metatiles_path.display());
    write_file(&metatiles_path, &area.metatiles.to_bytes())?;
    save_json(&dir.join("rooms.json"), &area.rooms)?;
    save_json(&dir.join("global_objs.json"), &area.global_objs)?;
    area.modified = false;
    Ok(())
}

pub fn load_project(
    global_config_path: PathBuf,
    global_config: GlobalConfig,
    project_dir: &Path,
) -> Result<EditorState> {
    info!("Opening project at {}", project_dir.display());
    let area_names: Vec<String> = load_json(&project_dir.join("area_names.json"))?;
    let (local_obj_types, global_obj_types) = load_schemas(project_dir)?;
    let world_map = WorldMap::from_bytes(&read_file(&project_dir.join("world_map.bin"))?)?;
    let areas = area_names
        .iter()
        .map(|name| {
            load_area(project_dir, name, &local_obj_types, &global_obj_types)
                .with_context(|| format!("Loading area `{}`", name))
        })
        .collect::<Result<Vec<Area>>>()?;
    Ok(EditorState {
        global_config_path,
        global_config,
        project_dir: project_dir.to_owned(),
        area_names,
        areas,
        local_obj_types,
        global_obj_types,
        world_map,
        world_map_modified: false,
        undo_stack: vec![],
        redo_stack: vec![],
    })
}

/// Writes every area with unsaved edits, plus the world map and area list.
pub fn save_project(state: &mut EditorState) -> Result<()> {
    let project_dir = state.project_dir.clone();
    let names_path = project_dir.join("area_names.json");
    if !names_path.exists() {
        save_json(&names_path, &state.area_names)?;
    }
    for area in &mut state.areas {
        save_area(&project_dir, area)?;
    }
    if state.world_map_modified {
        let path = project_dir.join("world_map.bin");
        info!("Saving {}", path.display());
        write_file(&path, state.world_map.as_bytes())?;
        state.world_map_modified = false;
    }
    Ok(())
}

/// Rooms the compressor could not pack. Everything else was written.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub rooms_built: usize,
    pub failures: Vec<(String, CodecError)>,
}

impl BuildReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Saves the project, then emits the assembler sources and compressed rooms
/// that the game build includes.
pub fn build_project(state: &mut EditorState, compressor: &Compressor) -> Result<BuildReport> {
    save_project(state)?;
    let mut report = BuildReport::default();
    for area in &state.areas {
        let dir = state.project_dir.join(&area.name);

        let path = dir.join("palettes.asm");
        info!("Saving {}", path.display());
        write_file(&path, asm::palettes_to_asm(&area.palettes).as_bytes())?;

        let path = dir.join("rooms.asm");
        info!("Saving {}", path.display());
        write_file(&path, asm::room_ptrs_and_incbins(&area.name, area.rooms.len()).as_bytes())?;

        let path = dir.join("global_objs.asm");
        info!("Saving {}", path.display());
        let text = global_objs::to_asm(&area.global_objs, &state.global_obj_types)
            .with_context(|| format!("Encoding global objects of {}", area.name))?;
        write_file(&path, text.as_bytes())?;

        let rooms_dir = dir.join("rooms");
        fs::create_dir_all(&rooms_dir).map_err(|source| CodecError::Io {
            path: rooms_dir.clone(),
            source,
        })?;
        for (i, room) in area.rooms.iter().enumerate() {
            let data = room
                .encode(&state.local_obj_types)
                .with_context(|| format!("Encoding {} room {:02X}", area.name, i))?;
            let out_path = rooms_dir.join(format!("{:02X}.bin", i));
            match compressor.compress_room(i, &data, &out_path) {
                Ok(()) => report.rooms_built += 1,
                Err(e) => {
                    error!("{}: {}", area.name, e);
                    report.failures.push((area.name.clone(), e));
                }
            }
        }
    }
    info!(
        "Built {} rooms, {} failed",
        report.rooms_built,
        report.failures.len()
    );
    Ok(report)
}

fn save_png(path: &Path, image: &IndexedImage, colors: &[[u8; 3]; 0x20]) -> Result<()> {
    info!("Saving {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CodecError::Io {
            path: parent.to_owned(),
            source,
        })?;
    }
    let file = fs::File::create(path).map_err(|source| CodecError::Io {
        path: path.to_owned(),
        source,
    })?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width as u32, image.height as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().context("Failed to write PNG header")?;
    writer
        .write_image_data(&image.to_rgb(colors))
        .context("Failed to write PNG data")?;
    Ok(())
}

fn master_palette_path(state: &EditorState) -> PathBuf {
    state
        .global_config
        .master_palette
        .clone()
        .unwrap_or_else(|| state.project_dir.join("palette.pal"))
}

/// Writes a tile sheet and a picture of every room for each area that has
/// graphics. Returns the number of images written.
pub fn render_project(state: &EditorState, out_dir: &Path) -> Result<usize> {
    let master = MasterPalette::load(&master_palette_path(state))?;
    let mut count = 0;
    for area in &state.areas {
        let Some(gfx) = &area.gfx else {
            warn!("{} has no bg.chr, skipping", area.name);
            continue;
        };
        let strings = area
            .palettes
            .first()
            .with_context(|| format!("{} has no palettes", area.name))?;
        let colors = master.resolve_palette(&palette::expand(strings, BACKGROUND)?);
        let dir = out_dir.join(&area.name);

        let sheet = tiles::bank_sheet(gfx, 0, SHEET_WIDTH)?;
        save_png(&dir.join("tiles.png"), &sheet, &colors)?;
        count += 1;

        for (i, room) in area.rooms.iter().enumerate() {
            let image = tiles::assemble_sheet(gfx, room.sheet_tiles(&area.metatiles), ROOM_SHEET_WIDTH)
                .with_context(|| format!("Rendering {} room {:02X}", area.name, i))?;
            save_png(&dir.join("rooms").join(format!("{:02X}.png", i)), &image, &colors)?;
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        message::{Message, ObjectList},
        schema::tests::{GLOBAL_TYPES, LOCAL_TYPES},
        state::tests::test_state,
        update::update,
    };

    fn project_in(dir: &Path) -> EditorState {
        let mut state = test_state();
        state.project_dir = dir.to_owned();
        state.area_names.truncate(1);
        state.areas.truncate(1);
        state.areas[0].modified = true;
        state.world_map_modified = true;
        fs::write(dir.join("local_obj_types.json"), LOCAL_TYPES).unwrap();
        fs::write(dir.join("global_obj_types.json"), GLOBAL_TYPES).unwrap();
        state
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = project_in(dir.path());
        let obj = ObjectInstance::new(state.local_obj_types.get("door").unwrap());
        update(
            &mut state,
            Message::AddObject {
                area: 0,
                list: ObjectList::Room(0),
                index: 0,
                obj,
            },
        )
        .unwrap();
        update(&mut state, Message::SetMapCell { x: 1, y: 1, room: 3 }).unwrap();
        save_project(&mut state).unwrap();
        assert!(!state.areas[0].modified);
        assert!(!state.world_map_modified);

        let loaded = load_project(PathBuf::new(), GlobalConfig::default(), dir.path()).unwrap();
        assert_eq!(loaded.area_names, ["brinstar"]);
        assert_eq!(loaded.areas[0].rooms, state.areas[0].rooms);
        assert_eq!(loaded.areas[0].palettes, state.areas[0].palettes);
        assert_eq!(loaded.world_map.get(1, 1), 3);
        assert!(loaded.areas[0].gfx.is_none());
        assert_eq!(
            fs::metadata(dir.path().join("brinstar/metatiles.bin")).unwrap().len(),
            0x400
        );
    }

    #[test]
    fn missing_area_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = project_in(dir.path());
        save_project(&mut state).unwrap();
        fs::remove_file(dir.path().join("brinstar/metatiles.bin")).unwrap();
        let err = load_project(PathBuf::new(), GlobalConfig::default(), dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("metatiles.bin"));
    }

    #[test]
    fn out_of_range_attr_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = project_in(dir.path());
        state.areas[0].rooms[0].attrs[0x23] = 5;
        save_project(&mut state).unwrap();
        let err = load_project(PathBuf::new(), GlobalConfig::default(), dir.path()).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("rooms.json room 00"));
        assert!(msg.contains("attribute 5 at (3, 2)"));
    }

    #[test]
    fn unknown_object_type_names_room() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = project_in(dir.path());
        let mut obj = ObjectInstance::new(state.local_obj_types.get("door").unwrap());
        obj.obj_type = "ghost".to_string();
        state.areas[0].rooms[0].objs.push(obj);
        save_project(&mut state).unwrap();
        let err = load_project(PathBuf::new(), GlobalConfig::default(), dir.path()).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("rooms.json room 00"));
        assert!(msg.contains("Unknown object type: ghost"));
    }

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_global_config(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg.compressor, "lzsa");
    }

    #[cfg(unix)]
    #[test]
    fn build_writes_asm_and_rooms() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = project_in(dir.path());
        update(&mut state, Message::NewRoom { area: 0 }).unwrap();
        let cp = Compressor {
            program: "cp".to_string(),
            args: vec![],
        };
        let report = build_project(&mut state, &cp).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.rooms_built, 2);

        let area_dir = dir.path().join("brinstar");
        let room = fs::read(area_dir.join("rooms/01.bin")).unwrap();
        assert_eq!(room.len(), 240 + 64 + 1);
        let rooms_asm = fs::read_to_string(area_dir.join("rooms.asm")).unwrap();
        assert!(rooms_asm.contains("Room01: .incbin \"data/brinstar/rooms/01.bin\""));
        let pal_asm = fs::read_to_string(area_dir.join("palettes.asm")).unwrap();
        assert!(pal_asm.starts_with("Palette00:\n    PPUString $3F00, \\\n        $0F, $22, $12, $30\n"));
        assert!(area_dir.join("global_objs.asm").exists());
    }

    #[cfg(unix)]
    #[test]
    fn build_reports_failed_rooms() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = project_in(dir.path());
        let broken = Compressor {
            program: "false".to_string(),
            args: vec![],
        };
        let report = build_project(&mut state, &broken).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "brinstar");
        assert!(dir.path().join("brinstar/rooms.asm").exists());
    }

    #[test]
    fn renders_sheet_and_rooms() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = project_in(dir.path());
        state.areas[0].gfx = Some(vec![0xFF; 0x1000]);
        let master: Vec<u8> = (0..0xC0).collect();
        fs::write(dir.path().join("palette.pal"), master).unwrap();

        let out = dir.path().join("png");
        assert_eq!(render_project(&state, &out).unwrap(), 2);

        let decoder = png::Decoder::new(fs::File::open(out.join("brinstar/rooms/00.png")).unwrap());
        let reader = decoder.read_info().unwrap();
        assert_eq!((reader.info().width, reader.info().height), (256, 240));
        let decoder = png::Decoder::new(fs::File::open(out.join("brinstar/tiles.png")).unwrap());
        let reader = decoder.read_info().unwrap();
        assert_eq!((reader.info().width, reader.info().height), (128, 128));
    }

    #[test]
    fn render_needs_master_palette() {
        let dir = tempfile::tempdir().unwrap();
        let state = project_in(dir.path());
        let err = render_project(&state, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("palette.pal"));
    }
}
