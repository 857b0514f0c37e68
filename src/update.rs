use anyhow::{bail, ensure, Context, Result};
use log::{debug, info};

use crate::{
    common::{ATTRS_SIZE, PALETTE_SIZE, ROOM_HEIGHT, ROOM_WIDTH},
    message::{Message, ObjectList},
    object::ObjectInstance,
    palette::{self, HOLE},
    room::Room,
    schema::SchemaTable,
    state::{Area, EditorState},
    undo::{get_undo_action, UndoAction},
};

fn object_list_mut<'a>(area: &'a mut Area, list: ObjectList) -> Result<&'a mut Vec<ObjectInstance>> {
    match list {
        ObjectList::Global => Ok(&mut area.global_objs),
        ObjectList::Room(room) => Ok(&mut area
            .rooms
            .get_mut(room)
            .with_context(|| format!("room {:02X} out of range", room))?
            .objs),
    }
}

fn object_mut(area: &mut Area, list: ObjectList, index: usize) -> Result<&mut ObjectInstance> {
    object_list_mut(area, list)?
        .get_mut(index)
        .with_context(|| format!("object {} out of range", index))
}

fn room_mut(area: &mut Area, room: usize) -> Result<&mut Room> {
    area.rooms
        .get_mut(room)
        .with_context(|| format!("room {:02X} out of range", room))
}

pub fn object_types(state: &EditorState, list: ObjectList) -> &SchemaTable {
    match list {
        ObjectList::Room(_) => &state.local_obj_types,
        ObjectList::Global => &state.global_obj_types,
    }
}

fn cell(x: usize, y: usize) -> Result<usize> {
    ensure!(x < ROOM_WIDTH && y < ROOM_HEIGHT, "cell ({}, {}) out of range", x, y);
    Ok(y * ROOM_WIDTH + x)
}

/// Applies an edit to the project data, recording its inverse for undo.
pub fn update(state: &mut EditorState, message: Message) -> Result<()> {
    let undo = get_undo_action(state, &message)?;
    apply(state, message)?;
    match undo {
        UndoAction::None => {}
        UndoAction::Irreversible => {
            state.undo_stack.clear();
            state.redo_stack.clear();
        }
        UndoAction::Ok(inverse) => {
            state.undo_stack.push(inverse);
            state.redo_stack.clear();
        }
    }
    Ok(())
}

/// Reverts the most recent edit. Returns false if there was nothing to undo.
pub fn undo(state: &mut EditorState) -> Result<bool> {
    replay(state, Stack::Undo)
}

/// Re-applies the most recently undone edit.
pub fn redo(state: &mut EditorState) -> Result<bool> {
    replay(state, Stack::Redo)
}

#[derive(Copy, Clone)]
enum Stack {
    Undo,
    Redo,
}

// Pops from one history stack and records the inverse on the other. If the
// entry no longer applies it goes back where it came from.
fn replay(state: &mut EditorState, from: Stack) -> Result<bool> {
    let popped = match from {
        Stack::Undo => state.undo_stack.pop(),
        Stack::Redo => state.redo_stack.pop(),
    };
    let Some(message) = popped else {
        return Ok(false);
    };
    let result = get_undo_action(state, &message).and_then(|inverse| {
        apply(state, message.clone())?;
        Ok(inverse)
    });
    let (source, target) = match from {
        Stack::Undo => (&mut state.undo_stack, &mut state.redo_stack),
        Stack::Redo => (&mut state.redo_stack, &mut state.undo_stack),
    };
    match result {
        Ok(UndoAction::Ok(inverse)) => target.push(inverse),
        Ok(_) => {}
        Err(err) => {
            source.push(message);
            return Err(err);
        }
    }
    Ok(true)
}

fn apply(state: &mut EditorState, message: Message) -> Result<()> {
    debug!("Applying {:?}", message);
    match message {
        Message::NewRoom { area } => {
            let area = state.area_mut(area)?;
            area.rooms.push(Room::default());
            info!("Added room {:02X} to {}", area.rooms.len() - 1, area.name);
            area.modified = true;
        }
        Message::RestoreRoom { area, room } => {
            let area = state.area_mut(area)?;
            area.rooms.push(room);
            area.modified = true;
        }
        Message::DeleteLastRoom { area } => {
            let area = state.area_mut(area)?;
            area.rooms.pop().context("no rooms to delete")?;
            area.modified = true;
        }
        Message::SetRoomTile {
            area,
            room,
            x,
            y,
            metatile,
        } => {
            let i = cell(x, y)?;
            let area = state.area_mut(area)?;
            room_mut(area, room)?.tilemap[i] = metatile;
            area.modified = true;
        }
        Message::SetRoomAttr {
            area,
            room,
            x,
            y,
            attr,
        } => {
            ensure!(attr < 4, "palette selector {} out of range", attr);
            ensure!(x < ROOM_WIDTH && y * ROOM_WIDTH + x < ATTRS_SIZE, "cell ({}, {}) out of range", x, y);
            let area = state.area_mut(area)?;
            room_mut(area, room)?.attrs[y * ROOM_WIDTH + x] = attr;
            area.modified = true;
        }
        Message::AddObject {
            area,
            list,
            index,
            obj,
        } => {
            object_types(state, list).get(&obj.obj_type)?;
            let area = state.area_mut(area)?;
            let objs = object_list_mut(area, list)?;
            ensure!(index <= objs.len(), "object {} out of range", index);
            objs.insert(index, obj);
            area.modified = true;
        }
        Message::RemoveObject { area, list, index } => {
            let area = state.area_mut(area)?;
            let objs = object_list_mut(area, list)?;
            ensure!(index < objs.len(), "object {} out of range", index);
            objs.remove(index);
            area.modified = true;
        }
        Message::RestoreObject {
            area,
            list,
            index,
            obj,
        } => {
            let area = state.area_mut(area)?;
            *object_mut(area, list, index)? = obj;
            area.modified = true;
        }
        Message::SetObjectType {
            area,
            list,
            index,
            obj_type,
        } => {
            let schema = object_types(state, list).get(&obj_type)?.clone();
            let area = state.area_mut(area)?;
            object_mut(area, list, index)?.set_type(&schema);
            area.modified = true;
        }
        Message::SetObjectProp {
            area,
            list,
            index,
            prop,
            value,
        } => {
            let obj_type = object_mut(state.area_mut(area)?, list, index)?.obj_type.clone();
            let schema = object_types(state, list).get(&obj_type)?.clone();
            let area = state.area_mut(area)?;
            object_mut(area, list, index)?.set_prop(&schema, &prop, value)?;
            area.modified = true;
        }
        Message::MoveObject {
            area,
            list,
            index,
            x,
            y,
        } => {
            if let ObjectList::Room(_) = list {
                ensure!(x < 0x100 && y < 0x100, "({:X}, {:X}) is outside the room", x, y);
            }
            let area = state.area_mut(area)?;
            let obj = object_mut(area, list, index)?;
            obj.x = x;
            obj.y = y;
            area.modified = true;
        }
        Message::SetMetatileCorner {
            area,
            metatile,
            corner,
            tile,
        } => {
            let area = state.area_mut(area)?;
            area.metatiles.set_corner(metatile, corner, tile)?;
            area.modified = true;
        }
        Message::SetMapCell { x, y, room } => {
            state.world_map.set(x, y, room)?;
            state.world_map_modified = true;
        }
        Message::SetPaletteColor {
            area,
            palette,
            slot,
            color,
        } => {
            ensure!(slot < PALETTE_SIZE, "palette slot {} out of range", slot);
            ensure!(color < 0x40, "color {:02X} out of range", color);
            let area = state.area_mut(area)?;
            let strings = area
                .palettes
                .get_mut(palette)
                .with_context(|| format!("palette {:02X} out of range", palette))?;
            let mut pal = palette::expand(strings, HOLE)?;
            pal[slot] = color;
            *strings = palette::compress(&pal, HOLE);
            area.modified = true;
        }
        Message::RestorePalette {
            area,
            palette,
            strings,
        } => {
            let area = state.area_mut(area)?;
            *area
                .palettes
                .get_mut(palette)
                .with_context(|| format!("palette {:02X} out of range", palette))? = strings;
            area.modified = true;
        }
        Message::AddPalette { area, source } => {
            let area = state.area_mut(area)?;
            let Some(pal) = area.palettes.get(source).cloned() else {
                bail!("palette {:02X} out of range", source);
            };
            area.palettes.push(pal);
            area.modified = true;
        }
        Message::DeleteLastPalette { area } => {
            let area = state.area_mut(area)?;
            ensure!(area.palettes.len() > 1, "an area needs at least one palette");
            area.palettes.pop();
            area.modified = true;
        }
        Message::RestoreLastPalette { area, strings } => {
            let area = state.area_mut(area)?;
            area.palettes.push(strings);
            area.modified = true;
        }
    }
    Ok(())
}
