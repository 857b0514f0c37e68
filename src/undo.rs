use crate::{
    common::{ROOM_WIDTH, WORLD_MAP_WIDTH},
    message::{Message, ObjectList},
    object::ObjectInstance,
    room::Room,
    state::{Area, EditorState},
};

use anyhow::{ensure, Context, Result};

#[derive(Debug)]
pub enum UndoAction {
    None,
    Irreversible,
    Ok(Message),
}

fn room(area: &Area, room: usize) -> Result<&Room> {
    area.rooms
        .get(room)
        .with_context(|| format!("room {:02X} out of range", room))
}

fn object(area: &Area, list: ObjectList, index: usize) -> Result<&ObjectInstance> {
    let objs = match list {
        ObjectList::Global => &area.global_objs,
        ObjectList::Room(r) => &room(area, r)?.objs,
    };
    objs.get(index)
        .with_context(|| format!("object {} out of range", index))
}

fn restore_object(state: &EditorState, area: usize, list: ObjectList, index: usize) -> Result<UndoAction> {
    let obj = object(state.area(area)?, list, index)?.clone();
    Ok(UndoAction::Ok(Message::RestoreObject {
        area,
        list,
        index,
        obj,
    }))
}

fn restore_palette(state: &EditorState, area: usize, palette: usize) -> Result<UndoAction> {
    let strings = state
        .area(area)?
        .palettes
        .get(palette)
        .with_context(|| format!("palette {:02X} out of range", palette))?
        .clone();
    Ok(UndoAction::Ok(Message::RestorePalette {
        area,
        palette,
        strings,
    }))
}

/// The message that reverts `message`, computed against the state before it
/// is applied.
pub fn get_undo_action(state: &EditorState, message: &Message) -> Result<UndoAction> {
    let action = match message {
        &Message::NewRoom { area } | &Message::RestoreRoom { area, .. } => {
            UndoAction::Ok(Message::DeleteLastRoom { area })
        }
        &Message::DeleteLastRoom { area } => {
            let room = state.area(area)?.rooms.last().context("no rooms to delete")?;
            UndoAction::Ok(Message::RestoreRoom {
                area,
                room: room.clone(),
            })
        }
        &Message::SetRoomTile {
            area,
            room: r,
            x,
            y,
            metatile: _,
        } => {
            let old = room(state.area(area)?, r)?;
            let metatile = *old
                .tilemap
                .get(y * ROOM_WIDTH + x)
                .filter(|_| x < ROOM_WIDTH)
                .with_context(|| format!("cell ({}, {}) out of range", x, y))?;
            UndoAction::Ok(Message::SetRoomTile {
                area,
                room: r,
                x,
                y,
                metatile,
            })
        }
        &Message::SetRoomAttr {
            area,
            room: r,
            x,
            y,
            attr: _,
        } => {
            let old = room(state.area(area)?, r)?;
            let attr = *old
                .attrs
                .get(y * ROOM_WIDTH + x)
                .filter(|_| x < ROOM_WIDTH)
                .with_context(|| format!("cell ({}, {}) out of range", x, y))?;
            UndoAction::Ok(Message::SetRoomAttr {
                area,
                room: r,
                x,
                y,
                attr,
            })
        }
        &Message::AddObject {
            area, list, index, ..
        } => UndoAction::Ok(Message::RemoveObject { area, list, index }),
        &Message::RemoveObject { area, list, index } => {
            let obj = object(state.area(area)?, list, index)?.clone();
            UndoAction::Ok(Message::AddObject {
                area,
                list,
                index,
                obj,
            })
        }
        &Message::RestoreObject {
            area, list, index, ..
        }
        | &Message::SetObjectType {
            area, list, index, ..
        }
        | &Message::SetObjectProp {
            area, list, index, ..
        }
        | &Message::MoveObject {
            area, list, index, ..
        } => restore_object(state, area, list, index)?,
        &Message::SetMetatileCorner {
            area,
            metatile,
            corner,
            tile: _,
        } => {
            ensure!(corner < 4, "metatile corner {} out of range", corner);
            let tile = state.area(area)?.metatiles.get(metatile)[corner];
            UndoAction::Ok(Message::SetMetatileCorner {
                area,
                metatile,
                corner,
                tile,
            })
        }
        &Message::SetMapCell { x, y, room: _ } => {
            ensure!(
                x < WORLD_MAP_WIDTH && y < WORLD_MAP_WIDTH,
                "map cell ({}, {}) out of range",
                x,
                y
            );
            UndoAction::Ok(Message::SetMapCell {
                x,
                y,
                room: state.world_map.get(x, y),
            })
        }
        &Message::SetPaletteColor { area, palette, .. } | &Message::RestorePalette { area, palette, .. } => {
            restore_palette(state, area, palette)?
        }
        &Message::AddPalette { area, .. } | &Message::RestoreLastPalette { area, .. } => {
            UndoAction::Ok(Message::DeleteLastPalette { area })
        }
        &Message::DeleteLastPalette { area } => {
            let strings = state
                .area(area)?
                .palettes
                .last()
                .context("no palettes to delete")?
                .clone();
            UndoAction::Ok(Message::RestoreLastPalette { area, strings })
        }
    };
    Ok(action)
}
