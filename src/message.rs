use crate::{
    common::{AttrValue, ColorIdx, MetatileIdx, RoomIdx, TileIdx},
    object::ObjectInstance,
    palette::PaletteString,
    room::Room,
};

/// Which object list of an area an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectList {
    Room(usize),
    Global,
}

/// Edits to project data. Every variant is applied by `update::update` and
/// has its inverse computed by `undo::get_undo_action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    NewRoom {
        area: usize,
    },
    RestoreRoom {
        area: usize,
        room: Room,
    },
    DeleteLastRoom {
        area: usize,
    },
    SetRoomTile {
        area: usize,
        room: usize,
        x: usize,
        y: usize,
        metatile: MetatileIdx,
    },
    SetRoomAttr {
        area: usize,
        room: usize,
        x: usize,
        y: usize,
        attr: AttrValue,
    },
    AddObject {
        area: usize,
        list: ObjectList,
        index: usize,
        obj: ObjectInstance,
    },
    RemoveObject {
        area: usize,
        list: ObjectList,
        index: usize,
    },
    RestoreObject {
        area: usize,
        list: ObjectList,
        index: usize,
        obj: ObjectInstance,
    },
    SetObjectType {
        area: usize,
        list: ObjectList,
        index: usize,
        obj_type: String,
    },
    SetObjectProp {
        area: usize,
        list: ObjectList,
        index: usize,
        prop: String,
        value: u32,
    },
    MoveObject {
        area: usize,
        list: ObjectList,
        index: usize,
        x: u16,
        y: u16,
    },
    SetMetatileCorner {
        area: usize,
        metatile: MetatileIdx,
        corner: usize,
        tile: TileIdx,
    },
    SetMapCell {
        x: usize,
        y: usize,
        room: RoomIdx,
    },
    SetPaletteColor {
        area: usize,
        palette: usize,
        slot: usize,
        color: ColorIdx,
    },
    RestorePalette {
        area: usize,
        palette: usize,
        strings: Vec<PaletteString>,
    },
    AddPalette {
        area: usize,
        source: usize,
    },
    DeleteLastPalette {
        area: usize,
    },
    RestoreLastPalette {
        area: usize,
        strings: Vec<PaletteString>,
    },
}
