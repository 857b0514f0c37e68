pub type ColorIdx = u8; // Index into the master palette (0-63)
pub type PixelValue = u8; // 2bpp pixel value (0-3), before palette offset
pub type TileIdx = u8; // Index into an area's 8x8 background tiles
pub type MetatileIdx = u8; // Index into an area's metatile table
pub type AttrValue = u8; // Palette selector of a metatile cell (0-3)
pub type RoomIdx = u8; // Index into an area's room list (0xFF = no room)
pub type ColorRGB = [u8; 3];

pub const PALETTE_SIZE: usize = 0x20;
pub const MASTER_PALETTE_SIZE: usize = 0x40;

pub const ROOM_WIDTH: usize = 0x10;
pub const ROOM_HEIGHT: usize = 0xF;
pub const TILEMAP_SIZE: usize = ROOM_WIDTH * ROOM_HEIGHT;
pub const ATTRS_SIZE: usize = 0x100;
pub const ATTR_TABLE_SIZE: usize = 0x40;

pub const METATILE_COUNT: usize = 0x100;
pub const METATILE_DATA_SIZE: usize = 0xFF * 4;
pub const BLANK_METATILE: MetatileIdx = 0xFF;

pub const WORLD_MAP_WIDTH: usize = 0x20;
pub const WORLD_MAP_SIZE: usize = WORLD_MAP_WIDTH * WORLD_MAP_WIDTH;
pub const NO_ROOM: RoomIdx = 0xFF;
