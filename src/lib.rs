pub mod asm;
pub mod bitfield;
pub mod common;
pub mod compress;
pub mod error;
pub mod global_objs;
pub mod import;
pub mod message;
pub mod object;
pub mod palette;
pub mod persist;
pub mod reader;
pub mod room;
pub mod schema;
pub mod state;
pub mod structs;
pub mod tiles;
pub mod undo;
pub mod update;
