use std::{fs, path::Path, path::PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use m1_level_editor::{
    message::{Message, ObjectList},
    persist::{load_project, save_project},
    state::{EditorState, GlobalConfig},
    update::{undo, update},
};

const LOCAL_TYPES: &str = r#"{
    "enemy": {"type": 1, "props": [
        {"slot": {"shifts": 4, "len": 4}},
        {"id": {"shifts": 0, "len": 4}, "respawn": {"shifts": 7, "len": 1}},
        {"y": {"shifts": 4, "len": 4}, "x": {"shifts": 0, "len": 4}}
    ]},
    "door": {"type": 2, "props": [{"dir": {"shifts": 7, "len": 1}}]}
}"#;

const GLOBAL_TYPES: &str = r#"{
    "item": {"type": 2, "props": [
        {"y": {"shifts": 4, "len": 4}},
        {"x": {"shifts": 4, "len": 4}, "kind": {"shifts": 0, "len": 4}}
    ]}
}"#;

fn item(col: u16, row: u16, kind: u8) -> serde_json::Value {
    serde_json::json!({"obj_type": "item", "x": col * 0x100 + 0x38, "y": row * 0x100 + 0x58, "kind": kind})
}

fn write_project(dir: &Path) {
    fs::write(dir.join("area_names.json"), r#"["norfair"]"#).unwrap();
    fs::write(dir.join("local_obj_types.json"), LOCAL_TYPES).unwrap();
    fs::write(dir.join("global_obj_types.json"), GLOBAL_TYPES).unwrap();
    fs::write(dir.join("world_map.bin"), [0xFF; 0x400]).unwrap();

    let area = dir.join("norfair");
    fs::create_dir_all(&area).unwrap();
    fs::write(area.join("palettes.json"), r#"[[{"start": 0, "data": [15, 34, 18, 48]}]]"#).unwrap();
    fs::write(area.join("metatiles.bin"), [0; 0x400]).unwrap();

    let tilemap: Vec<u8> = (0..240).map(|i| i as u8).collect();
    let rooms = serde_json::json!([{
        "tilemap": STANDARD.encode(&tilemap),
        "attrs": STANDARD.encode([0u8; 256]),
        "objs": [{"obj_type": "enemy", "x": 156, "y": 72, "slot": 3, "id": 5, "respawn": 1}]
    }]);
    fs::write(area.join("rooms.json"), rooms.to_string()).unwrap();
    let globals = serde_json::json!([item(2, 1, 1), item(1, 1, 2), item(1, 0, 3)]);
    fs::write(area.join("global_objs.json"), globals.to_string()).unwrap();
}

fn open(dir: &Path) -> EditorState {
    load_project(PathBuf::from("unused.json"), GlobalConfig::default(), dir).unwrap()
}

#[test]
fn edits_survive_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let mut state = open(dir.path());
    assert_eq!(state.areas[0].rooms[0].objs[0].prop("respawn"), Some(1));

    update(
        &mut state,
        Message::SetObjectProp {
            area: 0,
            list: ObjectList::Room(0),
            index: 0,
            prop: "id".to_string(),
            value: 9,
        },
    )
    .unwrap();
    update(
        &mut state,
        Message::RemoveObject {
            area: 0,
            list: ObjectList::Global,
            index: 2,
        },
    )
    .unwrap();
    update(&mut state, Message::SetMapCell { x: 0, y: 0, room: 0 }).unwrap();
    undo(&mut state).unwrap();
    save_project(&mut state).unwrap();

    let reloaded = open(dir.path());
    assert_eq!(reloaded.areas[0].rooms[0].objs[0].prop("id"), Some(9));
    assert_eq!(reloaded.areas[0].global_objs.len(), 2);
    assert_eq!(reloaded.world_map.get(0, 0), 0xFF);

    let text = fs::read_to_string(dir.path().join("norfair/rooms.json")).unwrap();
    let keys: Vec<usize> = ["\"obj_type\"", "\"x\"", "\"y\"", "\"slot\"", "\"id\"", "\"respawn\""]
        .iter()
        .map(|k| text.find(k).unwrap())
        .collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[cfg(unix)]
#[test]
fn build_emits_room_bytes_and_sorted_globals() {
    use m1_level_editor::{compress::Compressor, persist::build_project};

    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let mut state = open(dir.path());
    let cp = Compressor {
        program: "cp".to_string(),
        args: vec![],
    };
    let report = build_project(&mut state, &cp).unwrap();
    assert!(report.is_ok());

    let area = dir.path().join("norfair");
    let room = fs::read(area.join("rooms/00.bin")).unwrap();
    assert_eq!(room.len(), 240 + 64 + 3 + 1);
    assert_eq!(room[239], 239);
    assert_eq!(&room[304..], &[0x31, 0x85, 0x49, 0xFF]);

    let asm = fs::read_to_string(area.join("global_objs.asm")).unwrap();
    let pos = |label: &str| asm.find(label).unwrap();
    assert!(pos("@y00:") < pos("@y01:"));
    let row1 = &asm[pos("@y01:")..];
    assert!(row1.find("@@x01:").unwrap() < row1.find("@@x02:").unwrap());
    assert!(asm.contains("        .byte $52, $32\n"));
    assert!(asm.contains("    .word $FFFF\n"));
}

#[test]
fn invalid_schema_names_its_file() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    fs::write(
        dir.path().join("norfair/global_objs.json"),
        r#"[{"obj_type": "item", "x": 0, "y": 0}]"#,
    )
    .unwrap();
    fs::write(dir.path().join("global_obj_types.json"), r#"{"item": {"type": 2, "props": [{"x": {"shifts": 0, "len": 9}}]}}"#).unwrap();
    let err = load_project(PathBuf::new(), GlobalConfig::default(), dir.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("global_obj_types.json"));
}
