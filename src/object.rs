//! Object records: a control byte whose low nibble selects the object type,
//! followed by the type's parameter bytes.
//!
//! Decoding turns the raw `x`/`y` fields into absolute pixel coordinates using
//! a per-type rule. Encoding does not invert those rules: it stores the high
//! bits of the coordinate's low byte directly, which is what the rules for
//! grid-placed objects produce, and drops coordinates entirely for types
//! without `x`/`y` fields.

use std::fmt;

use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    bitfield,
    error::{CodecError, CodecResult},
    reader::ByteReader,
    schema::{ObjectTypeSchema, SchemaTable, OBJ_TYPE, X, Y},
};

/// Position of a new object before the user moves it.
pub const DEFAULT_POS: u16 = 0x80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInstance {
    pub obj_type: String,
    /// Absolute pixel coordinates; for world-spanning objects these include
    /// the room origin (`room * 0x100`).
    pub x: u16,
    pub y: u16,
    /// Schema fields other than `x`/`y`, in declared order.
    pub props: Vec<(String, u8)>,
}

/// How a type's absolute position follows from its decoded fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CoordRule {
    /// `raw * 0x10 + offset` on each axis.
    Grid { x_offset: u16, y_offset: u16 },
    /// `dir` selects the right (0) or left (1) edge of the room.
    DoorSide,
    /// Alternating columns by the parity of `id`.
    ZebetitePair,
    Fixed { x: u16, y: u16 },
}

const COORD_RULES: &[(&str, CoordRule)] = &[
    ("enemy", CoordRule::Grid { x_offset: 0xC, y_offset: 8 }),
    ("door", CoordRule::DoorSide),
    ("elevator", CoordRule::Fixed { x: 0x80, y: 0x83 }),
    ("pipe_bug_hole", CoordRule::Grid { x_offset: 0, y_offset: 8 }),
    ("item", CoordRule::Grid { x_offset: 8, y_offset: 8 }),
    ("cannon", CoordRule::Grid { x_offset: 7, y_offset: 7 }),
    ("zebetite", CoordRule::ZebetitePair),
];

impl CoordRule {
    fn for_type(name: &str) -> CoordRule {
        COORD_RULES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, rule)| *rule)
            .unwrap_or(CoordRule::Fixed { x: 0x80, y: 0x80 })
    }

    fn apply(self, raw: &[(String, u8)]) -> (u16, u16) {
        let field = |name: &str| {
            raw.iter()
                .find(|(n, _)| n == name)
                .map_or(0, |(_, v)| *v as u16)
        };
        match self {
            CoordRule::Grid { x_offset, y_offset } => {
                (field(X) * 0x10 + x_offset, field(Y) * 0x10 + y_offset)
            }
            CoordRule::DoorSide => (if field("dir") == 0 { 0xF0 } else { 0x10 }, 0x68),
            CoordRule::ZebetitePair => (0xA0 - (field("id") % 2) * 0x80, 0x60),
            CoordRule::Fixed { x, y } => (x, y),
        }
    }
}

impl ObjectInstance {
    /// A fresh instance of `schema` at the default position, all fields 0.
    pub fn new(schema: &ObjectTypeSchema) -> Self {
        let mut obj = ObjectInstance {
            obj_type: String::new(),
            x: DEFAULT_POS,
            y: DEFAULT_POS,
            props: vec![],
        };
        obj.set_type(schema);
        obj
    }

    /// Switches to another type. Position is kept; every other property is
    /// replaced by the new type's fields, zeroed.
    pub fn set_type(&mut self, schema: &ObjectTypeSchema) {
        self.obj_type = schema.name.clone();
        self.props = schema
            .property_fields()
            .map(|f| (f.name.clone(), 0))
            .collect();
    }

    pub fn prop(&self, name: &str) -> Option<u8> {
        self.props.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn set_prop(&mut self, schema: &ObjectTypeSchema, name: &str, value: u32) -> CodecResult<()> {
        let field = schema
            .property_fields()
            .find(|f| f.name == name)
            .ok_or_else(|| CodecError::MissingProperty {
                obj_type: self.obj_type.clone(),
                prop: name.to_string(),
            })?;
        if value > bitfield::mask(field.len) as u32 {
            return Err(CodecError::FieldOutOfRange {
                prop: name.to_string(),
                value,
                len: field.len,
            });
        }
        match self.props.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value as u8,
            None => self.props.push((name.to_string(), value as u8)),
        }
        Ok(())
    }

    /// Puts the properties in the schema's declared order, checking that each
    /// one is present and fits its field.
    pub fn conform(&mut self, schema: &ObjectTypeSchema) -> CodecResult<()> {
        let mut props = Vec::with_capacity(self.props.len());
        for f in schema.property_fields() {
            let v = self.prop(&f.name).ok_or_else(|| CodecError::MissingProperty {
                obj_type: self.obj_type.clone(),
                prop: f.name.clone(),
            })?;
            if v > bitfield::mask(f.len) {
                return Err(CodecError::FieldOutOfRange {
                    prop: f.name.clone(),
                    value: v as u32,
                    len: f.len,
                });
            }
            props.push((f.name.clone(), v));
        }
        if let Some((name, _)) = self.props.iter().find(|(n, _)| schema.field(n).is_none()) {
            return Err(CodecError::Format(format!(
                "`{}` has no property `{}`",
                self.obj_type, name
            )));
        }
        self.props = props;
        Ok(())
    }

    /// Room (column, row) containing the object's absolute position.
    pub fn room(&self) -> (u8, u8) {
        ((self.x / 0x100) as u8, (self.y / 0x100) as u8)
    }
}

/// Decodes one object from its control byte and parameter bytes. `origin` is
/// the (column, row) of the room the object belongs to, added to the absolute
/// coordinates (zero for room-local objects).
pub fn decode(
    control: u8,
    params: &[u8],
    types: &SchemaTable,
    origin: (u8, u8),
) -> CodecResult<ObjectInstance> {
    let schema = types.by_control(control)?;
    if params.len() != schema.param_count() {
        return Err(CodecError::Format(format!(
            "`{}` takes {} parameter byte(s), got {}",
            schema.name,
            schema.param_count(),
            params.len()
        )));
    }

    let mut raw: Vec<(String, u8)> = vec![];
    for (i, fields) in schema.bytes.iter().enumerate() {
        let b = if i == 0 { control } else { params[i - 1] };
        for f in fields {
            raw.push((f.name.clone(), bitfield::unpack(b, f.shifts, f.len)));
        }
    }

    let (x, y) = CoordRule::for_type(&schema.name).apply(&raw);
    raw.retain(|(name, _)| name != X && name != Y);
    Ok(ObjectInstance {
        obj_type: schema.name.clone(),
        x: x + origin.0 as u16 * 0x100,
        y: y + origin.1 as u16 * 0x100,
        props: raw,
    })
}

/// Encodes an object into its control byte followed by its parameter bytes.
pub fn encode(obj: &ObjectInstance, types: &SchemaTable) -> CodecResult<Vec<u8>> {
    let schema = types.get(&obj.obj_type)?;
    let mut out = Vec::with_capacity(schema.byte_count());
    for (i, fields) in schema.bytes.iter().enumerate() {
        let mut packed = vec![];
        for f in fields {
            let value = match f.name.as_str() {
                X => ((obj.x & 0xFF) >> (8 - f.len)) as u8,
                Y => ((obj.y & 0xFF) >> (8 - f.len)) as u8,
                name => {
                    let v = obj.prop(name).ok_or_else(|| CodecError::MissingProperty {
                        obj_type: obj.obj_type.clone(),
                        prop: name.to_string(),
                    })?;
                    if v > bitfield::mask(f.len) {
                        return Err(CodecError::FieldOutOfRange {
                            prop: name.to_string(),
                            value: v as u32,
                            len: f.len,
                        });
                    }
                    v
                }
            };
            packed.push((value, f.shifts, f.len));
        }
        let b = bitfield::pack(packed);
        // The type tag owns the low nibble of the control byte.
        out.push(if i == 0 { b & 0xF0 | schema.type_tag } else { b });
    }
    Ok(out)
}

/// Reads control byte + parameters records until `terminator` is seen as a
/// control byte.
pub fn read_objects(
    reader: &mut ByteReader,
    types: &SchemaTable,
    terminator: u8,
    origin: (u8, u8),
) -> CodecResult<Vec<ObjectInstance>> {
    let mut objs = vec![];
    loop {
        let control = reader.read_u8()?;
        if control == terminator {
            return Ok(objs);
        }
        let n = types.by_control(control)?.param_count();
        let params = reader.read_n(n)?;
        objs.push(decode(control, params, types, origin)?);
    }
}

impl Serialize for ObjectInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.props.len() + 3))?;
        map.serialize_entry(OBJ_TYPE, &self.obj_type)?;
        map.serialize_entry(X, &self.x)?;
        map.serialize_entry(Y, &self.y)?;
        for (name, value) in &self.props {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ObjectInstance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = ObjectInstance;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object property map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut obj_type: Option<String> = None;
                let mut x: Option<u16> = None;
                let mut y: Option<u16> = None;
                let mut props = vec![];
                while let Some(key) = access.next_key::<String>()? {
                    match key.as_str() {
                        OBJ_TYPE => obj_type = Some(access.next_value()?),
                        X => x = Some(access.next_value()?),
                        Y => y = Some(access.next_value()?),
                        _ => {
                            let v: u8 = access.next_value()?;
                            props.push((key, v));
                        }
                    }
                }
                Ok(ObjectInstance {
                    obj_type: obj_type.ok_or_else(|| de::Error::missing_field(OBJ_TYPE))?,
                    x: x.ok_or_else(|| de::Error::missing_field(X))?,
                    y: y.ok_or_else(|| de::Error::missing_field(Y))?,
                    props,
                })
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}
