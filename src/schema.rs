//! Object type schemas (`local_obj_types.json` / `global_obj_types.json`).
//!
//! On disk a table is `{type_name: {type: tag, props: [byte, ...]}}` where
//! each byte is `{field_name: {shifts, len}}`. Byte 0 is the object's control
//! byte, whose low nibble holds the type tag. Key order is significant (it is
//! the order fields are listed in), so maps are read into vectors.

use std::{fmt, marker::PhantomData};

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    bitfield,
    error::{CodecError, CodecResult},
};

/// Names of the pseudo-fields holding raw coordinates.
pub const X: &str = "x";
pub const Y: &str = "y";
pub const OBJ_TYPE: &str = "obj_type";

/// JSON object read as a list of entries in file order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = vec![];
                while let Some((k, v)) = access.next_entry::<String, V>()? {
                    entries.push((k, v));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    pub shifts: u8,
    pub len: u8,
}

/// One type entry as written on disk, before validation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RawSchema {
    #[serde(rename = "type")]
    pub type_tag: u8,
    pub props: Vec<OrderedMap<FieldLayout>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub shifts: u8,
    pub len: u8,
}

impl FieldSpec {
    pub fn is_coordinate(&self) -> bool {
        self.name == X || self.name == Y
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectTypeSchema {
    pub name: String,
    pub type_tag: u8,
    /// Fields of each encoded byte; `bytes[0]` is the control byte.
    pub bytes: Vec<Vec<FieldSpec>>,
}

impl ObjectTypeSchema {
    /// Encoded size of one object, control byte included.
    pub fn byte_count(&self) -> usize {
        self.bytes.len()
    }

    /// Number of parameter bytes following the control byte.
    pub fn param_count(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.bytes.iter().flatten()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields().find(|f| f.name == name)
    }

    /// Fields stored literally on an instance, in declared order.
    pub fn property_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields().filter(|f| !f.is_coordinate())
    }

    fn validate(&self) -> CodecResult<()> {
        let invalid = |reason: String| CodecError::InvalidSchema {
            type_name: self.name.clone(),
            reason,
        };
        if self.type_tag > 0xF {
            return Err(invalid(format!("type tag {} does not fit in 4 bits", self.type_tag)));
        }
        if self.bytes.is_empty() {
            return Err(invalid("no control byte declared".to_string()));
        }
        let mut seen: Vec<&str> = vec![];
        for (i, byte) in self.bytes.iter().enumerate() {
            let mut used = 0u8;
            for f in byte {
                if f.len == 0 || f.shifts as u16 + f.len as u16 > 8 {
                    return Err(invalid(format!(
                        "field `{}` (shifts {}, len {}) does not fit in byte {}",
                        f.name, f.shifts, f.len, i
                    )));
                }
                // Coordinates hold a 16-pixel grid position within one room.
                if f.is_coordinate() && f.len > 4 {
                    return Err(invalid(format!("coordinate `{}` is wider than 4 bits", f.name)));
                }
                let bits = bitfield::field_bits(f.shifts, f.len);
                if used & bits != 0 {
                    return Err(invalid(format!("field `{}` overlaps another field in byte {}", f.name, i)));
                }
                used |= bits;
                if f.name == OBJ_TYPE || seen.contains(&f.name.as_str()) {
                    return Err(invalid(format!("field name `{}` is reserved or repeated", f.name)));
                }
                seen.push(&f.name);
            }
        }
        Ok(())
    }
}

/// All object types of one kind (room-local or world-spanning), in file order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "OrderedMap<RawSchema>", into = "OrderedMap<RawSchema>")]
pub struct SchemaTable {
    types: Vec<ObjectTypeSchema>,
}

impl SchemaTable {
    pub fn new(types: Vec<ObjectTypeSchema>) -> CodecResult<Self> {
        for (i, t) in types.iter().enumerate() {
            t.validate()?;
            if let Some(other) = types[..i].iter().find(|o| o.type_tag == t.type_tag || o.name == t.name) {
                return Err(CodecError::InvalidSchema {
                    type_name: t.name.clone(),
                    reason: format!("tag or name clashes with `{}`", other.name),
                });
            }
        }
        Ok(SchemaTable { types })
    }

    pub fn types(&self) -> &[ObjectTypeSchema] {
        &self.types
    }

    pub fn get(&self, name: &str) -> CodecResult<&ObjectTypeSchema> {
        self.types
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| CodecError::SchemaMismatch(name.to_string()))
    }

    /// Looks up the type selected by the low nibble of a control byte.
    pub fn by_control(&self, control: u8) -> CodecResult<&ObjectTypeSchema> {
        let tag = control & 0xF;
        self.types.iter().find(|t| t.type_tag == tag).ok_or_else(|| {
            CodecError::Format(format!("no object type for control byte 0x{:02X}", control))
        })
    }
}

impl TryFrom<OrderedMap<RawSchema>> for SchemaTable {
    type Error = CodecError;

    fn try_from(raw: OrderedMap<RawSchema>) -> CodecResult<Self> {
        let types = raw
            .0
            .into_iter()
            .map(|(name, schema)| ObjectTypeSchema {
                name,
                type_tag: schema.type_tag,
                bytes: schema
                    .props
                    .into_iter()
                    .map(|byte| {
                        byte.0
                            .into_iter()
                            .map(|(name, l)| FieldSpec {
                                name,
                                shifts: l.shifts,
                                len: l.len,
                            })
                            .collect()
                    })
                    .collect(),
            })
            .collect();
        SchemaTable::new(types)
    }
}

impl From<SchemaTable> for OrderedMap<RawSchema> {
    fn from(table: SchemaTable) -> Self {
        OrderedMap(
            table
                .types
                .into_iter()
                .map(|t| {
                    let props = t
                        .bytes
                        .into_iter()
                        .map(|byte| {
                            OrderedMap(
                                byte.into_iter()
                                    .map(|f| {
                                        (
                                            f.name,
                                            FieldLayout {
                                                shifts: f.shifts,
                                                len: f.len,
                                            },
                                        )
                                    })
                                    .collect(),
                            )
                        })
                        .collect();
                    (
                        t.name,
                        RawSchema {
                            type_tag: t.type_tag,
                            props,
                        },
                    )
                })
                .collect(),
        )
    }
}
