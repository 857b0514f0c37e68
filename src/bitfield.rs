//! Sub-byte field packing shared by the object and attribute codecs.
//!
//! Fields are described by a bit offset (`shift`) and a bit width (`len`).
//! Callers guarantee the fields of one byte do not overlap and that
//! `shift + len <= 8`.

pub fn mask(len: u8) -> u8 {
    debug_assert!(len <= 8);
    ((1u16 << len) - 1) as u8
}

/// Extracts the `len`-bit field starting at bit `shift`.
pub fn unpack(byte: u8, shift: u8, len: u8) -> u8 {
    debug_assert!(shift + len <= 8);
    (byte >> shift) & mask(len)
}

/// ORs together `(value & mask(len)) << shift` for each `(value, shift, len)`.
pub fn pack<I>(fields: I) -> u8
where
    I: IntoIterator<Item = (u8, u8, u8)>,
{
    fields.into_iter().fold(0, |b, (value, shift, len)| {
        debug_assert!(shift + len <= 8);
        b | (value & mask(len)) << shift
    })
}

/// Bits occupied by a field, as a mask over the whole byte.
pub fn field_bits(shift: u8, len: u8) -> u8 {
    mask(len) << shift
}
