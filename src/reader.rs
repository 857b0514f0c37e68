use crate::error::{CodecError, CodecResult};

/// Sequential little-endian reader over a slice of ROM data.
///
/// All reads are bounds-checked and report the offset (relative to the start
/// of the slice) at which the data ran out.
#[derive(Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        let b = *self.data.get(self.pos).ok_or_else(|| self.eof(1))?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Ok(lo | hi << 8)
    }

    pub fn read_n(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(self.eof(n));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn eof(&self, n: usize) -> CodecError {
        CodecError::Format(format!(
            "unexpected end of data reading {} byte(s) at offset 0x{:X}",
            n, self.pos
        ))
    }
}
