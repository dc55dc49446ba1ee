//! Little-endian byte cursor for the game client's binary formats
//!
//! All reads fail with a format error carrying the offset at which the read
//! started when the input is exhausted.

use chrono::{DateTime, Utc};
use osutrack_common::time::ticks_to_datetime;
use osutrack_common::{Error, Result};

/// Marker byte preceding a present string
const STRING_PRESENT: u8 = 0x0b;
/// Marker byte of an absent string
const STRING_ABSENT: u8 = 0x00;

/// Maximum encoded width of a 64-bit variable-length integer
const MAX_ULEB128_BYTES: usize = 10;

/// Cursor over an in-memory byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the input
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Borrow the next `len` bytes and advance past them
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                Error::format(
                    self.pos,
                    format!(
                        "unexpected end of input: wanted {} bytes, {} left",
                        len,
                        self.remaining()
                    ),
                )
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    /// Advance without interpreting the bytes
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// One byte, any non-zero value is true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Variable-length integer: 7 data bits per byte, low group first
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut result: u64 = 0;
        for index in 0..MAX_ULEB128_BYTES {
            let byte = self.read_u8()?;
            let shift = 7 * index as u32;
            let group = u64::from(byte & 0x7f);
            if shift == 63 && group > 1 {
                return Err(Error::format(start, "variable-length integer overflows 64 bits"));
            }
            result |= group << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::format(start, "variable-length integer is too long"))
    }

    /// Marker-prefixed UTF-8 string; an absent string reads as empty
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        match self.read_u8()? {
            STRING_ABSENT => Ok(String::new()),
            STRING_PRESENT => {
                let len = self.read_uleb128()?;
                let len = usize::try_from(len)
                    .map_err(|_| Error::format(start, format!("string length {len} too large")))?;
                let bytes = self.take(len)?;
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::format(start, format!("invalid UTF-8 in string: {e}")))
            }
            other => Err(Error::format(
                start,
                format!("invalid string marker 0x{other:02x}"),
            )),
        }
    }

    /// Advance past a string without decoding its payload
    pub fn skip_string(&mut self) -> Result<()> {
        let start = self.pos;
        match self.read_u8()? {
            STRING_ABSENT => Ok(()),
            STRING_PRESENT => {
                let len = self.read_uleb128()?;
                let len = usize::try_from(len)
                    .map_err(|_| Error::format(start, format!("string length {len} too large")))?;
                self.skip(len)
            }
            other => Err(Error::format(
                start,
                format!("invalid string marker 0x{other:02x}"),
            )),
        }
    }

    /// 8-byte tick timestamp; zero and unrepresentable values read as `None`
    pub fn read_ticks(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(ticks_to_datetime(self.read_u64()?))
    }
}
