//! Tag-nibble integer packing shared by the pooled format family.
//!
//! A tag byte is `(major << 4) | subtype`. Subtypes 0–10 carry that literal
//! value inline, 11 is literal −1, and 12/13/14/15 announce a signed
//! 8/16/32/64-bit little-endian payload, always the smallest width that
//! holds the value losslessly. The same packing encodes integer values,
//! array/object counts, string byte lengths and pool reference indices.

use std::io::{Read, Write};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Major {
    Primitive = 0,
    Int = 1,
    Float = 2,
    Array = 3,
    Object = 4,
    String = 5,
    Ref = 6,
}

impl Major {
    /// Extracts the major type from a tag byte.
    pub fn from_tag(tag: u8) -> Option<Major> {
        match tag >> 4 {
            0 => Some(Major::Primitive),
            1 => Some(Major::Int),
            2 => Some(Major::Float),
            3 => Some(Major::Array),
            4 => Some(Major::Object),
            5 => Some(Major::String),
            6 => Some(Major::Ref),
            _ => None,
        }
    }
}

pub const SUB_NULL: u8 = 0;
pub const SUB_TRUE: u8 = 1;
pub const SUB_FALSE: u8 = 2;
pub const SUB_MINUS_ONE: u8 = 11;
pub const SUB_I8: u8 = 12;
pub const SUB_I16: u8 = 13;
pub const SUB_I32: u8 = 14;
pub const SUB_I64: u8 = 15;

pub fn tag(major: Major, subtype: u8) -> u8 {
    ((major as u8) << 4) | (subtype & 0x0f)
}

/// Splits a tag byte into its subtype nibble.
pub fn subtype(tag: u8) -> u8 {
    tag & 0x0f
}

/// Writes a tag byte for `major` with `value` packed into the smallest
/// representation.
pub fn write_packed<W: Write>(out: &mut W, major: Major, value: i64) -> Result<()> {
    if (0..=10).contains(&value) {
        out.write_all(&[tag(major, value as u8)])?;
    } else if value == -1 {
        out.write_all(&[tag(major, SUB_MINUS_ONE)])?;
    } else if let Ok(v) = i8::try_from(value) {
        out.write_all(&[tag(major, SUB_I8)])?;
        out.write_all(&v.to_le_bytes())?;
    } else if let Ok(v) = i16::try_from(value) {
        out.write_all(&[tag(major, SUB_I16)])?;
        out.write_all(&v.to_le_bytes())?;
    } else if let Ok(v) = i32::try_from(value) {
        out.write_all(&[tag(major, SUB_I32)])?;
        out.write_all(&v.to_le_bytes())?;
    } else {
        out.write_all(&[tag(major, SUB_I64)])?;
        out.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn payload_error(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::TruncatedRecord
    } else {
        Error::Io(err.to_string())
    }
}

/// Reads the packed value whose tag byte carried `subtype`. A truncated
/// payload is a fatal [`Error::TruncatedRecord`].
pub fn read_packed<R: Read>(input: &mut R, subtype: u8) -> Result<i64> {
    match subtype {
        SUB_MINUS_ONE => Ok(-1),
        SUB_I8 => {
            let mut buf = [0u8; 1];
            input.read_exact(&mut buf).map_err(payload_error)?;
            Ok(i64::from(i8::from_le_bytes(buf)))
        }
        SUB_I16 => {
            let mut buf = [0u8; 2];
            input.read_exact(&mut buf).map_err(payload_error)?;
            Ok(i64::from(i16::from_le_bytes(buf)))
        }
        SUB_I32 => {
            let mut buf = [0u8; 4];
            input.read_exact(&mut buf).map_err(payload_error)?;
            Ok(i64::from(i32::from_le_bytes(buf)))
        }
        SUB_I64 => {
            let mut buf = [0u8; 8];
            input.read_exact(&mut buf).map_err(payload_error)?;
            Ok(i64::from_le_bytes(buf))
        }
        literal => Ok(i64::from(literal)),
    }
}

/// Bounds-checked cursor over an in-memory buffer, used by the formats
/// that read by position rather than through a stream.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    /// Next byte, or [`Error::UnexpectedEndOfInput`] at the buffer end.
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(Error::UnexpectedEndOfInput)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Takes `n` bytes; failing mid-record is [`Error::TruncatedRecord`].
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::TruncatedRecord)?;
        let slice = self.buf.get(self.pos..end).ok_or(Error::TruncatedRecord)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(buf))
    }

    /// Packed value continuation, cursor flavor of [`read_packed`].
    pub fn read_packed(&mut self, subtype: u8) -> Result<i64> {
        match subtype {
            SUB_MINUS_ONE => Ok(-1),
            SUB_I8 => Ok(i64::from(self.take(1)?[0] as i8)),
            SUB_I16 => {
                let bytes = self.take(2)?;
                Ok(i64::from(i16::from_le_bytes([bytes[0], bytes[1]])))
            }
            SUB_I32 => Ok(i64::from(self.read_i32()?)),
            SUB_I64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(self.take(8)?);
                Ok(i64::from_le_bytes(buf))
            }
            literal => Ok(i64::from(literal)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn packed(major: Major, value: i64) -> Vec<u8> {
        let mut out = Vec::new();
        write_packed(&mut out, major, value).unwrap();
        out
    }

    #[rstest]
    #[case(0, 1)]
    #[case(5, 1)]
    #[case(10, 1)]
    #[case(-1, 1)]
    #[case(11, 2)]
    #[case(127, 2)]
    #[case(-2, 2)]
    #[case(128, 3)]
    #[case(-32768, 3)]
    #[case(32768, 5)]
    #[case(i64::from(i32::MAX), 5)]
    #[case(i64::from(i32::MAX) + 1, 9)]
    #[case(i64::MIN, 9)]
    fn test_packed_width(#[case] value: i64, #[case] expected_len: usize) {
        assert_eq!(packed(Major::Int, value).len(), expected_len);
    }

    #[rstest]
    #[case(0)]
    #[case(10)]
    #[case(-1)]
    #[case(42)]
    #[case(-120)]
    #[case(30_000)]
    #[case(-2_000_000)]
    #[case(i64::MAX)]
    #[case(i64::MIN)]
    fn test_packed_round_trip(#[case] value: i64) {
        let bytes = packed(Major::Int, value);
        let mut input = &bytes[..];
        let mut first = [0u8; 1];
        std::io::Read::read_exact(&mut input, &mut first).unwrap();
        assert_eq!(Major::from_tag(first[0]), Some(Major::Int));
        assert_eq!(read_packed(&mut input, subtype(first[0])).unwrap(), value);
    }

    #[rstest]
    #[case(3, Major::Array)]
    #[case(7, Major::Object)]
    #[case(2, Major::Ref)]
    fn test_major_survives_packing(#[case] value: i64, #[case] major: Major) {
        let bytes = packed(major, value);
        assert_eq!(Major::from_tag(bytes[0]), Some(major));
        assert_eq!(i64::from(subtype(bytes[0])), value);
    }

    #[test]
    fn test_unknown_major_is_rejected() {
        assert_eq!(Major::from_tag(0x70), None);
        assert_eq!(Major::from_tag(0xf0), None);
    }

    #[test]
    fn test_truncated_payload_is_fatal() {
        // Tag announces an 8-byte payload, only 2 bytes follow.
        let bytes = packed(Major::Int, i64::MAX);
        let mut input = &bytes[..3];
        let mut first = [0u8; 1];
        std::io::Read::read_exact(&mut input, &mut first).unwrap();
        assert_eq!(
            read_packed(&mut input, subtype(first[0])).unwrap_err(),
            Error::TruncatedRecord
        );
    }

    #[test]
    fn test_byte_reader_bounds() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.take(2).unwrap(), &[2, 3]);
        assert_eq!(r.read_u8().unwrap_err(), Error::UnexpectedEndOfInput);
        assert_eq!(r.take(1).unwrap_err(), Error::TruncatedRecord);
    }
}
