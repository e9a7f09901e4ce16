//! Primitive binary codec
//!
//! Little-endian encoding of fixed-width integers, the 32-bit bool pattern,
//! length-prefixed strings and typed-value tags. Every writer returns the
//! number of bytes it produced so callers can keep a running content length;
//! every reader reports a short read as [`PakError::ShortRead`].

use crate::digest::{Digest, DIGEST_SIZE};
use crate::error::{PakError, Result};
use std::io::{self, Read, Write};

/// Encoded form of `true`
pub const BOOL_TRUE: u32 = 0x1111_1111;

/// Encoded form of `false`
pub const BOOL_FALSE: u32 = 0x0000_0000;

/// Width of the string length prefix
pub const STRING_LEN_SIZE: usize = 8;

/// Longest string a reader accepts (1 MiB)
pub const MAX_STRING_LENGTH: u64 = 1 << 20;

/// Significant digits used for float text
pub const FLOAT_PRECISION: usize = 9;

/// One-byte tag identifying the type of the value that follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ItemType {
    Bool = 0x01,
    U8 = 0x02,
    U16 = 0x03,
    U32 = 0x04,
    U64 = 0x05,
    I8 = 0x06,
    I16 = 0x07,
    I32 = 0x08,
    I64 = 0x09,
    Float = 0x0A,
    String = 0x0B,
    Hash = 0x0C,
    BinFile = 0x0D,
}

impl ItemType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let ty = match value {
            0x01 => Self::Bool,
            0x02 => Self::U8,
            0x03 => Self::U16,
            0x04 => Self::U32,
            0x05 => Self::U64,
            0x06 => Self::I8,
            0x07 => Self::I16,
            0x08 => Self::I32,
            0x09 => Self::I64,
            0x0A => Self::Float,
            0x0B => Self::String,
            0x0C => Self::Hash,
            0x0D => Self::BinFile,
            _ => return None,
        };
        Some(ty)
    }
}

fn read_array<const N: usize, R: Read>(mut reader: R, what: &'static str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| short_read(e, what))?;
    Ok(buf)
}

pub(crate) fn short_read(err: io::Error, what: &'static str) -> PakError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        PakError::ShortRead { what }
    } else {
        PakError::Io(err)
    }
}

macro_rules! int_codec {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            pub fn $write<W: Write>(mut writer: W, value: $ty) -> Result<usize> {
                let bytes = value.to_le_bytes();
                writer.write_all(&bytes)?;
                Ok(bytes.len())
            }

            pub fn $read<R: Read>(reader: R) -> Result<$ty> {
                Ok(<$ty>::from_le_bytes(read_array(reader, stringify!($ty))?))
            }
        )*
    };
}

int_codec! {
    u8 => write_u8, read_u8;
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    u64 => write_u64, read_u64;
    i8 => write_i8, read_i8;
    i16 => write_i16, read_i16;
    i32 => write_i32, read_i32;
    i64 => write_i64, read_i64;
}

pub fn write_bool<W: Write>(writer: W, value: bool) -> Result<usize> {
    write_u32(writer, if value { BOOL_TRUE } else { BOOL_FALSE })
}

pub fn read_bool<R: Read>(reader: R) -> Result<bool> {
    match read_u32(reader)? {
        BOOL_TRUE => Ok(true),
        BOOL_FALSE => Ok(false),
        other => Err(PakError::InvalidBool(other)),
    }
}

/// Bytes of `s` up to, not including, the first NUL
fn c_str_prefix(s: &str) -> &str {
    match s.find('\0') {
        Some(end) => &s[..end],
        None => s,
    }
}

fn write_raw_string<W: Write>(mut writer: W, text: &str) -> Result<usize> {
    let bytes = text.as_bytes();
    let mut written = write_u64(&mut writer, bytes.len() as u64)?;
    writer.write_all(bytes)?;
    writer.write_all(&[0u8])?;
    written += bytes.len() + 1;
    Ok(written)
}

/// Write `u64 length | bytes | NUL`
///
/// Text after an embedded NUL is not written.
pub fn write_string<W: Write>(writer: W, s: &str) -> Result<usize> {
    write_raw_string(writer, c_str_prefix(s))
}

/// Write at most `width` bytes of `s` using the string encoding
///
/// The length prefix records the bytes actually used, so the encoded size
/// varies with the input. Truncation never splits a UTF-8 character.
pub fn write_fixed_width_string<W: Write>(writer: W, s: &str, width: usize) -> Result<usize> {
    let text = c_str_prefix(s);
    let mut end = width.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    write_raw_string(writer, &text[..end])
}

pub fn read_string<R: Read>(mut reader: R) -> Result<String> {
    let len = read_u64(&mut reader)?;
    if len > MAX_STRING_LENGTH {
        return Err(PakError::InvalidString(format!(
            "length {} exceeds limit {}",
            len, MAX_STRING_LENGTH
        )));
    }

    let mut buf = vec![0u8; len as usize + 1];
    reader
        .read_exact(&mut buf)
        .map_err(|e| short_read(e, "string"))?;

    if buf.pop() != Some(0) {
        return Err(PakError::InvalidString(
            "missing NUL terminator".to_string(),
        ));
    }
    if buf.contains(&0) {
        return Err(PakError::InvalidString("embedded NUL".to_string()));
    }

    String::from_utf8(buf).map_err(|e| PakError::InvalidString(format!("invalid UTF-8: {}", e)))
}

/// Write a float as `%.9g` text
pub fn write_float<W: Write>(writer: W, value: f64) -> Result<usize> {
    write_string(writer, &format_general(value, FLOAT_PRECISION))
}

pub fn read_float<R: Read>(reader: R) -> Result<f64> {
    let text = read_string(reader)?;
    match text.as_str() {
        "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        "nan" | "-nan" => Ok(f64::NAN),
        _ => text.parse().map_err(|_| PakError::InvalidFloat(text)),
    }
}

/// printf-style `%.{precision}g` formatting
pub fn format_general(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

pub fn write_tag<W: Write>(writer: W, tag: ItemType) -> Result<usize> {
    write_u8(writer, tag as u8)
}

/// Read a tag and require it to be `expected`
pub fn read_tag<R: Read>(reader: R, expected: ItemType) -> Result<ItemType> {
    let found = read_u8(reader)?;
    match ItemType::from_u8(found) {
        Some(tag) if tag == expected => Ok(tag),
        _ => Err(PakError::UnexpectedItemType {
            expected: expected as u8,
            found,
        }),
    }
}

/// Write a `Hash` tag followed by the raw digest bytes
pub fn write_hash<W: Write>(mut writer: W, digest: &Digest) -> Result<usize> {
    let written = write_tag(&mut writer, ItemType::Hash)?;
    writer.write_all(digest.as_bytes())?;
    Ok(written + DIGEST_SIZE)
}

pub fn read_hash<R: Read>(mut reader: R) -> Result<Digest> {
    read_tag(&mut reader, ItemType::Hash)?;
    Ok(Digest(read_array(reader, "digest")?))
}

/// Encoded size of a string written with [`write_string`]
pub fn string_size(s: &str) -> usize {
    STRING_LEN_SIZE + c_str_prefix(s).len() + 1
}
