//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Codec primitives.
//!
//! Pure byte encode/decode helpers shared by the reader, the builder, and
//! the shredding engine. Every function here bounds-checks `pos` before
//! touching the buffer and surfaces [`Error::Malformed`] on any violation.
//!
//! # References
//!
//! 1. <https://github.com/apache/parquet-format/blob/master/VariantEncoding.md>

use nom::bytes::complete::take;
use nom::IResult;

use crate::error::{Error, Result};
use crate::variant::Type;

pub const BASIC_TYPE_BITS: u32 = 2;
pub const BASIC_TYPE_MASK: u8 = 0x3;
pub const TYPE_INFO_MASK: u8 = 0x3F;
pub const MAX_SHORT_STR_SIZE: usize = 0x3F;

pub const BASIC_TYPE_PRIMITIVE: u8 = 0;
pub const BASIC_TYPE_SHORT_STR: u8 = 1;
pub const BASIC_TYPE_OBJECT: u8 = 2;
pub const BASIC_TYPE_ARRAY: u8 = 3;

pub const PRIMITIVE_NULL: u8 = 0;
pub const PRIMITIVE_TRUE: u8 = 1;
pub const PRIMITIVE_FALSE: u8 = 2;
pub const PRIMITIVE_INT1: u8 = 3;
pub const PRIMITIVE_INT2: u8 = 4;
pub const PRIMITIVE_INT4: u8 = 5;
pub const PRIMITIVE_INT8: u8 = 6;
pub const PRIMITIVE_DOUBLE: u8 = 7;
pub const PRIMITIVE_DECIMAL4: u8 = 8;
pub const PRIMITIVE_DECIMAL8: u8 = 9;
pub const PRIMITIVE_DECIMAL16: u8 = 10;
pub const PRIMITIVE_DATE: u8 = 11;
pub const PRIMITIVE_TIMESTAMP: u8 = 12;
pub const PRIMITIVE_TIMESTAMP_NTZ: u8 = 13;
pub const PRIMITIVE_FLOAT: u8 = 14;
pub const PRIMITIVE_BINARY: u8 = 15;
pub const PRIMITIVE_LONG_STR: u8 = 16;
pub const PRIMITIVE_UUID: u8 = 20;

pub const VERSION: u8 = 1;
pub const VERSION_MASK: u8 = 0x0F;

pub const U8_MAX: usize = 0xFF;
pub const U16_MAX: usize = 0xFFFF;
pub const U24_MAX: usize = 0xFF_FFFF;
pub const U24_SIZE: usize = 3;
pub const U32_SIZE: usize = 4;

/// 16 MiB: the largest `value` or `metadata` buffer this format allows.
pub const SIZE_LIMIT: usize = U24_MAX + 1;

pub const MAX_DECIMAL4_PRECISION: u32 = 9;
pub const MAX_DECIMAL8_PRECISION: u32 = 18;
pub const MAX_DECIMAL16_PRECISION: u32 = 38;

/// Checks that `pos` is a valid index into a buffer of the given length.
pub fn check_index(pos: usize, len: usize) -> Result<()> {
    if pos >= len {
        Err(Error::Malformed)
    } else {
        Ok(())
    }
}

/// Checks that `buf[start..start + size]` is a valid (possibly empty) range.
/// Unlike checking `start + size - 1` against [`check_index`], this handles
/// `size == 0` correctly instead of underflowing or over-rejecting a
/// zero-length value that ends exactly at the buffer's end.
pub fn check_range(start: usize, size: usize, len: usize) -> Result<()> {
    if start.checked_add(size).map_or(true, |end| end > len) {
        Err(Error::Malformed)
    } else {
        Ok(())
    }
}

/// Writes the low `num_bytes` bytes of `value`, little-endian, into
/// `buf[pos..pos + num_bytes]`.
pub fn write_le(buf: &mut [u8], pos: usize, value: i64, num_bytes: usize) {
    for i in 0..num_bytes {
        buf[pos + i] = ((value >> (8 * i)) & 0xFF) as u8;
    }
}

/// Consumes exactly `num_bytes` bytes at `buf[pos..]`, the way
/// `de::parser::utils::be_u64_n` consumes a fixed-width run via `nom`'s
/// `take` instead of hand-checking a slice range. Fails malformed on
/// short input rather than panicking.
fn take_bytes(buf: &[u8], pos: usize, num_bytes: usize) -> Result<&[u8]> {
    check_index(pos, buf.len())?;
    let parser: IResult<&[u8], &[u8]> = take(num_bytes)(&buf[pos..]);
    parser.map(|(_, bytes)| bytes).map_err(|_: nom::Err<(&[u8], nom::error::ErrorKind)>| Error::Malformed)
}

/// Reads an unsigned little-endian integer from `buf[pos..pos + num_bytes]`.
///
/// Fails malformed if the top bit of a 4-byte read is set, since that would
/// decode to a negative value in signed-32 interpretation and this format
/// never produces offsets or sizes above the 16 MiB ceiling.
pub fn read_unsigned(buf: &[u8], pos: usize, num_bytes: usize) -> Result<u32> {
    let bytes = take_bytes(buf, pos, num_bytes)?;

    let mut result: u32 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        result |= (byte as u32) << (8 * i);
    }
    if num_bytes == U32_SIZE && (result & 0x8000_0000) != 0 {
        return Err(Error::Malformed);
    }
    Ok(result)
}

/// Reads a little-endian signed integer from `buf[pos..pos + num_bytes]`,
/// sign-extending the most significant byte.
pub fn read_signed(buf: &[u8], pos: usize, num_bytes: usize) -> Result<i64> {
    let bytes = take_bytes(buf, pos, num_bytes)?;

    let mut result: i64 = 0;
    for (i, &byte) in bytes[..num_bytes - 1].iter().enumerate() {
        result |= (byte as i64) << (8 * i);
    }
    let msb = bytes[num_bytes - 1] as i8;
    result |= (msb as i64) << (8 * (num_bytes - 1));
    Ok(result)
}

pub fn primitive_header(type_id: u8) -> u8 {
    (type_id << BASIC_TYPE_BITS) | BASIC_TYPE_PRIMITIVE
}

pub fn short_str_header(len: u8) -> u8 {
    (len << BASIC_TYPE_BITS) | BASIC_TYPE_SHORT_STR
}

pub fn object_header(large_size: bool, id_size: u8, offset_size: u8) -> u8 {
    (((large_size as u8) << (BASIC_TYPE_BITS + 4))
        | ((id_size - 1) << (BASIC_TYPE_BITS + 2))
        | ((offset_size - 1) << BASIC_TYPE_BITS))
        | BASIC_TYPE_OBJECT
}

pub fn array_header(large_size: bool, offset_size: u8) -> u8 {
    (((large_size as u8) << (BASIC_TYPE_BITS + 2)) | ((offset_size - 1) << BASIC_TYPE_BITS))
        | BASIC_TYPE_ARRAY
}

/// The header byte's basic type field: primitive, short-string, object, or array.
pub fn basic_type(buf: &[u8], pos: usize) -> Result<u8> {
    check_index(pos, buf.len())?;
    Ok(buf[pos] & BASIC_TYPE_MASK)
}

/// The header byte's 6-bit type_info field.
pub fn type_info(buf: &[u8], pos: usize) -> Result<u8> {
    check_index(pos, buf.len())?;
    Ok((buf[pos] >> BASIC_TYPE_BITS) & TYPE_INFO_MASK)
}

/// Dispatches the basic type, then (for primitives) the sub-type, into the
/// logical [`Type`] callers observe.
pub fn get_type(buf: &[u8], pos: usize) -> Result<Type> {
    check_index(pos, buf.len())?;
    let basic = basic_type(buf, pos)?;
    let info = type_info(buf, pos)?;

    match basic {
        BASIC_TYPE_SHORT_STR => Ok(Type::String),
        BASIC_TYPE_OBJECT => Ok(Type::Object),
        BASIC_TYPE_ARRAY => Ok(Type::Array),
        _ => match info {
            PRIMITIVE_NULL => Ok(Type::Null),
            PRIMITIVE_TRUE | PRIMITIVE_FALSE => Ok(Type::Boolean),
            PRIMITIVE_INT1 | PRIMITIVE_INT2 | PRIMITIVE_INT4 | PRIMITIVE_INT8 => Ok(Type::Long),
            PRIMITIVE_DOUBLE => Ok(Type::Double),
            PRIMITIVE_DECIMAL4 | PRIMITIVE_DECIMAL8 | PRIMITIVE_DECIMAL16 => Ok(Type::Decimal),
            PRIMITIVE_DATE => Ok(Type::Date),
            PRIMITIVE_TIMESTAMP => Ok(Type::Timestamp),
            PRIMITIVE_TIMESTAMP_NTZ => Ok(Type::TimestampNtz),
            PRIMITIVE_FLOAT => Ok(Type::Float),
            PRIMITIVE_BINARY => Ok(Type::Binary),
            PRIMITIVE_LONG_STR => Ok(Type::String),
            PRIMITIVE_UUID => Ok(Type::Uuid),
            other => Err(Error::UnknownPrimitiveType(other)),
        },
    }
}

/// Header decoded for a value whose basic type is `object`.
#[derive(Copy, Clone, Debug)]
pub struct ObjectHeader {
    pub size: usize,
    pub id_size: usize,
    pub offset_size: usize,
    pub id_start: usize,
    pub offset_start: usize,
    pub data_start: usize,
}

/// Header decoded for a value whose basic type is `array`.
#[derive(Copy, Clone, Debug)]
pub struct ArrayHeader {
    pub size: usize,
    pub offset_size: usize,
    pub offset_start: usize,
    pub data_start: usize,
}

/// Decodes the header of an object at `pos`. Returns a value type rather
/// than invoking a callback, since Rust closures borrowing the caller's
/// state awkwardly compose with the recursive navigation this format needs.
pub fn decode_object_header(buf: &[u8], pos: usize) -> Result<ObjectHeader> {
    check_index(pos, buf.len())?;
    if basic_type(buf, pos)? != BASIC_TYPE_OBJECT {
        return Err(Error::UnexpectedType(Type::Object));
    }
    let info = type_info(buf, pos)?;

    let large_size = (info >> 4) & 0x1 != 0;
    let size_bytes = if large_size { U32_SIZE } else { 1 };
    let size = read_unsigned(buf, pos + 1, size_bytes)? as usize;

    let id_size = (((info >> 2) & 0x3) + 1) as usize;
    let offset_size = ((info & 0x3) + 1) as usize;

    let id_start = pos + 1 + size_bytes;
    let offset_start = id_start + size * id_size;
    let data_start = offset_start + (size + 1) * offset_size;

    Ok(ObjectHeader {
        size,
        id_size,
        offset_size,
        id_start,
        offset_start,
        data_start,
    })
}

/// Decodes the header of an array at `pos`.
pub fn decode_array_header(buf: &[u8], pos: usize) -> Result<ArrayHeader> {
    check_index(pos, buf.len())?;
    if basic_type(buf, pos)? != BASIC_TYPE_ARRAY {
        return Err(Error::UnexpectedType(Type::Array));
    }
    let info = type_info(buf, pos)?;

    let large_size = (info >> 2) & 0x1 != 0;
    let size_bytes = if large_size { U32_SIZE } else { 1 };
    let size = read_unsigned(buf, pos + 1, size_bytes)? as usize;

    let offset_size = ((info & 0x3) + 1) as usize;
    let offset_start = pos + 1 + size_bytes;
    let data_start = offset_start + (size + 1) * offset_size;

    Ok(ArrayHeader {
        size,
        offset_size,
        offset_start,
        data_start,
    })
}

/// Computes the byte length of the subtree rooted at `pos`.
pub fn value_size(buf: &[u8], pos: usize) -> Result<usize> {
    check_index(pos, buf.len())?;
    let basic = basic_type(buf, pos)?;
    let info = type_info(buf, pos)?;

    match basic {
        BASIC_TYPE_SHORT_STR => Ok(1 + info as usize),
        BASIC_TYPE_OBJECT => {
            let header = decode_object_header(buf, pos)?;
            let last_offset = read_unsigned(
                buf,
                header.offset_start + header.size * header.offset_size,
                header.offset_size,
            )?;
            Ok(header.data_start - pos + last_offset as usize)
        }
        BASIC_TYPE_ARRAY => {
            let header = decode_array_header(buf, pos)?;
            let last_offset = read_unsigned(
                buf,
                header.offset_start + header.size * header.offset_size,
                header.offset_size,
            )?;
            Ok(header.data_start - pos + last_offset as usize)
        }
        _ => match info {
            PRIMITIVE_NULL | PRIMITIVE_TRUE | PRIMITIVE_FALSE => Ok(1),
            PRIMITIVE_INT1 => Ok(2),
            PRIMITIVE_INT2 => Ok(3),
            PRIMITIVE_INT4 | PRIMITIVE_DATE | PRIMITIVE_FLOAT => Ok(5),
            PRIMITIVE_INT8 | PRIMITIVE_DOUBLE | PRIMITIVE_TIMESTAMP | PRIMITIVE_TIMESTAMP_NTZ => {
                Ok(9)
            }
            PRIMITIVE_DECIMAL4 => Ok(6),
            PRIMITIVE_DECIMAL8 => Ok(10),
            PRIMITIVE_DECIMAL16 => Ok(18),
            PRIMITIVE_BINARY | PRIMITIVE_LONG_STR => {
                Ok(1 + U32_SIZE + read_unsigned(buf, pos + 1, U32_SIZE)? as usize)
            }
            PRIMITIVE_UUID => Ok(17),
            other => Err(Error::UnknownPrimitiveType(other)),
        },
    }
}

/// Chooses the smallest unsigned integer width in `{1, 2, 3, 4}` that holds
/// `value`. Shared by the builder's header sizing and the shredding
/// writer's residual-object path.
///
/// `value` can reach `SIZE_LIMIT` itself (a container's data region is
/// allowed to be exactly 16 MiB), which needs the full 4-byte width —
/// `U24_MAX` alone isn't enough headroom.
pub fn integer_size(value: usize) -> u8 {
    debug_assert!(value <= SIZE_LIMIT);
    if value <= U8_MAX {
        1
    } else if value <= U16_MAX {
        2
    } else if value <= U24_MAX {
        U24_SIZE as u8
    } else {
        U32_SIZE as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_round_trip_basic_type_bits() {
        let h = primitive_header(PRIMITIVE_INT4);
        assert_eq!(h & BASIC_TYPE_MASK, BASIC_TYPE_PRIMITIVE);
        assert_eq!((h >> BASIC_TYPE_BITS) & TYPE_INFO_MASK, PRIMITIVE_INT4);

        let h = short_str_header(5);
        assert_eq!(h & BASIC_TYPE_MASK, BASIC_TYPE_SHORT_STR);
        assert_eq!((h >> BASIC_TYPE_BITS) & TYPE_INFO_MASK, 5);

        let h = object_header(true, 3, 2);
        assert_eq!(h & BASIC_TYPE_MASK, BASIC_TYPE_OBJECT);

        let h = array_header(false, 1);
        assert_eq!(h & BASIC_TYPE_MASK, BASIC_TYPE_ARRAY);
    }

    #[test]
    fn read_unsigned_rejects_top_bit_in_four_byte_read() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(read_unsigned(&buf, 0, 4), Err(Error::Malformed));
    }

    #[test]
    fn read_signed_sign_extends() {
        let buf = [0xFFu8];
        assert_eq!(read_signed(&buf, 0, 1).unwrap(), -1);
        let buf = [0x00u8, 0x80];
        assert_eq!(read_signed(&buf, 0, 2).unwrap(), -32768);
    }

    #[test]
    fn integer_size_boundaries() {
        assert_eq!(integer_size(0), 1);
        assert_eq!(integer_size(255), 1);
        assert_eq!(integer_size(256), 2);
        assert_eq!(integer_size(65535), 2);
        assert_eq!(integer_size(65536), 3);
        assert_eq!(integer_size(U24_MAX), 3);
        assert_eq!(integer_size(U24_MAX + 1), 4);
        assert_eq!(integer_size(SIZE_LIMIT), 4);
    }

    #[test]
    fn read_unsigned_reports_malformed_instead_of_panicking_on_short_input() {
        let buf = [0x01u8];
        assert_eq!(read_unsigned(&buf, 0, 4), Err(Error::Malformed));
        assert_eq!(read_signed(&buf, 1, 1), Err(Error::Malformed));
    }
}
