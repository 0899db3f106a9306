//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The Variant reader.
//!
//! A `Variant` is a lightweight, immutable view over a `(value, metadata)`
//! byte pair plus a cursor `pos` into `value`. Navigating a `Variant` never
//! mutates the underlying buffers and is safe to share across threads so
//! long as nothing else mutates them concurrently.

use std::fmt::Write as _;

use crate::codec::{self, U32_SIZE, VERSION, VERSION_MASK};
use crate::decimal::VariantDecimal;
use crate::error::{Error, Result};

/// The logical type of a Variant value, as observed by callers (as opposed
/// to the on-wire basic-type/type_info split).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Type {
    Object,
    Array,
    Null,
    Boolean,
    Long,
    String,
    Double,
    Decimal,
    Date,
    Timestamp,
    TimestampNtz,
    Float,
    Binary,
    Uuid,
}

/// One `(key, value)` pair returned by [`Variant::get_field_at_index`].
#[derive(Clone, Debug)]
pub struct ObjectField<'a> {
    pub key: String,
    pub value: Variant<'a>,
}

/// An immutable view over a Variant value.
#[derive(Copy, Clone, Debug)]
pub struct Variant<'a> {
    pub value: &'a [u8],
    pub metadata: &'a [u8],
    pub pos: usize,
}

impl<'a> Variant<'a> {
    /// Constructs a Variant rooted at `pos` within `value`, sharing
    /// `metadata` with it. Fails malformed if the metadata header is not a
    /// recognized version, and fails size-limit if either buffer exceeds
    /// 16 MiB.
    pub fn new(value: &'a [u8], metadata: &'a [u8], pos: usize) -> Result<Self> {
        if metadata.is_empty() || (metadata[0] & VERSION_MASK) != VERSION {
            return Err(Error::Malformed);
        }
        if metadata.len() > codec::SIZE_LIMIT || value.len() > codec::SIZE_LIMIT {
            return Err(Error::SizeLimit);
        }
        Ok(Variant { value, metadata, pos })
    }

    /// Constructs a Variant rooted at the start of `value`.
    pub fn from_parts(value: &'a [u8], metadata: &'a [u8]) -> Result<Self> {
        Self::new(value, metadata, 0)
    }

    /// Returns a new view of the same buffers rooted at `pos`.
    fn at(&self, pos: usize) -> Variant<'a> {
        Variant {
            value: self.value,
            metadata: self.metadata,
            pos,
        }
    }

    /// Raw bytes of just this node's subtree (header, payload, and for
    /// containers the full offset table and child data).
    pub fn value_bytes(&self) -> Result<&'a [u8]> {
        let size = codec::value_size(self.value, self.pos)?;
        codec::check_index(self.pos + size - 1, self.value.len())?;
        Ok(&self.value[self.pos..self.pos + size])
    }

    pub fn get_type(&self) -> Result<Type> {
        codec::get_type(self.value, self.pos)
    }

    fn require_primitive(&self, expected_info: &[u8], expected: Type) -> Result<u8> {
        codec::check_index(self.pos, self.value.len())?;
        let basic = codec::basic_type(self.value, self.pos)?;
        let info = codec::type_info(self.value, self.pos)?;
        if basic != codec::BASIC_TYPE_PRIMITIVE || !expected_info.contains(&info) {
            return Err(Error::UnexpectedType(expected));
        }
        Ok(info)
    }

    pub fn get_boolean(&self) -> Result<bool> {
        let info = self.require_primitive(&[codec::PRIMITIVE_TRUE, codec::PRIMITIVE_FALSE], Type::Boolean)?;
        Ok(info == codec::PRIMITIVE_TRUE)
    }

    /// Accepts any of INT1/INT2/INT4/INT8, plus DATE/TIMESTAMP/TIMESTAMP_NTZ
    /// for raw-integer access in shredding paths.
    pub fn get_long(&self) -> Result<i64> {
        let info = self.require_primitive(
            &[
                codec::PRIMITIVE_INT1,
                codec::PRIMITIVE_INT2,
                codec::PRIMITIVE_INT4,
                codec::PRIMITIVE_INT8,
                codec::PRIMITIVE_DATE,
                codec::PRIMITIVE_TIMESTAMP,
                codec::PRIMITIVE_TIMESTAMP_NTZ,
            ],
            Type::Long,
        )?;
        let width = match info {
            codec::PRIMITIVE_INT1 => 1,
            codec::PRIMITIVE_INT2 => 2,
            codec::PRIMITIVE_INT4 | codec::PRIMITIVE_DATE => 4,
            _ => 8,
        };
        codec::read_signed(self.value, self.pos + 1, width)
    }

    pub fn get_double(&self) -> Result<f64> {
        self.require_primitive(&[codec::PRIMITIVE_DOUBLE], Type::Double)?;
        codec::check_index(self.pos + 8, self.value.len())?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.value[self.pos + 1..self.pos + 9]);
        Ok(f64::from_le_bytes(bytes))
    }

    pub fn get_float(&self) -> Result<f32> {
        self.require_primitive(&[codec::PRIMITIVE_FLOAT], Type::Float)?;
        codec::check_index(self.pos + 4, self.value.len())?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.value[self.pos + 1..self.pos + 5]);
        Ok(f32::from_le_bytes(bytes))
    }

    /// Decimal value with trailing fractional zeros stripped.
    pub fn get_decimal(&self) -> Result<VariantDecimal> {
        Ok(self.get_decimal_with_original_scale()?.normalized())
    }

    /// Decimal value preserving the on-wire scale, for round-tripping.
    pub fn get_decimal_with_original_scale(&self) -> Result<VariantDecimal> {
        let info = self.require_primitive(
            &[codec::PRIMITIVE_DECIMAL4, codec::PRIMITIVE_DECIMAL8, codec::PRIMITIVE_DECIMAL16],
            Type::Decimal,
        )?;
        codec::check_index(self.pos + 1, self.value.len())?;
        let scale = self.value[self.pos + 1];

        let (unscaled, max_precision) = match info {
            codec::PRIMITIVE_DECIMAL4 => (
                codec::read_signed(self.value, self.pos + 2, 4)? as i128,
                codec::MAX_DECIMAL4_PRECISION,
            ),
            codec::PRIMITIVE_DECIMAL8 => (
                codec::read_signed(self.value, self.pos + 2, 8)? as i128,
                codec::MAX_DECIMAL8_PRECISION,
            ),
            _ => {
                codec::check_index(self.pos + 17, self.value.len())?;
                let mut be = [0u8; 16];
                for i in 0..16 {
                    be[i] = self.value[self.pos + 17 - i];
                }
                (i128::from_be_bytes(be), codec::MAX_DECIMAL16_PRECISION)
            }
        };

        let result = VariantDecimal::new(unscaled, scale);
        if scale as u32 > max_precision || !result.fits_precision(max_precision) {
            return Err(Error::Malformed);
        }
        Ok(result)
    }

    pub fn get_binary(&self) -> Result<&'a [u8]> {
        self.require_primitive(&[codec::PRIMITIVE_BINARY], Type::Binary)?;
        let start = self.pos + 1 + U32_SIZE;
        let len = codec::read_unsigned(self.value, self.pos + 1, U32_SIZE)? as usize;
        codec::check_range(start, len, self.value.len())?;
        Ok(&self.value[start..start + len])
    }

    pub fn get_string(&self) -> Result<&'a str> {
        codec::check_index(self.pos, self.value.len())?;
        let basic = codec::basic_type(self.value, self.pos)?;
        let info = codec::type_info(self.value, self.pos)?;

        let (start, len) = if basic == codec::BASIC_TYPE_SHORT_STR {
            (self.pos + 1, info as usize)
        } else if basic == codec::BASIC_TYPE_PRIMITIVE && info == codec::PRIMITIVE_LONG_STR {
            (
                self.pos + 1 + U32_SIZE,
                codec::read_unsigned(self.value, self.pos + 1, U32_SIZE)? as usize,
            )
        } else {
            return Err(Error::UnexpectedType(Type::String));
        };
        codec::check_range(start, len, self.value.len())?;
        std::str::from_utf8(&self.value[start..start + len]).map_err(|_| Error::Malformed)
    }

    pub fn get_uuid(&self) -> Result<uuid::Uuid> {
        self.require_primitive(&[codec::PRIMITIVE_UUID], Type::Uuid)?;
        let start = self.pos + 1;
        codec::check_index(start + 15, self.value.len())?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.value[start..start + 16]);
        Ok(uuid::Uuid::from_bytes(bytes))
    }

    /// Number of object fields. Only legal when `get_type()` is `Object`.
    pub fn object_size(&self) -> Result<usize> {
        Ok(codec::decode_object_header(self.value, self.pos)?.size)
    }

    /// Finds the field whose key equals `key`, or `None` if absent. Linear
    /// scan under 32 fields, binary search at or above (field ids are
    /// stored in sorted-by-key order, so binary search is valid).
    pub fn get_field_by_key(&self, key: &str) -> Result<Option<Variant<'a>>> {
        let h = codec::decode_object_header(self.value, self.pos)?;
        const BINARY_SEARCH_THRESHOLD: usize = 32;

        if h.size < BINARY_SEARCH_THRESHOLD {
            for i in 0..h.size {
                let id = codec::read_unsigned(self.value, h.id_start + h.id_size * i, h.id_size)?;
                if get_metadata_key(self.metadata, id)? == key {
                    let offset =
                        codec::read_unsigned(self.value, h.offset_start + h.offset_size * i, h.offset_size)?;
                    return Ok(Some(self.at(h.data_start + offset as usize)));
                }
            }
        } else {
            let (mut low, mut high) = (0i64, h.size as i64 - 1);
            while low <= high {
                let mid = ((low + high) >> 1) as usize;
                let id = codec::read_unsigned(self.value, h.id_start + h.id_size * mid, h.id_size)?;
                let candidate = get_metadata_key(self.metadata, id)?;
                match candidate.as_str().cmp(key) {
                    std::cmp::Ordering::Less => low = mid as i64 + 1,
                    std::cmp::Ordering::Greater => high = mid as i64 - 1,
                    std::cmp::Ordering::Equal => {
                        let offset = codec::read_unsigned(
                            self.value,
                            h.offset_start + h.offset_size * mid,
                            h.offset_size,
                        )?;
                        return Ok(Some(self.at(h.data_start + offset as usize)));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Returns the `(key, value)` pair at `index`, or `None` if out of range.
    pub fn get_field_at_index(&self, index: usize) -> Result<Option<ObjectField<'a>>> {
        let h = codec::decode_object_header(self.value, self.pos)?;
        if index >= h.size {
            return Ok(None);
        }
        let id = codec::read_unsigned(self.value, h.id_start + h.id_size * index, h.id_size)?;
        let offset = codec::read_unsigned(self.value, h.offset_start + h.offset_size * index, h.offset_size)?;
        let key = get_metadata_key(self.metadata, id)?;
        Ok(Some(ObjectField {
            key,
            value: self.at(h.data_start + offset as usize),
        }))
    }

    /// Dictionary id of the field at `index`. Fails malformed if out of range.
    pub fn get_dictionary_id_at_index(&self, index: usize) -> Result<u32> {
        let h = codec::decode_object_header(self.value, self.pos)?;
        if index >= h.size {
            return Err(Error::Malformed);
        }
        codec::read_unsigned(self.value, h.id_start + h.id_size * index, h.id_size)
    }

    /// Number of array elements. Only legal when `get_type()` is `Array`.
    pub fn array_size(&self) -> Result<usize> {
        Ok(codec::decode_array_header(self.value, self.pos)?.size)
    }

    /// Returns the element at `index`, or `None` if out of range.
    pub fn get_element_at_index(&self, index: usize) -> Result<Option<Variant<'a>>> {
        let h = codec::decode_array_header(self.value, self.pos)?;
        if index >= h.size {
            return Ok(None);
        }
        let offset = codec::read_unsigned(self.value, h.offset_start + h.offset_size * index, h.offset_size)?;
        Ok(Some(self.at(h.data_start + offset as usize)))
    }

    /// Renders this Variant as canonical JSON.
    pub fn to_json(&self) -> Result<String> {
        let mut out = String::new();
        self.write_json(&mut out)?;
        Ok(out)
    }

    fn write_json(&self, out: &mut String) -> Result<()> {
        match self.get_type()? {
            Type::Object => {
                let h = codec::decode_object_header(self.value, self.pos)?;
                out.push('{');
                for i in 0..h.size {
                    if i != 0 {
                        out.push(',');
                    }
                    let field = self.get_field_at_index(i)?.expect("index in range");
                    write_json_string(&field.key, out);
                    out.push(':');
                    field.value.write_json(out)?;
                }
                out.push('}');
            }
            Type::Array => {
                let h = codec::decode_array_header(self.value, self.pos)?;
                out.push('[');
                for i in 0..h.size {
                    if i != 0 {
                        out.push(',');
                    }
                    let element = self.get_element_at_index(i)?.expect("index in range");
                    element.write_json(out)?;
                }
                out.push(']');
            }
            Type::Null => out.push_str("null"),
            Type::Boolean => out.push_str(if self.get_boolean()? { "true" } else { "false" }),
            Type::Long => {
                let _ = write!(out, "{}", self.get_long()?);
            }
            Type::String => write_json_string(self.get_string()?, out),
            Type::Double => {
                let _ = write!(out, "{}", format_finite_float(self.get_double()?));
            }
            Type::Float => {
                let _ = write!(out, "{}", format_finite_float(self.get_float()? as f64));
            }
            Type::Decimal => {
                let _ = write!(out, "{}", self.get_decimal()?);
            }
            Type::Date => {
                let days = self.get_long()?;
                let date = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
                    .unwrap()
                    .checked_add_signed(chrono::Duration::days(days))
                    .ok_or(Error::Malformed)?;
                let _ = write!(out, "\"{}\"", date.format("%Y-%m-%d"));
            }
            Type::Timestamp => {
                let micros = self.get_long()?;
                let dt = micros_to_datetime(micros)?;
                let _ = write!(out, "\"{}+0000\"", dt.format("%Y-%m-%d %H:%M:%S%.3f"));
            }
            Type::TimestampNtz => {
                let micros = self.get_long()?;
                let dt = micros_to_datetime(micros)?;
                let _ = write!(out, "\"{}\"", dt.format("%Y-%m-%d %H:%M:%S%.3f"));
            }
            Type::Binary => {
                use base64::Engine as _;
                let encoded = base64::engine::general_purpose::STANDARD.encode(self.get_binary()?);
                let _ = write!(out, "\"{}\"", encoded);
            }
            Type::Uuid => {
                let _ = write!(out, "\"{}\"", self.get_uuid()?);
            }
        }
        Ok(())
    }
}

fn micros_to_datetime(micros: i64) -> Result<chrono::NaiveDateTime> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = micros.rem_euclid(1_000_000) * 1_000;
    chrono::DateTime::from_timestamp(secs, nanos as u32)
        .map(|dt| dt.naive_utc())
        .ok_or(Error::Malformed)
}

fn format_finite_float(value: f64) -> String {
    if value == value.trunc() && value.is_finite() && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Resolves the key string for dictionary id `id` within `metadata`.
pub fn get_metadata_key(metadata: &[u8], id: u32) -> Result<String> {
    codec::check_index(0, metadata.len())?;
    let offset_size = (((metadata[0] >> 6) & 0x3) + 1) as usize;
    let dict_size = codec::read_unsigned(metadata, 1, offset_size)?;

    if id >= dict_size {
        return Err(Error::Malformed);
    }

    let string_start = 1 + (dict_size as usize + 2) * offset_size;
    let offset = codec::read_unsigned(metadata, 1 + (id as usize + 1) * offset_size, offset_size)?;
    let next_offset = codec::read_unsigned(metadata, 1 + (id as usize + 2) * offset_size, offset_size)?;

    if offset > next_offset {
        return Err(Error::Malformed);
    }
    codec::check_range(string_start, next_offset as usize, metadata.len())?;

    std::str::from_utf8(&metadata[string_start + offset as usize..string_start + next_offset as usize])
        .map(str::to_owned)
        .map_err(|_| Error::Malformed)
}

/// Number of keys stored in a metadata dictionary.
pub fn metadata_dictionary_size(metadata: &[u8]) -> Result<u32> {
    codec::check_index(0, metadata.len())?;
    let offset_size = (((metadata[0] >> 6) & 0x3) + 1) as usize;
    codec::read_unsigned(metadata, 1, offset_size)
}
