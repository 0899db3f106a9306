//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The incremental Variant builder.
//!
//! `VariantBuilder` writes value bytes into a growing buffer as a caller
//! walks some source tree (JSON, another Variant, a row of typed columns),
//! deferring object and array headers until all of a container's children
//! have been written and their total size is known. Keys are interned into
//! a dictionary that is only finalized, sorted into its wire form, when
//! [`VariantBuilder::result`] is called.

use std::collections::HashMap;

use crate::codec::{self, U32_SIZE};
use crate::decimal::VariantDecimal;
use crate::error::{Error, Result};
use crate::variant::Variant;

/// A field written into an in-progress object: its key, its dictionary id
/// in this builder's metadata, and its byte offset relative to the start
/// of the object's data (before the header has been inserted).
#[derive(Clone, Debug)]
pub struct FieldEntry {
    pub key: String,
    pub id: u32,
    pub offset: usize,
}

impl FieldEntry {
    pub fn new(key: String, id: u32, offset: usize) -> Self {
        FieldEntry { key, id, offset }
    }

    fn with_offset(&self, offset: usize) -> Self {
        FieldEntry {
            key: self.key.clone(),
            id: self.id,
            offset,
        }
    }
}

/// Incrementally builds a Variant `(value, metadata)` pair.
#[derive(Debug)]
pub struct VariantBuilder {
    write_buffer: Vec<u8>,
    write_pos: usize,
    dictionary: HashMap<String, u32>,
    dictionary_keys: Vec<String>,
    allow_duplicate_keys: bool,
    /// Populated by [`Self::result`], which needs somewhere for the
    /// assembled metadata bytes to live so the `Variant<'_>` it returns
    /// can borrow from `self` rather than a value that would go out of
    /// scope immediately.
    metadata: Vec<u8>,
}

impl Default for VariantBuilder {
    fn default() -> Self {
        VariantBuilder::new(false)
    }
}

impl VariantBuilder {
    /// Creates an empty builder. When `allow_duplicate_keys` is false,
    /// [`Self::finish_writing_object`] fails with [`Error::DuplicateKey`]
    /// on repeated keys; when true, the field with the greatest write
    /// offset (the one written last) wins and the rest are discarded.
    pub fn new(allow_duplicate_keys: bool) -> Self {
        VariantBuilder {
            write_buffer: vec![0; 128],
            write_pos: 0,
            dictionary: HashMap::new(),
            dictionary_keys: Vec::new(),
            allow_duplicate_keys,
            metadata: Vec::new(),
        }
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Bytes written to the value buffer so far.
    pub fn len(&self) -> usize {
        self.write_pos
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    /// Current allocated capacity of the value buffer, before the next growth.
    pub fn capacity(&self) -> usize {
        self.write_buffer.len()
    }

    /// Interns `key`, returning its dictionary id. Repeated calls with the
    /// same key return the same id.
    pub fn add_key(&mut self, key: &str) -> u32 {
        if let Some(&id) = self.dictionary.get(key) {
            return id;
        }
        let id = self.dictionary_keys.len() as u32;
        self.dictionary.insert(key.to_owned(), id);
        self.dictionary_keys.push(key.to_owned());
        id
    }

    pub fn append_null(&mut self) -> Result<()> {
        self.check_capacity(1)?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_NULL));
        Ok(())
    }

    pub fn append_boolean(&mut self, value: bool) -> Result<()> {
        self.check_capacity(1)?;
        let type_info = if value { codec::PRIMITIVE_TRUE } else { codec::PRIMITIVE_FALSE };
        self.push_byte(codec::primitive_header(type_info));
        Ok(())
    }

    /// Appends a signed integer, choosing the narrowest of INT1/2/4/8 that
    /// holds it.
    pub fn append_long(&mut self, value: i64) -> Result<()> {
        self.check_capacity(1 + 8)?;
        if (-128..128).contains(&value) {
            self.push_byte(codec::primitive_header(codec::PRIMITIVE_INT1));
            self.push_le(value, 1);
        } else if (-32768..32768).contains(&value) {
            self.push_byte(codec::primitive_header(codec::PRIMITIVE_INT2));
            self.push_le(value, 2);
        } else if (-2_147_483_648..2_147_483_648).contains(&value) {
            self.push_byte(codec::primitive_header(codec::PRIMITIVE_INT4));
            self.push_le(value, 4);
        } else {
            self.push_byte(codec::primitive_header(codec::PRIMITIVE_INT8));
            self.push_le(value, 8);
        }
        Ok(())
    }

    pub fn append_double(&mut self, value: f64) -> Result<()> {
        self.check_capacity(1 + 8)?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_DOUBLE));
        self.push_bytes(&value.to_le_bytes());
        Ok(())
    }

    pub fn append_float(&mut self, value: f32) -> Result<()> {
        self.check_capacity(1 + 4)?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_FLOAT));
        self.push_bytes(&value.to_le_bytes());
        Ok(())
    }

    /// Appends a decimal, choosing the narrowest of DECIMAL4/8/16 that
    /// holds both its scale and its digit count.
    pub fn append_decimal(&mut self, value: VariantDecimal) -> Result<()> {
        self.check_capacity(2 + 16)?;
        let scale = value.scale();
        let unscaled = value.unscaled();
        let type_info = value.narrowest_type_info();

        self.push_byte(codec::primitive_header(type_info));
        self.push_byte(scale);

        match type_info {
            codec::PRIMITIVE_DECIMAL4 => self.push_le(unscaled as i64, 4),
            codec::PRIMITIVE_DECIMAL8 => self.push_le(unscaled as i64, 8),
            _ => {
                let be = unscaled.to_be_bytes();
                let mut reversed = [0u8; 16];
                for i in 0..16 {
                    reversed[i] = be[15 - i];
                }
                self.push_bytes(&reversed);
            }
        }
        Ok(())
    }

    pub fn append_date(&mut self, days_since_epoch: i32) -> Result<()> {
        self.check_capacity(1 + 4)?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_DATE));
        self.push_le(days_since_epoch as i64, 4);
        Ok(())
    }

    pub fn append_timestamp(&mut self, micros_since_epoch: i64) -> Result<()> {
        self.check_capacity(1 + 8)?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_TIMESTAMP));
        self.push_le(micros_since_epoch, 8);
        Ok(())
    }

    pub fn append_timestamp_ntz(&mut self, micros_since_epoch: i64) -> Result<()> {
        self.check_capacity(1 + 8)?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_TIMESTAMP_NTZ));
        self.push_le(micros_since_epoch, 8);
        Ok(())
    }

    pub fn append_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_capacity(1 + U32_SIZE + bytes.len())?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_BINARY));
        self.push_le(bytes.len() as i64, U32_SIZE);
        self.push_bytes(bytes);
        Ok(())
    }

    pub fn append_string(&mut self, s: &str) -> Result<()> {
        let text = s.as_bytes();
        let long_str = text.len() > codec::MAX_SHORT_STR_SIZE;
        self.check_capacity((if long_str { 1 + U32_SIZE } else { 1 }) + text.len())?;

        if long_str {
            self.push_byte(codec::primitive_header(codec::PRIMITIVE_LONG_STR));
            self.push_le(text.len() as i64, U32_SIZE);
        } else {
            self.push_byte(codec::short_str_header(text.len() as u8));
        }
        self.push_bytes(text);
        Ok(())
    }

    pub fn append_uuid(&mut self, uuid: uuid::Uuid) -> Result<()> {
        self.check_capacity(1 + 16)?;
        self.push_byte(codec::primitive_header(codec::PRIMITIVE_UUID));
        self.push_bytes(uuid.as_bytes());
        Ok(())
    }

    /// Finishes an object whose children were written starting at `start`
    /// (a value previously captured from [`Self::write_pos`]). `fields`
    /// records each child's key, dictionary id, and offset relative to
    /// `start`, in the order they were written.
    pub fn finish_writing_object(&mut self, start: usize, mut fields: Vec<FieldEntry>) -> Result<()> {
        let mut size = fields.len();
        fields.sort_by(|a, b| a.key.cmp(&b.key));
        let max_id = fields.iter().map(|f| f.id).max().unwrap_or(0);

        if self.allow_duplicate_keys {
            let mut distinct = Vec::with_capacity(size);
            let mut i = 0;
            while i < size {
                let mut winner = fields[i].clone();
                let mut j = i + 1;
                while j < size && fields[j].key == winner.key {
                    if fields[j].offset > winner.offset {
                        winner = fields[j].clone();
                    }
                    j += 1;
                }
                distinct.push(winner);
                i = j;
            }

            if distinct.len() < size {
                tracing::debug!(key_count = size, distinct_count = distinct.len(), "resolving duplicate object keys");
                fields = distinct;
                size = fields.len();
                fields.sort_by_key(|f| f.offset);

                let mut current_offset = 0usize;
                for field in fields.iter_mut() {
                    let old_offset = field.offset;
                    let field_size = codec::value_size(&self.write_buffer, start + old_offset)?;
                    if current_offset != old_offset {
                        self.write_buffer.copy_within(
                            start + old_offset..start + old_offset + field_size,
                            start + current_offset,
                        );
                    }
                    *field = field.with_offset(current_offset);
                    current_offset += field_size;
                }
                self.write_pos = start + current_offset;
                fields.sort_by(|a, b| a.key.cmp(&b.key));
            }
        } else {
            for i in 1..size {
                if fields[i].key == fields[i - 1].key {
                    return Err(Error::DuplicateKey(fields[i].key.clone()));
                }
            }
        }

        let data_size = self.write_pos - start;
        let large_size = size > codec::U8_MAX;
        let size_bytes = if large_size { U32_SIZE } else { 1 };
        let id_size = codec::integer_size(max_id as usize) as usize;
        let offset_size = codec::integer_size(data_size) as usize;

        let header_size = 1 + size_bytes + size * id_size + (size + 1) * offset_size;
        self.check_capacity(header_size)?;

        self.write_buffer.copy_within(start..start + data_size, start + header_size);
        self.write_pos += header_size;

        self.write_buffer[start] = codec::object_header(large_size, id_size as u8, offset_size as u8);
        codec::write_le(&mut self.write_buffer, start + 1, size as i64, size_bytes);

        let id_start = start + 1 + size_bytes;
        let offset_start = id_start + size * id_size;
        for (i, field) in fields.iter().enumerate() {
            codec::write_le(&mut self.write_buffer, id_start + i * id_size, field.id as i64, id_size);
            codec::write_le(
                &mut self.write_buffer,
                offset_start + i * offset_size,
                field.offset as i64,
                offset_size,
            );
        }
        codec::write_le(
            &mut self.write_buffer,
            offset_start + size * offset_size,
            data_size as i64,
            offset_size,
        );
        Ok(())
    }

    /// Finishes an array whose elements were written starting at `start`.
    /// `offsets[i]` is the byte offset of element `i` relative to `start`.
    pub fn finish_writing_array(&mut self, start: usize, offsets: Vec<usize>) -> Result<()> {
        let size = offsets.len();
        let data_size = self.write_pos - start;
        let large_size = size > codec::U8_MAX;
        let size_bytes = if large_size { U32_SIZE } else { 1 };
        let offset_size = codec::integer_size(data_size) as usize;

        let header_size = 1 + size_bytes + (size + 1) * offset_size;
        self.check_capacity(header_size)?;

        self.write_buffer.copy_within(start..start + data_size, start + header_size);
        self.write_pos += header_size;

        self.write_buffer[start] = codec::array_header(large_size, offset_size as u8);
        codec::write_le(&mut self.write_buffer, start + 1, size as i64, size_bytes);

        let offset_start = start + 1 + size_bytes;
        for (i, offset) in offsets.iter().enumerate() {
            codec::write_le(&mut self.write_buffer, offset_start + i * offset_size, *offset as i64, offset_size);
        }
        codec::write_le(
            &mut self.write_buffer,
            offset_start + size * offset_size,
            data_size as i64,
            offset_size,
        );
        Ok(())
    }

    /// Appends a deep copy of `source`, re-interning its keys into this
    /// builder's dictionary (so the result is valid regardless of what
    /// dictionary `source` was read against).
    pub fn append_variant(&mut self, source: Variant<'_>) -> Result<()> {
        self.append_variant_at(source.value, source.metadata, source.pos)
    }

    fn append_variant_at(&mut self, value: &[u8], metadata: &[u8], pos: usize) -> Result<()> {
        codec::check_index(pos, value.len())?;
        match codec::basic_type(value, pos)? {
            codec::BASIC_TYPE_OBJECT => {
                let h = codec::decode_object_header(value, pos)?;
                let start = self.write_pos;
                let mut fields = Vec::with_capacity(h.size);
                for i in 0..h.size {
                    let id = codec::read_unsigned(value, h.id_start + h.id_size * i, h.id_size)?;
                    let offset = codec::read_unsigned(value, h.offset_start + h.offset_size * i, h.offset_size)?;
                    let key = crate::variant::get_metadata_key(metadata, id)?;
                    let new_id = self.add_key(&key);
                    fields.push(FieldEntry::new(key, new_id, self.write_pos - start));
                    self.append_variant_at(value, metadata, h.data_start + offset as usize)?;
                }
                self.finish_writing_object(start, fields)
            }
            codec::BASIC_TYPE_ARRAY => {
                let h = codec::decode_array_header(value, pos)?;
                let start = self.write_pos;
                let mut offsets = Vec::with_capacity(h.size);
                for i in 0..h.size {
                    let offset = codec::read_unsigned(value, h.offset_start + h.offset_size * i, h.offset_size)?;
                    offsets.push(self.write_pos - start);
                    self.append_variant_at(value, metadata, h.data_start + offset as usize)?;
                }
                self.finish_writing_array(start, offsets)
            }
            _ => self.shallow_append_variant_at(value, pos),
        }
    }

    /// Appends the raw bytes of `source` verbatim, without re-interning
    /// keys. Only safe when `source` was read against the same metadata
    /// dictionary this builder will produce (e.g. when reassembling a
    /// shredded row from typed and residual columns that already share a
    /// metadata dictionary).
    pub fn shallow_append_variant(&mut self, source: Variant<'_>) -> Result<()> {
        self.shallow_append_variant_at(source.value, source.pos)
    }

    fn shallow_append_variant_at(&mut self, value: &[u8], pos: usize) -> Result<()> {
        let size = codec::value_size(value, pos)?;
        codec::check_index(pos + size - 1, value.len())?;
        self.check_capacity(size)?;
        let dest = self.write_pos;
        self.write_buffer[dest..dest + size].copy_from_slice(&value[pos..pos + size]);
        self.write_pos += size;
        Ok(())
    }

    /// Assembles the metadata dictionary and returns a Variant borrowing
    /// from this builder. Calling this again re-assembles the metadata
    /// (cheap unless the dictionary is large) and invalidates any
    /// previously returned `Variant`.
    pub fn result(&mut self) -> Result<Variant<'_>> {
        self.metadata = self.build_metadata()?;
        Variant::from_parts(&self.write_buffer[..self.write_pos], &self.metadata)
    }

    /// Consumes the builder, returning the finished `(value, metadata)`
    /// byte buffers.
    pub fn into_parts(self) -> Result<(Vec<u8>, Vec<u8>)> {
        let metadata = self.build_metadata()?;
        Ok((self.write_buffer[..self.write_pos].to_vec(), metadata))
    }

    /// The value bytes written so far, without a metadata dictionary.
    pub fn value_without_metadata(&self) -> &[u8] {
        &self.write_buffer[..self.write_pos]
    }

    fn build_metadata(&self) -> Result<Vec<u8>> {
        let num_keys = self.dictionary_keys.len();
        let dictionary_string_size: usize = self.dictionary_keys.iter().map(|k| k.len()).sum();
        let max_size = dictionary_string_size.max(num_keys);
        if max_size > codec::SIZE_LIMIT {
            return Err(Error::SizeLimit);
        }
        let offset_size = codec::integer_size(max_size) as usize;

        let offset_start = 1 + offset_size;
        let string_start = offset_start + (num_keys + 1) * offset_size;
        let metadata_size = string_start + dictionary_string_size;
        if metadata_size > codec::SIZE_LIMIT {
            return Err(Error::SizeLimit);
        }

        let mut metadata = vec![0u8; metadata_size];
        metadata[0] = codec::VERSION | (((offset_size - 1) as u8) << 6);
        codec::write_le(&mut metadata, 1, num_keys as i64, offset_size);

        let mut current_offset = 0usize;
        for (i, key) in self.dictionary_keys.iter().enumerate() {
            codec::write_le(&mut metadata, offset_start + i * offset_size, current_offset as i64, offset_size);
            let bytes = key.as_bytes();
            metadata[string_start + current_offset..string_start + current_offset + bytes.len()]
                .copy_from_slice(bytes);
            current_offset += bytes.len();
        }
        codec::write_le(
            &mut metadata,
            offset_start + num_keys * offset_size,
            current_offset as i64,
            offset_size,
        );
        Ok(metadata)
    }

    fn push_byte(&mut self, byte: u8) {
        self.write_buffer[self.write_pos] = byte;
        self.write_pos += 1;
    }

    fn push_le(&mut self, value: i64, num_bytes: usize) {
        codec::write_le(&mut self.write_buffer, self.write_pos, value, num_bytes);
        self.write_pos += num_bytes;
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.write_buffer[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
    }

    fn check_capacity(&mut self, additional: usize) -> Result<()> {
        let required = self.write_pos + additional;
        if required <= self.write_buffer.len() {
            return Ok(());
        }
        let mut new_capacity = self.write_buffer.len().max(1);
        while new_capacity < required {
            new_capacity *= 2;
        }
        if new_capacity > codec::SIZE_LIMIT {
            tracing::debug!(required, limit = codec::SIZE_LIMIT, "variant builder exceeded size limit");
            return Err(Error::SizeLimit);
        }
        tracing::trace!(from = self.write_buffer.len(), to = new_capacity, "growing variant builder buffer");
        self.write_buffer.resize(new_capacity, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_picks_narrowest_width() {
        let mut b = VariantBuilder::default();
        b.append_long(5).unwrap();
        let (value, _) = b.into_parts().unwrap();
        assert_eq!(codec::type_info(&value, 0).unwrap(), codec::PRIMITIVE_INT1);

        let mut b = VariantBuilder::default();
        b.append_long(40_000).unwrap();
        let (value, _) = b.into_parts().unwrap();
        assert_eq!(codec::type_info(&value, 0).unwrap(), codec::PRIMITIVE_INT4);
    }

    #[test]
    fn duplicate_keys_rejected_by_default() {
        let mut b = VariantBuilder::default();
        let start = b.write_pos();
        let id_a = b.add_key("a");
        b.append_long(1).unwrap();
        let id_a2 = b.add_key("a");
        let offset2 = b.write_pos() - start;
        b.append_long(2).unwrap();
        let fields = vec![
            FieldEntry::new("a".into(), id_a, 0),
            FieldEntry::new("a".into(), id_a2, offset2),
        ];
        assert_eq!(b.finish_writing_object(start, fields), Err(Error::DuplicateKey("a".into())));
    }

    #[test]
    fn duplicate_keys_keep_last_when_allowed() {
        let mut b = VariantBuilder::new(true);
        let start = b.write_pos();
        let id_a = b.add_key("a");
        b.append_long(1).unwrap();
        let id_a2 = b.add_key("a");
        let offset2 = b.write_pos() - start;
        b.append_long(2).unwrap();
        let fields = vec![
            FieldEntry::new("a".into(), id_a, 0),
            FieldEntry::new("a".into(), id_a2, offset2),
        ];
        b.finish_writing_object(start, fields).unwrap();
        let (value, metadata) = b.into_parts().unwrap();
        let variant = Variant::from_parts(&value, &metadata).unwrap();
        assert_eq!(variant.object_size().unwrap(), 1);
        assert_eq!(variant.get_field_by_key("a").unwrap().unwrap().get_long().unwrap(), 2);
    }

    #[test]
    fn array_round_trips() {
        let mut b = VariantBuilder::default();
        let start = b.write_pos();
        let mut offsets = Vec::new();
        offsets.push(b.write_pos() - start);
        b.append_string("x").unwrap();
        offsets.push(b.write_pos() - start);
        b.append_boolean(false).unwrap();
        b.finish_writing_array(start, offsets).unwrap();

        let (value, metadata) = b.into_parts().unwrap();
        let variant = Variant::from_parts(&value, &metadata).unwrap();
        assert_eq!(variant.array_size().unwrap(), 2);
        assert_eq!(variant.get_element_at_index(0).unwrap().unwrap().get_string().unwrap(), "x");
    }
}
