//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Rebuilding a Variant from its shredded column split.
//!
//! A host implements [`ShreddedRow`] over whatever row/column abstraction
//! it stores shredded data in (this mirrors the shape of Spark's
//! `SpecializedGetters`, without depending on Spark itself); [`rebuild`]
//! walks it back into a single Variant `(value, metadata)` pair.

use crate::builder::{FieldEntry, VariantBuilder};
use crate::error::{Error, Result};
use crate::schema::{IntegralSize, ScalarType, VariantSchema};
use crate::variant::{Type, Variant};

/// A read-only view over one shredded row or struct, indexed by ordinal.
pub trait ShreddedRow: Sized {
    fn is_null_at(&self, ordinal: usize) -> bool;
    fn get_boolean(&self, ordinal: usize) -> bool;
    fn get_byte(&self, ordinal: usize) -> i8;
    fn get_short(&self, ordinal: usize) -> i16;
    fn get_int(&self, ordinal: usize) -> i32;
    fn get_long(&self, ordinal: usize) -> i64;
    fn get_float(&self, ordinal: usize) -> f32;
    fn get_double(&self, ordinal: usize) -> f64;
    fn get_decimal(&self, ordinal: usize, precision: u8, scale: u8) -> crate::decimal::VariantDecimal;
    fn get_string(&self, ordinal: usize) -> String;
    fn get_binary(&self, ordinal: usize) -> Vec<u8>;
    fn get_uuid(&self, ordinal: usize) -> uuid::Uuid;
    /// A nested struct with `num_fields` ordinals, e.g. an object field's
    /// own `(value, typed_value)` pair or an array element.
    fn get_struct(&self, ordinal: usize, num_fields: usize) -> Self;
    /// The array stored at `ordinal`, addressable via [`Self::num_elements`]
    /// and `get_struct`.
    fn get_array(&self, ordinal: usize) -> Self;
    fn num_elements(&self) -> usize;
}

/// Rebuilds the Variant `(value, metadata)` pair described by `row` under
/// `schema`. Only call this with the top-level schema; recursive schema
/// nodes are handled internally.
pub fn rebuild<R: ShreddedRow>(row: &R, schema: &VariantSchema) -> Result<(Vec<u8>, Vec<u8>)> {
    if schema.top_level_metadata_idx < 0 || row.is_null_at(schema.top_level_metadata_idx as usize) {
        return Err(Error::Malformed);
    }
    let metadata = row.get_binary(schema.top_level_metadata_idx as usize);

    if schema.is_unshredded() {
        if row.is_null_at(schema.variant_idx as usize) {
            return Err(Error::Malformed);
        }
        let value = row.get_binary(schema.variant_idx as usize);
        return Ok((value, metadata));
    }

    let mut builder = VariantBuilder::new(false);
    rebuild_into(row, &metadata, schema, &mut builder)?;
    builder.into_parts()
}

fn rebuild_into<R: ShreddedRow>(
    row: &R,
    metadata: &[u8],
    schema: &VariantSchema,
    builder: &mut VariantBuilder,
) -> Result<()> {
    let typed_idx = schema.typed_idx;
    let variant_idx = schema.variant_idx;

    if typed_idx >= 0 && !row.is_null_at(typed_idx as usize) {
        let typed_idx = typed_idx as usize;

        if let Some(scalar) = schema.scalar_schema.as_ref() {
            append_scalar(row, typed_idx, scalar, builder)?;
        } else if let Some(element_schema) = schema.array_schema.as_deref() {
            let array = row.get_array(typed_idx);
            let start = builder.write_pos();
            let mut offsets = Vec::with_capacity(array.num_elements());
            for i in 0..array.num_elements() {
                offsets.push(builder.write_pos() - start);
                let element = array.get_struct(i, element_schema.num_fields);
                rebuild_into(&element, metadata, element_schema, builder)?;
            }
            builder.finish_writing_array(start, offsets)?;
        } else if let Some(object_schema) = schema.object_schema.as_deref() {
            let object_row = row.get_struct(typed_idx, object_schema.len());
            let mut fields = Vec::new();
            let start = builder.write_pos();

            for (field_idx, object_field) in object_schema.iter().enumerate() {
                if object_row.is_null_at(field_idx) {
                    return Err(Error::Malformed);
                }
                let field_schema = &object_field.schema;
                let field_value = object_row.get_struct(field_idx, field_schema.num_fields);

                let present = (field_schema.typed_idx >= 0 && !field_value.is_null_at(field_schema.typed_idx as usize))
                    || (field_schema.variant_idx >= 0
                        && !field_value.is_null_at(field_schema.variant_idx as usize));
                if present {
                    let id = builder.add_key(&object_field.field_name);
                    fields.push(FieldEntry::new(object_field.field_name.clone(), id, builder.write_pos() - start));
                    rebuild_into(&field_value, metadata, field_schema, builder)?;
                }
            }

            if variant_idx >= 0 && !row.is_null_at(variant_idx as usize) {
                let residual_bytes = row.get_binary(variant_idx as usize);
                let residual = Variant::from_parts(&residual_bytes, metadata)?;
                if residual.get_type()? != Type::Object {
                    return Err(Error::Malformed);
                }
                for i in 0..residual.object_size()? {
                    let field = residual.get_field_at_index(i)?.expect("index within object_size");
                    if schema.object_field_index(&field.key).is_some() {
                        return Err(Error::Malformed);
                    }
                    let id = builder.add_key(&field.key);
                    fields.push(FieldEntry::new(field.key.clone(), id, builder.write_pos() - start));
                    builder.append_variant(field.value)?;
                }
            }

            builder.finish_writing_object(start, fields)?;
        }
    } else if variant_idx >= 0 && !row.is_null_at(variant_idx as usize) {
        let value = row.get_binary(variant_idx as usize);
        let source = Variant::from_parts(&value, metadata)?;
        builder.append_variant(source)?;
    } else {
        return Err(Error::Malformed);
    }
    Ok(())
}

fn append_scalar<R: ShreddedRow>(
    row: &R,
    typed_idx: usize,
    scalar: &ScalarType,
    builder: &mut VariantBuilder,
) -> Result<()> {
    match scalar {
        ScalarType::String => builder.append_string(&row.get_string(typed_idx)),
        ScalarType::Integral(size) => {
            let value = match size {
                IntegralSize::Byte => row.get_byte(typed_idx) as i64,
                IntegralSize::Short => row.get_short(typed_idx) as i64,
                IntegralSize::Int => row.get_int(typed_idx) as i64,
                IntegralSize::Long => row.get_long(typed_idx),
            };
            builder.append_long(value)
        }
        ScalarType::Float => builder.append_float(row.get_float(typed_idx)),
        ScalarType::Double => builder.append_double(row.get_double(typed_idx)),
        ScalarType::Boolean => builder.append_boolean(row.get_boolean(typed_idx)),
        ScalarType::Binary => builder.append_binary(&row.get_binary(typed_idx)),
        ScalarType::Uuid => builder.append_uuid(row.get_uuid(typed_idx)),
        ScalarType::Decimal { precision, scale } => {
            builder.append_decimal(row.get_decimal(typed_idx, *precision, *scale))
        }
        ScalarType::Date => builder.append_date(row.get_int(typed_idx)),
        ScalarType::Timestamp => builder.append_timestamp(row.get_long(typed_idx)),
        ScalarType::TimestampNtz => builder.append_timestamp_ntz(row.get_long(typed_idx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectField;

    #[derive(Clone)]
    enum Cell {
        Null,
        Long(i64),
        Binary(Vec<u8>),
        Struct(Vec<Cell>),
    }

    struct Row(Vec<Cell>);

    impl ShreddedRow for Row {
        fn is_null_at(&self, ordinal: usize) -> bool {
            matches!(self.0[ordinal], Cell::Null)
        }
        fn get_boolean(&self, _: usize) -> bool {
            unimplemented!()
        }
        fn get_byte(&self, _: usize) -> i8 {
            unimplemented!()
        }
        fn get_short(&self, _: usize) -> i16 {
            unimplemented!()
        }
        fn get_int(&self, _: usize) -> i32 {
            unimplemented!()
        }
        fn get_long(&self, ordinal: usize) -> i64 {
            match &self.0[ordinal] {
                Cell::Long(v) => *v,
                _ => panic!("not a long"),
            }
        }
        fn get_float(&self, _: usize) -> f32 {
            unimplemented!()
        }
        fn get_double(&self, _: usize) -> f64 {
            unimplemented!()
        }
        fn get_decimal(&self, _: usize, _: u8, _: u8) -> crate::decimal::VariantDecimal {
            unimplemented!()
        }
        fn get_string(&self, _: usize) -> String {
            unimplemented!()
        }
        fn get_binary(&self, ordinal: usize) -> Vec<u8> {
            match &self.0[ordinal] {
                Cell::Binary(v) => v.clone(),
                _ => panic!("not binary"),
            }
        }
        fn get_uuid(&self, _: usize) -> uuid::Uuid {
            unimplemented!()
        }
        fn get_struct(&self, ordinal: usize, _num_fields: usize) -> Self {
            match &self.0[ordinal] {
                Cell::Struct(fields) => Row(fields.clone()),
                _ => panic!("not a struct"),
            }
        }
        fn get_array(&self, _: usize) -> Self {
            unimplemented!()
        }
        fn num_elements(&self) -> usize {
            unimplemented!()
        }
    }

    #[test]
    fn rebuilds_fully_shredded_object() {
        let mut inner_builder = VariantBuilder::default();
        inner_builder.append_long(7).unwrap();
        let metadata = inner_builder.result().unwrap().metadata.to_vec();

        let a_schema = VariantSchema::new(0, 1, -1, 2, Some(ScalarType::Integral(IntegralSize::Long)), None, None);
        let schema = VariantSchema::new(
            0,
            1,
            2,
            3,
            None,
            Some(vec![ObjectField {
                field_name: "a".into(),
                schema: a_schema,
            }]),
            None,
        );

        let row = Row(vec![
            Cell::Struct(vec![Cell::Struct(vec![Cell::Long(7), Cell::Null])]),
            Cell::Null,
            Cell::Binary(metadata),
        ]);

        let (value, metadata) = rebuild(&row, &schema).unwrap();
        let variant = Variant::from_parts(&value, &metadata).unwrap();
        assert_eq!(variant.to_json().unwrap(), "{\"a\":7}");
    }
}
