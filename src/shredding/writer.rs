//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Casting a Variant into its shredded column split.
//!
//! A host implements [`ShreddedResult`] over whatever column-builder type
//! it stores shredded data in, and [`ShreddedResultBuilder`] to construct
//! one per schema node; [`cast_shredded`] drives both while walking a
//! Variant value against a [`VariantSchema`].

use crate::builder::{FieldEntry, VariantBuilder};
use crate::decimal::VariantDecimal;
use crate::error::{Error, Result};
use crate::schema::{IntegralSize, ScalarType, VariantSchema};
use crate::variant::{Type, Variant};

/// A scalar value chosen for a shredded `typed_value` column. The variant
/// picked matches the [`ScalarType`] that was cast against, not the
/// original Variant type (e.g. an integer cast against
/// `ScalarType::Decimal` yields `ScalarValue::Decimal`).
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(VariantDecimal),
    String(String),
    Binary(Vec<u8>),
    Uuid(uuid::Uuid),
}

/// Receives the shredded pieces of one schema node as [`cast_shredded`]
/// produces them. A host's implementation owns however it stores typed
/// and untyped columns; this trait only describes the sequence of calls.
pub trait ShreddedResult: Sized {
    /// Records this node as an array whose elements are the (already
    /// shredded) results of `elements`, in order.
    fn add_array(&mut self, elements: Vec<Self>);
    /// Records this node as an object. `values[i]` is the shredded result
    /// for `object_schema[i]`; every index is populated, with an
    /// all-null empty result standing in for a field this Variant lacked.
    fn add_object(&mut self, values: Vec<Self>);
    /// Records leftover, unshredded bytes: either an object's untyped
    /// residual fields, or a scalar that didn't match its target type.
    fn add_variant_value(&mut self, value: Vec<u8>);
    /// Records a value that matched this node's scalar schema.
    fn add_scalar(&mut self, value: ScalarValue);
    /// Records the metadata dictionary. Only called at the top level.
    fn add_metadata(&mut self, metadata: Vec<u8>);
}

/// Constructs empty [`ShreddedResult`]s and configures cast behavior.
pub trait ShreddedResultBuilder {
    type Result: ShreddedResult;

    /// An all-null result for `schema`, used both as the starting point
    /// for [`cast_shredded`] and to fill in a missing object field.
    fn create_empty(&self, schema: &VariantSchema) -> Self::Result;

    /// When true, a decimal may shred into a different scale or into an
    /// integer column (and vice versa) as long as the value is exactly
    /// preserved.
    fn allow_numeric_scale_changes(&self) -> bool;
}

/// Casts `v` into the shredded layout `schema` describes.
pub fn cast_shredded<B: ShreddedResultBuilder>(
    v: Variant<'_>,
    schema: &VariantSchema,
    builder: &B,
) -> Result<B::Result> {
    let variant_type = v.get_type()?;
    let mut result = builder.create_empty(schema);

    if schema.top_level_metadata_idx >= 0 {
        result.add_metadata(v.metadata.to_vec());
    }

    if let (Some(element_schema), Type::Array) = (schema.array_schema.as_deref(), variant_type) {
        let size = v.array_size()?;
        let mut array = Vec::with_capacity(size);
        for i in 0..size {
            let element = v.get_element_at_index(i)?.expect("index within array_size");
            array.push(cast_shredded(element, element_schema, builder)?);
        }
        result.add_array(array);
    } else if let (Some(object_schema), Type::Object) = (schema.object_schema.as_deref(), variant_type) {
        let mut shredded_values: Vec<Option<B::Result>> = (0..object_schema.len()).map(|_| None).collect();
        let mut residual_builder = VariantBuilder::new(false);
        let mut field_entries = Vec::new();
        let mut num_fields_matched = 0usize;
        let start = residual_builder.write_pos();

        for i in 0..v.object_size()? {
            let field = v.get_field_at_index(i)?.expect("index within object_size");
            if let Some(field_idx) = schema.object_field_index(&field.key) {
                let shredded_field = cast_shredded(field.value, &object_schema[field_idx].schema, builder)?;
                shredded_values[field_idx] = Some(shredded_field);
                num_fields_matched += 1;
            } else {
                let id = v.get_dictionary_id_at_index(i)?;
                field_entries.push(FieldEntry::new(field.key.clone(), id, residual_builder.write_pos() - start));
                residual_builder.shallow_append_variant(field.value)?;
            }
        }

        if num_fields_matched < object_schema.len() {
            for (i, slot) in shredded_values.iter_mut().enumerate() {
                if slot.is_none() {
                    *slot = Some(builder.create_empty(&object_schema[i].schema));
                    num_fields_matched += 1;
                }
            }
        }

        if num_fields_matched != object_schema.len() {
            // Only possible if the Variant had two fields with the same key.
            return Err(Error::Malformed);
        }

        let values: Vec<B::Result> = shredded_values.into_iter().map(|v| v.expect("filled above")).collect();
        result.add_object(values);

        if residual_builder.write_pos() != start {
            residual_builder.finish_writing_object(start, field_entries)?;
            result.add_variant_value(residual_builder.value_without_metadata().to_vec());
        }
    } else if let Some(scalar_type) = schema.scalar_schema.as_ref() {
        match try_typed_shred(&v, variant_type, scalar_type, builder)? {
            Some(value) => result.add_scalar(value),
            None => result.add_variant_value(v.value_bytes()?.to_vec()),
        }
    } else {
        result.add_variant_value(v.value_bytes()?.to_vec());
    }

    Ok(result)
}

/// Tries to cast `v` (of type `variant_type`) into `target_type`. Returns
/// `None`, not an error, when the stored type simply doesn't match the
/// target; the caller falls back to storing the value untyped.
fn try_typed_shred<B: ShreddedResultBuilder>(
    v: &Variant<'_>,
    variant_type: Type,
    target_type: &ScalarType,
    builder: &B,
) -> Result<Option<ScalarValue>> {
    match (variant_type, target_type) {
        (Type::Long, ScalarType::Integral(size)) => {
            let value = v.get_long()?;
            Ok(integral_scalar(value, *size))
        }
        (Type::Long, ScalarType::Decimal { precision, scale }) if builder.allow_numeric_scale_changes() => {
            let value = v.get_long()?;
            let decimal = VariantDecimal::new(value as i128, 0);
            Ok(decimal
                .rescale(*scale)
                .filter(|scaled| scaled.fits_precision(*precision as u32))
                .map(ScalarValue::Decimal))
        }
        (Type::Decimal, ScalarType::Decimal { precision, scale }) => {
            let value = v.get_decimal_with_original_scale()?;
            if value.fits_precision(*precision as u32) && value.scale() == *scale {
                return Ok(Some(ScalarValue::Decimal(value)));
            }
            if builder.allow_numeric_scale_changes() {
                if let Some(rescaled) = value.rescale(*scale) {
                    if rescaled.fits_precision(*precision as u32) {
                        return Ok(Some(ScalarValue::Decimal(rescaled)));
                    }
                }
            }
            Ok(None)
        }
        (Type::Decimal, ScalarType::Integral(size)) if builder.allow_numeric_scale_changes() => {
            let value = v.get_decimal()?;
            match value.to_integral().and_then(|i| i64::try_from(i).ok()) {
                Some(long_value) => Ok(integral_scalar(long_value, *size)),
                None => Ok(None),
            }
        }
        (Type::Boolean, ScalarType::Boolean) => Ok(Some(ScalarValue::Boolean(v.get_boolean()?))),
        (Type::String, ScalarType::String) => Ok(Some(ScalarValue::String(v.get_string()?.to_owned()))),
        (Type::Double, ScalarType::Double) => Ok(Some(ScalarValue::Double(v.get_double()?))),
        (Type::Date, ScalarType::Date) => Ok(Some(ScalarValue::Int(v.get_long()? as i32))),
        (Type::Timestamp, ScalarType::Timestamp) => Ok(Some(ScalarValue::Long(v.get_long()?))),
        (Type::TimestampNtz, ScalarType::TimestampNtz) => Ok(Some(ScalarValue::Long(v.get_long()?))),
        (Type::Float, ScalarType::Float) => Ok(Some(ScalarValue::Float(v.get_float()?))),
        (Type::Binary, ScalarType::Binary) => Ok(Some(ScalarValue::Binary(v.get_binary()?.to_vec()))),
        (Type::Uuid, ScalarType::Uuid) => Ok(Some(ScalarValue::Uuid(v.get_uuid()?))),
        _ => Ok(None),
    }
}

fn integral_scalar(value: i64, size: IntegralSize) -> Option<ScalarValue> {
    match size {
        IntegralSize::Byte => i8::try_from(value).ok().map(ScalarValue::Byte),
        IntegralSize::Short => i16::try_from(value).ok().map(ScalarValue::Short),
        IntegralSize::Int => i32::try_from(value).ok().map(ScalarValue::Int),
        IntegralSize::Long => Some(ScalarValue::Long(value)),
    }
}
