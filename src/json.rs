//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Building Variants from a pre-parsed value tree.
//!
//! Tokenizing JSON text is out of scope here: callers hand in a
//! [`JsonValue`] tree (their own parser's output, adapted to this shape)
//! and [`build_json`] walks it into a [`VariantBuilder`].

use ordered_float::OrderedFloat;

use crate::builder::{FieldEntry, VariantBuilder};
use crate::decimal::VariantDecimal;
use crate::error::Result;

/// A pre-parsed JSON-like value tree, independent of any particular JSON
/// parser's own value type.
#[derive(Clone, Debug, PartialEq)]
pub enum JsonValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(OrderedFloat<f64>),
    String(String),
    Array(Vec<JsonValue>),
    Object(Vec<(String, JsonValue)>),
}

/// Walks `value` into `builder`, matching the field order of whatever
/// collection `Object` was built from (the builder re-sorts fields by key
/// when each object is finished, so caller order does not matter for
/// correctness).
pub fn build_json(builder: &mut VariantBuilder, value: &JsonValue) -> Result<()> {
    match value {
        JsonValue::Object(fields) => {
            let start = builder.write_pos();
            let mut entries = Vec::with_capacity(fields.len());
            for (key, child) in fields {
                let id = builder.add_key(key);
                entries.push(FieldEntry::new(key.clone(), id, builder.write_pos() - start));
                build_json(builder, child)?;
            }
            builder.finish_writing_object(start, entries)
        }
        JsonValue::Array(items) => {
            let start = builder.write_pos();
            let mut offsets = Vec::with_capacity(items.len());
            for item in items {
                offsets.push(builder.write_pos() - start);
                build_json(builder, item)?;
            }
            builder.finish_writing_array(start, offsets)
        }
        JsonValue::String(s) => builder.append_string(s),
        JsonValue::Boolean(b) => builder.append_boolean(*b),
        JsonValue::Integer(i) => builder.append_long(*i),
        JsonValue::Real(f) => append_real(builder, f.into_inner()),
        JsonValue::Null => builder.append_null(),
    }
}

/// Prefers an exact decimal representation of `value` (formatted the way
/// `f64`'s own `Display` renders it, which never produces scientific
/// notation for the magnitudes this format allows), falling back to a
/// double when the literal needs more than 38 significant digits or isn't
/// representable as a plain decimal at all (NaN, infinities).
fn append_real(builder: &mut VariantBuilder, value: f64) -> Result<()> {
    if value.is_finite() {
        if let Some(decimal) = VariantDecimal::parse(&format!("{}", value)) {
            return builder.append_decimal(decimal);
        }
    }
    builder.append_double(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;

    #[test]
    fn builds_nested_object_and_reads_back_as_json() {
        let value = JsonValue::Object(vec![
            ("name".into(), JsonValue::String("ada".into())),
            ("tags".into(), JsonValue::Array(vec![JsonValue::Integer(1), JsonValue::Null])),
        ]);
        let mut builder = VariantBuilder::default();
        build_json(&mut builder, &value).unwrap();
        let variant = builder.result().unwrap();
        assert_eq!(variant.to_json().unwrap(), "{\"name\":\"ada\",\"tags\":[1,null]}");
    }

    #[test]
    fn real_numbers_prefer_exact_decimal() {
        let mut builder = VariantBuilder::default();
        build_json(&mut builder, &JsonValue::Real(OrderedFloat(3.5))).unwrap();
        let variant = builder.result().unwrap();
        assert_eq!(variant.get_type().unwrap(), crate::variant::Type::Decimal);
        assert_eq!(variant.get_decimal().unwrap().to_string(), "3.5");
    }
}
