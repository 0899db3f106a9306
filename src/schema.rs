//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Shredding schemas.
//!
//! A `VariantSchema` mirrors the column layout a host engine uses to store
//! a shredded Variant: a `value` column, an optional `typed_value` column,
//! and (top level only) a `metadata` column. `typed_value` recurses for
//! arrays and objects. Schemas are ordinary config data, so they derive
//! `serde::Serialize`/`Deserialize` for loading from whatever configuration
//! format a host chooses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Width of an integral shredded column.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum IntegralSize {
    Byte,
    Short,
    Int,
    Long,
}

/// The type a scalar Variant value is shredded into.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    Integral(IntegralSize),
    Float,
    Double,
    Boolean,
    Binary,
    Decimal { precision: u8, scale: u8 },
    Date,
    Timestamp,
    TimestampNtz,
    Uuid,
}

/// One field of a shredded object: its name and the schema of its value.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ObjectField {
    pub field_name: String,
    pub schema: VariantSchema,
}

/// A shredding schema for a Variant value or one of its descendants.
///
/// `typed_idx`, `variant_idx`, and `top_level_metadata_idx` are row-ordinal
/// indices into whatever [`crate::shredding::reader::ShreddedRow`] (or
/// writer-side equivalent) abstraction the host provides; `-1` means the
/// corresponding column is absent from this node's schema.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct VariantSchema {
    pub typed_idx: i32,
    pub variant_idx: i32,
    pub top_level_metadata_idx: i32,
    pub num_fields: usize,
    pub scalar_schema: Option<ScalarType>,
    pub object_schema: Option<Vec<ObjectField>>,
    pub array_schema: Option<Box<VariantSchema>>,
    #[serde(skip)]
    object_schema_map: HashMap<String, usize>,
}

impl VariantSchema {
    pub fn new(
        typed_idx: i32,
        variant_idx: i32,
        top_level_metadata_idx: i32,
        num_fields: usize,
        scalar_schema: Option<ScalarType>,
        object_schema: Option<Vec<ObjectField>>,
        array_schema: Option<Box<VariantSchema>>,
    ) -> Self {
        let object_schema_map = object_schema
            .as_ref()
            .map(|fields| {
                fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| (field.field_name.clone(), i))
                    .collect()
            })
            .unwrap_or_default();

        VariantSchema {
            typed_idx,
            variant_idx,
            top_level_metadata_idx,
            num_fields,
            scalar_schema,
            object_schema,
            array_schema,
            object_schema_map,
        }
    }

    /// Builds the fast-lookup field-name index, for a schema deserialized
    /// from configuration (whose `object_schema_map` was skipped on the
    /// wire and so starts out empty).
    pub fn rebuild_field_index(&mut self) {
        self.object_schema_map = self
            .object_schema
            .as_ref()
            .map(|fields| {
                fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| (field.field_name.clone(), i))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(array_schema) = self.array_schema.as_mut() {
            array_schema.rebuild_field_index();
        }
        if let Some(object_schema) = self.object_schema.as_mut() {
            for field in object_schema.iter_mut() {
                field.schema.rebuild_field_index();
            }
        }
    }

    /// Index of `name` in `object_schema`, or `None` if this node has no
    /// object schema or doesn't shred that field.
    pub fn object_field_index(&self, name: &str) -> Option<usize> {
        self.object_schema_map.get(name).copied()
    }

    /// Whether this column stores a Variant value entirely unshredded:
    /// just `metadata` and `value`, no `typed_value`.
    pub fn is_unshredded(&self) -> bool {
        self.top_level_metadata_idx >= 0 && self.variant_idx >= 0 && self.typed_idx < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_field_index_looks_up_by_name() {
        let schema = VariantSchema::new(
            0,
            1,
            2,
            3,
            None,
            Some(vec![
                ObjectField {
                    field_name: "a".into(),
                    schema: VariantSchema::new(0, 1, -1, 2, Some(ScalarType::String), None, None),
                },
                ObjectField {
                    field_name: "b".into(),
                    schema: VariantSchema::new(0, 1, -1, 2, Some(ScalarType::Double), None, None),
                },
            ]),
            None,
        );
        assert_eq!(schema.object_field_index("b"), Some(1));
        assert_eq!(schema.object_field_index("missing"), None);
    }

    #[test]
    fn is_unshredded_requires_metadata_and_value_without_typed() {
        let schema = VariantSchema::new(-1, 1, 0, 2, None, None, None);
        assert!(schema.is_unshredded());
        let shredded = VariantSchema::new(0, 1, 0, 3, Some(ScalarType::String), None, None);
        assert!(!shredded.is_unshredded());
    }
}
