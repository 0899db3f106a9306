//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use variant::{
    build_json, cast_shredded, rebuild, IntegralSize, JsonValue, ScalarType, ScalarValue,
    ShreddedResult, ShreddedResultBuilder, ShreddedRow, SchemaField, Variant, VariantBuilder,
    VariantSchema,
};

fn build(value: &JsonValue) -> (Vec<u8>, Vec<u8>) {
    let mut builder = VariantBuilder::default();
    build_json(&mut builder, value).unwrap();
    builder.into_parts().unwrap()
}

#[test]
fn object_round_trips_through_json_and_field_lookup() {
    let value = JsonValue::Object(vec![
        ("a".into(), JsonValue::Integer(1)),
        ("b".into(), JsonValue::Boolean(true)),
    ]);
    let (data, metadata) = build(&value);
    let variant = Variant::from_parts(&data, &metadata).unwrap();

    assert_eq!(variant.to_json().unwrap(), "{\"a\":1,\"b\":true}");
    assert_eq!(variant.object_size().unwrap(), 2);
    assert!(variant.get_field_by_key("b").unwrap().unwrap().get_boolean().unwrap());
}

#[test]
fn array_elements_choose_narrowest_numeric_encoding() {
    let value = JsonValue::Array(vec![
        JsonValue::Integer(1),
        JsonValue::Integer(1_000_000_000_000),
        JsonValue::Real(ordered_float::OrderedFloat(3.5)),
    ]);
    let (data, metadata) = build(&value);
    let variant = Variant::from_parts(&data, &metadata).unwrap();

    assert_eq!(variant.array_size().unwrap(), 3);
    let first = variant.get_element_at_index(0).unwrap().unwrap();
    let second = variant.get_element_at_index(1).unwrap().unwrap();
    let third = variant.get_element_at_index(2).unwrap().unwrap();

    assert_eq!(first.get_long().unwrap(), 1);
    assert_eq!(second.get_long().unwrap(), 1_000_000_000_000);
    match third.get_type().unwrap() {
        variant::Type::Decimal => assert_eq!(third.get_decimal().unwrap().to_string(), "3.5"),
        variant::Type::Double => assert_eq!(third.get_double().unwrap(), 3.5),
        other => panic!("unexpected type for 3.5: {:?}", other),
    }
    assert!(data.len() > 1 + 2 + 3 + 4);
}

#[test]
fn object_fields_are_stored_in_sorted_key_order() {
    let value = JsonValue::Object(vec![
        ("z".into(), JsonValue::Integer(1)),
        ("a".into(), JsonValue::Integer(2)),
        ("m".into(), JsonValue::Integer(3)),
    ]);
    let (data, metadata) = build(&value);
    let variant = Variant::from_parts(&data, &metadata).unwrap();

    assert_eq!(variant.get_field_at_index(0).unwrap().unwrap().key, "a");
    assert_eq!(variant.get_field_at_index(1).unwrap().unwrap().key, "m");
    assert_eq!(variant.get_field_at_index(2).unwrap().unwrap().key, "z");
}

#[test]
fn large_objects_use_the_four_byte_size_field() {
    let fields: Vec<(String, JsonValue)> = (0..300).map(|i| (format!("k{i}"), JsonValue::Integer(i))).collect();
    let value = JsonValue::Object(fields);
    let (data, metadata) = build(&value);
    let variant = Variant::from_parts(&data, &metadata).unwrap();

    assert_eq!(variant.object_size().unwrap(), 300);
    let header_byte = data[0];
    let large_size_flag = (header_byte >> 6) & 0x1;
    assert_eq!(large_size_flag, 1);
}

#[test]
fn oversized_string_is_rejected_with_size_limit() {
    let huge = "x".repeat(17 * 1024 * 1024);
    let mut builder = VariantBuilder::default();
    let result = builder.append_string(&huge);
    assert_eq!(result, Err(variant::Error::SizeLimit));
}

struct ColumnResult {
    schema: VariantSchema,
    scalar: Option<ScalarValue>,
    object: Vec<ColumnResult>,
    variant_value: Option<Vec<u8>>,
    metadata: Option<Vec<u8>>,
}

struct ColumnBuilder;

impl ShreddedResult for ColumnResult {
    fn add_array(&mut self, _elements: Vec<Self>) {}
    fn add_object(&mut self, values: Vec<Self>) {
        self.object = values;
    }
    fn add_variant_value(&mut self, value: Vec<u8>) {
        self.variant_value = Some(value);
    }
    fn add_scalar(&mut self, value: ScalarValue) {
        self.scalar = Some(value);
    }
    fn add_metadata(&mut self, metadata: Vec<u8>) {
        self.metadata = Some(metadata);
    }
}

impl ShreddedResultBuilder for ColumnBuilder {
    type Result = ColumnResult;
    fn create_empty(&self, schema: &VariantSchema) -> ColumnResult {
        ColumnResult {
            schema: schema.clone(),
            scalar: None,
            object: Vec::new(),
            variant_value: None,
            metadata: None,
        }
    }
    fn allow_numeric_scale_changes(&self) -> bool {
        false
    }
}

#[derive(Clone)]
enum Cell {
    Null,
    Long(i64),
    Binary(Vec<u8>),
    Struct(Vec<Cell>),
    Array(Vec<Cell>),
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
    fn get_int(&self, ordinal: usize) -> i32 {
        self.get_long(ordinal) as i32
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
    fn get_decimal(&self, _: usize, _: u8, _: u8) -> variant::VariantDecimal {
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
    fn get_array(&self, ordinal: usize) -> Self {
        match &self.0[ordinal] {
            Cell::Array(elements) => Row(elements.clone()),
            _ => panic!("not an array"),
        }
    }
    fn num_elements(&self) -> usize {
        self.0.len()
    }
}

#[test]
fn shredding_splits_typed_fields_and_rebuild_recovers_the_original() {
    let value = JsonValue::Object(vec![
        ("x".into(), JsonValue::Integer(7)),
        ("y".into(), JsonValue::String("hi".into())),
        ("z".into(), JsonValue::Array(vec![JsonValue::Integer(1), JsonValue::Integer(2)])),
    ]);
    let (data, metadata) = build(&value);
    let source = Variant::from_parts(&data, &metadata).unwrap();

    let element_schema = VariantSchema::new(0, 1, -1, 2, Some(ScalarType::Integral(IntegralSize::Int)), None, None);
    let z_schema = VariantSchema::new(0, -1, -1, 1, None, None, Some(Box::new(element_schema)));
    let x_schema = VariantSchema::new(0, 1, -1, 2, Some(ScalarType::Integral(IntegralSize::Int)), None, None);

    let top_schema = VariantSchema::new(
        0,
        1,
        2,
        3,
        None,
        Some(vec![
            SchemaField { field_name: "x".into(), schema: x_schema },
            SchemaField { field_name: "z".into(), schema: z_schema },
        ]),
        None,
    );

    let shred_builder = ColumnBuilder;
    let shredded = cast_shredded(source, &top_schema, &shred_builder).unwrap();

    assert_eq!(shredded.object[0].scalar, Some(ScalarValue::Int(7)));
    assert!(shredded.variant_value.is_some());
    let residual = Variant::from_parts(shredded.variant_value.as_ref().unwrap(), &metadata).unwrap();
    assert_eq!(residual.to_json().unwrap(), "{\"y\":\"hi\"}");

    // Rebuild from a hand-rolled row mirroring the shredded column layout:
    // x is fully typed, z's elements are fully typed, y survives only in
    // the object's residual `value` column.
    let element_row = |n: i64| Cell::Struct(vec![Cell::Long(n), Cell::Null]);
    let row = Row(vec![
        Cell::Struct(vec![
            Cell::Struct(vec![Cell::Long(7), Cell::Null]),
            Cell::Struct(vec![Cell::Array(vec![element_row(1), element_row(2)]), Cell::Null]),
        ]),
        Cell::Binary(shredded.variant_value.clone().unwrap()),
        Cell::Binary(metadata.clone()),
    ]);

    let (rebuilt_value, rebuilt_metadata) = rebuild(&row, &top_schema).unwrap();
    let rebuilt = Variant::from_parts(&rebuilt_value, &rebuilt_metadata).unwrap();
    assert_eq!(rebuilt.to_json().unwrap(), "{\"x\":7,\"y\":\"hi\",\"z\":[1,2]}");
}
