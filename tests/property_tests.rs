//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use proptest::prelude::*;
use variant::{JsonValue, Type, VariantBuilder, VariantDecimal};

proptest! {
    /// Any signed 64-bit integer round-trips through the builder/reader
    /// exactly, regardless of which of INT1/2/4/8 it narrows to.
    #[test]
    fn long_round_trips_at_any_width(value: i64) {
        let mut builder = VariantBuilder::default();
        builder.append_long(value).unwrap();
        let variant = builder.result().unwrap();
        prop_assert_eq!(variant.get_long().unwrap(), value);
    }

    /// An object's fields are always readable back by key regardless of
    /// the order they were inserted in, and always come back out in
    /// sorted-key order by index.
    #[test]
    fn object_fields_survive_any_insertion_order(
        keys in prop::collection::hash_set("[a-z]{1,8}", 1..40),
    ) {
        let mut entries: Vec<(String, i64)> = keys.into_iter().enumerate().map(|(i, k)| (k, i as i64)).collect();
        // Shuffle deterministically by reversing; insertion order must not matter.
        entries.reverse();

        let value = JsonValue::Object(
            entries.iter().map(|(k, v)| (k.clone(), JsonValue::Integer(*v))).collect(),
        );
        let mut builder = VariantBuilder::default();
        variant::build_json(&mut builder, &value).unwrap();
        let variant = builder.result().unwrap();

        prop_assert_eq!(variant.object_size().unwrap(), entries.len());
        for (key, expected) in &entries {
            let field = variant.get_field_by_key(key).unwrap().unwrap();
            prop_assert_eq!(field.get_long().unwrap(), *expected);
        }

        let mut sorted_keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        sorted_keys.sort();
        for (i, expected_key) in sorted_keys.iter().enumerate() {
            prop_assert_eq!(&variant.get_field_at_index(i).unwrap().unwrap().key, expected_key);
        }
    }

    /// Decimal values round-trip exactly through the narrowest DECIMAL4/8/16
    /// encoding the builder selects, both at their original scale and after
    /// trailing-zero normalization.
    #[test]
    fn decimal_round_trips_at_narrowest_width(
        unscaled in any::<i128>(),
        scale in 0u8..38,
    ) {
        let decimal = VariantDecimal::new(unscaled, scale);
        prop_assume!(decimal.fits_precision(38));

        let mut builder = VariantBuilder::default();
        builder.append_decimal(decimal).unwrap();
        let variant = builder.result().unwrap();

        prop_assert_eq!(variant.get_type().unwrap(), Type::Decimal);
        let read_back = variant.get_decimal_with_original_scale().unwrap();
        prop_assert_eq!(read_back.unscaled(), unscaled);
        prop_assert_eq!(read_back.scale(), scale);
        prop_assert_eq!(variant.get_decimal().unwrap(), decimal.normalized());
    }

    /// Arrays of arbitrary JSON-safe strings round-trip through the builder
    /// and back out in original element order (unlike objects, arrays are
    /// not reordered).
    #[test]
    fn array_elements_preserve_order(values in prop::collection::vec("[ -~]{0,20}", 0..20)) {
        let value = JsonValue::Array(values.iter().map(|s| JsonValue::String(s.clone())).collect());
        let mut builder = VariantBuilder::default();
        variant::build_json(&mut builder, &value).unwrap();
        let variant = builder.result().unwrap();

        prop_assert_eq!(variant.array_size().unwrap(), values.len());
        for (i, expected) in values.iter().enumerate() {
            prop_assert_eq!(variant.get_element_at_index(i).unwrap().unwrap().get_string().unwrap(), expected.as_str());
        }
    }
}
