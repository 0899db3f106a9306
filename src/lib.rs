//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! A native Rust implementation of the Variant binary format: a
//! schema-free, self-describing encoding for semi-structured data with
//! O(1) random access into nested objects and arrays.
//!
//! - [`variant`] reads an encoded `(value, metadata)` pair.
//! - [`builder`] incrementally writes one.
//! - [`json`] builds a Variant from a pre-parsed JSON-like value tree.
//! - [`schema`] and [`shredding`] project a Variant into typed columns
//!   against a host-defined schema, and reconstruct it losslessly.

mod builder;
mod codec;
mod decimal;
mod error;
mod json;
mod schema;
mod shredding;
mod variant;

pub use builder::{FieldEntry, VariantBuilder};
pub use decimal::VariantDecimal;
pub use error::{Error, Result};
pub use json::{build_json, JsonValue};
pub use schema::{IntegralSize, ObjectField as SchemaField, ScalarType, VariantSchema};
pub use shredding::{cast_shredded, rebuild, ScalarValue, ShreddedResult, ShreddedResultBuilder, ShreddedRow};
pub use variant::{get_metadata_key, ObjectField, Type, Variant};
