//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Projecting Variant values into typed columns, and back.
//!
//! [`writer`] casts a Variant into the typed/untyped column split a
//! [`crate::schema::VariantSchema`] describes; [`reader`] walks that split
//! back into a single Variant. Both sides leave the actual column storage
//! to the host: this module only knows how to navigate a
//! [`writer::ShreddedResultBuilder`]/[`reader::ShreddedRow`] abstraction,
//! not how rows are physically stored.

pub mod reader;
pub mod writer;

pub use reader::{rebuild, ShreddedRow};
pub use writer::{cast_shredded, ScalarValue, ShreddedResult, ShreddedResultBuilder};
