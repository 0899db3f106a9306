//
// Copyright 2024 Variant Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Decimal values.
//!
//! No published crate represents a 38-digit, 128-bit two's-complement
//! mantissa with an explicit unsigned scale byte the way this wire format
//! does (`rust_decimal` tops out at 28-29 digits), so [`VariantDecimal`] is a
//! small data holder mirroring the wire representation directly, a
//! hand-rolled wrapper struct for a wire concept with no built-in `serde`
//! type.

use std::cmp::Ordering;
use std::fmt;

use crate::codec::{MAX_DECIMAL16_PRECISION, MAX_DECIMAL4_PRECISION, MAX_DECIMAL8_PRECISION};

/// A fixed-precision decimal: `unscaled / 10^scale`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct VariantDecimal {
    unscaled: i128,
    scale: u8,
}

impl VariantDecimal {
    pub fn new(unscaled: i128, scale: u8) -> Self {
        VariantDecimal { unscaled, scale }
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Number of significant decimal digits in the unscaled value (at least 1).
    pub fn digit_count(&self) -> u32 {
        digit_count_i128(self.unscaled)
    }

    /// Whether this value fits within `max_precision` significant digits.
    pub fn fits_precision(&self, max_precision: u32) -> bool {
        self.digit_count() <= max_precision
    }

    /// Picks the smallest of DECIMAL4/DECIMAL8/DECIMAL16 that can hold this
    /// value, returning the primitive `type_info` constant.
    pub fn narrowest_type_info(&self) -> u8 {
        use crate::codec::{PRIMITIVE_DECIMAL16, PRIMITIVE_DECIMAL4, PRIMITIVE_DECIMAL8};
        let digits = self.digit_count();
        if self.scale as u32 <= MAX_DECIMAL4_PRECISION && digits <= MAX_DECIMAL4_PRECISION {
            PRIMITIVE_DECIMAL4
        } else if self.scale as u32 <= MAX_DECIMAL8_PRECISION && digits <= MAX_DECIMAL8_PRECISION {
            PRIMITIVE_DECIMAL8
        } else {
            debug_assert!(self.scale as u32 <= MAX_DECIMAL16_PRECISION && digits <= MAX_DECIMAL16_PRECISION);
            PRIMITIVE_DECIMAL16
        }
    }

    /// Strips trailing fractional zeros, reducing `scale` accordingly (the
    /// on-wire scale is preserved separately by
    /// [`crate::variant::Variant::get_decimal_with_original_scale`]).
    pub fn normalized(&self) -> Self {
        if self.unscaled == 0 {
            return VariantDecimal::new(0, 0);
        }
        let mut unscaled = self.unscaled;
        let mut scale = self.scale;
        while scale > 0 && unscaled % 10 == 0 {
            unscaled /= 10;
            scale -= 1;
        }
        VariantDecimal::new(unscaled, scale)
    }

    /// Rescales to exactly `new_scale`. Returns `None` if this would lose
    /// information (the value is not exactly representable at the new
    /// scale).
    pub fn rescale(&self, new_scale: u8) -> Option<Self> {
        if new_scale as i32 >= self.scale as i32 {
            let factor = 10i128.checked_pow((new_scale - self.scale) as u32)?;
            let unscaled = self.unscaled.checked_mul(factor)?;
            Some(VariantDecimal::new(unscaled, new_scale))
        } else {
            let factor = 10i128.checked_pow((self.scale - new_scale) as u32)?;
            if self.unscaled % factor != 0 {
                return None;
            }
            Some(VariantDecimal::new(self.unscaled / factor, new_scale))
        }
    }

    /// Converts to an integer, returning `None` unless the decimal has no
    /// fractional part.
    pub fn to_integral(&self) -> Option<i128> {
        self.rescale(0).map(|d| d.unscaled)
    }

    /// Parses a decimal literal (e.g. as produced by formatting an `f64` or
    /// JSON number token) into a `VariantDecimal`, returning `None` if the
    /// literal would need more than 38 significant digits or isn't a valid
    /// plain decimal.
    pub fn parse(literal: &str) -> Option<Self> {
        let (sign, rest) = match literal.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, literal),
        };
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return None;
        }
        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let scale = frac_part.len();
        if scale > MAX_DECIMAL16_PRECISION as usize {
            return None;
        }
        let digits: String = format!("{}{}", int_part, frac_part);
        let digits = digits.trim_start_matches('0');
        let unscaled: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().ok()?
        };
        if digit_count_i128(unscaled) > MAX_DECIMAL16_PRECISION {
            return None;
        }
        Some(VariantDecimal::new(sign * unscaled, scale as u8))
    }
}

fn digit_count_i128(value: i128) -> u32 {
    let value = value.unsigned_abs();
    if value == 0 {
        1
    } else {
        value.ilog10() + 1
    }
}

impl PartialOrd for VariantDecimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariantDecimal {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare at the coarser of the two scales to avoid overflow from
        // always scaling up to the larger one.
        let scale = self.scale.max(other.scale);
        let a = self.rescale(scale).map(|d| d.unscaled);
        let b = other.rescale(scale).map(|d| d.unscaled);
        match (a, b) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => (self.unscaled as f64 / 10f64.powi(self.scale as i32))
                .partial_cmp(&(other.unscaled as f64 / 10f64.powi(other.scale as i32)))
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for VariantDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let normalized = self.normalized();
        let negative = normalized.unscaled < 0;
        let digits = normalized.unscaled.unsigned_abs().to_string();
        if negative {
            write!(f, "-")?;
        }
        if normalized.scale == 0 {
            return f.write_str(&digits);
        }
        let scale = normalized.scale as usize;
        if digits.len() <= scale {
            let zeros = "0".repeat(scale - digits.len());
            write!(f, "0.{}{}", zeros, digits)
        } else {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}.{}", int_part, frac_part)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_places_decimal_point() {
        assert_eq!(VariantDecimal::new(35, 1).to_string(), "3.5");
        assert_eq!(VariantDecimal::new(5, 3).to_string(), "0.005");
        assert_eq!(VariantDecimal::new(-35, 1).to_string(), "-3.5");
        assert_eq!(VariantDecimal::new(1234, 0).to_string(), "1234");
    }

    #[test]
    fn normalized_strips_trailing_zeros() {
        assert_eq!(VariantDecimal::new(3500, 3).normalized(), VariantDecimal::new(35, 1));
        assert_eq!(VariantDecimal::new(0, 5).normalized(), VariantDecimal::new(0, 0));
    }

    #[test]
    fn parse_round_trips_through_display() {
        let d = VariantDecimal::parse("3.50").unwrap();
        assert_eq!(d.normalized().to_string(), "3.5");
        assert_eq!(VariantDecimal::parse("-0.005").unwrap().unscaled(), -5);
    }

    #[test]
    fn narrowest_type_info_picks_smallest() {
        assert_eq!(
            VariantDecimal::new(5, 1).narrowest_type_info(),
            crate::codec::PRIMITIVE_DECIMAL4
        );
        assert_eq!(
            VariantDecimal::new(123456789012, 0).narrowest_type_info(),
            crate::codec::PRIMITIVE_DECIMAL8
        );
    }
}
