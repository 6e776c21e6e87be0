//! Resource quantity parsing and canonical formatting
//!
//! Implements the orchestrator's quantity grammar:
//!
//! ```text
//! <quantity> ::= <sign>? <number> <suffix>
//! <number>   ::= <digits> | <digits>.<digits> | <digits>. | .<digits>
//! <suffix>   ::= Ki | Mi | Gi | Ti | Pi | Ei        (binary SI)
//!              | n | u | m | "" | k | M | G | T | P | E  (decimal SI)
//!              | e<int> | E<int>                     (decimal exponent)
//! ```
//!
//! Amounts are held as an integer number of nano-units. Anything finer than
//! `1n` is rounded up, away from zero.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Decimal SI suffixes indexed by power-of-ten exponent, from nano to exa.
const DECIMAL_SUFFIXES: &[(i32, &str)] = &[
    (-9, "n"),
    (-6, "u"),
    (-3, "m"),
    (0, ""),
    (3, "k"),
    (6, "M"),
    (9, "G"),
    (12, "T"),
    (15, "P"),
    (18, "E"),
];

/// Binary SI suffixes indexed by power of 1024.
const BINARY_SUFFIXES: &[(u32, &str)] = &[
    (1, "Ki"),
    (2, "Mi"),
    (3, "Gi"),
    (4, "Ti"),
    (5, "Pi"),
    (6, "Ei"),
];

/// Reasons a quantity string is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("quantity does not start with a number")]
    InvalidNumber,
    #[error("unrecognized suffix {0:?}")]
    InvalidSuffix(String),
    #[error("quantity is out of range")]
    OutOfRange,
}

/// The notation family a quantity was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantityFormat {
    BinarySI,
    #[default]
    DecimalSI,
    DecimalExponent,
}

/// A canonicalized resource amount (CPU cores, memory bytes, ...)
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    nanos: i128,
    format: QuantityFormat,
}

impl Quantity {
    /// The zero quantity, rendered as `"0"`
    pub const ZERO: Quantity = Quantity {
        nanos: 0,
        format: QuantityFormat::DecimalSI,
    };

    /// Parse a quantity string such as `"500m"`, `"1.5Gi"` or `"2e3"`
    pub fn parse(raw: &str) -> Result<Self, QuantityError> {
        if raw.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, rest) = match raw.as_bytes()[0] {
            b'-' => (true, &raw[1..]),
            b'+' => (false, &raw[1..]),
            _ => (false, raw),
        };

        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_len);

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityError::InvalidNumber);
        }

        let (format, ten_exp, binary_exp) = parse_suffix(suffix)?;

        // Trailing fractional zeros carry no value.
        let frac_part = frac_part.trim_end_matches('0');

        let mut mantissa: i128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit - b'0')))
                .ok_or(QuantityError::OutOfRange)?;
        }

        let binary_factor = 1024i128
            .checked_pow(binary_exp)
            .ok_or(QuantityError::OutOfRange)?;
        let mantissa = mantissa
            .checked_mul(binary_factor)
            .ok_or(QuantityError::OutOfRange)?;

        // Shift the decimal point into nano-units.
        let frac_digits = i32::try_from(frac_part.len()).map_err(|_| QuantityError::OutOfRange)?;
        let shift = ten_exp + 9 - frac_digits;
        let magnitude = if shift >= 0 {
            10i128
                .checked_pow(shift as u32)
                .and_then(|f| mantissa.checked_mul(f))
                .ok_or(QuantityError::OutOfRange)?
        } else {
            div_ceil_pow10(mantissa, (-shift) as u32)
        };

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
            format,
        })
    }

    /// Quantity from whole CPU millicores
    pub fn from_millis(millis: i64) -> Self {
        Self {
            nanos: i128::from(millis) * 1_000_000,
            format: QuantityFormat::DecimalSI,
        }
    }

    /// Quantity from a byte count, formatted with binary suffixes
    pub fn from_bytes(bytes: i64) -> Self {
        Self {
            nanos: i128::from(bytes) * NANOS_PER_UNIT,
            format: QuantityFormat::BinarySI,
        }
    }

    /// Value in milli-units, rounded up
    pub fn as_millis(&self) -> i128 {
        ceil_div(self.nanos, 1_000_000)
    }

    /// Value in whole units, rounded up
    pub fn as_units(&self) -> i128 {
        ceil_div(self.nanos, NANOS_PER_UNIT)
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    fn fmt_decimal(&self, f: &mut fmt::Formatter<'_>, exponent_form: bool) -> fmt::Result {
        let mut mantissa = self.nanos;
        let mut exp = -9i32;
        while mantissa % 1000 == 0 && (exponent_form || exp < 18) {
            mantissa /= 1000;
            exp += 3;
        }

        if exponent_form {
            return match exp {
                0 => write!(f, "{}", mantissa),
                _ => write!(f, "{}e{}", mantissa, exp),
            };
        }

        let suffix = DECIMAL_SUFFIXES
            .iter()
            .find(|(e, _)| *e == exp)
            .map(|(_, s)| *s)
            .unwrap_or("");
        write!(f, "{}{}", mantissa, suffix)
    }

    fn fmt_binary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.nanos / NANOS_PER_UNIT;
        if self.nanos % NANOS_PER_UNIT != 0 || units.abs() < 1024 {
            return self.fmt_decimal(f, false);
        }

        let mut mantissa = units;
        let mut suffix = "";
        for &(_, s) in BINARY_SUFFIXES {
            if mantissa % 1024 != 0 {
                break;
            }
            mantissa /= 1024;
            suffix = s;
        }
        write!(f, "{}{}", mantissa, suffix)
    }
}

fn parse_suffix(suffix: &str) -> Result<(QuantityFormat, i32, u32), QuantityError> {
    if let Some((power, _)) = BINARY_SUFFIXES.iter().find(|(_, s)| *s == suffix) {
        return Ok((QuantityFormat::BinarySI, 0, *power));
    }

    if let Some((exp, _)) = DECIMAL_SUFFIXES.iter().find(|(_, s)| *s == suffix) {
        return Ok((QuantityFormat::DecimalSI, *exp, 0));
    }

    // "E" alone is exa, handled above; "e3" / "E-2" are exponents.
    if let Some(exp) = suffix.strip_prefix(['e', 'E']) {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let exp: i32 = exp
                .parse()
                .map_err(|_| QuantityError::InvalidSuffix(suffix.to_string()))?;
            if !(-1000..=38).contains(&exp) {
                return Err(QuantityError::OutOfRange);
            }
            return Ok((QuantityFormat::DecimalExponent, exp, 0));
        }
    }

    Err(QuantityError::InvalidSuffix(suffix.to_string()))
}

/// Divide a non-negative value by 10^pow, rounding up
fn div_ceil_pow10(value: i128, pow: u32) -> i128 {
    match 10i128.checked_pow(pow) {
        Some(divisor) => ceil_div(value, divisor),
        None if value > 0 => 1,
        None => 0,
    }
}

/// Division rounding away from zero
fn ceil_div(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    if value % divisor == 0 {
        quotient
    } else if value > 0 {
        quotient + 1
    } else {
        quotient - 1
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return write!(f, "0");
        }
        match self.format {
            QuantityFormat::BinarySI => self.fmt_binary(f),
            QuantityFormat::DecimalSI => self.fmt_decimal(f, false),
            QuantityFormat::DecimalExponent => self.fmt_decimal(f, true),
        }
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Quantity::parse(&raw).map_err(serde::de::Error::custom)
    }
}
