//! Engineering-notation number parsing.
//!
//! Accepts the usual notations (hex, octal, binary, decimal, floating point)
//! plus one engineering scale factor, e.g. `1k` = 1000.0 = 1e3.

use crate::error::{Result, SimError};

/// Scale factor for an engineering suffix character.
fn scale_factor(ch: u8) -> Option<f64> {
    let scale = match ch {
        b't' | b'T' => 1e12,
        b'g' | b'G' => 1e9,
        b'M' => 1e6,
        b'k' | b'K' => 1e3,
        b'm' => 1e-3,
        b'u' | b'U' => 1e-6,
        b'n' | b'N' => 1e-9,
        b'p' | b'P' => 1e-12,
        b'f' | b'F' => 1e-15,
        _ => return None,
    };
    Some(scale)
}

/// Accumulate digits of the given radix starting at `pos`.
fn read_radix(bytes: &[u8], mut pos: usize, radix: u32) -> f64 {
    let mut result = 0.0;
    while pos < bytes.len() {
        match (bytes[pos] as char).to_digit(radix) {
            Some(d) => result = result * radix as f64 + d as f64,
            None => break,
        }
        pos += 1;
    }
    result
}

/// Parse a number with an optional engineering suffix.
///
/// Returns `None` when no digits can be read. Characters following the
/// number or its scale factor are ignored, so `"1kohm"` is 1000.
/// Integers written with a leading `0` are octal, `0x` hex and `0b` binary;
/// those forms take no exponent or scale factor.
pub fn parse_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut pos = 0;

    while pos < len && bytes[pos] <= b' ' {
        pos += 1;
    }
    if pos == len {
        return None;
    }

    let mut sign = 1.0;
    match bytes[pos] {
        b'-' => {
            sign = -1.0;
            pos += 1;
        }
        b'+' => pos += 1,
        _ => {}
    }
    if pos >= len {
        return None;
    }

    if bytes[pos] == b'0' {
        pos += 1;
        if pos >= len {
            return Some(0.0);
        }
        match bytes[pos] {
            b'x' | b'X' => return Some(sign * read_radix(bytes, pos + 1, 16)),
            b'b' | b'B' => return Some(sign * read_radix(bytes, pos + 1, 2)),
            b'.' => pos -= 1,
            _ => return Some(sign * read_radix(bytes, pos, 8)),
        }
    }

    let start = pos;
    let mut digits = 0;
    while pos < len && bytes[pos].is_ascii_digit() {
        pos += 1;
        digits += 1;
    }
    if pos < len && bytes[pos] == b'.' {
        pos += 1;
        while pos < len && bytes[pos].is_ascii_digit() {
            pos += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    let mantissa = &text[start..pos];
    let mut value: f64 = mantissa.parse().ok()?;

    if pos < len {
        let suffix = bytes[pos];
        pos += 1;
        if suffix == b'e' || suffix == b'E' {
            let mut exp_sign = "";
            if pos < len && (bytes[pos] == b'+' || bytes[pos] == b'-') {
                if bytes[pos] == b'-' {
                    exp_sign = "-";
                }
                pos += 1;
            }
            let exp_start = pos;
            while pos < len && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            let exponent = &text[exp_start..pos];
            if !exponent.is_empty() {
                value = format!("{mantissa}e{exp_sign}{exponent}").parse().ok()?;
            }
        } else if let Some(scale) = scale_factor(suffix) {
            value *= scale;
        }
    }

    Some(sign * value)
}

/// Parse a property value, reporting `context` when it is not a number.
pub fn parse_value(text: &str, context: &str) -> Result<f64> {
    parse_number(text).ok_or_else(|| SimError::invalid_number(text, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn num(text: &str) -> f64 {
        parse_number(text).unwrap()
    }

    #[test]
    fn test_plain_numbers() {
        assert_relative_eq!(num("2.2"), 2.2);
        assert_relative_eq!(num("  -3.5"), -3.5);
        assert_relative_eq!(num("+7"), 7.0);
        assert_relative_eq!(num(".5"), 0.5);
        assert_relative_eq!(num("0.25"), 0.25);
        assert_relative_eq!(num("0"), 0.0);
    }

    #[test]
    fn test_engineering_suffixes() {
        assert_relative_eq!(num("1.5k"), 1500.0);
        assert_relative_eq!(num("10u"), 10e-6);
        assert_relative_eq!(num("100n"), 100e-9);
        assert_relative_eq!(num("4.7p"), 4.7e-12);
        assert_relative_eq!(num("3f"), 3e-15);
        assert_relative_eq!(num("2M"), 2e6);
        assert_relative_eq!(num("2m"), 2e-3);
        assert_relative_eq!(num("1G"), 1e9);
        assert_relative_eq!(num("1T"), 1e12);
        assert_relative_eq!(num("1kohm"), 1000.0);
    }

    #[test]
    fn test_exponents() {
        assert_relative_eq!(num("1e-9"), 1e-9);
        assert_relative_eq!(num("2.5E3"), 2500.0);
        assert_relative_eq!(num("-4e+2"), -400.0);
    }

    #[test]
    fn test_integer_radixes() {
        assert_relative_eq!(num("0x1F"), 31.0);
        assert_relative_eq!(num("0b101"), 5.0);
        assert_relative_eq!(num("017"), 15.0);
        assert_relative_eq!(num("-0x10"), -16.0);
    }

    #[test]
    fn test_malformed() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("k10"), None);
        assert!(parse_value("oops", "resistance").is_err());
    }
}
