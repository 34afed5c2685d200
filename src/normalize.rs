//! Value normalization shared by layout detection and record matching.
//!
//! Every function here is idempotent: feeding a normalized value back in
//! returns it unchanged.

use std::str::FromStr;

use itertools::Itertools;
use rust_decimal::Decimal;

/// Smallest difference at which two numeric cells are considered different.
pub const NUMERIC_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

pub const DEFAULT_MIN_IDENTIFIER_LEN: usize = 10;

/// Lower-cases and collapses every whitespace run (newlines included) into a single space.
pub fn normalize_text(value: &str) -> String {
    value.split_whitespace().join(" ").to_lowercase()
}

/// Drops every character that is not an ASCII letter or digit and upper-cases the rest.
pub fn normalize_id(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// True when the value looks like a chassis/serial style identifier: long enough
/// once punctuation is removed, and mixing letters with digits.
pub fn is_identifier_like(value: &str, min_len: usize) -> bool {
    let mut len = 0usize;
    let mut has_alpha = false;
    let mut has_digit = false;
    for ch in value.chars().filter(char::is_ascii_alphanumeric) {
        len += 1;
        has_alpha |= ch.is_ascii_alphabetic();
        has_digit |= ch.is_ascii_digit();
    }
    len >= min_len && has_alpha && has_digit
}

/// Parses a numeric cell, ignoring thousands separators. Scientific notation is accepted.
pub fn parse_numeric(value: &str) -> Option<Decimal> {
    let cleaned = value.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Numeric equality within [`NUMERIC_EPSILON`]. False when either side is not numeric.
pub fn compare_numeric(left: &str, right: &str) -> bool {
    numeric_equal(left, right).unwrap_or(false)
}

/// `Some(equal)` when both values are numeric, `None` otherwise.
pub fn numeric_equal(left: &str, right: &str) -> Option<bool> {
    let left = parse_numeric(left)?;
    let right = parse_numeric(right)?;
    let diff = left.checked_sub(right)?;
    Some(diff.abs() < NUMERIC_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Model\nCODE  "), "model code");
        assert_eq!(normalize_text("Sale\t\t Price"), "sale price");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn normalize_id_strips_punctuation() {
        assert_eq!(normalize_id("ab-12 34"), "AB1234");
        assert_eq!(normalize_id("AB1234"), "AB1234");
        assert_eq!(normalize_id(" mr0-ha3.cd/1 "), "MR0HA3CD1");
        assert_eq!(normalize_id("--"), "");
    }

    #[test]
    fn identifier_shape_requires_length_letters_and_digits() {
        assert!(is_identifier_like("MR0HA3CD1-00123", 10));
        assert!(is_identifier_like("1a2b3c4d5e", 10));
        assert!(!is_identifier_like("1234567890123", 10));
        assert!(!is_identifier_like("ABCDEFGHIJKL", 10));
        assert!(!is_identifier_like("A1-B2-C3", 10));
        assert!(!is_identifier_like("", 10));
    }

    #[test]
    fn numeric_parsing_ignores_separators() {
        assert_eq!(parse_numeric("1,000.00"), Decimal::from_str("1000").ok());
        assert_eq!(parse_numeric(" -12.5 "), Decimal::from_str("-12.5").ok());
        assert_eq!(parse_numeric("1e3"), Decimal::from_str("1000").ok());
        assert_eq!(parse_numeric("Y"), None);
        assert_eq!(parse_numeric(""), None);
    }

    #[test]
    fn numeric_comparison_is_tolerant_and_symmetric() {
        assert!(compare_numeric("1,200.50", "1200.5"));
        assert!(compare_numeric("1200.5", "1,200.50"));
        assert!(compare_numeric("50,000.00", "50000"));
        assert!(!compare_numeric("50000", "50001"));
        assert!(!compare_numeric("50000", "fifty"));
        assert_eq!(numeric_equal("abc", "1"), None);
    }
}
