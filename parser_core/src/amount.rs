//! Amount literal parsing
//!
//! Amounts are exact decimals. Accepted forms: `1000`, `1,000`, `0.5`, `.5`
//! and the multiplier suffixes `k`, `m`, `b`.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Regex fragment matching an amount literal (no capture group).
pub const AMOUNT_LITERAL: &str = r"(?:\d[\d,]*(?:\.\d+)?[kmb]?|\.\d+[kmb]?)\b";
/// Regex fragment matching an amount literal (one capture group).
pub const AMOUNT_PATTERN: &str = r"(\d[\d,]*(?:\.\d+)?[kmb]?|\.\d+[kmb]?)\b";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,

    #[error("misplaced thousands separator in '{0}'")]
    Grouping(String),

    #[error("not a decimal number: '{0}'")]
    Malformed(String),

    #[error("amount '{0}' is too large")]
    Overflow(String),
}

/// Parse an amount literal into an exact decimal.
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let text = raw.trim().to_ascii_lowercase();
    if text.is_empty() {
        return Err(AmountError::Empty);
    }

    let (number, multiplier) = match text.chars().last() {
        Some('k') => (&text[..text.len() - 1], Some(Decimal::from(1_000u64))),
        Some('m') => (&text[..text.len() - 1], Some(Decimal::from(1_000_000u64))),
        Some('b') => (&text[..text.len() - 1], Some(Decimal::from(1_000_000_000u64))),
        _ => (text.as_str(), None),
    };
    let number = number.trim();

    let digits = if number.contains(',') {
        if !has_valid_grouping(number) {
            return Err(AmountError::Grouping(raw.to_string()));
        }
        number.replace(',', "")
    } else {
        number.to_string()
    };

    let digits = if digits.starts_with('.') {
        format!("0{}", digits)
    } else {
        digits
    };

    let value =
        Decimal::from_str(&digits).map_err(|_| AmountError::Malformed(raw.to_string()))?;

    match multiplier {
        Some(factor) => value
            .checked_mul(factor)
            .ok_or_else(|| AmountError::Overflow(raw.to_string())),
        None => Ok(value),
    }
}

/// Parse a tip directive value. Only the `k` suffix is meaningful here.
pub fn parse_tip(raw: &str) -> Result<Decimal, AmountError> {
    let text = raw.trim().to_ascii_lowercase();
    if text.ends_with('m') || text.ends_with('b') {
        return Err(AmountError::Malformed(raw.to_string()));
    }
    parse_amount(&text)
}

// Integer part must be 1-3 digits followed by groups of exactly three.
fn has_valid_grouping(number: &str) -> bool {
    let integer = number.split('.').next().unwrap_or("");
    let mut groups = integer.split(',');
    let first_ok = groups
        .next()
        .map(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    first_ok && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_equivalent_thousands() {
        assert_eq!(parse_amount("1,000").unwrap(), dec("1000"));
        assert_eq!(parse_amount("1000").unwrap(), dec("1000"));
        assert_eq!(parse_amount("1k").unwrap(), dec("1000"));
    }

    #[test]
    fn test_fractional_suffix_is_exact() {
        assert_eq!(parse_amount("1.5m").unwrap(), dec("1500000"));
        assert_eq!(parse_amount("0.1").unwrap() + parse_amount("0.2").unwrap(), dec("0.3"));
        assert_eq!(parse_amount("2b").unwrap(), dec("2000000000"));
        assert_eq!(parse_amount(".5").unwrap(), dec("0.5"));
    }

    #[test]
    fn test_bad_grouping() {
        assert!(matches!(parse_amount("1,00"), Err(AmountError::Grouping(_))));
        assert!(matches!(parse_amount("1,2,3"), Err(AmountError::Grouping(_))));
        assert_eq!(parse_amount("12,345.25").unwrap(), dec("12345.25"));
    }

    #[test]
    fn test_malformed() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("1.2.3").is_err());
    }

    #[test]
    fn test_tip_only_accepts_k() {
        assert_eq!(parse_tip("10k").unwrap(), dec("10000"));
        assert_eq!(parse_tip("0.001").unwrap(), dec("0.001"));
        assert!(parse_tip("1m").is_err());
    }
}
