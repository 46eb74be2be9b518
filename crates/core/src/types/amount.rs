//! Lenient numeric extraction from backend JSON.
//!
//! The backend serializes money as numbers on some endpoints and as strings
//! (`"250.00"`, `"1,250"`) on others. Everything numeric that reaches a
//! displayed total goes through these helpers; a value that cannot be read
//! yields `None` so the caller can fall back to its documented default.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Parse a monetary amount from a JSON number or its textual form.
///
/// Thousands separators and surrounding whitespace are ignored. Empty
/// strings, booleans, objects and arrays are not amounts.
///
/// # Example
///
/// ```rust
/// use rust_decimal::Decimal;
/// use serde_json::json;
/// use souq_core::parse_amount;
///
/// assert_eq!(parse_amount(&json!(100)), Some(Decimal::from(100)));
/// assert_eq!(parse_amount(&json!("1,250.50")), Decimal::from_str_exact("1250.50").ok());
/// assert_eq!(parse_amount(&json!("n/a")), None);
/// ```
#[must_use]
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal_str(&n.to_string()),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            parse_decimal_str(&cleaned)
        }
        _ => None,
    }
}

/// Parse a positive integer quantity from a JSON number or string.
///
/// Returns `None` for zero, negative, fractional or non-numeric values.
#[must_use]
pub fn parse_quantity(value: &Value) -> Option<u32> {
    let amount = parse_amount(value)?;
    if amount <= Decimal::ZERO || amount.fract() != Decimal::ZERO {
        return None;
    }
    u32::from_str(&amount.trunc().normalize().to_string()).ok()
}

fn parse_decimal_str(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
