//! Total calculator.
//!
//! The cart endpoint does not promise a schema: some deployments send a
//! `summary` object with server-computed figures, some put them on the cart
//! itself, some send only lines. Each figure is taken from the first source
//! that yields a parseable amount, falling back to local computation and
//! finally to a fixed default. An unparseable value is never propagated.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use souq_core::parse_amount;
use tracing::debug;

use crate::shapes::{amount_field, cart_body};

/// Keys a cart may keep its lines under, in priority order.
pub const LINE_KEYS: [&str; 3] = ["items", "lines", "cart_items"];

/// Local defaults used when the backend provides no figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsPolicy {
    /// Shipping charged when neither the summary nor the cart states one.
    pub default_shipping: Decimal,
}

impl Default for TotalsPolicy {
    fn default() -> Self {
        Self {
            default_shipping: Decimal::ZERO,
        }
    }
}

/// Derived order figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Compute totals from a `GET /cart` response (enveloped or bare).
    #[must_use]
    pub fn from_response(body: &Value, policy: &TotalsPolicy) -> Self {
        let cart = cart_body(body);
        let summary = cart
            .get("summary")
            .or_else(|| body.get("data").and_then(|d| d.get("summary")))
            .or_else(|| body.get("summary"))
            .filter(|s| s.is_object());
        compute(cart, summary, policy)
    }
}

/// Compute totals from a bare cart object.
#[must_use]
pub fn compute_totals(cart: &Value, policy: &TotalsPolicy) -> Totals {
    let summary = cart.get("summary").filter(|s| s.is_object());
    compute(cart, summary, policy)
}

fn compute(cart: &Value, summary: Option<&Value>, policy: &TotalsPolicy) -> Totals {
    let from_summary = |keys: &[&str]| summary.and_then(|s| amount_field(s, keys));

    let subtotal = from_summary(&["subtotal"])
        .or_else(|| amount_field(cart, &["subtotal"]))
        .unwrap_or_else(|| lines_subtotal(cart));

    let shipping = from_summary(&["estimated_shipping", "shipping"])
        .or_else(|| amount_field(cart, &["shipping"]))
        .unwrap_or(policy.default_shipping);

    let tax = from_summary(&["estimated_tax", "tax"])
        .or_else(|| amount_field(cart, &["tax"]))
        .unwrap_or(Decimal::ZERO);

    let discount = from_summary(&["discount"])
        .or_else(|| amount_field(cart, &["discount"]))
        .unwrap_or(Decimal::ZERO);

    let total = from_summary(&["estimated_total", "total"])
        .or_else(|| amount_field(cart, &["total"]))
        .unwrap_or_else(|| derived_total(subtotal, shipping, tax, discount));

    Totals {
        subtotal,
        shipping,
        tax,
        discount,
        total,
    }
}

/// The line array of a cart object, if any.
#[must_use]
pub fn cart_lines(cart: &Value) -> &[Value] {
    match LINE_KEYS
        .iter()
        .find_map(|k| cart.get(*k).and_then(Value::as_array))
    {
        Some(lines) => lines,
        None => &[],
    }
}

/// Total of one line: `total`, then `unit_price * quantity`, then
/// `price * quantity`.
#[must_use]
pub fn line_total(line: &Value) -> Option<Decimal> {
    if let Some(total) = line.get("total").and_then(parse_amount) {
        return Some(total);
    }
    let quantity = line.get("quantity").and_then(parse_amount)?;
    ["unit_price", "price"]
        .iter()
        .find_map(|k| line.get(*k).and_then(parse_amount))
        .and_then(|price| price.checked_mul(quantity))
}

/// `subtotal + shipping + tax - discount`, clamped to the `Decimal` range.
fn derived_total(subtotal: Decimal, shipping: Decimal, tax: Decimal, discount: Decimal) -> Decimal {
    subtotal
        .saturating_add(shipping)
        .saturating_add(tax)
        .saturating_sub(discount)
}

/// Sum of line totals. A line that would overflow the sum is skipped like
/// a non-numeric one.
fn lines_subtotal(cart: &Value) -> Decimal {
    cart_lines(cart)
        .iter()
        .filter_map(line_total)
        .fold(Decimal::ZERO, |acc, t| {
            acc.checked_add(t).unwrap_or_else(|| {
                debug!(line_total = %t, "Skipped cart line overflowing the subtotal");
                acc
            })
        })
}
