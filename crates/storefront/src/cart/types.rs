//! Typed view of a cart snapshot.
//!
//! Extraction is lenient: a line that cannot be read is skipped rather than
//! failing the whole snapshot, and the raw JSON is kept alongside so nothing
//! the backend sent is lost.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use souq_core::{DEFAULT_CURRENCY, ProductId, VariantId, parse_quantity};
use tracing::debug;

use crate::shapes::{amount_field, cart_body, string_field};
use crate::totals::{Totals, TotalsPolicy, cart_lines, line_total};

/// One product + quantity entry of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub unit_price: Option<Decimal>,
    pub quantity: u32,
    pub line_total: Option<Decimal>,
}

impl CartLine {
    /// Read a line from its JSON form. Lines without a product id or a
    /// positive quantity are not cart lines.
    #[must_use]
    pub fn from_json(line: &Value) -> Option<Self> {
        let product = line.get("product");
        let product_id = line
            .get("product_id")
            .and_then(ProductId::from_json)
            .or_else(|| product?.get("id").and_then(ProductId::from_json))?;
        let quantity = line.get("quantity").and_then(parse_quantity)?;

        let variant_id = line
            .get("variant_id")
            .and_then(VariantId::from_json)
            .or_else(|| line.get("variant")?.get("id").and_then(VariantId::from_json));

        let name = ["name", "product_name", "title"]
            .iter()
            .find_map(|k| string_field(line, k))
            .or_else(|| product.and_then(|p| string_field(p, "name")))
            .unwrap_or_else(|| format!("Product #{product_id}"));

        let unit_price = amount_field(line, &["unit_price", "price"])
            .or_else(|| product.and_then(|p| amount_field(p, &["price"])));

        Some(Self {
            product_id,
            variant_id,
            name,
            unit_price,
            quantity,
            line_total: line_total(line),
        })
    }
}

/// How a coupon computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountRule {
    /// Percent of the subtotal.
    Percentage(Decimal),
    /// Fixed amount off.
    Fixed(Decimal),
}

/// A discount code attached to the cart, as last validated by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coupon {
    pub code: String,
    pub rule: Option<DiscountRule>,
    pub amount: Option<Decimal>,
}

impl Coupon {
    /// Read the coupon from a cart object.
    ///
    /// Accepts `coupon: {code, type, value, discount_amount}`,
    /// `coupon: "CODE"` and a bare `coupon_code`.
    fn from_cart(cart: &Value) -> Option<Self> {
        match cart.get("coupon") {
            Some(obj @ Value::Object(_)) => {
                let code = string_field(obj, "code").or_else(|| string_field(obj, "coupon_code"))?;
                let value = amount_field(obj, &["value", "discount_value"]);
                let kind = string_field(obj, "type")
                    .or_else(|| string_field(obj, "discount_type"))
                    .map(|s| s.to_ascii_lowercase());
                let rule = match (kind.as_deref(), value) {
                    (Some("percentage" | "percent"), Some(v)) => Some(DiscountRule::Percentage(v)),
                    (Some("fixed" | "amount"), Some(v)) => Some(DiscountRule::Fixed(v)),
                    _ => None,
                };
                Some(Self {
                    code,
                    rule,
                    amount: amount_field(obj, &["discount_amount", "discount", "amount"]),
                })
            }
            Some(Value::String(code)) if !code.trim().is_empty() => Some(Self {
                code: code.trim().to_string(),
                rule: None,
                amount: None,
            }),
            _ => string_field(cart, "coupon_code").map(|code| Self {
                code,
                rule: None,
                amount: None,
            }),
        }
    }
}

/// Server-authoritative cart at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSnapshot {
    /// Response body as received.
    #[serde(skip)]
    pub raw: Value,
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub currency: String,
    pub coupon: Option<Coupon>,
    pub totals: Totals,
}

impl CartSnapshot {
    /// Build a snapshot from a `GET /cart` response.
    #[must_use]
    pub fn from_response(body: &Value, policy: &TotalsPolicy) -> Self {
        let cart = cart_body(body);
        let raw_lines = cart_lines(cart);
        let lines: Vec<CartLine> = raw_lines.iter().filter_map(CartLine::from_json).collect();
        if lines.len() != raw_lines.len() {
            debug!(
                skipped = raw_lines.len() - lines.len(),
                "Skipped unreadable cart lines"
            );
        }

        let item_count = ["item_count", "items_count", "total_quantity"]
            .iter()
            .find_map(|k| cart.get(*k).and_then(parse_quantity))
            .unwrap_or_else(|| {
                lines
                    .iter()
                    .fold(0_u32, |acc, l| acc.saturating_add(l.quantity))
            });

        let currency = string_field(cart, "currency")
            .or_else(|| cart.get("summary").and_then(|s| string_field(s, "currency")))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Self {
            raw: body.clone(),
            coupon: Coupon::from_cart(cart),
            totals: Totals::from_response(body, policy),
            lines,
            item_count,
            currency,
        }
    }

    /// Whether there is nothing to order.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
