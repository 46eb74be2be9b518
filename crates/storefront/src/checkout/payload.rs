//! Order payload for `POST /orders`.

use rust_decimal::Decimal;
use serde::Serialize;
use souq_core::{PaymentMethod, ProductId, ShippingAddress, VariantId};

use crate::cart::{CartLine, CartSnapshot};

/// One line item of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub variant_id: Option<VariantId>,
    /// Unit price as last quoted by the server; sent as a JSON number.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            variant_id: line.variant_id,
            price: line.unit_price,
        }
    }
}

/// Body of a create-order call. Exists for one submission attempt only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPayload {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItem>,
    pub notes: String,
    pub coupon_code: Option<String>,
}

impl OrderPayload {
    /// Build the payload from a validated address and a non-empty cart.
    ///
    /// An explicitly entered coupon code takes precedence over the one the
    /// server reports on the cart.
    #[must_use]
    pub fn build(
        address: &ShippingAddress,
        cart: &CartSnapshot,
        notes: &str,
        coupon_code: Option<&str>,
    ) -> Self {
        let coupon_code = coupon_code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .or_else(|| cart.coupon.as_ref().map(|c| c.code.clone()));

        Self {
            shipping_address: address.normalized(),
            payment_method: PaymentMethod::CashOnDelivery,
            items: cart.lines.iter().map(OrderItem::from).collect(),
            notes: notes.trim().to_string(),
            coupon_code,
        }
    }
}
