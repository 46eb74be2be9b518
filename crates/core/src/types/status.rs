//! Status enums for orders and payments.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Payment method selector sent with an order.
///
/// Only cash on delivery is offered; card payments happen outside this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
}

impl PaymentMethod {
    /// Wire value of the payment method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cash_on_delivery",
        }
    }
}

/// Order lifecycle status as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    /// A status this client does not know about, kept verbatim.
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    /// Map a backend status string, tolerating case and spacing differences.
    #[must_use]
    pub fn from_backend(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "processing" => Self::Processing,
            "shipped" | "out_for_delivery" => Self::Shipped,
            "delivered" | "completed" => Self::Delivered,
            "cancelled" | "canceled" => Self::Cancelled,
            "returned" | "refunded" => Self::Returned,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Whether the customer may still cancel the order.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Confirmed => f.write_str("confirmed"),
            Self::Processing => f.write_str("processing"),
            Self::Shipped => f.write_str("shipped"),
            Self::Delivered => f.write_str("delivered"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Returned => f.write_str("returned"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_wire_value() {
        assert_eq!(PaymentMethod::CashOnDelivery.as_str(), "cash_on_delivery");
        assert_eq!(
            serde_json::to_value(PaymentMethod::CashOnDelivery).ok(),
            Some(serde_json::json!("cash_on_delivery"))
        );
    }

    #[test]
    fn test_order_status_from_backend() {
        assert_eq!(OrderStatus::from_backend("Canceled"), OrderStatus::Cancelled);
        assert_eq!(
            OrderStatus::from_backend("out for delivery"),
            OrderStatus::Shipped
        );
        assert_eq!(
            OrderStatus::from_backend("on_hold"),
            OrderStatus::Other("on_hold".to_string())
        );
    }

    #[test]
    fn test_cancellable() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
    }
}
