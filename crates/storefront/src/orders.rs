//! Order follow-up calls: history, detail, tracking, cancellation.
//!
//! Responses are unwrapped with the same shape-matchers as the create-order
//! acknowledgement, so `{data: {...}}`, `{order: {...}}` and bare objects
//! are all accepted.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use souq_core::{DEFAULT_CURRENCY, OrderId, OrderStatus, Price, ProductId, ShippingAddress};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::shapes::{
    amount_field, backend_message, is_acknowledged, list_body, order_body, string_field,
    unwrap_data,
};

/// Errors from order follow-up calls.
#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("Please sign in to view your orders")]
    NotAuthenticated,

    /// The response did not contain an order.
    #[error("Unexpected order response: {0}")]
    Malformed(String),

    /// The backend answered 2xx without acknowledging the action.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl OrdersError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// One row of the order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: Option<String>,
    pub status: OrderStatus,
    pub total: Option<Price>,
    pub placed_at: Option<DateTime<Utc>>,
}

impl OrderSummary {
    fn from_json(order: &Value) -> Option<Self> {
        let id = ["id", "order_id"]
            .iter()
            .find_map(|k| order.get(*k).and_then(OrderId::from_json))?;
        let currency =
            string_field(order, "currency").unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Some(Self {
            id,
            order_number: string_field(order, "order_number")
                .or_else(|| string_field(order, "number")),
            status: string_field(order, "status")
                .map_or_else(OrderStatus::default, |s| OrderStatus::from_backend(&s)),
            total: amount_field(order, &["total_amount", "total", "grand_total"])
                .map(|amount| Price::new(amount, currency)),
            placed_at: ["created_at", "placed_at", "date"]
                .iter()
                .find_map(|k| order.get(*k).and_then(Value::as_str).and_then(parse_timestamp)),
        })
    }
}

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub product_id: Option<ProductId>,
    pub name: String,
    pub quantity: u32,
    pub price: Option<Price>,
}

/// A single order with its lines and delivery address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub lines: Vec<OrderLine>,
    pub shipping_address: Option<ShippingAddress>,
    pub notes: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl OrderDetail {
    fn from_json(order: &Value) -> Option<Self> {
        let summary = OrderSummary::from_json(order)?;
        let currency = summary
            .total
            .as_ref()
            .map_or_else(|| DEFAULT_CURRENCY.to_string(), |p| p.currency.clone());

        let lines = ["items", "order_items", "lines"]
            .iter()
            .find_map(|k| order.get(*k).and_then(Value::as_array))
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let product = item.get("product");
                        Some(OrderLine {
                            product_id: item
                                .get("product_id")
                                .and_then(ProductId::from_json)
                                .or_else(|| product?.get("id").and_then(ProductId::from_json)),
                            name: string_field(item, "name")
                                .or_else(|| string_field(item, "product_name"))
                                .or_else(|| product.and_then(|p| string_field(p, "name")))
                                .unwrap_or_default(),
                            quantity: item.get("quantity").and_then(souq_core::parse_quantity)?,
                            price: amount_field(item, &["price", "unit_price"])
                                .map(|amount| Price::new(amount, currency.clone())),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let shipping_address = order
            .get("shipping_address")
            .filter(|a| a.is_object())
            .and_then(|a| serde_json::from_value(a.clone()).ok());

        Some(Self {
            summary,
            lines,
            shipping_address,
            notes: string_field(order, "notes"),
            raw: order.clone(),
        })
    }
}

/// A single step in an order's delivery history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingEvent {
    pub status: OrderStatus,
    pub description: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

/// Delivery progress of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tracking {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub events: Vec<TrackingEvent>,
}

impl Tracking {
    fn from_json(body: &Value) -> Self {
        let tracking = unwrap_data(body);
        let tracking = tracking
            .get("tracking")
            .filter(|t| t.is_object())
            .unwrap_or(tracking);

        let events = ["events", "history", "timeline"]
            .iter()
            .find_map(|k| tracking.get(*k).and_then(Value::as_array))
            .map(|events| {
                events
                    .iter()
                    .map(|event| TrackingEvent {
                        status: string_field(event, "status")
                            .map_or_else(OrderStatus::default, |s| OrderStatus::from_backend(&s)),
                        description: string_field(event, "description")
                            .or_else(|| string_field(event, "note")),
                        at: ["created_at", "date", "timestamp"].iter().find_map(|k| {
                            event.get(*k).and_then(Value::as_str).and_then(parse_timestamp)
                        }),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            status: string_field(tracking, "status")
                .map_or_else(OrderStatus::default, |s| OrderStatus::from_backend(&s)),
            tracking_number: string_field(tracking, "tracking_number"),
            carrier: string_field(tracking, "carrier")
                .or_else(|| string_field(tracking, "shipping_company")),
            events,
        }
    }
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD HH:MM:SS` one taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

// =============================================================================
// OrdersApi
// =============================================================================

/// Client for the order endpoints.
#[derive(Debug, Clone)]
pub struct OrdersApi {
    api: ApiClient,
}

impl OrdersApi {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn ensure_session(&self) -> Result<(), OrdersError> {
        if self.api.session().is_authenticated() {
            Ok(())
        } else {
            Err(OrdersError::NotAuthenticated)
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, &str)],
    ) -> Result<Value, OrdersError> {
        self.ensure_session()?;
        self.api
            .request(method, path, body, query)
            .await
            .inspect_err(|e| {
                warn!(error = %e, path, "Order request failed");
                self.api.session().handle_auth_failure(e);
            })
            .map_err(OrdersError::from)
    }

    /// The signed-in user's order history.
    ///
    /// # Errors
    ///
    /// Returns `OrdersError` if not signed in or the request fails.
    #[instrument(skip(self))]
    pub async fn list(&self, page: Option<u32>) -> Result<Vec<OrderSummary>, OrdersError> {
        let page = page.map(|p| p.to_string());
        let query: Vec<(&str, &str)> = page.as_deref().map(|p| ("page", p)).into_iter().collect();
        let body = self.call(Method::GET, "/orders", None, &query).await?;
        Ok(list_body(&body, "orders")
            .iter()
            .filter_map(OrderSummary::from_json)
            .collect())
    }

    /// A single order.
    ///
    /// # Errors
    ///
    /// Returns `OrdersError` if not signed in, the request fails, or the
    /// response holds no order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get(&self, id: OrderId) -> Result<OrderDetail, OrdersError> {
        let body = self
            .call(Method::GET, &format!("/orders/{id}"), None, &[])
            .await?;
        OrderDetail::from_json(order_body(&body))
            .ok_or_else(|| OrdersError::Malformed(format!("no order {id} in response")))
    }

    /// Delivery progress of an order.
    ///
    /// # Errors
    ///
    /// Returns `OrdersError` if not signed in or the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn tracking(&self, id: OrderId) -> Result<Tracking, OrdersError> {
        let body = self
            .call(Method::GET, &format!("/orders/{id}/tracking"), None, &[])
            .await?;
        Ok(Tracking::from_json(&body))
    }

    /// Ask the backend to cancel an order.
    ///
    /// # Errors
    ///
    /// Returns `OrdersError` if not signed in, the request fails, or the
    /// backend does not acknowledge the cancellation.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel(&self, id: OrderId, reason: Option<&str>) -> Result<(), OrdersError> {
        let body = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| json!({"reason": r}));
        let response = self
            .call(Method::PUT, &format!("/orders/{id}/cancel"), body, &[])
            .await?;

        if is_acknowledged(&response) {
            Ok(())
        } else {
            Err(OrdersError::Rejected(backend_message(&response).unwrap_or_else(
                || "The order could not be cancelled.".to_string(),
            )))
        }
    }
}
