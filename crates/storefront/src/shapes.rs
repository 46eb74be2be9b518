//! Shape-matchers for backend responses with no fixed schema.
//!
//! The backend wraps payloads differently per endpoint and per version:
//! sometimes in `data`, sometimes in `cart`/`order`, sometimes not at all.
//! Instead of nested special cases, each possible layout is a small
//! extraction function, and the functions are tried in priority order until
//! one of them produces a normalized value.

use rust_decimal::Decimal;
use serde_json::Value;
use souq_core::{OrderId, parse_amount};

/// Words in a backend message that indicate a successful order.
const SUCCESS_MARKERS: &[&str] = &["success", "created", "placed"];

/// Words that turn an otherwise successful-sounding message into a failure.
const FAILURE_MARKERS: &[&str] = &["not ", "fail", "unsuccess", "error", "cannot", "unable"];

/// Extraction function tried against a response body.
pub type ShapeMatcher<T> = fn(&Value) -> Option<T>;

/// Run matchers in order; the first one that matches wins.
pub fn first_match<T>(body: &Value, matchers: &[(&'static str, ShapeMatcher<T>)]) -> Option<T> {
    matchers.iter().find_map(|(name, matcher)| {
        let result = matcher(body);
        if result.is_some() {
            tracing::trace!(shape = *name, "Response shape matched");
        }
        result
    })
}

// =============================================================================
// Generic helpers
// =============================================================================

/// JSON truthiness the way the backend means it: `true`, `1`, `"true"`, `"1"`.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Non-empty trimmed string at `key`.
#[must_use]
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First key in `keys` that holds a parseable amount.
#[must_use]
pub fn amount_field(value: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|k| value.get(*k).and_then(parse_amount))
}

/// Human-readable message from a backend body (`message`, then `error`).
#[must_use]
pub fn backend_message(body: &Value) -> Option<String> {
    string_field(body, "message").or_else(|| match body.get("error")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        nested @ Value::Object(_) => string_field(nested, "message"),
        _ => None,
    })
}

/// Whether a mutation response carries a truthy success indicator.
///
/// `success` is checked first; if absent, `status` of `"success"`/`"ok"` is
/// accepted. A JSON `null` (an empty 2xx body) counts as an acknowledgement.
#[must_use]
pub fn is_acknowledged(body: &Value) -> bool {
    if body.is_null() {
        return true;
    }
    if let Some(flag) = body.get("success") {
        return is_truthy(flag);
    }
    body.get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "success" | "ok"))
}

// =============================================================================
// Envelopes
// =============================================================================

fn data_cart(body: &Value) -> Option<&Value> {
    body.get("data")?.get("cart").filter(|v| v.is_object())
}

fn data_object(body: &Value) -> Option<&Value> {
    body.get("data").filter(|v| v.is_object())
}

fn cart_object(body: &Value) -> Option<&Value> {
    body.get("cart").filter(|v| v.is_object())
}

fn data_order(body: &Value) -> Option<&Value> {
    body.get("data")?.get("order").filter(|v| v.is_object())
}

fn order_object(body: &Value) -> Option<&Value> {
    body.get("order").filter(|v| v.is_object())
}

type Envelope = fn(&Value) -> Option<&Value>;

const CART_ENVELOPES: [Envelope; 3] = [data_cart, data_object, cart_object];
const ORDER_ENVELOPES: [Envelope; 3] = [data_order, data_object, order_object];

/// The cart object inside a `GET /cart` response.
///
/// Tries `data.cart`, `data`, `cart`, then the body itself.
#[must_use]
pub fn cart_body(body: &Value) -> &Value {
    CART_ENVELOPES
        .iter()
        .find_map(|f| f(body))
        .unwrap_or(body)
}

/// The payload of a single-resource response (`data` or the body itself).
#[must_use]
pub fn unwrap_data(body: &Value) -> &Value {
    data_object(body).unwrap_or(body)
}

/// The order object inside a response: `data.order`, `data`, `order`, body.
#[must_use]
pub fn order_body(body: &Value) -> &Value {
    ORDER_ENVELOPES
        .iter()
        .find_map(|f| f(body))
        .unwrap_or(body)
}

/// The list of records inside a collection response.
///
/// Accepts a bare array, `data: [...]`, `data: {data: [...]}` (paginated)
/// and `<key>: [...]`.
#[must_use]
pub fn list_body<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    let found = body
        .as_array()
        .or_else(|| body.get("data").and_then(Value::as_array))
        .or_else(|| body.get("data")?.get("data").and_then(Value::as_array))
        .or_else(|| body.get("data")?.get(key).and_then(Value::as_array))
        .or_else(|| body.get(key).and_then(Value::as_array));
    match found {
        Some(items) => items,
        None => &[],
    }
}

// =============================================================================
// Order acknowledgement
// =============================================================================

/// Normalized result of a create-order call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    /// Created order identifier, when the backend returned one.
    pub id: Option<OrderId>,
    /// Customer-facing order number (e.g. `ORD-42`).
    pub order_number: Option<String>,
    /// Order total as computed by the backend.
    pub total: Option<Decimal>,
}

impl OrderAck {
    fn from_order(order: &Value) -> Self {
        Self {
            id: order_id(order),
            order_number: string_field(order, "order_number")
                .or_else(|| string_field(order, "number"))
                .or_else(|| string_field(order, "reference")),
            total: amount_field(order, &["total_amount", "total", "grand_total"]),
        }
    }
}

fn order_id(value: &Value) -> Option<OrderId> {
    ["id", "order_id"]
        .iter()
        .find_map(|k| value.get(*k).and_then(OrderId::from_json))
}

fn explicit_success(body: &Value) -> Option<OrderAck> {
    body.get("success")
        .filter(|flag| is_truthy(flag))
        .map(|_| OrderAck::from_order(order_body(body)))
}

fn top_level_id(body: &Value) -> Option<OrderAck> {
    order_id(body).map(|_| OrderAck::from_order(body))
}

fn data_wrapper(body: &Value) -> Option<OrderAck> {
    let data = data_object(body)?;
    if let Some(order) = data.get("order").filter(|o| order_id(o).is_some()) {
        return Some(OrderAck::from_order(order));
    }
    order_id(data).map(|_| OrderAck::from_order(data))
}

fn order_wrapper(body: &Value) -> Option<OrderAck> {
    let order = body.get("order")?;
    order_id(order).map(|_| OrderAck::from_order(order))
}

fn success_message(body: &Value) -> Option<OrderAck> {
    let message = string_field(body, "message")?.to_lowercase();
    let negated = FAILURE_MARKERS.iter().any(|marker| message.contains(marker));
    (!negated && SUCCESS_MARKERS.iter().any(|marker| message.contains(marker)))
        .then(|| OrderAck::from_order(order_body(body)))
}

/// Create-order acknowledgement layouts, in priority order.
pub const ORDER_ACK_MATCHERS: &[(&str, ShapeMatcher<OrderAck>)] = &[
    ("explicit_success_flag", explicit_success),
    ("top_level_id", top_level_id),
    ("data_wrapper", data_wrapper),
    ("order_wrapper", order_wrapper),
    ("success_message", success_message),
];

/// Interpret a create-order response.
///
/// An explicit falsy `success` flag is a rejection no matter what else the
/// body contains. Otherwise the first matching layout wins; `None` means
/// the order was not accepted.
#[must_use]
pub fn interpret_order_ack(body: &Value) -> Option<OrderAck> {
    if body.get("success").is_some_and(|flag| !is_truthy(flag)) {
        return None;
    }
    first_match(body, ORDER_ACK_MATCHERS)
}
