//! Integration tests for souq.
//!
//! The tests drive the real storefront client (reqwest, session store, cart
//! synchronizer, order coordinator) against an in-process mock of the
//! catalog/order backend built with axum and bound to an ephemeral port.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p souq-integration-tests
//! ```
//!
//! # Mock backend
//!
//! [`MockBackend`] keeps a small stateful cart and order book so mutation
//! sequences behave like the real thing. Any route can be overridden with a
//! [`Canned`] response (status, content type, body, delay) to provoke
//! failures. Every request is recorded for assertions.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use secrecy::SecretString;
use serde_json::{Value, json};
use souq_core::Locale;
use souq_storefront::{
    ApiClient, CartSynchronizer, ClientConfig, Frontend, Notification, OrderCoordinator, OrdersApi,
    Route, Session, TotalsPolicy,
};
use tokio::task::JoinHandle;
use url::Url;

/// Token the mock backend treats as revoked.
pub const EXPIRED_TOKEN: &str = "expired-token";

/// Token used by signed-in test sessions.
pub const VALID_TOKEN: &str = "test-token";

/// Prefix every backend path is mounted under.
const API_PREFIX: &str = "/api";

// =============================================================================
// Recorded requests and canned responses
// =============================================================================

/// A request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path without the `/api` prefix, e.g. `/cart/add`.
    pub path: String,
    pub query: String,
    pub accept: Option<String>,
    pub authorization: Option<String>,
    pub idempotency_key: Option<String>,
    pub body: Value,
}

/// A fixed response replacing a route's default behavior.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Duration,
    pub retry_after: Option<u64>,
}

impl Canned {
    /// JSON response.
    #[must_use]
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
            delay: Duration::ZERO,
            retry_after: None,
        }
    }

    /// HTML response, as served by a misconfigured proxy or error page.
    #[must_use]
    pub fn html(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            content_type: "text/html; charset=UTF-8",
            body: body.to_string(),
            delay: Duration::ZERO,
            retry_after: None,
        }
    }

    /// Respond only after `delay`.
    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Add a `Retry-After` header.
    #[must_use]
    pub const fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

impl IntoResponse for Canned {
    fn into_response(self) -> Response {
        let mut response =
            (self.status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response();
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, seconds.into());
        }
        response
    }
}

// =============================================================================
// Backend state
// =============================================================================

#[derive(Debug, Clone)]
struct MockLine {
    product_id: i64,
    quantity: i64,
    unit_price: i64,
}

#[derive(Debug, Clone)]
struct MockOrder {
    id: i64,
    total: i64,
    status: &'static str,
    items: Vec<MockLine>,
}

#[derive(Debug, Default)]
struct BackendState {
    lines: Mutex<Vec<MockLine>>,
    coupon: Mutex<Option<String>>,
    valid_coupons: Mutex<Vec<String>>,
    orders: Mutex<Vec<MockOrder>>,
    overrides: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Catalog price of a product in the mock backend.
#[must_use]
pub const fn unit_price(product_id: i64) -> i64 {
    match product_id {
        5 => 100,
        7 => 55,
        _ => 40,
    }
}

/// Discount granted by any accepted coupon.
pub const COUPON_DISCOUNT: i64 = 10;

// =============================================================================
// MockBackend
// =============================================================================

/// In-process catalog/order backend.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    task: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MockBackend {
    /// Start the backend on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if no local port can be bound.
    pub async fn start() -> io::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(BackendState::default());

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });

        Ok(Self { addr, state, task })
    }

    /// Base URL clients should be configured with.
    ///
    /// # Panics
    ///
    /// Never in practice; the address is always a valid URL.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}{API_PREFIX}", self.addr)).unwrap()
    }

    /// Put a line in the cart directly, as if added from another device.
    pub fn seed_line(&self, product_id: i64, quantity: i64) {
        lock(&self.state.lines).push(MockLine {
            product_id,
            quantity,
            unit_price: unit_price(product_id),
        });
    }

    /// Make `code` an acceptable coupon.
    pub fn accept_coupon(&self, code: &str) {
        lock(&self.state.valid_coupons).push(code.to_string());
    }

    /// Replace the response of `method path` (path without `/api`).
    pub fn set_response(&self, method: &Method, path: &str, canned: Canned) {
        lock(&self.state.overrides).insert(route_key(method, path), canned);
    }

    /// Restore the default behavior of `method path`.
    pub fn clear_response(&self, method: &Method, path: &str) {
        lock(&self.state.overrides).remove(&route_key(method, path));
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    /// Requests received for `method path`.
    #[must_use]
    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Number of requests received for `method path`.
    #[must_use]
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    /// Number of lines in the server-side cart.
    #[must_use]
    pub fn server_cart_len(&self) -> usize {
        lock(&self.state.lines).len()
    }
}

fn route_key(method: &Method, path: &str) -> String {
    format!("{method} {path}")
}

async fn handle(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(uri.path())
        .to_string();
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let request = RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().unwrap_or("").to_string(),
        accept: header_value("accept"),
        authorization: header_value("authorization"),
        idempotency_key: header_value("idempotency-key"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    lock(&state.requests).push(request.clone());

    let canned = lock(&state.overrides)
        .get(&route_key(&method, &path))
        .cloned();
    if let Some(canned) = canned {
        tokio::time::sleep(canned.delay).await;
        return canned.into_response();
    }

    match request.authorization.as_deref() {
        Some(auth) if auth.starts_with("Bearer ") && auth != format!("Bearer {EXPIRED_TOKEN}") => {}
        _ => {
            return Canned::json(StatusCode::UNAUTHORIZED, &json!({"message": "Unauthenticated."}))
                .into_response();
        }
    }

    route(&state, &method, &path, &request.body)
}

fn route(state: &BackendState, method: &Method, path: &str, body: &Value) -> Response {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let ok = |payload: Value| Canned::json(StatusCode::OK, &payload).into_response();
    let id_of = |v: &Value| v.as_i64().or_else(|| v.as_str()?.parse().ok());

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["cart"]) => ok(json!({"success": true, "data": cart_json(state)})),
        ("POST", ["cart", "add"]) => {
            let (Some(product_id), Some(quantity)) = (
                body.get("product_id").and_then(id_of),
                body.get("quantity").and_then(id_of),
            ) else {
                return validation_error("The product id field is required.");
            };
            let mut lines = lock(&state.lines);
            match lines.iter_mut().find(|l| l.product_id == product_id) {
                Some(line) => line.quantity += quantity,
                None => lines.push(MockLine {
                    product_id,
                    quantity,
                    unit_price: unit_price(product_id),
                }),
            }
            ok(json!({"success": true, "message": "Product added to cart"}))
        }
        ("PUT", ["cart", "update"]) => {
            let product_id = body.get("product_id").and_then(id_of);
            let quantity = body.get("quantity").and_then(id_of).unwrap_or(0);
            let mut lines = lock(&state.lines);
            match lines.iter_mut().find(|l| Some(l.product_id) == product_id) {
                Some(line) => {
                    line.quantity = quantity;
                    ok(json!({"success": true}))
                }
                None => ok(json!({"success": false, "message": "Item not found in cart"})),
            }
        }
        ("DELETE", ["cart", "remove", id]) => {
            let id: Option<i64> = id.parse().ok();
            lock(&state.lines).retain(|l| Some(l.product_id) != id);
            ok(json!({"status": "success"}))
        }
        ("DELETE", ["cart", "clear"]) => {
            lock(&state.lines).clear();
            *lock(&state.coupon) = None;
            ok(json!({"success": true, "message": "Cart cleared"}))
        }
        ("POST", ["cart", "apply-coupon"]) => {
            let code = body
                .get("coupon_code")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if lock(&state.valid_coupons).contains(&code) {
                *lock(&state.coupon) = Some(code);
                ok(json!({"success": true, "message": "Coupon applied"}))
            } else {
                Canned::json(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    &json!({
                        "success": false,
                        "message": "The given data was invalid.",
                        "errors": {"coupon_code": ["The selected coupon code is invalid."]}
                    }),
                )
                .into_response()
            }
        }
        ("POST", ["cart", "remove-coupon"]) => {
            *lock(&state.coupon) = None;
            ok(json!({"success": true}))
        }
        ("POST", ["orders"]) => create_order(state),
        ("GET", ["orders"]) => {
            let orders: Vec<Value> = lock(&state.orders).iter().map(order_json).collect();
            ok(json!({"success": true, "data": {"data": orders, "current_page": 1}}))
        }
        ("GET", ["orders", id]) => find_order(state, id).map_or_else(not_found, |order| {
            ok(json!({"success": true, "data": order_json(&order)}))
        }),
        ("GET", ["orders", id, "tracking"]) => {
            find_order(state, id).map_or_else(not_found, |order| {
                ok(json!({"data": {
                    "status": order.status,
                    "tracking_number": format!("EG{}", order.id),
                    "carrier": "Souq Express",
                    "events": [
                        {"status": "pending", "description": "Order received", "created_at": "2026-03-01 10:30:00"}
                    ]
                }}))
            })
        }
        ("PUT", ["orders", id, "cancel"]) => {
            let id: Option<i64> = id.parse().ok();
            let mut orders = lock(&state.orders);
            match orders.iter_mut().find(|o| Some(o.id) == id) {
                Some(order) if order.status == "pending" => {
                    order.status = "cancelled";
                    ok(json!({"success": true, "message": "Order cancelled"}))
                }
                Some(_) => validation_error("This order can no longer be cancelled."),
                None => not_found(),
            }
        }
        _ => not_found(),
    }
}

fn cart_json(state: &BackendState) -> Value {
    let lines = lock(&state.lines);
    let coupon = lock(&state.coupon).clone();
    let items: Vec<Value> = lines
        .iter()
        .map(|l| {
            json!({
                "product_id": l.product_id,
                "name": format!("Product {}", l.product_id),
                "quantity": l.quantity,
                "unit_price": l.unit_price.to_string(),
            })
        })
        .collect();
    let count: i64 = lines.iter().map(|l| l.quantity).sum();

    let mut cart = json!({
        "items": items,
        "item_count": count,
        "currency": "EGP",
        "coupon": coupon.as_ref().map(|code| json!({
            "code": code,
            "type": "fixed",
            "value": COUPON_DISCOUNT,
            "discount_amount": COUPON_DISCOUNT,
        })),
    });
    if coupon.is_some()
        && let Some(map) = cart.as_object_mut()
    {
        map.insert("discount".to_string(), json!(COUPON_DISCOUNT));
    }
    cart
}

fn create_order(state: &BackendState) -> Response {
    let lines = lock(&state.lines).clone();
    if lines.is_empty() {
        return validation_error("Your cart is empty.");
    }
    let discount = if lock(&state.coupon).is_some() {
        COUPON_DISCOUNT
    } else {
        0
    };
    let total = lines.iter().map(|l| l.quantity * l.unit_price).sum::<i64>() - discount;

    let mut orders = lock(&state.orders);
    let id = 42 + i64::try_from(orders.len()).unwrap_or(0);
    let order = MockOrder {
        id,
        total,
        status: "pending",
        items: lines,
    };
    let payload = json!({
        "success": true,
        "message": "Order placed successfully",
        "data": {"order": order_json(&order)}
    });
    orders.push(order);
    Canned::json(StatusCode::CREATED, &payload).into_response()
}

fn order_json(order: &MockOrder) -> Value {
    json!({
        "id": order.id,
        "order_number": format!("ORD-{}", order.id),
        "status": order.status,
        "total_amount": order.total.to_string(),
        "currency": "EGP",
        "created_at": "2026-03-01T10:30:00Z",
        "items": order.items.iter().map(|l| json!({
            "product_id": l.product_id,
            "name": format!("Product {}", l.product_id),
            "quantity": l.quantity,
            "price": l.unit_price,
        })).collect::<Vec<_>>(),
    })
}

fn find_order(state: &BackendState, id: &str) -> Option<MockOrder> {
    let id: i64 = id.parse().ok()?;
    lock(&state.orders).iter().find(|o| o.id == id).cloned()
}

fn validation_error(message: &str) -> Response {
    Canned::json(
        StatusCode::UNPROCESSABLE_ENTITY,
        &json!({"success": false, "message": message}),
    )
    .into_response()
}

fn not_found() -> Response {
    Canned::json(
        StatusCode::NOT_FOUND,
        &json!({"success": false, "message": "Not found"}),
    )
    .into_response()
}

// =============================================================================
// Client harness
// =============================================================================

/// Frontend that records everything it is asked to show.
#[derive(Debug, Default)]
pub struct RecordingFrontend {
    notifications: Mutex<Vec<Notification>>,
    routes: Mutex<Vec<Route>>,
}

impl RecordingFrontend {
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }

    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        lock(&self.routes).clone()
    }
}

impl Frontend for RecordingFrontend {
    fn notify(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
    }

    fn navigate(&self, route: Route) {
        lock(&self.routes).push(route);
    }
}

/// Delays short enough to keep the suite fast.
pub const TEST_RATE_LIMIT_DELAY: Duration = Duration::from_millis(100);
pub const TEST_NAVIGATION_DELAY: Duration = Duration::from_millis(50);

/// A fully wired client pointed at a backend.
pub struct Harness {
    pub config: ClientConfig,
    pub session: Session,
    pub api: ApiClient,
    pub cart: CartSynchronizer,
    pub orders: OrdersApi,
    pub frontend: Arc<RecordingFrontend>,
    pub coordinator: OrderCoordinator,
}

impl Harness {
    /// Signed-out client for `base_url`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        let mut config = ClientConfig::new(base_url);
        config.rate_limit_delay = TEST_RATE_LIMIT_DELAY;
        config.navigation_delay = TEST_NAVIGATION_DELAY;
        config.request_timeout = Duration::from_secs(5);
        Self::with_config(config, Session::in_memory(Locale::default()))
    }

    /// Client with explicit configuration and session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn with_config(config: ClientConfig, session: Session) -> Self {
        let api = ApiClient::new(&config, session.clone()).unwrap();
        let cart = CartSynchronizer::new(
            api.clone(),
            TotalsPolicy {
                default_shipping: config.default_shipping,
            },
        );
        let frontend = Arc::new(RecordingFrontend::default());
        let coordinator = OrderCoordinator::new(
            api.clone(),
            cart.clone(),
            Arc::clone(&frontend) as Arc<dyn Frontend>,
            config.navigation_delay,
        );
        Self {
            orders: OrdersApi::new(api.clone()),
            config,
            session,
            api,
            cart,
            frontend,
            coordinator,
        }
    }

    /// Signed-in client for `base_url`.
    ///
    /// # Panics
    ///
    /// Panics if the token cannot be stored.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn signed_in(base_url: Url) -> Self {
        let harness = Self::new(base_url);
        harness
            .session
            .start(&SecretString::from(VALID_TOKEN))
            .unwrap();
        harness
    }

    /// Wait until a scheduled navigation has had time to fire.
    pub async fn wait_for_navigation(&self) {
        tokio::time::sleep(self.config.navigation_delay * 4).await;
    }
}

/// A base URL on which nothing is listening.
///
/// # Errors
///
/// Returns an I/O error if no local port can be bound.
pub async fn unreachable_url() -> io::Result<Url> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Url::parse(&format!("http://{addr}{API_PREFIX}"))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}
