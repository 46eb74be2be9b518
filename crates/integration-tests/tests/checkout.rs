//! Integration tests for the order submission coordinator.
//!
//! Run with: cargo test -p souq-integration-tests --test checkout

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use serde_json::json;
use souq_core::{AddressError, AddressField, OrderId, ProductId, ShippingAddress};
use souq_integration_tests::{Canned, Harness, MockBackend, RecordingFrontend, unreachable_url};
use souq_storefront::{
    ApiClient, ApiError, CheckoutError, CheckoutForm, Frontend, NotificationLevel,
    OrderCoordinator, Route, SubmitOutcome,
};

async fn backend() -> MockBackend {
    MockBackend::start()
        .await
        .expect("Failed to start mock backend")
}

fn filled_form() -> CheckoutForm {
    CheckoutForm {
        address: ShippingAddress {
            recipient_name: "Mona Adel".to_string(),
            phone: "01001234567".to_string(),
            governorate: "Cairo".to_string(),
            city: "Nasr City".to_string(),
            street: "12 Makram Ebeid".to_string(),
            ..ShippingAddress::default()
        },
        notes: "Ring twice".to_string(),
        coupon_code: None,
    }
}

/// Signed-in harness with product 5 (100 EGP) x2 in a fetched cart.
async fn ready_to_order(backend: &MockBackend) -> Harness {
    let harness = Harness::signed_in(backend.base_url());
    backend.seed_line(5, 2);
    harness.cart.refresh().await.expect("Cart fetch failed");
    harness
}

// ============================================================================
// Success
// ============================================================================

#[tokio::test]
async fn test_successful_order_clears_cart_and_navigates() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(
            StatusCode::OK,
            &json!({"data": {"id": 42, "order_number": "ORD-42", "total_amount": 250}}),
        ),
    );
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    let SubmitOutcome::Succeeded(confirmation) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(confirmation.order_id, Some(OrderId::new(42)));
    assert_eq!(confirmation.order_number.as_deref(), Some("ORD-42"));
    assert_eq!(confirmation.total.amount, Decimal::from(250));
    assert_eq!(confirmation.destination, Route::OrderDetail(OrderId::new(42)));

    assert_eq!(form, CheckoutForm::default());
    assert!(harness.cart.snapshot().is_none());
    assert_eq!(backend.count(&Method::DELETE, "/cart/clear"), 1);
    assert_eq!(backend.server_cart_len(), 0);
    assert!(!harness.coordinator.is_submitting());

    let notifications = harness.frontend.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Success);
    assert_eq!(
        notifications[0].message,
        "Order ORD-42 has been placed. Total: 250.00 EGP"
    );
    assert_eq!(notifications[0].duration, Duration::from_secs(8));

    // Navigation is deferred so the notification can be read first.
    assert!(harness.frontend.routes().is_empty());
    harness.wait_for_navigation().await;
    assert_eq!(
        harness.frontend.routes(),
        vec![Route::OrderDetail(OrderId::new(42))]
    );
}

#[tokio::test]
async fn test_order_payload_and_idempotency_key() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    let mut form = filled_form();
    form.coupon_code = Some("RAMADAN".to_string());

    let outcome = harness.coordinator.submit(&mut form).await;
    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");

    let requests = backend.requests_to(&Method::POST, "/orders");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    let key = request.idempotency_key.as_deref().expect("Idempotency-Key sent");
    assert_eq!(key.len(), 36);

    let body = &request.body;
    assert_eq!(body["payment_method"], "cash_on_delivery");
    assert_eq!(body["notes"], "Ring twice");
    assert_eq!(body["coupon_code"], "RAMADAN");
    assert_eq!(body["shipping_address"]["name"], "Mona Adel");
    assert_eq!(body["shipping_address"]["city"], "Nasr City");
    assert_eq!(body["items"][0]["product_id"], 5);
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_each_attempt_gets_a_fresh_idempotency_key() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(StatusCode::INTERNAL_SERVER_ERROR, &json!({"message": "Server Error"})),
    );

    let mut form = filled_form();
    assert!(!harness.coordinator.submit(&mut form).await.is_success());
    assert!(!harness.coordinator.submit(&mut form).await.is_success());

    let keys: Vec<_> = backend
        .requests_to(&Method::POST, "/orders")
        .into_iter()
        .filter_map(|r| r.idempotency_key)
        .collect();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
}

#[tokio::test]
async fn test_success_message_without_id_goes_to_order_list() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(StatusCode::CREATED, &json!({"message": "Order placed successfully"})),
    );
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    let SubmitOutcome::Succeeded(confirmation) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(confirmation.order_id, None);
    // Falls back to the cart's own total.
    assert_eq!(confirmation.total.amount, Decimal::from(200));
    harness.wait_for_navigation().await;
    assert_eq!(harness.frontend.routes(), vec![Route::OrderList]);
}

// ============================================================================
// Guards
// ============================================================================

#[tokio::test]
async fn test_invalid_address_makes_no_request() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());
    let mut form = filled_form();
    form.address.city = "   ".to_string();
    let before = form.clone();

    let outcome = harness.coordinator.submit(&mut form).await;

    let SubmitOutcome::Failed(CheckoutError::Address(AddressError::MissingField(field))) = outcome
    else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(field, AddressField::City);
    assert_eq!(form, before);
    assert!(backend.requests().is_empty());
    assert!(!harness.coordinator.is_submitting());
    let notifications = harness.frontend.notifications();
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert_eq!(notifications[0].message, "City is required");
}

#[tokio::test]
async fn test_cart_emptied_by_mutations_is_refused() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());
    harness
        .cart
        .add_line(ProductId::new(5), 1)
        .await
        .expect("Add failed");
    harness
        .cart
        .remove_line(ProductId::new(5))
        .await
        .expect("Remove failed");
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    assert!(matches!(outcome, SubmitOutcome::Failed(CheckoutError::EmptyCart)));
    assert_eq!(backend.count(&Method::POST, "/orders"), 0);
    assert!(!harness.coordinator.is_submitting());
    assert_eq!(form, filled_form());
}

#[tokio::test]
async fn test_cart_is_fetched_when_never_loaded() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());
    backend.seed_line(7, 1);
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    assert_eq!(backend.count(&Method::POST, "/orders"), 1);
}

#[tokio::test]
async fn test_order_uses_server_cart_not_stale_snapshot() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    // Added from another device after the snapshot was taken.
    backend.seed_line(7, 3);
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let body = &backend.requests_to(&Method::POST, "/orders")[0].body;
    let items = body["items"].as_array().expect("items array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["product_id"], 7);
    assert_eq!(items[1]["quantity"], 3);
}

#[tokio::test]
async fn test_failed_refetch_falls_back_to_snapshot() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::GET,
        "/cart",
        Canned::json(StatusCode::SERVICE_UNAVAILABLE, &json!({"message": "Down for maintenance"})),
    );
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let body = &backend.requests_to(&Method::POST, "/orders")[0].body;
    assert_eq!(body["items"][0]["product_id"], 5);
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_double_submit_sends_one_order() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(
            StatusCode::CREATED,
            &json!({"success": true, "data": {"order": {"id": 42, "order_number": "ORD-42"}}}),
        )
        .delayed(Duration::from_millis(300)),
    );
    let mut first = filled_form();
    let mut second = filled_form();

    let (a, b) = tokio::join!(
        harness.coordinator.submit(&mut first),
        harness.coordinator.submit(&mut second)
    );

    assert!(a.is_success(), "unexpected outcome: {a:?}");
    assert!(matches!(b, SubmitOutcome::Busy));
    assert_eq!(backend.count(&Method::POST, "/orders"), 1);
    assert_eq!(second, filled_form());
    assert!(
        harness
            .frontend
            .notifications()
            .iter()
            .any(|n| n.level == NotificationLevel::Warning && n.title == "Please wait")
    );
    assert!(!harness.coordinator.is_submitting());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_network_failure_keeps_cart_and_form() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    let before = harness.cart.snapshot();

    let dead = harness.config.clone();
    let dead = souq_storefront::ClientConfig {
        api_base_url: unreachable_url().await.expect("Failed to reserve a port"),
        ..dead
    };
    let api = ApiClient::new(&dead, harness.session.clone()).expect("client");
    let frontend = Arc::new(RecordingFrontend::default());
    let coordinator = OrderCoordinator::new(
        api,
        harness.cart.clone(),
        Arc::clone(&frontend) as Arc<dyn Frontend>,
        dead.navigation_delay,
    );
    let mut form = filled_form();

    let outcome = coordinator.submit(&mut form).await;

    let SubmitOutcome::Failed(CheckoutError::Api(ApiError::Network(_))) = &outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(!coordinator.is_submitting());
    assert_eq!(harness.cart.snapshot(), before);
    assert_eq!(form, filled_form());
    assert!(harness.session.is_authenticated());
    assert!(frontend.routes().is_empty());
    assert_eq!(
        frontend.notifications()[0].message,
        "Could not reach the server. Check your connection and try again."
    );
}

#[tokio::test]
async fn test_explicit_failure_flag_is_rejection() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(
            StatusCode::OK,
            &json!({"success": false, "message": "Payment method not supported", "data": {"id": 9}}),
        ),
    );
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    assert!(matches!(
        outcome,
        SubmitOutcome::Failed(CheckoutError::Rejected(ref m)) if m == "Payment method not supported"
    ));
    assert!(harness.cart.snapshot().is_some());
    assert_eq!(backend.count(&Method::DELETE, "/cart/clear"), 0);
}

#[tokio::test]
async fn test_stock_failure_uses_fixed_message() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(
            StatusCode::UNPROCESSABLE_ENTITY,
            &json!({"message": "Insufficient stock for product Dates Box"}),
        ),
    );
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    let SubmitOutcome::Failed(err @ CheckoutError::InsufficientStock { .. }) = &outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    let notification = &harness.frontend.notifications()[0];
    assert_eq!(notification.title, "Cart needs attention");
    assert_eq!(notification.message, err.user_message());
    assert!(notification.message.starts_with("Some items in your cart"));
}

#[tokio::test]
async fn test_validation_errors_reach_the_user() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(
            StatusCode::UNPROCESSABLE_ENTITY,
            &json!({
                "message": "The given data was invalid.",
                "errors": {
                    "shipping_address.phone": ["The phone format is invalid."],
                    "shipping_address.city": ["The selected city is invalid."]
                }
            }),
        ),
    );
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    assert!(matches!(outcome, SubmitOutcome::Failed(CheckoutError::Api(_))));
    assert_eq!(
        harness.frontend.notifications()[0].message,
        "The selected city is invalid.; The phone format is invalid."
    );
    assert_eq!(form, filled_form());
}

#[tokio::test]
async fn test_expired_session_sends_user_to_login() {
    let backend = backend().await;
    let harness = ready_to_order(&backend).await;
    backend.set_response(
        &Method::POST,
        "/orders",
        Canned::json(StatusCode::UNAUTHORIZED, &json!({"message": "Unauthenticated."})),
    );
    let mut form = filled_form();

    let outcome = harness.coordinator.submit(&mut form).await;

    assert!(matches!(
        outcome,
        SubmitOutcome::Failed(CheckoutError::Api(ApiError::Unauthenticated { .. }))
    ));
    assert!(!harness.session.is_authenticated());
    assert!(harness.cart.snapshot().is_none());
    assert_eq!(harness.frontend.routes(), vec![Route::Login]);
}
