//! Integration tests for order history, tracking and cancellation.
//!
//! Run with: cargo test -p souq-integration-tests --test orders

use axum::http::Method;
use rust_decimal::Decimal;
use souq_core::{OrderId, OrderStatus, ProductId};
use souq_integration_tests::{Harness, MockBackend};
use souq_storefront::{ApiError, CheckoutForm, OrdersError, SubmitOutcome};

async fn backend() -> MockBackend {
    MockBackend::start()
        .await
        .expect("Failed to start mock backend")
}

/// Place one order for 2 x product 5 through the coordinator.
async fn place_order(backend: &MockBackend, harness: &Harness) -> OrderId {
    backend.seed_line(5, 2);
    let mut form = CheckoutForm::default();
    form.address.recipient_name = "Mona Adel".to_string();
    form.address.phone = "01001234567".to_string();
    form.address.governorate = "Cairo".to_string();
    form.address.city = "Nasr City".to_string();
    form.address.street = "12 Makram Ebeid".to_string();

    match harness.coordinator.submit(&mut form).await {
        SubmitOutcome::Succeeded(confirmation) => {
            confirmation.order_id.expect("order id in acknowledgement")
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_placed_order_appears_in_history() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());
    let id = place_order(&backend, &harness).await;

    let orders = harness.orders.list(Some(1)).await.expect("List failed");

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, id);
    assert_eq!(orders[0].order_number.as_deref(), Some("ORD-42"));
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(
        orders[0].total.as_ref().map(|p| p.amount),
        Some(Decimal::from(200))
    );
    assert!(orders[0].placed_at.is_some());
    assert_eq!(backend.requests_to(&Method::GET, "/orders")[0].query, "page=1&lang=en");
}

#[tokio::test]
async fn test_order_detail_includes_lines() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());
    let id = place_order(&backend, &harness).await;

    let order = harness.orders.get(id).await.expect("Get failed");

    assert_eq!(order.summary.id, id);
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].product_id, Some(ProductId::new(5)));
    assert_eq!(order.lines[0].quantity, 2);
}

#[tokio::test]
async fn test_tracking() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());
    let id = place_order(&backend, &harness).await;

    let tracking = harness.orders.tracking(id).await.expect("Tracking failed");

    assert_eq!(tracking.status, OrderStatus::Pending);
    assert_eq!(tracking.tracking_number.as_deref(), Some("EG42"));
    assert_eq!(tracking.carrier.as_deref(), Some("Souq Express"));
    assert_eq!(tracking.events.len(), 1);
    assert!(tracking.events[0].at.is_some());
}

#[tokio::test]
async fn test_cancel_once() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());
    let id = place_order(&backend, &harness).await;

    harness
        .orders
        .cancel(id, Some(" Ordered by mistake "))
        .await
        .expect("Cancel failed");

    let request = &backend.requests_to(&Method::PUT, "/orders/42/cancel")[0];
    assert_eq!(request.body["reason"], "Ordered by mistake");
    let order = harness.orders.get(id).await.expect("Get failed");
    assert_eq!(order.summary.status, OrderStatus::Cancelled);

    let err = harness
        .orders
        .cancel(id, None)
        .await
        .expect_err("Second cancel must be refused");
    assert!(matches!(
        err,
        OrdersError::Api(ApiError::ValidationFailed { ref message, .. })
            if message == "This order can no longer be cancelled."
    ));
}

#[tokio::test]
async fn test_unknown_order_is_http_error() {
    let backend = backend().await;
    let harness = Harness::signed_in(backend.base_url());

    let err = harness
        .orders
        .get(OrderId::new(404))
        .await
        .expect_err("Unknown order");

    assert!(matches!(err, OrdersError::Api(ApiError::Http { status: 404, .. })));
}

#[tokio::test]
async fn test_orders_require_sign_in() {
    let backend = backend().await;
    let harness = Harness::new(backend.base_url());

    let err = harness.orders.list(None).await.expect_err("signed out");

    assert!(matches!(err, OrdersError::NotAuthenticated));
    assert!(backend.requests().is_empty());
}
