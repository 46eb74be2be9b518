//! Order submission coordinator.
//!
//! Drives one submission attempt through
//! `Idle -> Locked -> (Succeeded | Failed) -> Idle`:
//!
//! 1. Take the [`SubmissionLock`] synchronously, before anything can suspend.
//!    A second trigger while it is held is answered with "please wait".
//! 2. Validate the address, refetch the cart and check it is non-empty.
//! 3. `POST /orders` and read the acknowledgement through the order
//!    shape-matchers.
//! 4. On success clear the cart (server, then local), reset the form,
//!    notify, release the lock and schedule navigation to the new order.
//!    On failure release the lock, notify with the most specific message and
//!    leave the form alone so the user can correct it.
//!
//! The lock only covers this process. Each attempt also carries an
//! `Idempotency-Key` so a backend that honors it can reject duplicates from
//! other tabs or devices.

mod lock;
mod payload;

use std::sync::Arc;
use std::time::Duration;

use souq_core::{AddressError, OrderId, Price, ShippingAddress};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::cart::{CartError, CartSnapshot, CartSynchronizer};
use crate::frontend::{Frontend, Notification, ORDER_NOTIFICATION_DURATION, Route};
use crate::shapes::{OrderAck, backend_message, interpret_order_ack};

pub use lock::{SubmissionGuard, SubmissionLock};
pub use payload::{OrderItem, OrderPayload};

const INSUFFICIENT_STOCK_MESSAGE: &str =
    "Some items in your cart are not available in the requested quantity. Please update your cart and try again.";
const PRODUCT_UNAVAILABLE_MESSAGE: &str =
    "One or more products in your cart are no longer available. Please remove them and try again.";
const GENERIC_FAILURE_MESSAGE: &str = "We could not place your order. Please try again.";

/// Why a submission attempt failed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A required address field is blank.
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Please sign in to place an order")]
    NotAuthenticated,

    /// The backend answered 2xx but nothing in the body looked like an order.
    #[error("{0}")]
    Rejected(String),

    /// The backend refused the order for lack of stock.
    #[error("Insufficient stock: {backend_message}")]
    InsufficientStock { backend_message: String },

    /// The backend refused the order because a product is gone.
    #[error("Product unavailable: {backend_message}")]
    ProductUnavailable { backend_message: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CheckoutError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::InsufficientStock { .. } => INSUFFICIENT_STOCK_MESSAGE.to_string(),
            Self::ProductUnavailable { .. } => PRODUCT_UNAVAILABLE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Notification title for this failure.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Address(_) => "Missing information",
            Self::EmptyCart => "Empty cart",
            Self::NotAuthenticated => "Sign in required",
            Self::InsufficientStock { .. } | Self::ProductUnavailable { .. } => "Cart needs attention",
            Self::Rejected(_) | Self::Api(_) => "Order failed",
        }
    }

    /// Replace backend stock/availability complaints with fixed texts.
    fn classify_business_rule(self) -> Self {
        let message = match &self {
            Self::Rejected(message) => Some(message.clone()),
            Self::Api(e @ (ApiError::ValidationFailed { .. } | ApiError::Http { .. })) => {
                Some(e.user_message())
            }
            _ => None,
        };
        let Some(message) = message else {
            return self;
        };

        let lower = message.to_lowercase();
        if lower.contains("stock") || lower.contains("quantity available") {
            Self::InsufficientStock {
                backend_message: message,
            }
        } else if lower.contains("product")
            && ["not found", "unavailable", "no longer available", "does not exist", "inactive"]
                .iter()
                .any(|marker| lower.contains(marker))
        {
            Self::ProductUnavailable {
                backend_message: message,
            }
        } else {
            self
        }
    }
}

impl From<CartError> for CheckoutError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Api(e) => Self::Api(e),
            CartError::NotAuthenticated => Self::NotAuthenticated,
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// Form state of the checkout page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    pub address: ShippingAddress,
    pub notes: String,
    pub coupon_code: Option<String>,
}

impl CheckoutForm {
    /// Return the form to its initial, empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What the user gets back after a successful order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub order_id: Option<OrderId>,
    pub order_number: Option<String>,
    pub total: Price,
    /// Where the frontend is sent once the navigation delay has passed.
    pub destination: Route,
}

/// Result of one call to [`OrderCoordinator::submit`].
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Another submission was already in flight; nothing was sent.
    Busy,
    Succeeded(OrderConfirmation),
    Failed(CheckoutError),
}

impl SubmitOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

// =============================================================================
// OrderCoordinator
// =============================================================================

/// Submits orders at most once at a time.
///
/// Cheaply cloneable; clones share the lock.
#[derive(Clone)]
pub struct OrderCoordinator {
    inner: Arc<OrderCoordinatorInner>,
}

struct OrderCoordinatorInner {
    api: ApiClient,
    cart: CartSynchronizer,
    frontend: Arc<dyn Frontend>,
    lock: SubmissionLock,
    navigation_delay: Duration,
}

impl std::fmt::Debug for OrderCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderCoordinator")
            .field("locked", &self.inner.lock.is_held())
            .field("navigation_delay", &self.inner.navigation_delay)
            .finish_non_exhaustive()
    }
}

impl OrderCoordinator {
    #[must_use]
    pub fn new(
        api: ApiClient,
        cart: CartSynchronizer,
        frontend: Arc<dyn Frontend>,
        navigation_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(OrderCoordinatorInner {
                api,
                cart,
                frontend,
                lock: SubmissionLock::new(),
                navigation_delay,
            }),
        }
    }

    /// Whether a submission is currently in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.inner.lock.is_held()
    }

    /// Submit the checkout form as an order.
    ///
    /// Never fails the process: every outcome, including transport errors,
    /// comes back as a [`SubmitOutcome`] with the lock released.
    #[instrument(skip(self, form))]
    pub async fn submit(&self, form: &mut CheckoutForm) -> SubmitOutcome {
        let Some(guard) = self.inner.lock.try_acquire() else {
            info!("Submission already in flight; ignoring trigger");
            self.inner.frontend.notify(Notification::warning(
                "Please wait",
                "Your order is already being submitted.",
            ));
            return SubmitOutcome::Busy;
        };

        match self.place(form).await {
            Ok((ack, cart)) => self.succeed(guard, form, &ack, &cart).await,
            Err(e) => {
                drop(guard);
                self.fail(e)
            }
        }
    }

    /// Preconditions and the create-order call.
    async fn place(&self, form: &CheckoutForm) -> Result<(OrderAck, CartSnapshot), CheckoutError> {
        form.address.validate()?;

        if !self.inner.api.session().is_authenticated() {
            return Err(CheckoutError::NotAuthenticated);
        }

        // Order what the server holds now. A cached snapshot only stands in
        // when the refetch fails for a reason other than authentication.
        let cart = match (self.inner.cart.refresh().await, self.inner.cart.snapshot()) {
            (Ok(fresh), _) => fresh,
            (Err(CartError::Api(e)), Some(cached)) if !e.is_auth_failure() => {
                warn!(error = %e, "Cart refetch before order failed; using last snapshot");
                cached
            }
            (Err(e), _) => return Err(e.into()),
        };
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let payload = OrderPayload::build(
            &form.address,
            &cart,
            &form.notes,
            form.coupon_code.as_deref(),
        );
        let idempotency_key = uuid::Uuid::new_v4().to_string();
        info!(
            items = payload.items.len(),
            idempotency_key = %idempotency_key,
            "Submitting order"
        );

        let request = ApiRequest::new(reqwest::Method::POST, "/orders")
            .json(serde_json::to_value(&payload).map_err(ApiError::from)?)
            .idempotency_key(idempotency_key);
        let body = self
            .inner
            .api
            .send(request)
            .await
            .map_err(|e| CheckoutError::from(e).classify_business_rule())?;

        match interpret_order_ack(&body) {
            Some(ack) => Ok((ack, cart)),
            None => {
                let message =
                    backend_message(&body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
                Err(CheckoutError::Rejected(message).classify_business_rule())
            }
        }
    }

    /// `Locked -> Succeeded`.
    async fn succeed(
        &self,
        guard: SubmissionGuard<'_>,
        form: &mut CheckoutForm,
        ack: &OrderAck,
        cart: &CartSnapshot,
    ) -> SubmitOutcome {
        info!(order_id = ?ack.id, order_number = ?ack.order_number, "Order placed");

        if let Err(e) = self.inner.cart.clear_remote().await {
            warn!(error = %e, "Server-side cart clear after order failed");
        }
        self.inner.cart.clear();
        form.reset();

        let total = Price::new(
            ack.total.unwrap_or(cart.totals.total),
            cart.currency.clone(),
        );
        let message = match &ack.order_number {
            Some(number) => format!("Order {number} has been placed. Total: {total}"),
            None => format!("Your order has been placed. Total: {total}"),
        };
        self.inner.frontend.notify(
            Notification::success("Order placed", message)
                .with_duration(ORDER_NOTIFICATION_DURATION),
        );

        drop(guard);

        let destination = ack.id.map_or(Route::OrderList, Route::OrderDetail);
        self.schedule_navigation(destination);

        SubmitOutcome::Succeeded(OrderConfirmation {
            order_id: ack.id,
            order_number: ack.order_number.clone(),
            total,
            destination,
        })
    }

    /// `Locked -> Failed`. The lock has already been released.
    fn fail(&self, err: CheckoutError) -> SubmitOutcome {
        match &err {
            CheckoutError::Api(api_err) => {
                error!(error = %api_err, kind = ?api_err.kind(), "Order submission failed");
                if self.inner.api.session().handle_auth_failure(api_err) {
                    self.inner.cart.clear();
                    self.inner.frontend.navigate(Route::Login);
                }
            }
            other => warn!(error = %other, "Order submission rejected"),
        }

        self.inner
            .frontend
            .notify(Notification::error(err.title(), err.user_message()));
        SubmitOutcome::Failed(err)
    }

    fn schedule_navigation(&self, destination: Route) {
        let frontend = Arc::clone(&self.inner.frontend);
        let delay = self.inner.navigation_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            frontend.navigate(destination);
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use souq_core::{AddressField, Locale};
    use url::Url;

    use super::*;
    use crate::config::ClientConfig;
    use crate::session::Session;
    use crate::totals::TotalsPolicy;

    #[derive(Default)]
    struct Recorder {
        notifications: Mutex<Vec<Notification>>,
        routes: Mutex<Vec<Route>>,
    }

    impl Frontend for Recorder {
        fn notify(&self, notification: Notification) {
            self.notifications.lock().unwrap().push(notification);
        }

        fn navigate(&self, route: Route) {
            self.routes.lock().unwrap().push(route);
        }
    }

    fn coordinator(frontend: Arc<Recorder>) -> OrderCoordinator {
        // Nothing listens here; these tests must fail before any request.
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:9/").unwrap());
        let api = ApiClient::new(&config, Session::in_memory(Locale::default())).unwrap();
        let cart = CartSynchronizer::new(api.clone(), TotalsPolicy::default());
        OrderCoordinator::new(api, cart, frontend, Duration::ZERO)
    }

    fn form_without_city() -> CheckoutForm {
        CheckoutForm {
            address: ShippingAddress {
                recipient_name: "Mona".to_string(),
                phone: "0100".to_string(),
                governorate: "Giza".to_string(),
                city: String::new(),
                street: "12 Tahrir St".to_string(),
                ..ShippingAddress::default()
            },
            notes: "ring twice".to_string(),
            coupon_code: None,
        }
    }

    #[tokio::test]
    async fn test_missing_city_fails_before_network_and_keeps_form() {
        let frontend = Arc::new(Recorder::default());
        let coordinator = coordinator(Arc::clone(&frontend));
        let mut form = form_without_city();

        let outcome = coordinator.submit(&mut form).await;

        let SubmitOutcome::Failed(CheckoutError::Address(AddressError::MissingField(field))) = outcome
        else {
            panic!("expected address failure, got {outcome:?}");
        };
        assert_eq!(field, AddressField::City);
        assert!(!coordinator.is_submitting());
        assert_eq!(form, form_without_city());

        let notifications = frontend.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "City is required");
    }

    #[tokio::test]
    async fn test_signed_out_submission_is_rejected() {
        let frontend = Arc::new(Recorder::default());
        let coordinator = coordinator(Arc::clone(&frontend));
        let mut form = form_without_city();
        form.address.city = "Dokki".to_string();

        let outcome = coordinator.submit(&mut form).await;
        assert!(matches!(outcome, SubmitOutcome::Failed(CheckoutError::NotAuthenticated)));
        assert!(!coordinator.is_submitting());
    }

    #[tokio::test]
    async fn test_busy_while_lock_held() {
        let frontend = Arc::new(Recorder::default());
        let coordinator = coordinator(Arc::clone(&frontend));
        let _held = coordinator.inner.lock.try_acquire().unwrap();

        let outcome = coordinator.submit(&mut form_without_city()).await;
        assert!(matches!(outcome, SubmitOutcome::Busy));
        assert_eq!(frontend.notifications.lock().unwrap()[0].title, "Please wait");
    }

    #[test]
    fn test_business_rule_mapping() {
        let err = CheckoutError::Api(ApiError::ValidationFailed {
            message: "Insufficient stock for Dates 1kg".to_string(),
            fields: Vec::new(),
        })
        .classify_business_rule();
        assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
        assert_eq!(err.user_message(), INSUFFICIENT_STOCK_MESSAGE);

        let err = CheckoutError::Rejected("Product not found".to_string()).classify_business_rule();
        assert!(matches!(err, CheckoutError::ProductUnavailable { .. }));

        let err = CheckoutError::Api(ApiError::Forbidden {
            message: "Out of stock".to_string(),
        })
        .classify_business_rule();
        assert!(matches!(err, CheckoutError::Api(ApiError::Forbidden { .. })));

        let err = CheckoutError::Rejected("Payment declined".to_string()).classify_business_rule();
        assert_eq!(err.user_message(), "Payment declined");
    }
}
