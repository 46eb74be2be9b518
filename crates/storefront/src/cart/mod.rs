//! Cart synchronizer.
//!
//! Holds the last cart snapshot the server sent. Mutations are never applied
//! locally: each one is sent to the backend and, only if the backend
//! acknowledges it, followed by a full [`CartSynchronizer::refresh`]. The
//! snapshot is therefore always either the last server truth or about to be
//! replaced by a newer one.
//!
//! Concurrent mutations are not sequenced against each other. If two
//! refreshes race, the one that resolves last wins.

mod types;

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Value, json};
use souq_core::ProductId;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::shapes::{backend_message, is_acknowledged};
use crate::totals::TotalsPolicy;

pub use types::{CartLine, CartSnapshot, Coupon, DiscountRule};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Mutations need a signed-in user.
    #[error("Please sign in to modify your cart")]
    NotAuthenticated,

    /// Quantities must be positive integers.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// A coupon code was empty after trimming.
    #[error("Please enter a coupon code")]
    EmptyCouponCode,

    /// The backend answered 2xx without a success indicator.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Keeps a local cart snapshot consistent with the server.
///
/// Cheaply cloneable; clones share the snapshot.
#[derive(Clone)]
pub struct CartSynchronizer {
    inner: Arc<CartSynchronizerInner>,
}

struct CartSynchronizerInner {
    api: ApiClient,
    policy: TotalsPolicy,
    snapshot: RwLock<Option<CartSnapshot>>,
}

impl std::fmt::Debug for CartSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSynchronizer")
            .field("policy", &self.inner.policy)
            .field("has_snapshot", &self.snapshot().is_some())
            .finish_non_exhaustive()
    }
}

impl CartSynchronizer {
    /// Create a synchronizer with no snapshot yet.
    #[must_use]
    pub fn new(api: ApiClient, policy: TotalsPolicy) -> Self {
        Self {
            inner: Arc::new(CartSynchronizerInner {
                api,
                policy,
                snapshot: RwLock::new(None),
            }),
        }
    }

    /// The last snapshot fetched from the server, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<CartSnapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, snapshot: Option<CartSnapshot>) {
        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Fetch the canonical cart and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the transport error. The previous snapshot is left in place.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CartSnapshot, CartError> {
        let body = self.inner.api.get("/cart").await.inspect_err(|e| {
            warn!(error = %e, "Cart refresh failed; keeping last snapshot");
            self.inner.api.session().handle_auth_failure(e);
        })?;

        let snapshot = CartSnapshot::from_response(&body, &self.inner.policy);
        self.store(Some(snapshot.clone()));
        Ok(snapshot)
    }

    /// Add `quantity` of a product.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if not signed in, the quantity is zero, or the
    /// backend refuses.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_line(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let body = json!({"product_id": product_id, "quantity": quantity});
        self.mutate("add", reqwest::Method::POST, "/cart/add".to_string(), Some(body))
            .await
    }

    /// Set the quantity of a product already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if not signed in, the quantity is zero, or the
    /// backend refuses.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_line(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let body = json!({"product_id": product_id, "quantity": quantity});
        self.mutate("update", reqwest::Method::PUT, "/cart/update".to_string(), Some(body))
            .await
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if not signed in or the backend refuses.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_line(&self, product_id: ProductId) -> Result<(), CartError> {
        self.mutate(
            "remove",
            reqwest::Method::DELETE,
            format!("/cart/remove/{product_id}"),
            None,
        )
        .await
    }

    /// Apply a coupon code. The discount shown afterwards is whatever the
    /// server computes on the next fetch.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if not signed in, the code is blank, or the
    /// backend rejects the coupon. A rejection leaves the snapshot as is.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<(), CartError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CartError::EmptyCouponCode);
        }
        let body = json!({"coupon_code": code});
        self.mutate(
            "apply-coupon",
            reqwest::Method::POST,
            "/cart/apply-coupon".to_string(),
            Some(body),
        )
        .await
    }

    /// Remove the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if not signed in or the backend refuses.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self) -> Result<(), CartError> {
        self.mutate(
            "remove-coupon",
            reqwest::Method::POST,
            "/cart/remove-coupon".to_string(),
            None,
        )
        .await
    }

    /// Empty the cart on the server, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if not signed in or the backend refuses.
    #[instrument(skip(self))]
    pub async fn clear_remote(&self) -> Result<(), CartError> {
        self.mutate("clear", reqwest::Method::DELETE, "/cart/clear".to_string(), None)
            .await
    }

    /// Drop the local snapshot without telling the server.
    ///
    /// Used after sign-out, or once the server has already emptied the cart.
    pub fn clear(&self) {
        self.store(None);
        info!("Local cart snapshot cleared");
    }

    /// Send a mutation and refresh only if the backend acknowledges it.
    ///
    /// A failed refresh after an acknowledged mutation is not an error: the
    /// snapshot is merely stale.
    async fn mutate(
        &self,
        action: &'static str,
        method: reqwest::Method,
        path: String,
        body: Option<Value>,
    ) -> Result<(), CartError> {
        let session = self.inner.api.session();
        if !session.is_authenticated() {
            warn!(action, "Cart mutation attempted without a session");
            return Err(CartError::NotAuthenticated);
        }

        let response = self
            .inner
            .api
            .request(method, &path, body, &[])
            .await
            .inspect_err(|e| {
                warn!(action, error = %e, "Cart mutation failed");
                session.handle_auth_failure(e);
            })?;

        if !is_acknowledged(&response) {
            let message = backend_message(&response)
                .unwrap_or_else(|| "The cart could not be updated. Please try again.".to_string());
            warn!(action, %message, "Cart mutation not acknowledged");
            return Err(CartError::Rejected(message));
        }

        info!(action, "Cart mutation acknowledged; refreshing");
        if let Err(e) = self.refresh().await {
            warn!(action, error = %e, "Refresh after mutation failed; snapshot is stale");
        }
        Ok(())
    }
}
