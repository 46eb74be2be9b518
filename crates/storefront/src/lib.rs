//! Souq Storefront client library.
//!
//! The cart consistency and order submission layer of the souq storefront.
//! Everything the presentation layer does with the remote catalog/order
//! backend goes through this crate.
//!
//! # Architecture
//!
//! Leaves first:
//!
//! - [`api`] - Transport normalizer: auth token and locale injection,
//!   content-type verification, failure classification
//! - [`session`] - Token and language stores behind an explicit session context
//! - [`totals`] - Subtotal/shipping/tax/discount/total derivation from a
//!   cart snapshot of uncertain shape
//! - [`cart`] - Cart synchronizer; every mutation is followed by a full refetch
//! - [`checkout`] - Order submission coordinator with a single-submission lock
//! - [`orders`] - Order history, detail, tracking and cancellation
//! - [`shapes`] - Ordered shape-matchers for responses without a fixed schema
//! - [`frontend`] - Notification and navigation callbacks
//!
//! The backend is the source of truth. Nothing here guesses at server state:
//! the cart snapshot is either the last thing the server said or is being
//! re-fetched.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod frontend;
pub mod orders;
pub mod session;
pub mod shapes;
pub mod totals;

pub use api::{ApiClient, ApiError, ApiRequest, ErrorKind, FieldError};
pub use cart::{CartError, CartLine, CartSnapshot, CartSynchronizer, Coupon, DiscountRule};
pub use checkout::{
    CheckoutError, CheckoutForm, OrderConfirmation, OrderCoordinator, OrderPayload, SubmitOutcome,
};
pub use config::{ClientConfig, ConfigError};
pub use frontend::{Frontend, LogFrontend, Notification, NotificationLevel, Route};
pub use orders::{OrderDetail, OrderSummary, OrdersApi, OrdersError, Tracking};
pub use session::{FileStore, KeyValueStore, MemoryStore, Session, StoreError};
pub use totals::{Totals, TotalsPolicy, compute_totals};
