//! Core types for souq.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod amount;
pub mod id;
pub mod locale;
pub mod price;
pub mod status;

pub use address::{AddressError, AddressField, ShippingAddress};
pub use amount::{parse_amount, parse_quantity};
pub use id::*;
pub use locale::{Locale, LocaleError};
pub use price::{DEFAULT_CURRENCY, Price};
pub use status::*;
