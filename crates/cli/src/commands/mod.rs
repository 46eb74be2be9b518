//! CLI command implementations.

use std::fmt::Display;
use std::sync::{Arc, PoisonError};

use serde::Serialize;
use souq_core::LocaleError;
use souq_storefront::{
    ApiClient, ApiError, CartError, CartSynchronizer, ClientConfig, Frontend, LogFrontend,
    Notification, OrdersApi, OrdersError, Route, Session, StoreError, TotalsPolicy,
};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod session;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Session state error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{}", .0.user_message())]
    Cart(#[from] CartError),

    #[error("{}", .0.user_message())]
    Orders(#[from] OrdersError),

    #[error("Invalid locale: {0}")]
    Locale(#[from] LocaleError),

    #[error("Could not encode output: {0}")]
    Output(#[from] serde_json::Error),

    /// A submission ended in failure; details were already shown.
    #[error("Checkout failed: {0}")]
    Checkout(String),
}

/// Everything a command needs, wired from configuration.
pub struct App {
    pub config: ClientConfig,
    pub session: Session,
    pub api: ApiClient,
    pub cart: CartSynchronizer,
    pub orders: OrdersApi,
    pub frontend: Arc<TerminalFrontend>,
    pub json: bool,
}

impl App {
    /// Open the persisted session and build the clients.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the session file is unreadable or the HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig, json: bool) -> Result<Self, CliError> {
        let session = Session::persistent(&config.state_path, config.default_locale.clone())?;
        let api = ApiClient::new(&config, session.clone())?;
        let cart = CartSynchronizer::new(
            api.clone(),
            TotalsPolicy {
                default_shipping: config.default_shipping,
            },
        );
        let orders = OrdersApi::new(api.clone());

        Ok(Self {
            config,
            session,
            api,
            cart,
            orders,
            frontend: Arc::new(TerminalFrontend::new(json)),
            json,
        })
    }

    /// Print a serializable value as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Output` if the value cannot be encoded.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<(), CliError> {
        print_line(serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Write one line of command output to stdout.
#[allow(clippy::print_stdout)]
pub fn print_line(line: impl Display) {
    println!("{line}");
}

/// Frontend that prints notifications and reports navigation on a channel.
///
/// In JSON mode notifications go to the log instead, so stdout stays
/// machine-readable.
pub struct TerminalFrontend {
    quiet: bool,
    routes_tx: mpsc::UnboundedSender<Route>,
    routes_rx: std::sync::Mutex<mpsc::UnboundedReceiver<Route>>,
}

impl TerminalFrontend {
    fn new(quiet: bool) -> Self {
        let (routes_tx, routes_rx) = mpsc::unbounded_channel();
        Self {
            quiet,
            routes_tx,
            routes_rx: std::sync::Mutex::new(routes_rx),
        }
    }

    /// Take the next navigation request, if one arrived already.
    pub fn try_next_route(&self) -> Option<Route> {
        self.routes_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }
}

impl Frontend for TerminalFrontend {
    fn notify(&self, notification: Notification) {
        if self.quiet {
            LogFrontend.notify(notification);
        } else {
            print_line(notification);
        }
    }

    fn navigate(&self, route: Route) {
        tracing::debug!(%route, "Navigation requested");
        // The receiver lives as long as the frontend.
        let _ = self.routes_tx.send(route);
    }
}
