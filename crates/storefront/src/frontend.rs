//! Seam between the coordination layer and whatever renders it.
//!
//! The coordinator never draws anything itself. It emits [`Notification`]s
//! and [`Route`] changes through a [`Frontend`], which the CLI (or a test)
//! implements.

use std::fmt;
use std::time::Duration;

use souq_core::OrderId;

/// How long a regular notification stays visible.
pub const NOTIFICATION_DURATION: Duration = Duration::from_secs(4);

/// How long a notification carrying an order number and total stays visible.
pub const ORDER_NOTIFICATION_DURATION: Duration = Duration::from_secs(8);

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// A user-facing message with a title and a display duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub duration: Duration,
}

impl Notification {
    fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            duration: NOTIFICATION_DURATION,
        }
    }

    #[must_use]
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, title, message)
    }

    #[must_use]
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, message)
    }

    #[must_use]
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, title, message)
    }

    #[must_use]
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, title, message)
    }

    /// Override the display duration.
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level.as_str(), self.title, self.message)
    }
}

/// Views the coordinator can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Detail view of a single order.
    OrderDetail(OrderId),
    /// The user's order history.
    OrderList,
    /// Sign-in.
    Login,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderDetail(id) => write!(f, "/orders/{id}"),
            Self::OrderList => f.write_str("/orders"),
            Self::Login => f.write_str("/login"),
        }
    }
}

/// Presentation layer callbacks.
///
/// Both methods are fire-and-forget and must not block.
pub trait Frontend: Send + Sync {
    /// Show a notification.
    fn notify(&self, notification: Notification);

    /// Move to another view.
    fn navigate(&self, route: Route);
}

/// Frontend that only logs. Useful for headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFrontend;

impl Frontend for LogFrontend {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::error!(%notification, "Notification"),
            NotificationLevel::Warning => tracing::warn!(%notification, "Notification"),
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(%notification, "Notification");
            }
        }
    }

    fn navigate(&self, route: Route) {
        tracing::info!(%route, "Navigate");
    }
}
