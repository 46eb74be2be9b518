//! Session context: bearer token and active locale.
//!
//! Both values live in a [`KeyValueStore`] so they survive restarts. The
//! session is passed explicitly into the [`ApiClient`](crate::api::ApiClient)
//! rather than read from ambient globals; its lifecycle is tied to sign-in
//! and sign-out.
//!
//! There is no client-side token expiry. An expired token is noticed when
//! the backend answers `401`, at which point the caller clears it with
//! [`Session::handle_auth_failure`].

mod store;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use souq_core::Locale;
use tracing::{info, warn};

use crate::api::ApiError;

pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

const TOKEN_KEY: &str = "auth_token";
const LANGUAGE_KEY: &str = "language";

// =============================================================================
// TokenStore
// =============================================================================

/// Bearer token storage. Read-many, written only at sign-in and sign-out.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("token", &self.get().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl TokenStore {
    /// Current bearer token, if signed in.
    #[must_use]
    pub fn get(&self) -> Option<SecretString> {
        self.store
            .get(TOKEN_KEY)
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from)
    }

    /// Store a new bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the token could not be persisted.
    pub fn set(&self, token: &SecretString) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, token.expose_secret().trim())
    }

    /// Forget the bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the removal could not be persisted.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(TOKEN_KEY)
    }

    /// Whether a token is present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

// =============================================================================
// LanguageStore
// =============================================================================

/// Active locale storage with a fixed fallback.
#[derive(Clone)]
pub struct LanguageStore {
    store: Arc<dyn KeyValueStore>,
    default: Locale,
}

impl LanguageStore {
    /// Active locale; the default if none is stored or the stored tag is invalid.
    #[must_use]
    pub fn get(&self) -> Locale {
        self.store
            .get(LANGUAGE_KEY)
            .and_then(|tag| Locale::parse(&tag).ok())
            .unwrap_or_else(|| self.default.clone())
    }

    /// Switch the active locale.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the locale could not be persisted.
    pub fn set(&self, locale: &Locale) -> Result<(), StoreError> {
        self.store.set(LANGUAGE_KEY, locale.as_str())
    }

    /// Fallback locale.
    #[must_use]
    pub const fn default_locale(&self) -> &Locale {
        &self.default
    }
}

// =============================================================================
// Session
// =============================================================================

/// Explicit session context shared by every component that talks to the backend.
///
/// Cheaply cloneable; all clones see the same token and locale.
#[derive(Clone)]
pub struct Session {
    token: TokenStore,
    language: LanguageStore,
}

impl Session {
    /// Create a session over a backing store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, default_locale: Locale) -> Self {
        Self {
            token: TokenStore {
                store: Arc::clone(&store),
            },
            language: LanguageStore {
                store,
                default: default_locale,
            },
        }
    }

    /// Session persisted to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if an existing state file cannot be read.
    pub fn persistent(
        path: impl Into<std::path::PathBuf>,
        default_locale: Locale,
    ) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(FileStore::open(path)?), default_locale))
    }

    /// Session that lives only as long as the process.
    #[must_use]
    pub fn in_memory(default_locale: Locale) -> Self {
        Self::new(Arc::new(MemoryStore::new()), default_locale)
    }

    /// Token store.
    #[must_use]
    pub const fn token(&self) -> &TokenStore {
        &self.token
    }

    /// Language store.
    #[must_use]
    pub const fn language(&self) -> &LanguageStore {
        &self.language
    }

    /// Whether an authenticated principal is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_present()
    }

    /// Begin an authenticated session with a token issued by the backend.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the token could not be persisted.
    pub fn start(&self, token: &SecretString) -> Result<(), StoreError> {
        self.token.set(token)?;
        info!("Session started");
        Ok(())
    }

    /// End the session (sign-out). The locale is kept.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the token removal could not be persisted.
    pub fn end(&self) -> Result<(), StoreError> {
        self.token.clear()?;
        info!("Session ended");
        Ok(())
    }

    /// Clear the token if `error` says the backend no longer accepts it.
    ///
    /// Returns `true` when the caller should send the user to sign in.
    pub fn handle_auth_failure(&self, error: &ApiError) -> bool {
        if !error.is_auth_failure() {
            return false;
        }
        if let Err(e) = self.token.clear() {
            warn!(error = %e, "Failed to clear rejected token");
        }
        warn!("Backend rejected the session token; sign-in required");
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token)
            .field("language", &self.language.get())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::in_memory(Locale::parse("en").unwrap())
    }

    #[test]
    fn test_token_lifecycle() {
        let session = session();
        assert!(!session.is_authenticated());

        session.start(&SecretString::from("tok-123")).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(
            session.token().get().unwrap().expose_secret(),
            "tok-123"
        );

        session.end().unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_blank_token_is_absent() {
        let session = session();
        session.start(&SecretString::from("   ")).unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_language_defaults_and_switches() {
        let session = session();
        assert_eq!(session.language().get().as_str(), "en");

        session
            .language()
            .set(&Locale::parse("ar").unwrap())
            .unwrap();
        assert_eq!(session.language().get().as_str(), "ar");

        session.end().unwrap();
        assert_eq!(session.language().get().as_str(), "ar");
    }

    #[test]
    fn test_clones_share_state() {
        let session = session();
        let clone = session.clone();
        session.start(&SecretString::from("shared")).unwrap();
        assert!(clone.is_authenticated());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = session();
        session.start(&SecretString::from("super-secret-token")).unwrap();
        let debug_output = format!("{session:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-token"));
    }

    #[test]
    fn test_handle_auth_failure_clears_only_on_401() {
        let session = session();
        session.start(&SecretString::from("tok")).unwrap();

        let forbidden = ApiError::Forbidden {
            message: "nope".to_string(),
        };
        assert!(!session.handle_auth_failure(&forbidden));
        assert!(session.is_authenticated());

        let unauthenticated = ApiError::Unauthenticated {
            message: "expired".to_string(),
        };
        assert!(session.handle_auth_failure(&unauthenticated));
        assert!(!session.is_authenticated());
    }
}
