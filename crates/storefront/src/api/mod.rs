//! Transport normalizer for the catalog/order backend.
//!
//! Uses `reqwest` for HTTP. Every call goes through [`ApiClient::send`], which:
//!
//! - sends `Accept: application/json` and, when signed in,
//!   `Authorization: Bearer <token>`
//! - appends the active locale as the `lang` query parameter
//! - refuses to parse anything that is not declared as JSON
//! - maps failures onto [`ErrorKind`]
//!
//! Any 2xx is returned as success, whatever a body-level `success` flag says;
//! interpreting that flag is the caller's job. There are no retries. A 429
//! is surfaced after one fixed pause so the user is not immediately invited
//! to hammer the backend again.
//!
//! # Example
//!
//! ```rust,ignore
//! use souq_storefront::{ApiClient, ClientConfig, Session};
//!
//! let session = Session::in_memory(config.default_locale.clone());
//! let api = ApiClient::new(&config, session)?;
//!
//! let cart = api.get("/cart").await?;
//! ```

mod error;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::session::Session;

pub use error::{ApiError, BODY_PREVIEW_CHARS, ErrorKind, FieldError, body_preview, classify};

/// Header carrying a per-attempt key the backend may use to de-duplicate orders.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// A single backend request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub idempotency_key: Option<String>,
}

impl ApiRequest {
    /// Request with no body or query parameters.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            idempotency_key: None,
        }
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the catalog/order backend.
///
/// Cheaply cloneable; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: Session,
    rate_limit_delay: Duration,
    diagnostics: bool,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new backend client bound to a session.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, session: Session) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.clone(),
                session,
                rate_limit_delay: config.rate_limit_delay,
                diagnostics: config.http_diagnostics,
            }),
        })
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.send(ApiRequest::new(Method::GET, path)).await
    }

    /// `POST path` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(Method::POST, path, body, &[]).await
    }

    /// `PUT path` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    pub async fn put(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, body, &[]).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.send(ApiRequest::new(Method::DELETE, path)).await
    }

    /// `request(method, path, body?, query?)`.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        request.query = query
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.send(request).await
    }

    /// Execute a request and normalize the outcome.
    ///
    /// # Errors
    ///
    /// Returns the classified failure: an [`ErrorKind`] for HTTP answers,
    /// `Network`/`Timeout` when there was no answer.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.build_url(&request)?;

        let mut builder = self.inner.client.request(request.method.clone(), url.clone());
        let token = self.inner.session.token().get();
        if let Some(token) = &token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        if self.inner.diagnostics {
            debug!(
                method = %request.method,
                url = %url,
                accept = "application/json",
                authorization = if token.is_some() { "Bearer [REDACTED]" } else { "none" },
                idempotency_key = request.idempotency_key.as_deref().unwrap_or(""),
                body = %request.body.as_ref().map(serde_json::Value::to_string).unwrap_or_default(),
                "API request"
            );
        }

        let response = builder.send().await.inspect_err(|e| {
            warn!(error = %e, url = %url, "API request failed before a response");
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let text = response.text().await?;

        self.interpret(status, &content_type, &text, retry_after).await
    }

    /// Turn a raw response into a payload or a classified error.
    async fn interpret(
        &self,
        status: StatusCode,
        content_type: &str,
        text: &str,
        retry_after: Option<u64>,
    ) -> Result<Value, ApiError> {
        let is_json = is_json_content_type(content_type);
        let parsed = if is_json && !text.trim().is_empty() {
            Some(serde_json::from_str::<Value>(text))
        } else {
            None
        };

        if self.inner.diagnostics {
            debug!(
                status = status.as_u16(),
                content_type,
                body = %body_preview(text),
                "API response"
            );
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                delay_ms = u64::try_from(self.inner.rate_limit_delay.as_millis()).unwrap_or(u64::MAX),
                "Rate limited by backend; pausing before surfacing"
            );
            tokio::time::sleep(self.inner.rate_limit_delay).await;
            return Err(ApiError::RateLimited { retry_after });
        }

        // Statuses with a fixed meaning are classified even when the body is
        // an HTML error page.
        if matches!(status.as_u16(), 401 | 403 | 419 | 422) {
            let body = parsed.and_then(Result::ok);
            return Err(classify(status, body.as_ref(), retry_after));
        }

        if !text.trim().is_empty() && !is_json {
            warn!(
                status = status.as_u16(),
                content_type,
                "Backend returned a non-JSON response"
            );
            return Err(ApiError::UnexpectedContentType {
                status: status.as_u16(),
                content_type: if content_type.is_empty() {
                    "(none)".to_string()
                } else {
                    content_type.to_string()
                },
                preview: body_preview(text),
            });
        }

        let body = match parsed {
            Some(Ok(value)) => value,
            Some(Err(e)) if status.is_success() => return Err(ApiError::Decode(e)),
            Some(Err(_)) | None => Value::Null,
        };

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify(status, Some(&body), retry_after))
        }
    }

    /// Base URL + path + query + `lang`.
    fn build_url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let path = request.path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))?;

        let locale = self.inner.session.language().get();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("lang", locale.as_str());
        }
        Ok(url)
    }
}

/// Whether a `Content-Type` header declares JSON (`application/json`,
/// `application/problem+json`, ...).
fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use souq_core::Locale;

    use super::*;

    fn client(delay: Duration) -> ApiClient {
        let mut config = ClientConfig::new(Url::parse("http://localhost:8000/api/").unwrap());
        config.rate_limit_delay = delay;
        config.http_diagnostics = false;
        ApiClient::new(&config, Session::in_memory(Locale::default())).unwrap()
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("Application/Problem+JSON"));
        assert!(!is_json_content_type("text/html; charset=UTF-8"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn test_build_url_appends_lang_after_query() {
        let api = client(Duration::ZERO);
        api.session()
            .language()
            .set(&Locale::parse("ar").unwrap())
            .unwrap();

        let request = ApiRequest::new(Method::GET, "/orders").query("page", "2");
        let url = api.build_url(&request).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/orders?page=2&lang=ar");
    }

    #[test]
    fn test_build_url_default_locale() {
        let api = client(Duration::ZERO);
        let url = api
            .build_url(&ApiRequest::new(Method::DELETE, "cart/remove/5"))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/cart/remove/5?lang=en");
    }

    #[tokio::test]
    async fn test_interpret_success_ignores_body_flag() {
        let api = client(Duration::ZERO);
        let body = api
            .interpret(
                StatusCode::OK,
                "application/json",
                r#"{"success": false, "message": "nothing to do"}"#,
                None,
            )
            .await
            .unwrap();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_interpret_empty_success_body_is_null() {
        let api = client(Duration::ZERO);
        let body = api
            .interpret(StatusCode::NO_CONTENT, "", "", None)
            .await
            .unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_interpret_html_is_unexpected_content_type() {
        let api = client(Duration::ZERO);
        let html = format!("<!DOCTYPE html><html>{}</html>", "a".repeat(400));
        let err = api
            .interpret(StatusCode::OK, "text/html; charset=UTF-8", &html, None)
            .await
            .unwrap_err();

        let ApiError::UnexpectedContentType { preview, status, .. } = &err else {
            panic!("expected UnexpectedContentType, got {err:?}");
        };
        assert_eq!(*status, 200);
        assert!(preview.starts_with("<!DOCTYPE html>"));
        assert!(preview.chars().count() <= BODY_PREVIEW_CHARS + 1);
    }

    #[tokio::test]
    async fn test_interpret_401_html_still_unauthenticated() {
        let api = client(Duration::ZERO);
        let err = api
            .interpret(StatusCode::UNAUTHORIZED, "text/html", "<html>login</html>", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn test_interpret_invalid_json_on_success_is_decode_error() {
        let api = client(Duration::ZERO);
        let err = api
            .interpret(StatusCode::OK, "application/json", "{not json", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interpret_429_pauses_once_then_surfaces() {
        let api = client(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        let err = api
            .interpret(
                StatusCode::TOO_MANY_REQUESTS,
                "application/json",
                r#"{"message": "Too Many Attempts."}"#,
                Some(60),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RateLimited { retry_after: Some(60) }));
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let api = client(Duration::ZERO);
        api.session()
            .start(&SecretString::from("bearer-secret"))
            .unwrap();
        assert!(!format!("{api:?}").contains("bearer-secret"));
    }
}
