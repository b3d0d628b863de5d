//! Low-level HTTP client for the storefront backend.
//!
//! [`ApiClient`] resolves endpoints, attaches default and caller headers,
//! decodes bodies by content type, and maps non-success statuses to
//! [`ApiError::Status`]. It knows nothing about the session; credential
//! attachment from auth state and forced logout live in
//! [`crate::gateway::Gateway`].

pub mod types;

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;

const JSON: &str = "application/json";

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Structured JSON.
    Json(Value),
    /// Plain text.
    Text(String),
    /// No content.
    Empty,
}

impl ResponseBody {
    /// Deserialize a JSON body into `T`.
    ///
    /// Text bodies are parsed as JSON; an empty body is treated as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if the body does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = match self {
            Self::Json(value) => value,
            Self::Text(text) => serde_json::from_str(&text)?,
            Self::Empty => Value::Null,
        };
        Ok(serde_json::from_value(value)?)
    }

    /// The body as text, if it was decoded as text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// How a body should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Text,
    /// Try JSON, fall back to text.
    Sniff,
}

/// Content-type fragments and the decoding they select, checked in order.
const BODY_KINDS: &[(&str, BodyKind)] = &[
    ("application/json", BodyKind::Json),
    ("+json", BodyKind::Json),
    ("text/plain", BodyKind::Text),
];

impl BodyKind {
    fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Sniff;
        };
        let content_type = content_type.to_ascii_lowercase();
        BODY_KINDS
            .iter()
            .find(|(fragment, _)| content_type.contains(fragment))
            .map_or(Self::Sniff, |(_, kind)| *kind)
    }
}

/// Decode a response body.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] if a body declared as JSON fails to parse.
fn decode_body(
    status: StatusCode,
    content_type: Option<&str>,
    text: String,
) -> Result<ResponseBody, ApiError> {
    if status == StatusCode::NO_CONTENT {
        return Ok(ResponseBody::Empty);
    }

    match BodyKind::from_content_type(content_type) {
        BodyKind::Json => Ok(ResponseBody::Json(serde_json::from_str(&text)?)),
        BodyKind::Text => Ok(ResponseBody::Text(text)),
        BodyKind::Sniff if text.trim().is_empty() => Ok(ResponseBody::Empty),
        BodyKind::Sniff => Ok(serde_json::from_str(&text)
            .map_or_else(|_| ResponseBody::Text(text), ResponseBody::Json)),
    }
}

/// Extract the backend's error message from a failed response body.
fn error_message(status: StatusCode, text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| {
            ["error", "message"].iter().find_map(|field| {
                value
                    .get(field)
                    .and_then(Value::as_str)
                    .filter(|message| !message.is_empty())
                    .map(String::from)
            })
        })
        .unwrap_or_else(|| {
            format!(
                "API request failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        })
}

/// Options for a single request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Caller-supplied headers, merged over the defaults.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    /// A `GET` request.
    #[must_use]
    pub const fn get() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A `POST` request with a JSON body.
    #[must_use]
    pub const fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// A `PUT` request with a JSON body.
    #[must_use]
    pub const fn put(body: Value) -> Self {
        Self {
            method: Method::PUT,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// A `DELETE` request.
    #[must_use]
    pub const fn delete() -> Self {
        Self {
            method: Method::DELETE,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add or override a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// HTTP client bound to one backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: ApiConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    /// The endpoint layout this client talks to.
    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Send a request.
    ///
    /// `Content-Type: application/json` and `Accept: application/json` are
    /// always present unless the caller overrides them; `Authorization` is
    /// attached when `token` is set.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Status`] for any non-success status, carrying the
    ///   backend's `error`/`message` field when present
    /// - [`ApiError::Network`] if no response was received
    /// - [`ApiError::Decode`] if a JSON body is malformed
    #[instrument(skip(self, options, token), fields(method = %options.method))]
    pub async fn send(
        &self,
        endpoint: &str,
        options: RequestOptions,
        token: Option<&str>,
    ) -> Result<ResponseBody, ApiError> {
        let url = self.config.resolve(endpoint)?;
        let headers = build_headers(&options.headers, token)?;

        let mut request = self.client.request(options.method, url).headers(headers);
        if let Some(body) = &options.body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_message(status, &text);
            warn!(status = %status, %message, "Backend returned non-success status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = %status, "Backend request succeeded");
        decode_body(status, content_type.as_deref(), text)
    }

    /// Send a request and deserialize the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`].
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        self.send(endpoint, options, token).await?.into_json()
    }
}

/// Defaults first, then caller headers, then credentials.
fn build_headers(extra: &[(String, String)], token: Option<&str>) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    headers.insert(ACCEPT, HeaderValue::from_static(JSON));

    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ApiError::InvalidHeader("Authorization".to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader(name.to_string()))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_dispatch_by_content_type() {
        let ok = StatusCode::OK;
        assert_eq!(
            decode_body(ok, Some("application/json; charset=utf-8"), r#"{"a":1}"#.into()).unwrap(),
            ResponseBody::Json(json!({"a": 1}))
        );
        assert_eq!(
            decode_body(ok, Some("text/plain"), "OK".into()).unwrap(),
            ResponseBody::Text("OK".to_string())
        );
        assert_eq!(
            decode_body(StatusCode::NO_CONTENT, Some("application/json"), String::new()).unwrap(),
            ResponseBody::Empty
        );
    }

    #[test]
    fn test_decode_unknown_content_type_sniffs() {
        let ok = StatusCode::OK;
        assert_eq!(
            decode_body(ok, Some("application/octet-stream"), "true".into()).unwrap(),
            ResponseBody::Json(json!(true))
        );
        assert_eq!(
            decode_body(ok, None, "hello".into()).unwrap(),
            ResponseBody::Text("hello".to_string())
        );
        assert_eq!(decode_body(ok, None, "  ".into()).unwrap(), ResponseBody::Empty);
    }

    #[test]
    fn test_decode_malformed_json_is_error() {
        let result = decode_body(StatusCode::OK, Some("application/json"), "{oops".into());
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_error_message_prefers_backend_field() {
        let status = StatusCode::BAD_REQUEST;
        assert_eq!(error_message(status, r#"{"error":"Out of stock"}"#), "Out of stock");
        assert_eq!(error_message(status, r#"{"message":"Bad input"}"#), "Bad input");
        assert_eq!(
            error_message(status, "<html>"),
            "API request failed: 400 Bad Request"
        );
    }

    #[test]
    fn test_caller_headers_merge_without_dropping_content_type() {
        let headers = build_headers(
            &[("Accept".to_string(), "text/plain".to_string())],
            Some("tok"),
        )
        .unwrap();

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), JSON);
        assert_eq!(headers.get(ACCEPT).unwrap(), "text/plain");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[test]
    fn test_no_authorization_without_token() {
        let headers = build_headers(&[], None).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_into_json() {
        let body = ResponseBody::Text(r#"{"ok":true}"#.to_string());
        let value: Value = body.into_json().unwrap();
        assert_eq!(value, json!({"ok": true}));
    }
}
