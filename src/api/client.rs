//! HTTP client for the single script endpoint.
//!
//! Every request targets the same base URL; the `action` discriminator is
//! sent as a query parameter and, for POST, inside the JSON body as well.
//!
//! AUTH CONTEXT
//! ============
//! - `login`: the API key is added to the body if absent. The session token
//!   is never attached.
//! - everything else: the stored session token rides along as `?token=`
//!   when one exists. Requests without a token are still sent; the backend
//!   decides how to reject them.
//!
//! A 401 clears the stored session and publishes a logout marker so every
//! other open client drops its session, then surfaces as `PortalError::Unauthorized`.
//! Business-level success is left to the caller.

use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::storage::SessionStore;

pub const LOGIN_ACTION: &str = "login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub action: String,
    pub method: ApiMethod,
    /// Extra query parameters besides `action` and `token`.
    pub params: Vec<(String, String)>,
    pub body: Option<Map<String, Value>>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(action: impl Into<String>) -> Self {
        Self { action: action.into(), method: ApiMethod::Get, params: Vec::new(), body: None }
    }

    /// POST with `body`. Non-object bodies are sent as `{}`.
    #[must_use]
    pub fn post(action: impl Into<String>, body: Value) -> Self {
        let body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { action: action.into(), method: ApiMethod::Post, params: Vec::new(), body: Some(body) }
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_login(&self) -> bool {
        self.action == LOGIN_ACTION
            || self
                .body
                .as_ref()
                .and_then(|b| b.get("action"))
                .and_then(Value::as_str)
                == Some(LOGIN_ACTION)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    store: SessionStore,
}

impl ApiClient {
    pub fn new(config: &PortalConfig, store: SessionStore) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request)
            .connect_timeout(config.timeouts.connect)
            .build()
            .map_err(|e| PortalError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone(), api_key: config.api_key.clone(), store })
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Send one action and return the decoded response body.
    ///
    /// # Errors
    ///
    /// `Transport` when the request fails, `Unauthorized` on 401 (after
    /// clearing storage and broadcasting logout), `Status` for any other non-success status.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, PortalError> {
        let ApiRequest { action, method, params, body } = self.prepare(request);

        let mut query = Vec::with_capacity(params.len() + 1);
        query.push(("action".to_owned(), action.clone()));
        query.extend(params);

        debug!(%action, ?method, "api request");
        let builder = match method {
            ApiMethod::Get => self.http.get(&self.base_url),
            ApiMethod::Post => self
                .http
                .post(&self.base_url)
                .json(&Value::Object(body.unwrap_or_default())),
        };
        let response = builder.query(&query).send().await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(%action, status = status.as_u16(), "api response");

        if status == StatusCode::UNAUTHORIZED {
            warn!(%action, "backend rejected session; broadcasting logout");
            self.store.clear();
            self.store.broadcast_logout();
            return Err(PortalError::Unauthorized);
        }
        if !status.is_success() {
            return Err(PortalError::Status { status: status.as_u16(), body: text });
        }
        Ok(decode_body(&text))
    }

    /// Attach auth context and mirror `action` into the body.
    fn prepare(&self, mut request: ApiRequest) -> ApiRequest {
        if request.is_login() {
            if let Some(key) = &self.api_key {
                request
                    .body
                    .get_or_insert_with(Map::new)
                    .entry("apiKey")
                    .or_insert_with(|| Value::String(key.clone()));
            }
        } else if let Some(token) = self.store.token() {
            request.params.push(("token".to_owned(), token));
        }

        if let Some(body) = request.body.as_mut() {
            body.entry("action")
                .or_insert_with(|| Value::String(request.action.clone()));
        }
        request
    }
}

/// Empty bodies decode to `null`; non-JSON text is kept as a string.
pub(crate) fn decode_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(text.to_owned()))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
