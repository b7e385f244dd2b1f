//! HTTP transport to the Sumo Logic API.
//!
//! [`SumoClient`] owns request assembly and response classification; the
//! actual exchange goes through a [`RequestDispatcher`], so the adapter
//! never opens sockets itself. [`HttpDispatcher`] is the reqwest-backed
//! production dispatcher with the configured timeout applied.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::DatasourceConfig;
use crate::error::DatasourceError;

/// One proxied HTTP request, fully assembled by [`SumoClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: String,
    pub url: String,
    pub content_type: String,
    pub authorization: Option<String>,
    /// Forward credentials along with the request (basic-auth mode).
    pub with_credentials: bool,
    /// JSON-serialized body.
    pub body: String,
}

/// Raw result of a dispatched request. Error statuses come back here, not
/// as `Err`; `Err` is reserved for failures with no HTTP response at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

/// The host's networking capability.
#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    async fn dispatch(&self, request: ProxyRequest) -> Result<ProxyResponse, DatasourceError>;
}

/// reqwest-backed dispatcher.
pub struct HttpDispatcher {
    http: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, DatasourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| network_failure(0, e.to_string(), String::new()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RequestDispatcher for HttpDispatcher {
    async fn dispatch(&self, request: ProxyRequest) -> Result<ProxyResponse, DatasourceError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| network_failure(0, e.to_string(), request.url.clone()))?;

        let mut builder = self
            .http
            .request(method, &request.url)
            .header(reqwest::header::CONTENT_TYPE, &request.content_type)
            .body(request.body.clone());
        if let Some(authorization) = &request.authorization {
            builder = builder.header(reqwest::header::AUTHORIZATION, authorization);
        }

        // No HTTP response at all surfaces as a status-0 network error.
        let response = builder
            .send()
            .await
            .map_err(|e| network_failure(0, e.to_string(), request.url.clone()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| network_failure(status.as_u16(), e.to_string(), request.url.clone()))?;

        Ok(ProxyResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("unknown status").to_string(),
            body,
        })
    }
}

fn network_failure(status: u16, reason: String, url: String) -> DatasourceError {
    DatasourceError::Network {
        status,
        reason,
        body: String::new(),
        url,
    }
}

/// Request builder and response classifier for the Sumo Logic API.
pub struct SumoClient {
    base_url: String,
    authorization: Option<String>,
    with_credentials: bool,
    dispatcher: Arc<dyn RequestDispatcher>,
}

impl SumoClient {
    pub fn new(config: &DatasourceConfig, dispatcher: Arc<dyn RequestDispatcher>) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            authorization: config.auth_header.clone(),
            with_credentials: config.basic_auth,
            dispatcher,
        }
    }

    /// POST `body` to `path` and deserialize the response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, DatasourceError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.request("POST", path, body).await
    }

    /// Issue one request against the configured base URL.
    pub async fn request<B, T>(&self, method: &str, path: &str, body: &B) -> Result<T, DatasourceError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let request = ProxyRequest {
            method: method.to_string(),
            url: url.clone(),
            content_type: "application/json".to_string(),
            authorization: self.authorization.clone(),
            with_credentials: self.with_credentials,
            body: serde_json::to_string(body)?,
        };

        tracing::debug!(method, url = %url, "dispatching Sumo Logic request");

        let response = self.dispatcher.dispatch(request).await?;
        handle_response(response, &url)
    }
}

/// Classify a raw response: below 300 deserializes; from 300 up it is a
/// backend error when the body carries a structured `error` field and a
/// network error otherwise.
fn handle_response<T: DeserializeOwned>(
    response: ProxyResponse,
    url: &str,
) -> Result<T, DatasourceError> {
    if response.status < 300 {
        return Ok(serde_json::from_str(&response.body)?);
    }

    match serde_json::from_str::<sumo_api::ApiError>(&response.body) {
        Ok(api_error) => Err(DatasourceError::Backend {
            message: api_error.message(),
            body: response.body,
            url: url.to_string(),
        }),
        Err(_) => Err(DatasourceError::Network {
            status: response.status,
            reason: response.status_text,
            body: response.body,
            url: url.to_string(),
        }),
    }
}
