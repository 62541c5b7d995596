//! HTTP plumbing shared by the provider adapters.
//!
//! Adapters talk to the network through the [`Transport`] trait so tests can
//! script responses without a server. [`ReqwestTransport`] is the production
//! implementation; [`fetch_with_retry`] layers bounded retry with linear
//! backoff on top of any transport.

mod client;
mod retry;

use std::rc::Rc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

pub use client::{
    DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, ReqwestTransport, TransportBuildError, TransportConfig,
};
pub use retry::{AttemptFailure, RetryError, RetryPolicy, fetch_with_retry};

/// HTTP method used by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

/// Transport-agnostic HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Fully qualified URL, including the query string.
    pub url: Url,
    /// Extra headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Build a `GET` request.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Build a `POST` request carrying `body`.
    #[must_use]
    pub fn post(url: Url, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value matching `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as UTF-8.
    pub body: String,
}

impl HttpResponse {
    /// Build a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Failures raised before an HTTP status is available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection failed or the body could not be read.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// Error description reported by the client.
        message: String,
    },
    /// The request exceeded its timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Fully qualified request URL.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
}

/// Sends [`HttpRequest`]s.
///
/// Any HTTP status, including 4xx and 5xx, is a successful exchange;
/// only failures to obtain a status are errors.
#[async_trait(?Send)]
pub trait Transport {
    /// Perform `request`.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait(?Send)]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait(?Send)]
impl<T: Transport + ?Sized> Transport for Rc<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
