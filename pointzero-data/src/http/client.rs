//! `reqwest`-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::USER_AGENT};
use thiserror::Error;

use super::{HttpRequest, HttpResponse, Method, Transport, TransportError};

/// Default user agent sent to every provider.
pub const DEFAULT_USER_AGENT: &str = "pointzero-osint/0.1";

/// Default request timeout; matches the Overpass server-side timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Error raised when the HTTP client cannot be constructed.
#[derive(Debug, Error)]
#[error("failed to build HTTP client")]
pub struct TransportBuildError(#[source] reqwest::Error);

/// Configuration for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl TransportConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Production [`Transport`] built on a shared `reqwest` client.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use pointzero_data::http::{ReqwestTransport, TransportConfig};
///
/// let config = TransportConfig::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_user_agent("my-app/1.0");
/// let transport = ReqwestTransport::with_config(config)?;
/// # Ok::<(), pointzero_data::http::TransportBuildError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    /// Create a transport with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, TransportBuildError> {
        Self::with_config(TransportConfig::default())
    }

    /// Create a transport with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_config(config: TransportConfig) -> Result<Self, TransportBuildError> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(TransportBuildError)?;
        Ok(Self { client, config })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }
        TransportError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        if request.header(USER_AGENT.as_str()).is_none() {
            builder = builder.header(USER_AGENT, self.config.user_agent.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        log::debug!("{url} answered {status} with {} bytes", body.len());
        Ok(HttpResponse { status, body })
    }
}
