//! Provider adapters turning a point, radius and category into records.
//!
//! Each adapter owns its request template and its raw response types, and
//! maps responses into [`NormalizedRecord`]s. Malformed elements are skipped
//! with a debug log line; request-level failures are returned as
//! [`ProviderError`] and contained by the orchestrator.

mod geonames;
mod overpass;
mod wikidata;

use std::{fmt, rc::Rc};

use async_trait::async_trait;
use pointzero_core::{Category, NormalizedRecord, SearchRequest, Source};
use thiserror::Error;

use crate::http::{RetryError, TransportError};

pub use geonames::{DEFAULT_GEONAMES_BASE_URL, GeoNamesAdapter, MAX_ROWS};
pub use overpass::{DEFAULT_OVERPASS_MIRRORS, OverpassAdapter};
pub use wikidata::{DEFAULT_WIKIDATA_ENDPOINT, WIKIDATA_SUBTYPE, WikidataAdapter};

/// Inputs for one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuery {
    /// Centre latitude in decimal degrees.
    pub latitude: f64,
    /// Centre longitude in decimal degrees.
    pub longitude: f64,
    /// Search radius in kilometres.
    pub radius_km: f64,
    /// Category searched for.
    pub category: Category,
    /// GeoNames account name, if configured.
    pub geonames_username: Option<String>,
}

impl ProviderQuery {
    /// Derive the query for `category` from a validated request.
    #[must_use]
    pub fn from_request(request: &SearchRequest, category: Category) -> Self {
        Self {
            latitude: request.latitude,
            longitude: request.longitude,
            radius_km: request.radius_km,
            category,
            geonames_username: request.geonames_username().map(str::to_owned),
        }
    }

    /// Radius in metres.
    #[must_use]
    pub fn radius_m(&self) -> f64 {
        self.radius_km * 1000.0
    }
}

/// Non-fatal warning raised during a provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderNotice {
    /// The provider needs a credential that was not supplied.
    MissingCredential {
        /// Name of the missing credential.
        credential: &'static str,
    },
    /// One mirror failed and the next will be tried.
    MirrorFailed {
        /// Mirror that failed.
        endpoint: String,
        /// Failure description.
        reason: String,
    },
}

impl fmt::Display for ProviderNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential { credential } => write!(f, "{credential} not provided"),
            Self::MirrorFailed { endpoint, reason } => {
                write!(f, "server {endpoint} failed: {reason}")
            }
        }
    }
}

/// Records and notices produced by one provider call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderOutcome {
    /// Normalized records in provider order.
    pub records: Vec<NormalizedRecord>,
    /// Non-fatal warnings.
    pub notices: Vec<ProviderNotice>,
}

impl ProviderOutcome {
    /// Outcome carrying only records.
    #[must_use]
    pub const fn with_records(records: Vec<NormalizedRecord>) -> Self {
        Self {
            records,
            notices: Vec::new(),
        }
    }

    /// Outcome carrying a single notice and no records.
    #[must_use]
    pub fn notice(notice: ProviderNotice) -> Self {
        Self {
            records: Vec::new(),
            notices: vec![notice],
        }
    }
}

/// Request-level provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Every Overpass mirror failed.
    #[error("all {attempted} Overpass servers unavailable ({})", join_notices(failures))]
    AllServersUnavailable {
        /// Mirrors tried.
        attempted: usize,
        /// Why each mirror failed, in the order they were tried.
        failures: Vec<ProviderNotice>,
    },
    /// The provider rejected the credentials.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message supplied by the provider.
        message: String,
    },
    /// The provider answered with a non-success status.
    #[error("request to {url} failed with HTTP {status}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The provider reported an error inside a successful response.
    #[error("service error: {message}")]
    Service {
        /// Message supplied by the provider.
        message: String,
    },
    /// The request could not be sent.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Retries were exhausted.
    #[error(transparent)]
    Retry(#[from] RetryError),
    /// The response body could not be decoded.
    #[error("failed to decode response from {url}")]
    Decode {
        /// Request URL.
        url: String,
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// No adapter is registered for the provider.
    #[error("{provider} is not configured")]
    NotConfigured {
        /// Provider that was requested.
        provider: Source,
    },
}

fn join_notices(notices: &[ProviderNotice]) -> String {
    notices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Queries one provider for one category.
#[async_trait(?Send)]
pub trait ProviderAdapter {
    /// Provider this adapter talks to.
    fn source(&self) -> Source;

    /// Fetch and normalize records for `query`.
    async fn search(&self, query: &ProviderQuery) -> Result<ProviderOutcome, ProviderError>;
}

#[async_trait(?Send)]
impl<A: ProviderAdapter + ?Sized> ProviderAdapter for Rc<A> {
    fn source(&self) -> Source {
        (**self).source()
    }

    async fn search(&self, query: &ProviderQuery) -> Result<ProviderOutcome, ProviderError> {
        (**self).search(query).await
    }
}

/// Read a JSON number or numeric string.
pub(crate) fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .filter(|parsed| parsed.is_finite())
}
