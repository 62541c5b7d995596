//! Test utilities for provider adapters and the orchestrator.
//!
//! [`StubTransport`] replays scripted HTTP exchanges, [`RecordingDelay`]
//! records waits instead of sleeping and [`StubAdapter`] returns canned
//! provider outcomes.

use std::{cell::RefCell, collections::VecDeque, future::Future, rc::Rc, time::Duration};

use async_trait::async_trait;
use pointzero_core::Source;

use crate::{
    http::{HttpRequest, HttpResponse, Transport, TransportError},
    pacing::Delay,
    providers::{ProviderAdapter, ProviderError, ProviderOutcome, ProviderQuery},
};

/// Drive `future` to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be created.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("test runtime should build")
        .block_on(future)
}

/// Scripted [`Transport`] recording every request it receives.
///
/// Responses are returned in the order they were scripted. Once the script
/// is exhausted every request fails with a network error.
///
/// # Example
///
/// ```
/// use pointzero_data::http::{HttpRequest, Transport};
/// use pointzero_data::test_support::{StubTransport, block_on};
/// use url::Url;
///
/// let transport = StubTransport::new().respond(200, "{}");
/// let request = HttpRequest::get(Url::parse("https://example.com/").expect("valid url"));
/// let response = block_on(transport.send(&request)).expect("scripted response");
/// assert_eq!(response.status, 200);
/// assert_eq!(transport.requests().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct StubTransport {
    script: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl StubTransport {
    /// Create a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    #[must_use]
    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.script
            .borrow_mut()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queue a transport failure.
    #[must_use]
    pub fn fail(self, error: TransportError) -> Self {
        self.script.borrow_mut().push_back(Err(error));
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Transport for StubTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Network {
                    url: request.url.to_string(),
                    message: "no scripted response".to_owned(),
                })
            })
    }
}

/// [`Delay`] that records requested waits and returns immediately.
///
/// Clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct RecordingDelay {
    waits: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingDelay {
    /// Waits requested so far, including zero-length ones.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }

    /// Sum of every requested wait.
    pub fn total(&self) -> Duration {
        self.waits.borrow().iter().sum()
    }
}

#[async_trait(?Send)]
impl Delay for RecordingDelay {
    async fn wait(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}

/// [`ProviderAdapter`] returning scripted outcomes in call order.
///
/// When the script runs out the adapter returns an empty outcome.
#[derive(Debug)]
pub struct StubAdapter {
    source: Source,
    script: RefCell<VecDeque<Result<ProviderOutcome, ProviderError>>>,
    queries: RefCell<Vec<ProviderQuery>>,
}

impl StubAdapter {
    /// Create an adapter reporting `source`.
    #[must_use]
    pub fn new(source: Source) -> Self {
        Self {
            source,
            script: RefCell::new(VecDeque::new()),
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Queue a successful outcome.
    #[must_use]
    pub fn succeed(self, outcome: ProviderOutcome) -> Self {
        self.script.borrow_mut().push_back(Ok(outcome));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn fail(self, error: ProviderError) -> Self {
        self.script.borrow_mut().push_back(Err(error));
        self
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<ProviderQuery> {
        self.queries.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for StubAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn search(&self, query: &ProviderQuery) -> Result<ProviderOutcome, ProviderError> {
        self.queries.borrow_mut().push(query.clone());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderOutcome::default()))
    }
}
