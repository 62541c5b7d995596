//! Sequential fan-out over enabled providers and categories.
//!
//! The orchestrator validates the request, then walks providers in the fixed
//! order OpenStreetMap, GeoNames, Wikidata and categories in the order
//! Military, Hospital. A failing provider call is reported as a
//! [`SearchEvent::Failed`] and contributes no records; the search continues.

use std::rc::Rc;

use pointzero_core::{
    AggregationSession, Category, SearchEvent, SearchObserver, SearchRequest, SearchRequestError,
    Source,
};
use url::Url;

use crate::{
    http::{RetryPolicy, Transport},
    pacing::{Delay, PacingPolicy, TokioDelay},
    providers::{
        GeoNamesAdapter, OverpassAdapter, ProviderAdapter, ProviderError, ProviderOutcome,
        ProviderQuery, WikidataAdapter,
    },
};

/// Runs searches against a registry of provider adapters.
///
/// # Examples
/// ```
/// use std::rc::Rc;
///
/// use pointzero_core::{Category, NoopObserver, SearchRequest, Source};
/// use pointzero_data::{Orchestrator, PacingPolicy};
/// use pointzero_data::test_support::{RecordingDelay, StubAdapter, block_on};
///
/// let orchestrator = Orchestrator::new()
///     .with_adapter(Box::new(StubAdapter::new(Source::Wikidata)))
///     .with_pacing(PacingPolicy::none())
///     .with_delay(Rc::new(RecordingDelay::default()));
/// let request = SearchRequest::new(55.7, 37.6, 5.0)
///     .with_category(Category::Hospital)
///     .with_provider(Source::Wikidata);
///
/// let session = block_on(orchestrator.run_search(&request, &mut NoopObserver))
///     .expect("request is valid");
/// assert!(session.results().is_empty());
/// assert_eq!(session.events().len(), 3);
/// ```
pub struct Orchestrator {
    adapters: Vec<Box<dyn ProviderAdapter>>,
    pacing: PacingPolicy,
    delay: Rc<dyn Delay>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<_> = self.registered().collect();
        f.debug_struct("Orchestrator")
            .field("adapters", &sources)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// Create an orchestrator with no adapters and default pacing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
            pacing: PacingPolicy::default(),
            delay: Rc::new(TokioDelay),
        }
    }

    /// Register the three public providers over a shared `transport`.
    ///
    /// Overpass tries `mirrors` in order with the `retry` budget each and
    /// backs off through the orchestrator's default delay.
    pub fn with_default_providers<T>(
        transport: Rc<T>,
        mirrors: Vec<Url>,
        retry: RetryPolicy,
    ) -> Self
    where
        T: Transport + 'static,
    {
        let base = Self::new();
        let overpass = OverpassAdapter::new(Rc::clone(&transport))
            .with_mirrors(mirrors)
            .with_retry_policy(retry)
            .with_delay(Rc::clone(&base.delay));
        base.with_adapter(Box::new(overpass))
            .with_adapter(Box::new(GeoNamesAdapter::new(Rc::clone(&transport))))
            .with_adapter(Box::new(WikidataAdapter::new(transport)))
    }

    /// Register `adapter`, replacing any adapter for the same provider.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Box<dyn ProviderAdapter>) -> Self {
        let source = adapter.source();
        self.adapters.retain(|existing| existing.source() != source);
        self.adapters.push(adapter);
        self
    }

    /// Replace the waits applied around each provider call.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    /// Use `delay` for pacing waits.
    #[must_use]
    pub fn with_delay(mut self, delay: Rc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Provider sources with a registered adapter.
    pub fn registered(&self) -> impl Iterator<Item = Source> + '_ {
        self.adapters.iter().map(|adapter| adapter.source())
    }

    fn adapter_for(&self, source: Source) -> Option<&dyn ProviderAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.source() == source)
            .map(AsRef::as_ref)
    }

    /// Run one aggregated search.
    ///
    /// Events are forwarded to `observer` as they happen and kept on the
    /// returned session.
    ///
    /// # Errors
    ///
    /// Returns a [`SearchRequestError`] when `request` fails validation; no
    /// provider is contacted in that case.
    pub async fn run_search(
        &self,
        request: &SearchRequest,
        observer: &mut dyn SearchObserver,
    ) -> Result<AggregationSession, SearchRequestError> {
        request.validate()?;
        let mut session = AggregationSession::new(request.clone());

        for provider in Source::ALL {
            if !request.providers.contains(&provider) {
                continue;
            }
            for category in Category::ALL {
                if !request.categories.contains(&category) {
                    continue;
                }
                session.emit(observer, SearchEvent::Started { provider, category });

                let Some(adapter) = self.adapter_for(provider) else {
                    log::warn!("no adapter registered for {provider}");
                    let reason = ProviderError::NotConfigured { provider }.to_string();
                    session.emit(
                        observer,
                        SearchEvent::Failed {
                            provider,
                            category,
                            reason,
                        },
                    );
                    continue;
                };

                let query = ProviderQuery::from_request(request, category);
                self.pacing
                    .around(self.delay.as_ref(), async {
                        log::info!("querying {provider} for {category}");
                        let result = adapter.search(&query).await;
                        record_outcome(&mut session, &mut *observer, provider, category, result);
                    })
                    .await;
            }
        }

        let total = session.results().len();
        log::info!("search finished with {total} records");
        session.emit(observer, SearchEvent::Finished { total });
        Ok(session)
    }
}

fn record_outcome(
    session: &mut AggregationSession,
    observer: &mut dyn SearchObserver,
    provider: Source,
    category: Category,
    result: Result<ProviderOutcome, ProviderError>,
) {
    match result {
        Ok(ProviderOutcome { records, notices }) => {
            let count = session.append(records);
            session.emit(
                observer,
                SearchEvent::Completed {
                    provider,
                    category,
                    count,
                },
            );
            for notice in notices {
                session.emit(
                    observer,
                    SearchEvent::Notice {
                        provider,
                        category,
                        message: notice.to_string(),
                    },
                );
            }
        }
        Err(error) => {
            log::warn!("{provider} {category} search failed: {error}");
            session.emit(
                observer,
                SearchEvent::Failed {
                    provider,
                    category,
                    reason: error.to_string(),
                },
            );
        }
    }
}
