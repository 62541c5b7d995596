//! Per-search state: the result set, progress events and their observers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Category, NormalizedRecord, SearchRequest, Source};

/// Ordered, append-only records gathered during one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchResultSet {
    records: Vec<NormalizedRecord>,
}

impl SearchResultSet {
    /// Create an empty result set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append records, preserving their order.
    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = NormalizedRecord>,
    {
        self.records.extend(records);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were gathered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedRecord> {
        self.records.iter()
    }

    /// Consume the set, returning the records.
    #[must_use]
    pub fn into_records(self) -> Vec<NormalizedRecord> {
        self.records
    }

    /// Number of records in `category`.
    #[must_use]
    pub fn count_category(&self, category: Category) -> usize {
        self.records
            .iter()
            .filter(|record| record.category == category)
            .count()
    }

    /// Record counts keyed by provider.
    #[must_use]
    pub fn counts_by_source(&self) -> BTreeMap<Source, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.source).or_insert(0) += 1;
        }
        counts
    }

    /// Records that carry a real name, dropping `"Unnamed"` entries.
    pub fn named_only(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.records.iter().filter(|record| record.is_named())
    }
}

impl<'a> IntoIterator for &'a SearchResultSet {
    type Item = &'a NormalizedRecord;
    type IntoIter = std::slice::Iter<'a, NormalizedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Progress reported while a search runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SearchEvent {
    /// A provider call is about to start.
    Started {
        /// Provider being queried.
        provider: Source,
        /// Category being searched.
        category: Category,
    },
    /// A provider call finished and its records were appended.
    Completed {
        /// Provider that was queried.
        provider: Source,
        /// Category that was searched.
        category: Category,
        /// Number of records appended.
        count: usize,
    },
    /// A provider call failed; it contributed no records.
    Failed {
        /// Provider that was queried.
        provider: Source,
        /// Category that was searched.
        category: Category,
        /// Human readable failure description.
        reason: String,
    },
    /// A non-fatal warning raised by a provider.
    Notice {
        /// Provider that raised the warning.
        provider: Source,
        /// Category that was searched.
        category: Category,
        /// Warning text.
        message: String,
    },
    /// The search ran to completion.
    Finished {
        /// Total number of records gathered.
        total: usize,
    },
}

/// Receives [`SearchEvent`]s as they happen.
///
/// Closures taking `&SearchEvent` implement the trait, which keeps callers
/// that only log progress concise.
pub trait SearchObserver {
    /// Handle a single event.
    fn on_event(&mut self, event: &SearchEvent);
}

impl<F> SearchObserver for F
where
    F: FnMut(&SearchEvent),
{
    fn on_event(&mut self, event: &SearchEvent) {
        self(event);
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {
    fn on_event(&mut self, _event: &SearchEvent) {}
}

/// Everything produced by one search run.
///
/// Owned exclusively by the orchestrator while the search runs and handed to
/// the caller once it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSession {
    request: SearchRequest,
    results: SearchResultSet,
    events: Vec<SearchEvent>,
}

impl AggregationSession {
    /// Begin a session for `request` with an empty result set.
    #[must_use]
    pub const fn new(request: SearchRequest) -> Self {
        Self {
            request,
            results: SearchResultSet::new(),
            events: Vec::new(),
        }
    }

    /// The request this session serves.
    #[must_use]
    pub const fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Records gathered so far.
    #[must_use]
    pub const fn results(&self) -> &SearchResultSet {
        &self.results
    }

    /// Events emitted so far, in order.
    #[must_use]
    pub fn events(&self) -> &[SearchEvent] {
        &self.events
    }

    /// Append the records of one provider call.
    pub fn append(&mut self, records: Vec<NormalizedRecord>) -> usize {
        let count = records.len();
        self.results.extend(records);
        count
    }

    /// Store `event` and forward it to `observer`.
    pub fn emit(&mut self, observer: &mut dyn SearchObserver, event: SearchEvent) {
        observer.on_event(&event);
        self.events.push(event);
    }

    /// Sum of the counts reported by every completed provider call.
    #[must_use]
    pub fn reported_total(&self) -> usize {
        self.events
            .iter()
            .map(|event| match event {
                SearchEvent::Completed { count, .. } => *count,
                _ => 0,
            })
            .sum()
    }

    /// Consume the session, returning the result set.
    #[must_use]
    pub fn into_results(self) -> SearchResultSet {
        self.results
    }
}
