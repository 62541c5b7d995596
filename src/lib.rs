//! Facade crate for the Point Zero OSINT aggregator.
//!
//! This crate re-exports the core domain types and exposes the provider
//! adapters and the SQLite annotation store behind feature flags.

#![forbid(unsafe_code)]

pub use pointzero_core::{
    AggregationSession, Category, NormalizedRecord, SearchEvent, SearchObserver, SearchRequest,
    SearchRequestError, SearchResultSet, Source, annotation, export, share, store,
};

#[cfg(feature = "store-sqlite")]
pub use pointzero_core::store::{SqliteStore, SqliteStoreError};

#[cfg(feature = "providers")]
pub use pointzero_data::{
    GeoNamesAdapter, Orchestrator, OverpassAdapter, PacingPolicy, ProviderAdapter, ProviderError,
    WikidataAdapter,
};
