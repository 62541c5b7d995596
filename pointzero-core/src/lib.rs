//! Core domain types for the Point Zero aggregator.
//!
//! Responsibilities:
//! - Define the normalized record shape every provider maps into.
//! - Validate search requests before any network traffic happens.
//! - Hold per-search state and progress events.
//! - Cache record annotations over an injected key-value store.
//! - Render result sets as reports and share links.
//!
//! Boundaries:
//! - No HTTP here; provider adapters live in `pointzero-data`.
//! - No filesystem writes; callers persist rendered reports.
//!
//! Invariants:
//! - No global mutable state; every search owns its session.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod record;
mod request;
mod session;

pub mod annotation;
pub mod export;
pub mod share;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use record::{Category, NormalizedRecord, ParseKindError, Source, UNNAMED};
pub use request::{
    LATITUDE_RANGE, LONGITUDE_RANGE, RADIUS_KM_RANGE, SearchRequest, SearchRequestError,
};
pub use session::{
    AggregationSession, NoopObserver, SearchEvent, SearchObserver, SearchResultSet,
};
