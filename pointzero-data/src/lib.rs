//! Provider access and search orchestration for Point Zero.
//!
//! Responsibilities:
//! - Talk to OpenStreetMap (Overpass), GeoNames and Wikidata over HTTP.
//! - Retry transient failures and fail over between Overpass mirrors.
//! - Pace provider calls and drive the sequential search.
//!
//! Boundaries:
//! - Domain types and validation live in `pointzero-core`.
//! - No rendering or persistence; callers consume the returned session.
//!
//! Invariants:
//! - Provider calls run one at a time on the current task.
//! - A single provider failure never aborts a search.

pub mod http;
pub mod orchestrator;
pub mod pacing;
pub mod providers;

#[doc(hidden)]
pub mod test_support;

pub use orchestrator::Orchestrator;
pub use pacing::{Delay, PacingPolicy, TokioDelay};
pub use providers::{
    GeoNamesAdapter, OverpassAdapter, ProviderAdapter, ProviderError, ProviderNotice,
    ProviderOutcome, ProviderQuery, WikidataAdapter,
};
