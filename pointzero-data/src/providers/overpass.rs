//! OpenStreetMap facilities via the Overpass API.
//!
//! The query is posted to each mirror in turn. Every mirror gets the full
//! retry budget; the first successful, decodable answer wins.

use std::{collections::HashMap, rc::Rc};

use async_trait::async_trait;
use pointzero_core::{Category, NormalizedRecord, Source};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{
    ProviderAdapter, ProviderError, ProviderNotice, ProviderOutcome, ProviderQuery, lenient_f64,
};
use crate::{
    http::{HttpRequest, RetryPolicy, Transport, fetch_with_retry},
    pacing::{Delay, TokioDelay},
};

/// Public Overpass mirrors, in the order they are tried.
pub const DEFAULT_OVERPASS_MIRRORS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.nchc.org.tw/api/interpreter",
];

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Tag filters and the element kinds each applies to.
const MILITARY_FILTERS: &[(&str, &[&str])] = &[
    (r#"["building"="military"]"#, &["node", "way", "relation"]),
    (r#"["military"]"#, &["node", "way", "relation"]),
    (r#"["landuse"="military"]"#, &["node", "way", "relation"]),
];

const HOSPITAL_FILTERS: &[(&str, &[&str])] = &[
    (r#"["amenity"="hospital"]"#, &["node", "way", "relation"]),
    (r#"["healthcare"="hospital"]"#, &["node", "way", "relation"]),
    (r#"["building"="hospital"]"#, &["node", "way"]),
];

/// Tags consulted for the subtype, highest priority first.
const SUBTYPE_TAGS: [&str; 5] = ["military", "landuse", "building", "healthcare", "amenity"];

/// Elements stay untyped so one malformed entry cannot sink the whole answer.
#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type", default)]
    kind: String,
    id: u64,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
    center: Option<Center>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Center {
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
}

impl Center {
    fn position(&self) -> Option<(f64, f64)> {
        Some((lenient_f64(&self.lat)?, lenient_f64(&self.lon)?))
    }
}

impl OverpassElement {
    /// `(latitude, longitude)` from the element itself or its centre.
    fn position(&self) -> Option<(f64, f64)> {
        match (lenient_f64(&self.lat), lenient_f64(&self.lon)) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => self.center.as_ref().and_then(Center::position),
        }
    }

    fn subtype(&self, category: Category) -> String {
        SUBTYPE_TAGS
            .iter()
            .filter_map(|tag| self.tags.get(*tag))
            .find(|value| !value.is_empty())
            .map_or_else(|| category.as_str().to_owned(), Clone::clone)
    }

    fn into_record(self, category: Category) -> Option<NormalizedRecord> {
        let Some((latitude, longitude)) = self.position() else {
            log::debug!("skipping OSM {} {} without coordinates", self.kind, self.id);
            return None;
        };
        Some(NormalizedRecord::new(
            Source::OpenStreetMap,
            self.id,
            category,
            self.tags.get("name").map(String::as_str),
            self.subtype(category),
            latitude,
            longitude,
        ))
    }
}

fn decode_element(element: Value, category: Category) -> Option<NormalizedRecord> {
    match serde_json::from_value::<OverpassElement>(element) {
        Ok(element) => element.into_record(category),
        Err(error) => {
            log::debug!("skipping malformed OSM element: {error}");
            None
        }
    }
}

/// Build the Overpass QL query for `query`.
pub(crate) fn build_query(query: &ProviderQuery) -> String {
    let filters = match query.category {
        Category::Military => MILITARY_FILTERS,
        Category::Hospital => HOSPITAL_FILTERS,
    };
    let around = format!(
        "(around:{},{},{})",
        query.radius_m(),
        query.latitude,
        query.longitude
    );
    let around_clause = &around;
    let statements: String = filters
        .iter()
        .flat_map(|(filter, kinds)| {
            kinds
                .iter()
                .map(move |kind| format!("  {kind}{filter}{around_clause};\n"))
        })
        .collect();
    format!("[out:json][timeout:90];\n(\n{statements});\nout center;\n")
}

/// [`ProviderAdapter`] for OpenStreetMap through Overpass mirrors.
pub struct OverpassAdapter<T> {
    transport: T,
    delay: Rc<dyn Delay>,
    mirrors: Vec<Url>,
    retry: RetryPolicy,
}

impl<T> std::fmt::Debug for OverpassAdapter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverpassAdapter")
            .field("mirrors", &self.mirrors)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> OverpassAdapter<T> {
    /// Create an adapter using the public mirrors and default retry policy.
    pub fn new(transport: T) -> Self {
        let mirrors = DEFAULT_OVERPASS_MIRRORS
            .iter()
            .filter_map(|mirror| Url::parse(mirror).ok())
            .collect();
        Self {
            transport,
            delay: Rc::new(TokioDelay),
            mirrors,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the mirror list.
    #[must_use]
    pub fn with_mirrors(mut self, mirrors: Vec<Url>) -> Self {
        self.mirrors = mirrors;
        self
    }

    /// Use `delay` for retry backoff.
    #[must_use]
    pub fn with_delay(mut self, delay: Rc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

}

#[async_trait(?Send)]
impl<T: Transport> ProviderAdapter for OverpassAdapter<T> {
    fn source(&self) -> Source {
        Source::OpenStreetMap
    }

    async fn search(&self, query: &ProviderQuery) -> Result<ProviderOutcome, ProviderError> {
        let body = build_query(query);
        let mut notices = Vec::new();

        for mirror in &self.mirrors {
            let request = HttpRequest::post(mirror.clone(), body.as_str())
                .with_header("Content-Type", CONTENT_TYPE);
            let failure =
                match fetch_with_retry(&self.transport, self.delay.as_ref(), &request, &self.retry)
                    .await
                {
                    Ok(response) if response.is_success() => {
                        match response.json::<OverpassResponse>() {
                            Ok(decoded) => {
                                let records: Vec<_> = decoded
                                    .elements
                                    .into_iter()
                                    .filter_map(|element| decode_element(element, query.category))
                                    .collect();
                                log::info!(
                                    "{mirror} returned {} {} records",
                                    records.len(),
                                    query.category
                                );
                                return Ok(ProviderOutcome { records, notices });
                            }
                            Err(error) => format!("undecodable response: {error}"),
                        }
                    }
                    Ok(response) => format!("HTTP {}", response.status),
                    Err(error) => error.to_string(),
                };
            log::warn!("Overpass server {mirror} failed: {failure}");
            notices.push(ProviderNotice::MirrorFailed {
                endpoint: mirror.to_string(),
                reason: failure,
            });
        }

        Err(ProviderError::AllServersUnavailable {
            attempted: self.mirrors.len(),
            failures: notices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingDelay, StubTransport, block_on};
    use crate::http::Method;
    use rstest::{fixture, rstest};

    #[fixture]
    fn query() -> ProviderQuery {
        ProviderQuery {
            latitude: 55.7558,
            longitude: 37.6173,
            radius_km: 10.0,
            category: Category::Military,
            geonames_username: None,
        }
    }

    fn adapter(transport: &StubTransport) -> OverpassAdapter<&StubTransport> {
        OverpassAdapter::new(transport).with_delay(Rc::new(RecordingDelay::default()))
    }

    const NODE_RESPONSE: &str = r#"{
        "elements": [{
            "type": "node",
            "id": 123456,
            "lat": 55.7558,
            "lon": 37.6173,
            "tags": {"name": "Test Military Base", "military": "barracks"}
        }]
    }"#;

    #[rstest]
    fn military_query_covers_every_filter(query: ProviderQuery) {
        let text = build_query(&query);
        assert!(text.starts_with("[out:json][timeout:90];"));
        assert!(text.contains(r#"relation["landuse"="military"](around:10000,55.7558,37.6173);"#));
        assert!(text.contains(r#"node["military"](around:10000,55.7558,37.6173);"#));
        assert_eq!(text.matches("(around:").count(), 9);
        assert!(text.trim_end().ends_with("out center;"));
    }

    #[rstest]
    fn hospital_query_skips_building_relations(query: ProviderQuery) {
        let text = build_query(&ProviderQuery {
            category: Category::Hospital,
            ..query
        });
        assert_eq!(text.matches("(around:").count(), 8);
        assert!(!text.contains(r#"relation["building"="hospital"]"#));
        assert!(text.contains(r#"way["building"="hospital"]"#));
    }

    #[rstest]
    fn normalizes_node_elements(query: ProviderQuery) {
        let transport = StubTransport::new().respond(200, NODE_RESPONSE);
        let outcome = block_on(adapter(&transport).search(&query)).expect("search succeeds");

        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.id, "osm_123456");
        assert_eq!(record.name, "Test Military Base");
        assert_eq!(record.subtype, "barracks");
        assert_eq!(record.coordinates(), (55.7558, 37.6173));
        assert_eq!(record.source, Source::OpenStreetMap);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].url.as_str(), DEFAULT_OVERPASS_MIRRORS[0]);
        assert_eq!(requests[0].header("content-type"), Some(CONTENT_TYPE));
    }

    #[rstest]
    fn uses_centre_and_skips_elements_without_position(query: ProviderQuery) {
        let body = r#"{"elements": [
            {"type": "way", "id": 7, "center": {"lat": 1.5, "lon": 2.5}, "tags": {"landuse": "military", "building": "yes"}},
            {"type": "relation", "id": 8, "tags": {"name": "Nowhere"}},
            {"type": "node", "id": 9, "lat": 3.0, "lon": 4.0}
        ]}"#;
        let transport = StubTransport::new().respond(200, body);
        let outcome = block_on(adapter(&transport).search(&query)).expect("search succeeds");

        let summary: Vec<_> = outcome
            .records
            .iter()
            .map(|r| (r.id.as_str(), r.name.as_str(), r.subtype.as_str(), r.coordinates()))
            .collect();
        assert_eq!(
            summary,
            [
                ("osm_7", "Unnamed", "military", (1.5, 2.5)),
                ("osm_9", "Unnamed", "military", (3.0, 4.0)),
            ]
        );
    }

    #[rstest]
    fn fails_over_to_next_mirror(query: ProviderQuery) {
        let transport = StubTransport::new()
            .respond(429, "")
            .respond(200, "<html>not json</html>")
            .respond(200, NODE_RESPONSE);
        let outcome = block_on(adapter(&transport).search(&query)).expect("third mirror answers");

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.notices.len(), 2);
        let urls: Vec<_> = transport
            .requests()
            .iter()
            .map(|request| request.url.to_string())
            .collect();
        assert_eq!(urls, DEFAULT_OVERPASS_MIRRORS);
    }

    #[rstest]
    fn exhausting_every_mirror_is_an_error(query: ProviderQuery) {
        let transport = StubTransport::new().respond(500, "").respond(403, "");
        let mirrors = vec![
            Url::parse("https://a.example/api").expect("url"),
            Url::parse("https://b.example/api").expect("url"),
        ];
        let err = block_on(adapter(&transport).with_mirrors(mirrors).search(&query))
            .expect_err("every mirror fails");

        match err {
            ProviderError::AllServersUnavailable { attempted, failures } => {
                assert_eq!(attempted, 2);
                assert_eq!(
                    failures,
                    [
                        ProviderNotice::MirrorFailed {
                            endpoint: "https://a.example/api".to_owned(),
                            reason: "HTTP 500".to_owned(),
                        },
                        ProviderNotice::MirrorFailed {
                            endpoint: "https://b.example/api".to_owned(),
                            reason: "HTTP 403".to_owned(),
                        },
                    ]
                );
                let message = ProviderError::AllServersUnavailable { attempted, failures }
                    .to_string();
                assert!(message.contains("server https://a.example/api failed: HTTP 500"));
                assert!(message.contains("server https://b.example/api failed: HTTP 403"));
            }
            other => panic!("expected AllServersUnavailable, found {other:?}"),
        }
    }

    #[rstest]
    fn malformed_elements_do_not_hide_their_neighbours(query: ProviderQuery) {
        let body = r#"{"elements": [
            {"type": "node", "id": 42, "lat": 10, "lon": 20, "tags": {"military": "barracks"}},
            {"type": "way", "id": 43, "center": {"lat": 1.0}},
            {"type": "node", "lat": 5.0, "lon": 6.0},
            {"type": "node", "id": 44, "lat": "north", "lon": 6.0},
            {"type": "way", "id": 45, "center": {"lat": "7.5", "lon": 8.5}}
        ]}"#;
        let transport = StubTransport::new().respond(200, body);
        let outcome = block_on(adapter(&transport).search(&query)).expect("search succeeds");

        let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["osm_42", "osm_45"]);
        assert_eq!(outcome.records[1].coordinates(), (7.5, 8.5));
        assert!(outcome.notices.is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[rstest]
    fn gateway_errors_use_the_retry_budget_per_mirror(query: ProviderQuery) {
        let delay = RecordingDelay::default();
        let transport = StubTransport::new()
            .respond(504, "")
            .respond(504, "")
            .respond(504, "")
            .respond(200, NODE_RESPONSE);
        let outcome = block_on(
            OverpassAdapter::new(&transport)
                .with_delay(Rc::new(delay.clone()))
                .search(&query),
        )
        .expect("second mirror answers");

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(transport.requests().len(), 4);
        assert_eq!(delay.waits().len(), 2);
        assert_eq!(delay.total(), std::time::Duration::from_millis(6000));
    }
}
