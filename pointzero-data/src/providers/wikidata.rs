//! Wikidata entities around a point, via the SPARQL endpoint.

use std::sync::LazyLock;

use async_trait::async_trait;
use pointzero_core::{Category, NormalizedRecord, Source};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{ProviderAdapter, ProviderError, ProviderOutcome, ProviderQuery};
use crate::http::{HttpRequest, Transport};

/// Public Wikidata Query Service endpoint.
pub const DEFAULT_WIKIDATA_ENDPOINT: &str = "https://query.wikidata.org/sparql";

/// Subtype given to every Wikidata record.
pub const WIKIDATA_SUBTYPE: &str = "Wikidata Entity";

const ACCEPT: &str = "application/sparql-results+json";

/// WKT point literal, `Point(lon lat)`.
static WKT_POINT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Point\(([-\d.]+) ([-\d.]+)\)").ok());

const MILITARY_PATTERNS: &str = "
    {
        ?item wdt:P31/wdt:P279* wd:Q245016.
    } UNION {
        ?item wdt:P31/wdt:P279* wd:Q695793.
    } UNION {
        ?item wdt:P31/wdt:P279* wd:Q1785071.
    } UNION {
        ?item wdt:P31/wdt:P279* wd:Q18691599.
    } UNION {
        ?item wdt:P31/wdt:P279* wd:Q744099.
    } UNION {
        ?item wdt:P137 wd:Q9212.
    } UNION {
        ?item wdt:P366 wd:Q245068.
    } UNION {
        ?item wdt:P241 ?militaryBranch.
    } UNION {
        ?item wdt:P127/wdt:P31 wd:Q247952.
    }";

const HOSPITAL_PATTERNS: &str = "
    {
        ?item wdt:P31 wd:Q16917.
    } UNION {
        ?item wdt:P31 wd:Q1059324.
    } UNION {
        ?item wdt:P31 wd:Q4260475.
    }";

/// Build the SPARQL query for `query`.
pub(crate) fn build_query(query: &ProviderQuery) -> String {
    let (patterns, limit) = match query.category {
        Category::Military => (MILITARY_PATTERNS, 200),
        Category::Hospital => (HOSPITAL_PATTERNS, 100),
    };
    format!(
        "SELECT DISTINCT ?item ?itemLabel ?coord WHERE {{
    SERVICE wikibase:around {{
        ?item wdt:P625 ?coord.
        bd:serviceParam wikibase:center \"Point({lon} {lat})\"^^geo:wktLiteral.
        bd:serviceParam wikibase:radius \"{radius}\".
        bd:serviceParam wikibase:distance ?dist.
    }}{patterns}
    SERVICE wikibase:label {{ bd:serviceParam wikibase:language \"en,ru\". }}
}}
ORDER BY ?dist
LIMIT {limit}
",
        lon = query.longitude,
        lat = query.latitude,
        radius = query.radius_km,
    )
}

/// Parse a WKT `Point(lon lat)` literal into `(latitude, longitude)`.
fn parse_point(literal: &str) -> Option<(f64, f64)> {
    let captures = WKT_POINT.as_ref()?.captures(literal)?;
    let longitude: f64 = captures.get(1)?.as_str().parse().ok()?;
    let latitude: f64 = captures.get(2)?.as_str().parse().ok()?;
    Some((latitude, longitude))
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: Option<SparqlResults>,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Binding {
    item: Option<Term>,
    item_label: Option<Term>,
    coord: Option<Term>,
}

#[derive(Debug, Deserialize)]
struct Term {
    value: String,
}

impl Binding {
    fn decode(binding: Value, category: Category) -> Option<NormalizedRecord> {
        match serde_json::from_value::<Self>(binding) {
            Ok(binding) => binding.into_record(category),
            Err(error) => {
                log::debug!("skipping malformed Wikidata binding: {error}");
                None
            }
        }
    }

    fn into_record(self, category: Category) -> Option<NormalizedRecord> {
        let entity = self
            .item
            .as_ref()
            .and_then(|item| item.value.rsplit('/').next())
            .filter(|segment| !segment.is_empty())?;
        let Some((latitude, longitude)) = self.coord.as_ref().and_then(|c| parse_point(&c.value))
        else {
            log::debug!("skipping Wikidata entity {entity} without a point coordinate");
            return None;
        };
        Some(NormalizedRecord::new(
            Source::Wikidata,
            entity,
            category,
            self.item_label.as_ref().map(|label| label.value.as_str()),
            WIKIDATA_SUBTYPE,
            latitude,
            longitude,
        ))
    }
}

/// [`ProviderAdapter`] for the Wikidata Query Service.
#[derive(Debug)]
pub struct WikidataAdapter<T> {
    transport: T,
    endpoint: String,
}

impl<T: Transport> WikidataAdapter<T> {
    /// Create an adapter against the public endpoint.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            endpoint: DEFAULT_WIKIDATA_ENDPOINT.to_owned(),
        }
    }

    /// Use a different SPARQL endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait(?Send)]
impl<T: Transport> ProviderAdapter for WikidataAdapter<T> {
    fn source(&self) -> Source {
        Source::Wikidata
    }

    async fn search(&self, query: &ProviderQuery) -> Result<ProviderOutcome, ProviderError> {
        let sparql = build_query(query);
        let url = Url::parse_with_params(&self.endpoint, [("query", sparql.as_str())]).map_err(
            |error| ProviderError::Service {
                message: format!("invalid Wikidata endpoint {}: {error}", self.endpoint),
            },
        )?;
        log::debug!("Wikidata {} query:\n{sparql}", query.category);

        let request = HttpRequest::get(url.clone()).with_header("Accept", ACCEPT);
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(ProviderError::HttpStatus {
                url: self.endpoint.clone(),
                status: response.status,
            });
        }

        let decoded: SparqlResponse = response.json().map_err(|source| ProviderError::Decode {
            url: self.endpoint.clone(),
            source,
        })?;
        let records: Vec<_> = decoded
            .results
            .map(|results| results.bindings)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|binding| Binding::decode(binding, query.category))
            .collect();
        log::info!("Wikidata returned {} {} records", records.len(), query.category);
        Ok(ProviderOutcome::with_records(records))
    }
}
