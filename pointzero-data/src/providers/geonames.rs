//! GeoNames `findNearbyJSON` lookups by feature code.

use async_trait::async_trait;
use pointzero_core::{Category, NormalizedRecord, Source};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{
    ProviderAdapter, ProviderError, ProviderNotice, ProviderOutcome, ProviderQuery, lenient_f64,
};
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Public GeoNames web service.
pub const DEFAULT_GEONAMES_BASE_URL: &str = "http://api.geonames.org";

/// Maximum rows requested per call.
pub const MAX_ROWS: u32 = 100;

const UNAUTHORIZED_FALLBACK: &str = "401 Unauthorized - Account not activated or invalid username";

const fn feature_code(category: Category) -> &'static str {
    match category {
        Category::Military => "MLTY",
        Category::Hospital => "HSP",
    }
}

#[derive(Debug, Default, Deserialize)]
struct GeoNamesResponse {
    geonames: Option<Vec<GeoNamesPlace>>,
    status: Option<GeoNamesStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoNamesPlace {
    geoname_id: Option<Value>,
    name: Option<String>,
    toponym_name: Option<String>,
    fcode_name: Option<String>,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lng: Value,
}

#[derive(Debug, Deserialize)]
struct GeoNamesStatus {
    #[serde(default)]
    message: String,
}

impl GeoNamesPlace {
    fn native_id(&self) -> Option<String> {
        match self.geoname_id.as_ref()? {
            Value::Number(number) => Some(number.to_string()),
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
            _ => None,
        }
    }

    fn into_record(self, category: Category) -> Option<NormalizedRecord> {
        let Some(native_id) = self.native_id() else {
            log::debug!("skipping GeoNames place without an id");
            return None;
        };
        let (Some(latitude), Some(longitude)) = (lenient_f64(&self.lat), lenient_f64(&self.lng))
        else {
            log::debug!("skipping GeoNames place {native_id} with unparsable coordinates");
            return None;
        };
        let name = [self.name.as_deref(), self.toponym_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|candidate| !candidate.trim().is_empty());
        let subtype = self
            .fcode_name
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| category.as_str().to_owned());
        Some(NormalizedRecord::new(
            Source::GeoNames,
            native_id,
            category,
            name,
            subtype,
            latitude,
            longitude,
        ))
    }
}

/// [`ProviderAdapter`] for the GeoNames gazetteer.
///
/// Requires a GeoNames account name; without one the adapter reports a
/// notice and returns no records without touching the network.
#[derive(Debug)]
pub struct GeoNamesAdapter<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> GeoNamesAdapter<T> {
    /// Create an adapter against the public GeoNames service.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            base_url: DEFAULT_GEONAMES_BASE_URL.to_owned(),
        }
    }

    /// Use a different service root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the `findNearbyJSON` URL.
    fn build_url(&self, query: &ProviderQuery, username: &str) -> Result<Url, ProviderError> {
        let endpoint = format!("{}/findNearbyJSON", self.base_url.trim_end_matches('/'));
        Url::parse_with_params(
            &endpoint,
            [
                ("lat", query.latitude.to_string()),
                ("lng", query.longitude.to_string()),
                ("radius", query.radius_km.to_string()),
                ("featureCode", feature_code(query.category).to_owned()),
                ("maxRows", MAX_ROWS.to_string()),
                ("username", username.to_owned()),
            ],
        )
        .map_err(|error| ProviderError::Service {
            message: format!("invalid GeoNames endpoint {endpoint}: {error}"),
        })
    }
}

fn decode(url: &Url, response: &HttpResponse) -> Result<GeoNamesResponse, ProviderError> {
    response.json().map_err(|source| ProviderError::Decode {
        url: url.to_string(),
        source,
    })
}

#[async_trait(?Send)]
impl<T: Transport> ProviderAdapter for GeoNamesAdapter<T> {
    fn source(&self) -> Source {
        Source::GeoNames
    }

    async fn search(&self, query: &ProviderQuery) -> Result<ProviderOutcome, ProviderError> {
        let Some(username) = query
            .geonames_username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        else {
            log::warn!("GeoNames username not provided; skipping");
            return Ok(ProviderOutcome::notice(ProviderNotice::MissingCredential {
                credential: "GeoNames username",
            }));
        };

        let url = self.build_url(query, username)?;
        let response = self.transport.send(&HttpRequest::get(url.clone())).await?;

        if response.status == 401 {
            let message = decode(&url, &response)
                .ok()
                .and_then(|body| body.status)
                .map(|status| status.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| UNAUTHORIZED_FALLBACK.to_owned());
            return Err(ProviderError::Authentication { message });
        }
        if !response.is_success() {
            return Err(ProviderError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let body = decode(&url, &response)?;
        match (body.geonames, body.status) {
            (Some(places), _) if !places.is_empty() => {
                let records: Vec<_> = places
                    .into_iter()
                    .filter_map(|place| place.into_record(query.category))
                    .collect();
                log::info!("GeoNames returned {} {} records", records.len(), query.category);
                Ok(ProviderOutcome::with_records(records))
            }
            (_, Some(status)) => Err(ProviderError::Service {
                message: status.message,
            }),
            _ => Ok(ProviderOutcome::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubTransport, block_on};
    use rstest::{fixture, rstest};

    #[fixture]
    fn query() -> ProviderQuery {
        ProviderQuery {
            latitude: 51.5074,
            longitude: -0.1278,
            radius_km: 25.0,
            category: Category::Hospital,
            geonames_username: Some("demo".to_owned()),
        }
    }

    #[rstest]
    #[case(None)]
    #[case(Some("  "))]
    fn missing_username_skips_the_request(query: ProviderQuery, #[case] username: Option<&str>) {
        let transport = StubTransport::new();
        let query = ProviderQuery {
            geonames_username: username.map(str::to_owned),
            ..query
        };

        let outcome = block_on(GeoNamesAdapter::new(&transport).search(&query))
            .expect("missing username is not an error");

        assert!(outcome.records.is_empty());
        assert_eq!(
            outcome.notices,
            [ProviderNotice::MissingCredential {
                credential: "GeoNames username"
            }]
        );
        assert!(transport.requests().is_empty());
    }

    #[rstest]
    fn builds_find_nearby_url(query: ProviderQuery) {
        let transport = StubTransport::new().respond(200, r#"{"geonames": []}"#);
        block_on(GeoNamesAdapter::new(&transport).search(&query)).expect("search succeeds");

        let requests = transport.requests();
        assert_eq!(
            requests[0].url.as_str(),
            "http://api.geonames.org/findNearbyJSON?lat=51.5074&lng=-0.1278&radius=25\
             &featureCode=HSP&maxRows=100&username=demo"
        );
    }

    #[rstest]
    fn normalizes_places_with_string_coordinates(query: ProviderQuery) {
        let body = r#"{"geonames": [
            {"geonameId": 2643743, "name": "", "toponymName": "St Thomas", "fcodeName": "hospital", "lat": "51.4989", "lng": "-0.1181"},
            {"geonameId": 17, "lat": 51.0, "lng": 0.5},
            {"geonameId": 18, "name": "Broken", "lat": "n/a", "lng": "0"}
        ]}"#;
        let transport = StubTransport::new().respond(200, body);
        let outcome = block_on(GeoNamesAdapter::new(&transport).search(&query))
            .expect("search succeeds");

        let summary: Vec<_> = outcome
            .records
            .iter()
            .map(|r| (r.id.as_str(), r.name.as_str(), r.subtype.as_str(), r.coordinates()))
            .collect();
        assert_eq!(
            summary,
            [
                ("geonames_2643743", "St Thomas", "hospital", (51.4989, -0.1181)),
                ("geonames_17", "Unnamed", "hospital", (51.0, 0.5)),
            ]
        );
    }

    #[rstest]
    fn unauthorized_uses_envelope_message(query: ProviderQuery) {
        let body = r#"{"status": {"message": "user account not enabled to use the free webservice", "value": 10}}"#;
        let transport = StubTransport::new().respond(401, body);
        let err = block_on(GeoNamesAdapter::new(&transport).search(&query))
            .expect_err("401 is an authentication failure");

        match err {
            ProviderError::Authentication { message } => {
                assert_eq!(message, "user account not enabled to use the free webservice");
            }
            other => panic!("expected Authentication, got {other:?}"),
        }
    }

    #[rstest]
    fn unauthorized_without_envelope_uses_fallback(query: ProviderQuery) {
        let transport = StubTransport::new().respond(401, "Unauthorized");
        let err = block_on(GeoNamesAdapter::new(&transport).search(&query))
            .expect_err("401 is an authentication failure");
        assert!(
            matches!(err, ProviderError::Authentication { ref message } if message == UNAUTHORIZED_FALLBACK)
        );
    }

    #[rstest]
    fn status_envelope_is_a_service_error(query: ProviderQuery) {
        let body = r#"{"status": {"message": "daily limit exceeded", "value": 18}}"#;
        let transport = StubTransport::new().respond(200, body);
        let err = block_on(GeoNamesAdapter::new(&transport).search(&query))
            .expect_err("envelope signals failure");
        assert!(matches!(err, ProviderError::Service { ref message } if message == "daily limit exceeded"));
    }

    #[rstest]
    fn other_statuses_are_http_errors(query: ProviderQuery) {
        let transport = StubTransport::new().respond(503, "");
        let err = block_on(GeoNamesAdapter::new(&transport).search(&query))
            .expect_err("503 is an error");
        assert!(matches!(err, ProviderError::HttpStatus { status: 503, .. }));
        assert_eq!(transport.requests().len(), 1, "GeoNames is not retried");
    }
}
