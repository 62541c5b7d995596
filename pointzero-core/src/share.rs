//! Encode searches as shareable links and restore them.
//!
//! A link carries the centre, radius, category and provider selection and an
//! `auto` flag asking the receiver to run the search immediately. Credentials
//! such as the GeoNames username are never embedded.

use thiserror::Error;
use url::Url;

use crate::{
    Category, SearchRequest, Source,
    request::{LATITUDE_RANGE, LONGITUDE_RANGE, RADIUS_KM_RANGE},
};

const LAT: &str = "lat";
const LON: &str = "lon";
const RADIUS: &str = "radius";
const AUTO: &str = "auto";

const fn category_param(category: Category) -> &'static str {
    match category {
        Category::Military => "military",
        Category::Hospital => "hospital",
    }
}

const fn source_param(source: Source) -> &'static str {
    match source {
        Source::OpenStreetMap => "sourceOSM",
        Source::GeoNames => "sourceGeoNames",
        Source::Wikidata => "sourceWikidata",
    }
}

/// Selection assumed for flags missing from a link.
const fn default_source_flag(source: Source) -> bool {
    matches!(source, Source::OpenStreetMap)
}

/// Errors raised while decoding a share link.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShareLinkError {
    /// A required parameter was absent.
    #[error("share link is missing the `{param}` parameter")]
    MissingParameter {
        /// Parameter name.
        param: &'static str,
    },
    /// A numeric parameter did not parse.
    #[error("share link parameter `{param}` is not a number: {value:?}")]
    InvalidNumber {
        /// Parameter name.
        param: &'static str,
        /// Raw value.
        value: String,
    },
    /// A numeric parameter was outside its accepted range.
    #[error("share link parameter `{param}` is out of range: {value}")]
    OutOfRange {
        /// Parameter name.
        param: &'static str,
        /// Parsed value.
        value: f64,
    },
}

/// Search restored from a share link.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedSearch {
    /// Request without credentials.
    pub request: SearchRequest,
    /// Whether the sender asked for the search to run on open.
    pub auto_run: bool,
}

/// Append the search parameters of `request` to `base`.
///
/// Any query string already present on `base` is replaced.
///
/// # Examples
/// ```
/// use pointzero_core::{Category, SearchRequest, Source, share};
/// use url::Url;
///
/// let base = Url::parse("https://pointzero.example/").expect("valid base URL");
/// let request = SearchRequest::new(55.75, 37.62, 5.0)
///     .with_category(Category::Military)
///     .with_provider(Source::OpenStreetMap)
///     .with_geonames_username("secret");
/// let link = share::encode(&base, &request);
/// assert!(link.as_str().contains("lat=55.75&lon=37.62&radius=5"));
/// assert!(!link.as_str().contains("secret"));
/// ```
#[must_use]
pub fn encode(base: &Url, request: &SearchRequest) -> Url {
    let mut link = base.clone();
    link.set_query(None);
    {
        let mut query = link.query_pairs_mut();
        query
            .append_pair(LAT, &request.latitude.to_string())
            .append_pair(LON, &request.longitude.to_string())
            .append_pair(RADIUS, &request.radius_km.to_string());
        for category in Category::ALL {
            query.append_pair(
                category_param(category),
                flag(request.categories.contains(&category)),
            );
        }
        for source in Source::ALL {
            query.append_pair(
                source_param(source),
                flag(request.providers.contains(&source)),
            );
        }
        query.append_pair(AUTO, "1");
    }
    link
}

const fn flag(enabled: bool) -> &'static str {
    if enabled { "1" } else { "0" }
}

/// Restore a search from a link produced by [`encode`].
///
/// Missing category flags default to selected; missing provider flags
/// default to OpenStreetMap only.
///
/// # Errors
///
/// Returns [`ShareLinkError`] when the centre or radius is missing,
/// unparsable or out of range.
pub fn decode(link: &Url) -> Result<SharedSearch, ShareLinkError> {
    let param = |name: &str| {
        link.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };
    let number = |name: &'static str, range: std::ops::RangeInclusive<f64>| {
        let raw = param(name).ok_or(ShareLinkError::MissingParameter { param: name })?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| ShareLinkError::InvalidNumber {
                param: name,
                value: raw.clone(),
            })?;
        if range.contains(&value) {
            Ok(value)
        } else {
            Err(ShareLinkError::OutOfRange { param: name, value })
        }
    };

    let latitude = number(LAT, LATITUDE_RANGE)?;
    let longitude = number(LON, LONGITUDE_RANGE)?;
    let radius_km = number(RADIUS, RADIUS_KM_RANGE)?;

    let mut request = SearchRequest::new(latitude, longitude, radius_km);
    for category in Category::ALL {
        if param(category_param(category)).is_none_or(|value| value == "1") {
            request.categories.insert(category);
        }
    }
    for source in Source::ALL {
        let enabled = param(source_param(source))
            .map_or(default_source_flag(source), |value| value == "1");
        if enabled {
            request.providers.insert(source);
        }
    }

    Ok(SharedSearch {
        request,
        auto_run: param(AUTO).as_deref() == Some("1"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn base() -> Url {
        Url::parse("https://pointzero.example/app?stale=1").expect("valid base URL")
    }

    #[rstest]
    fn encodes_every_flag(base: Url) {
        let request = SearchRequest::new(38.8707, -77.0559, 10.0)
            .with_category(Category::Hospital)
            .with_provider(Source::Wikidata);
        let link = encode(&base, &request);
        assert_eq!(
            link.query(),
            Some(
                "lat=38.8707&lon=-77.0559&radius=10&military=0&hospital=1\
                 &sourceOSM=0&sourceGeoNames=0&sourceWikidata=1&auto=1"
            )
        );
    }

    #[rstest]
    fn decodes_what_it_encodes(base: Url) {
        let request = SearchRequest::new(-33.5, 151.25, 0.5)
            .with_everything()
            .with_geonames_username("demo");
        let shared = decode(&encode(&base, &request)).expect("decode link");
        assert!(shared.auto_run);
        assert_eq!(shared.request.geonames_username, None);
        assert_eq!(shared.request.categories, request.categories);
        assert_eq!(shared.request.providers, request.providers);
        assert_eq!(shared.request.latitude, -33.5);
    }

    #[rstest]
    fn missing_flags_use_defaults() {
        let link = Url::parse("https://x.example/?lat=1&lon=2&radius=3").expect("url");
        let shared = decode(&link).expect("decode link");
        assert_eq!(shared.request.categories.len(), 2);
        assert_eq!(
            shared.request.providers.iter().copied().collect::<Vec<_>>(),
            [Source::OpenStreetMap]
        );
        assert!(!shared.auto_run);
    }

    #[rstest]
    #[case("https://x.example/?lon=2&radius=3", ShareLinkError::MissingParameter { param: "lat" })]
    #[case("https://x.example/?lat=91&lon=2&radius=3", ShareLinkError::OutOfRange { param: "lat", value: 91.0 })]
    #[case("https://x.example/?lat=1&lon=2&radius=0", ShareLinkError::OutOfRange { param: "radius", value: 0.0 })]
    #[case("https://x.example/?lat=1&lon=east&radius=3", ShareLinkError::InvalidNumber { param: "lon", value: "east".into() })]
    fn rejects_bad_links(#[case] raw: &str, #[case] expected: ShareLinkError) {
        let link = Url::parse(raw).expect("url");
        assert_eq!(decode(&link), Err(expected));
    }
}
