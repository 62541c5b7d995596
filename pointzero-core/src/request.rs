//! Search request input contract and its pre-flight validation.

use std::{collections::BTreeSet, ops::RangeInclusive};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Category, Source};

/// Accepted latitude range in decimal degrees.
pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;
/// Accepted longitude range in decimal degrees.
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;
/// Accepted search radius in kilometres (one metre up to 10 000 km).
pub const RADIUS_KM_RANGE: RangeInclusive<f64> = 0.001..=10_000.0;

/// Parameters for one aggregated search.
///
/// Construct with [`SearchRequest::new`] and the `with_*` helpers, then call
/// [`SearchRequest::validate`] (the orchestrator does this before any network
/// call).
///
/// # Examples
/// ```
/// use pointzero_core::{Category, SearchRequest, Source};
///
/// let request = SearchRequest::new(55.7558, 37.6173, 20.0)
///     .with_category(Category::Military)
///     .with_provider(Source::OpenStreetMap);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Centre latitude in decimal degrees.
    pub latitude: f64,
    /// Centre longitude in decimal degrees.
    pub longitude: f64,
    /// Search radius in kilometres.
    pub radius_km: f64,
    /// Facility classes to search for.
    pub categories: BTreeSet<Category>,
    /// Providers to query.
    pub providers: BTreeSet<Source>,
    /// GeoNames account name; required when GeoNames is selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geonames_username: Option<String>,
}

/// Reasons a [`SearchRequest`] is rejected before the search starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchRequestError {
    /// Latitude outside `[-90, 90]` or not a number.
    #[error("latitude must be between -90 and 90, got {value}")]
    LatitudeOutOfRange {
        /// Rejected value.
        value: f64,
    },
    /// Longitude outside `[-180, 180]` or not a number.
    #[error("longitude must be between -180 and 180, got {value}")]
    LongitudeOutOfRange {
        /// Rejected value.
        value: f64,
    },
    /// Radius outside `[0.001, 10000]` km or not a number.
    #[error("radius must be between 0.001 km (1m) and 10,000 km, got {value}")]
    RadiusOutOfRange {
        /// Rejected value.
        value: f64,
    },
    /// No facility category was selected.
    #[error("select at least one category")]
    NoCategories,
    /// No provider was selected.
    #[error("select at least one data source")]
    NoProviders,
    /// GeoNames was selected without a username.
    #[error("GeoNames is enabled but no username was provided")]
    MissingGeoNamesUsername,
}

impl SearchRequest {
    /// Start a request with no categories or providers selected.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_km,
            categories: BTreeSet::new(),
            providers: BTreeSet::new(),
            geonames_username: None,
        }
    }

    /// Add a category to the selection.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.insert(category);
        self
    }

    /// Add a provider to the selection.
    #[must_use]
    pub fn with_provider(mut self, provider: Source) -> Self {
        self.providers.insert(provider);
        self
    }

    /// Select every category and provider.
    #[must_use]
    pub fn with_everything(mut self) -> Self {
        self.categories.extend(Category::ALL);
        self.providers.extend(Source::ALL);
        self
    }

    /// Set the GeoNames username.
    #[must_use]
    pub fn with_geonames_username(mut self, username: impl Into<String>) -> Self {
        self.geonames_username = Some(username.into());
        self
    }

    /// Trimmed GeoNames username, if a non-blank one is configured.
    #[must_use]
    pub fn geonames_username(&self) -> Option<&str> {
        self.geonames_username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Check every pre-flight rule, reporting the first violation.
    ///
    /// # Errors
    ///
    /// Returns a [`SearchRequestError`] describing the first rule broken, in
    /// the order latitude, longitude, radius, categories, providers,
    /// GeoNames username.
    pub fn validate(&self) -> Result<(), SearchRequestError> {
        if !LATITUDE_RANGE.contains(&self.latitude) {
            return Err(SearchRequestError::LatitudeOutOfRange {
                value: self.latitude,
            });
        }
        if !LONGITUDE_RANGE.contains(&self.longitude) {
            return Err(SearchRequestError::LongitudeOutOfRange {
                value: self.longitude,
            });
        }
        if !RADIUS_KM_RANGE.contains(&self.radius_km) {
            return Err(SearchRequestError::RadiusOutOfRange {
                value: self.radius_km,
            });
        }
        if self.categories.is_empty() {
            return Err(SearchRequestError::NoCategories);
        }
        if self.providers.is_empty() {
            return Err(SearchRequestError::NoProviders);
        }
        if self.providers.contains(&Source::GeoNames) && self.geonames_username().is_none() {
            return Err(SearchRequestError::MissingGeoNamesUsername);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid() -> SearchRequest {
        SearchRequest::new(38.8707, -77.0559, 10.0)
            .with_category(Category::Military)
            .with_provider(Source::OpenStreetMap)
    }

    #[rstest]
    fn accepts_valid_request(valid: SearchRequest) {
        assert_eq!(valid.validate(), Ok(()));
    }

    #[rstest]
    #[case(-90.0, -180.0, 0.001)]
    #[case(90.0, 180.0, 10_000.0)]
    fn accepts_boundary_values(#[case] lat: f64, #[case] lon: f64, #[case] radius: f64) {
        let request = SearchRequest::new(lat, lon, radius)
            .with_category(Category::Hospital)
            .with_provider(Source::Wikidata);
        assert!(request.validate().is_ok());
    }

    #[rstest]
    fn rejects_nan_latitude(valid: SearchRequest) {
        let request = SearchRequest {
            latitude: f64::NAN,
            ..valid
        };
        assert!(matches!(
            request.validate(),
            Err(SearchRequestError::LatitudeOutOfRange { .. })
        ));
    }

    #[rstest]
    fn rejects_empty_categories(valid: SearchRequest) {
        let request = SearchRequest {
            categories: BTreeSet::new(),
            ..valid
        };
        assert_eq!(request.validate(), Err(SearchRequestError::NoCategories));
    }

    #[rstest]
    fn rejects_empty_providers(valid: SearchRequest) {
        let request = SearchRequest {
            providers: BTreeSet::new(),
            ..valid
        };
        assert_eq!(request.validate(), Err(SearchRequestError::NoProviders));
    }

    #[rstest]
    #[case(None)]
    #[case(Some("   "))]
    fn geonames_requires_username(valid: SearchRequest, #[case] username: Option<&str>) {
        let mut request = valid.with_provider(Source::GeoNames);
        request.geonames_username = username.map(str::to_owned);
        assert_eq!(
            request.validate(),
            Err(SearchRequestError::MissingGeoNamesUsername)
        );
    }

    #[rstest]
    fn geonames_username_is_trimmed(valid: SearchRequest) {
        let request = valid
            .with_provider(Source::GeoNames)
            .with_geonames_username("  demo ");
        assert_eq!(request.geonames_username(), Some("demo"));
        assert!(request.validate().is_ok());
    }

    proptest! {
        #[test]
        fn out_of_range_latitude_is_rejected(lat in prop_oneof![-1.0e6..-90.000_001f64, 90.000_001f64..1.0e6]) {
            let request = SearchRequest::new(lat, 0.0, 1.0).with_everything().with_geonames_username("demo");
            let is_latitude_error = matches!(
                request.validate(),
                Err(SearchRequestError::LatitudeOutOfRange { .. })
            );
            prop_assert!(is_latitude_error);
        }

        #[test]
        fn out_of_range_longitude_is_rejected(lon in prop_oneof![-1.0e6..-180.000_001f64, 180.000_001f64..1.0e6]) {
            let request = SearchRequest::new(0.0, lon, 1.0).with_everything().with_geonames_username("demo");
            let is_longitude_error = matches!(
                request.validate(),
                Err(SearchRequestError::LongitudeOutOfRange { .. })
            );
            prop_assert!(is_longitude_error);
        }

        #[test]
        fn out_of_range_radius_is_rejected(radius in prop_oneof![-1.0e6..0.000_999f64, 10_000.000_1f64..1.0e7]) {
            let request = SearchRequest::new(0.0, 0.0, radius).with_everything().with_geonames_username("demo");
            let is_radius_error = matches!(
                request.validate(),
                Err(SearchRequestError::RadiusOutOfRange { .. })
            );
            prop_assert!(is_radius_error);
        }
    }
}
