//! Normalized facility records shared by every provider.

use std::{fmt, str::FromStr};

use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Display name assigned when a provider supplies no usable name.
pub const UNNAMED: &str = "Unnamed";

/// Facility class being searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Military installations, barracks and restricted land.
    Military,
    /// Hospitals and comparable healthcare facilities.
    Hospital,
}

impl Category {
    /// All categories in search order.
    pub const ALL: [Self; 2] = [Self::Military, Self::Hospital];

    /// Lower-case identifier used in records, exports and share links.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Military => "military",
            Self::Hospital => "hospital",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`Category`] or [`Source`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} {value:?}")]
pub struct ParseKindError {
    kind: &'static str,
    value: String,
}

impl ParseKindError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl FromStr for Category {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "military" => Ok(Self::Military),
            "hospital" => Ok(Self::Hospital),
            _ => Err(ParseKindError::new("category", value)),
        }
    }
}

/// Provenance of a record. Always set by the adapter that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    /// OpenStreetMap via the Overpass API.
    OpenStreetMap,
    /// The GeoNames gazetteer.
    GeoNames,
    /// Wikidata via the SPARQL endpoint.
    Wikidata,
}

impl Source {
    /// All providers in search order.
    pub const ALL: [Self; 3] = [Self::OpenStreetMap, Self::GeoNames, Self::Wikidata];

    /// Prefix prepended to provider-native identifiers.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::OpenStreetMap => "osm",
            Self::GeoNames => "geonames",
            Self::Wikidata => "wikidata",
        }
    }

    /// Human readable provider name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenStreetMap => "OpenStreetMap",
            Self::GeoNames => "GeoNames",
            Self::Wikidata => "Wikidata",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "osm" | "openstreetmap" | "overpass" => Ok(Self::OpenStreetMap),
            "geonames" => Ok(Self::GeoNames),
            "wikidata" => Ok(Self::Wikidata),
            _ => Err(ParseKindError::new("provider", value)),
        }
    }
}

/// Provider-agnostic representation of one discovered facility.
///
/// The location is a WGS84 [`Coord`] with `x = longitude` and `y = latitude`,
/// matching the rest of the `geo` ecosystem. [`NormalizedRecord::coordinates`]
/// exposes the `(latitude, longitude)` pair used by reports.
///
/// # Examples
/// ```
/// use pointzero_core::{Category, NormalizedRecord, Source};
///
/// let record = NormalizedRecord::new(
///     Source::OpenStreetMap,
///     "42",
///     Category::Military,
///     None,
///     "barracks",
///     10.0,
///     20.0,
/// );
/// assert_eq!(record.id, "osm_42");
/// assert_eq!(record.name, "Unnamed");
/// assert_eq!(record.coordinates(), (10.0, 20.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordRepr", from = "RecordRepr")]
pub struct NormalizedRecord {
    /// Session-unique identifier, `{source-prefix}_{native-id}`.
    pub id: String,
    /// Facility class the record was searched under.
    pub category: Category,
    /// Display name; never empty.
    pub name: String,
    /// Provider-specific classification.
    pub subtype: String,
    /// Position with `x = longitude`, `y = latitude`.
    pub location: Coord<f64>,
    /// Provider that produced the record.
    pub source: Source,
}

impl NormalizedRecord {
    /// Build a record, applying the identifier and naming conventions.
    ///
    /// Blank names fall back to [`UNNAMED`].
    #[must_use]
    pub fn new(
        source: Source,
        native_id: impl fmt::Display,
        category: Category,
        name: Option<&str>,
        subtype: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: format!("{}_{native_id}", source.id_prefix()),
            category,
            name: display_name(name),
            subtype: subtype.into(),
            location: Coord {
                x: longitude,
                y: latitude,
            },
            source,
        }
    }

    /// Latitude in decimal degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.location.y
    }

    /// Longitude in decimal degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.location.x
    }

    /// `(latitude, longitude)` pair.
    #[must_use]
    pub const fn coordinates(&self) -> (f64, f64) {
        (self.location.y, self.location.x)
    }

    /// Whether the provider supplied a real name.
    #[must_use]
    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty() && self.name != UNNAMED
    }
}

fn display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_owned(),
        _ => UNNAMED.to_owned(),
    }
}

/// Wire shape of a record: `coords` is `[latitude, longitude]`.
#[derive(Serialize, Deserialize)]
struct RecordRepr {
    #[serde(rename = "type")]
    category: Category,
    name: String,
    subtype: String,
    coords: [f64; 2],
    source: Source,
    id: String,
}

impl From<NormalizedRecord> for RecordRepr {
    fn from(record: NormalizedRecord) -> Self {
        Self {
            category: record.category,
            name: record.name,
            subtype: record.subtype,
            coords: [record.location.y, record.location.x],
            source: record.source,
            id: record.id,
        }
    }
}

impl From<RecordRepr> for NormalizedRecord {
    fn from(repr: RecordRepr) -> Self {
        let [latitude, longitude] = repr.coords;
        Self {
            id: repr.id,
            category: repr.category,
            name: repr.name,
            subtype: repr.subtype,
            location: Coord {
                x: longitude,
                y: latitude,
            },
            source: repr.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn blank_names_become_unnamed(#[case] name: Option<&str>) {
        let record = NormalizedRecord::new(
            Source::GeoNames,
            7,
            Category::Hospital,
            name,
            "hospital",
            1.0,
            2.0,
        );
        assert_eq!(record.name, UNNAMED);
        assert!(!record.is_named());
    }

    #[rstest]
    #[case(Source::OpenStreetMap, "123456", "osm_123456")]
    #[case(Source::GeoNames, "987", "geonames_987")]
    #[case(Source::Wikidata, "Q42", "wikidata_Q42")]
    fn identifiers_carry_source_prefix(
        #[case] source: Source,
        #[case] native: &str,
        #[case] expected: &str,
    ) {
        let record =
            NormalizedRecord::new(source, native, Category::Military, Some("Base"), "x", 0.0, 0.0);
        assert_eq!(record.id, expected);
    }

    #[rstest]
    fn serialises_coords_as_latitude_first() {
        let record = NormalizedRecord::new(
            Source::Wikidata,
            "Q1",
            Category::Hospital,
            Some("Clinic"),
            "Wikidata Entity",
            55.7,
            37.6,
        );
        let value = serde_json::to_value(&record).expect("record should serialise");
        assert_eq!(value["coords"], serde_json::json!([55.7, 37.6]));
        assert_eq!(value["type"], "hospital");
        assert_eq!(value["source"], "Wikidata");

        let decoded: NormalizedRecord =
            serde_json::from_value(value).expect("record should deserialise");
        assert_eq!(decoded, record);
    }

    #[rstest]
    #[case("osm", Source::OpenStreetMap)]
    #[case("OpenStreetMap", Source::OpenStreetMap)]
    #[case("GeoNames", Source::GeoNames)]
    #[case("wikidata", Source::Wikidata)]
    fn parses_provider_names(#[case] raw: &str, #[case] expected: Source) {
        assert_eq!(raw.parse::<Source>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_category() {
        let err = "airport".parse::<Category>().expect_err("unknown category");
        assert_eq!(err.to_string(), "unknown category \"airport\"");
    }
}
