//! Serialise result sets into shareable report formats.
//!
//! Every renderer is a pure function of the records and the export
//! timestamp, so reports are reproducible in tests. Writing the rendered
//! text (and bundling it into archives) is left to the caller.

use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{Category, NormalizedRecord, record::ParseKindError};

/// Tool name written into report metadata.
pub const TOOL_NAME: &str = "Point Zero OSINT";
/// Report format version written into JSON metadata.
pub const REPORT_VERSION: &str = "1.0.0";

/// Errors raised while rendering a report.
#[derive(Debug, Error)]
pub enum ExportError {
    /// There was nothing to export.
    #[error("no results to export")]
    NoResults,
    /// JSON encoding failed.
    #[error("failed to encode {format} report")]
    Encode {
        /// Format being rendered.
        format: ExportFormat,
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

/// A single-file report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma separated values.
    Csv,
    /// JSON with export metadata.
    Json,
    /// GeoJSON `FeatureCollection`.
    GeoJson,
    /// Standalone HTML report.
    Html,
    /// Plain text listing.
    Txt,
    /// Markdown report.
    Markdown,
}

impl ExportFormat {
    /// Every format, in archive order.
    pub const ALL: [Self; 6] = [
        Self::Csv,
        Self::Json,
        Self::GeoJson,
        Self::Html,
        Self::Txt,
        Self::Markdown,
    ];

    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::GeoJson => "geojson",
            Self::Html => "html",
            Self::Txt => "txt",
            Self::Markdown => "md",
        }
    }

    /// Short description used in archive READMEs.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Csv => "Excel/Google Sheets format",
            Self::Json => "JSON format with metadata",
            Self::GeoJson => "GeoJSON for GIS tools",
            Self::Html => "HTML report (open in browser)",
            Self::Txt => "Plain text list",
            Self::Markdown => "Markdown format",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "geojson" => Ok(Self::GeoJson),
            "html" => Ok(Self::Html),
            "txt" | "text" => Ok(Self::Txt),
            "md" | "markdown" => Ok(Self::Markdown),
            _ => Err(ParseKindError::new("export format", value)),
        }
    }
}

/// Render `records` in `format`.
///
/// # Errors
///
/// Returns [`ExportError::NoResults`] for an empty slice and
/// [`ExportError::Encode`] if JSON encoding fails.
pub fn render(
    format: ExportFormat,
    records: &[NormalizedRecord],
    exported_at: DateTime<Utc>,
) -> Result<String, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoResults);
    }
    match format {
        ExportFormat::Csv => Ok(to_csv(records)),
        ExportFormat::Json => to_json(records, exported_at),
        ExportFormat::GeoJson => to_geojson(records),
        ExportFormat::Html => Ok(to_html(records, exported_at)),
        ExportFormat::Txt => Ok(to_txt(records, exported_at)),
        ExportFormat::Markdown => Ok(to_markdown(records, exported_at)),
    }
}

/// Default file stem, e.g. `point_zero_2024-05-01T12-30-00`.
#[must_use]
pub fn default_basename(exported_at: DateTime<Utc>) -> String {
    format!("point_zero_{}", exported_at.format("%Y-%m-%dT%H-%M-%S"))
}

/// CSV with header `Type,Name,Subtype,Latitude,Longitude,Source`.
///
/// Name and subtype are always quoted with embedded quotes doubled.
#[must_use]
pub fn to_csv(records: &[NormalizedRecord]) -> String {
    let mut out = String::from("Type,Name,Subtype,Latitude,Longitude,Source");
    for record in records {
        let (lat, lon) = record.coordinates();
        out.push_str(&format!(
            "\n{},{},{},{lat},{lon},{}",
            record.category,
            csv_quote(&record.name),
            csv_quote(&record.subtype),
            record.source
        ));
    }
    out
}

fn csv_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Pretty JSON `{metadata, results}`.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if serialisation fails.
pub fn to_json(
    records: &[NormalizedRecord],
    exported_at: DateTime<Utc>,
) -> Result<String, ExportError> {
    let document = json!({
        "metadata": {
            "exportDate": exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "totalResults": records.len(),
            "tool": TOOL_NAME,
            "version": REPORT_VERSION,
        },
        "results": records,
    });
    serde_json::to_string_pretty(&document).map_err(|source| ExportError::Encode {
        format: ExportFormat::Json,
        source,
    })
}

/// GeoJSON `FeatureCollection`; positions are `[longitude, latitude]`.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if serialisation fails.
pub fn to_geojson(records: &[NormalizedRecord]) -> Result<String, ExportError> {
    let features: Vec<_> = records
        .iter()
        .map(|record| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [record.longitude(), record.latitude()],
                },
                "properties": {
                    "type": record.category,
                    "name": record.name,
                    "subtype": record.subtype,
                    "source": record.source,
                    "id": record.id,
                },
            })
        })
        .collect();
    let document = json!({ "type": "FeatureCollection", "features": features });
    serde_json::to_string_pretty(&document).map_err(|source| ExportError::Encode {
        format: ExportFormat::GeoJson,
        source,
    })
}

struct Summary {
    total: usize,
    military: usize,
    hospitals: usize,
}

impl Summary {
    fn of(records: &[NormalizedRecord]) -> Self {
        let count = |category| records.iter().filter(|r| r.category == category).count();
        Self {
            total: records.len(),
            military: count(Category::Military),
            hospitals: count(Category::Hospital),
        }
    }
}

fn display_date(exported_at: DateTime<Utc>) -> String {
    exported_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Standalone HTML report; every cell is escaped.
#[must_use]
pub fn to_html(records: &[NormalizedRecord], exported_at: DateTime<Utc>) -> String {
    let summary = Summary::of(records);
    let mut rows = String::new();
    for record in records {
        let (lat, lon) = record.coordinates();
        rows.push_str(&format!(
            "\n            <tr>\n                <td>{}</td>\n                <td>{}</td>\n                <td>{}</td>\n                <td>{lat:.4}</td>\n                <td>{lon:.4}</td>\n                <td>{}</td>\n            </tr>",
            record.category,
            escape_html(&record.name),
            escape_html(&record.subtype),
            record.source,
        ));
    }
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Point Zero OSINT Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; background: #f5f5f5; }}
        h1 {{ color: #d32f2f; }}
        .summary {{ background: white; padding: 20px; border-radius: 5px; margin-bottom: 20px; }}
        table {{ width: 100%; border-collapse: collapse; background: white; }}
        th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }}
        th {{ background: #d32f2f; color: white; }}
    </style>
</head>
<body>
    <h1>Point Zero OSINT Report</h1>
    <div class="summary">
        <p><strong>Export Date:</strong> {date}</p>
        <p><strong>Total Results:</strong> {total}</p>
        <p><strong>Military Facilities:</strong> {military}</p>
        <p><strong>Hospitals:</strong> {hospitals}</p>
    </div>
    <table>
        <thead>
            <tr>
                <th>Type</th>
                <th>Name</th>
                <th>Subtype</th>
                <th>Latitude</th>
                <th>Longitude</th>
                <th>Source</th>
            </tr>
        </thead>
        <tbody>{rows}
        </tbody>
    </table>
</body>
</html>
"#,
        date = display_date(exported_at),
        total = summary.total,
        military = summary.military,
        hospitals = summary.hospitals,
    )
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Numbered plain-text listing.
#[must_use]
pub fn to_txt(records: &[NormalizedRecord], exported_at: DateTime<Utc>) -> String {
    let rule = "=".repeat(60);
    let mut lines = vec![
        rule.clone(),
        "POINT ZERO OSINT REPORT".to_owned(),
        rule,
        format!("Export Date: {}", display_date(exported_at)),
        format!("Total Results: {}", records.len()),
        String::new(),
        "RESULTS:".to_owned(),
        "-".repeat(60),
    ];
    for (index, record) in records.iter().enumerate() {
        let (lat, lon) = record.coordinates();
        lines.push(format!("{}. {}", index + 1, record.name));
        lines.push(format!(
            "   Type: {} | Subtype: {}",
            record.category, record.subtype
        ));
        lines.push(format!("   Coordinates: {lat:.4}, {lon:.4}"));
        lines.push(format!("   Source: {}", record.source));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Markdown report with a summary list and a results table.
#[must_use]
pub fn to_markdown(records: &[NormalizedRecord], exported_at: DateTime<Utc>) -> String {
    let summary = Summary::of(records);
    let mut out = format!(
        "# Point Zero OSINT Report\n\n## Summary\n\n\
         - **Export Date:** {}\n\
         - **Total Results:** {}\n\
         - **Military Facilities:** {}\n\
         - **Hospitals:** {}\n\n\
         ## Results\n\n\
         | Type | Name | Subtype | Latitude | Longitude | Source |\n\
         |------|------|---------|----------|-----------|--------|\n",
        display_date(exported_at),
        summary.total,
        summary.military,
        summary.hospitals,
    );
    for record in records {
        let (lat, lon) = record.coordinates();
        out.push_str(&format!(
            "| {} | {} | {} | {lat:.4} | {lon:.4} | {} |\n",
            record.category,
            record.name.replace('|', "\\|"),
            record.subtype.replace('|', "\\|"),
            record.source,
        ));
    }
    out.push_str("\n---\n\nGenerated by Point Zero OSINT\n");
    out
}

/// README placed alongside the reports in a bundle archive.
#[must_use]
pub fn bundle_readme(basename: &str, total: usize, exported_at: DateTime<Utc>) -> String {
    let mut out = format!(
        "# Point Zero OSINT Export\n\nExport Date: {}\nTotal Results: {total}\n\n## Files Included:\n",
        display_date(exported_at)
    );
    for format in ExportFormat::ALL {
        out.push_str(&format!(
            "- {basename}.{} - {}\n",
            format.extension(),
            format.description()
        ));
    }
    out.push_str("\nGenerated by Point Zero OSINT Tool\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Source;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn exported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    #[fixture]
    fn records() -> Vec<NormalizedRecord> {
        vec![
            NormalizedRecord::new(
                Source::OpenStreetMap,
                1,
                Category::Military,
                Some("Fort \"Alpha\""),
                "barracks",
                55.75581,
                37.61731,
            ),
            NormalizedRecord::new(
                Source::Wikidata,
                "Q2",
                Category::Hospital,
                Some("<General>"),
                "Wikidata Entity",
                -1.5,
                2.25,
            ),
        ]
    }

    #[rstest]
    fn csv_quotes_text_columns(records: Vec<NormalizedRecord>) {
        let csv = to_csv(&records);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.first(), Some(&"Type,Name,Subtype,Latitude,Longitude,Source"));
        assert_eq!(
            lines.get(1),
            Some(&"military,\"Fort \"\"Alpha\"\"\",\"barracks\",55.75581,37.61731,OpenStreetMap")
        );
        assert_eq!(lines.len(), 3);
    }

    #[rstest]
    fn json_carries_metadata(records: Vec<NormalizedRecord>, exported_at: DateTime<Utc>) {
        let text = to_json(&records, exported_at).expect("render json");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse json");
        assert_eq!(value["metadata"]["totalResults"], 2);
        assert_eq!(value["metadata"]["tool"], TOOL_NAME);
        assert_eq!(value["metadata"]["exportDate"], "2024-05-01T12:30:00.000Z");
        assert_eq!(value["results"][1]["coords"], json!([-1.5, 2.25]));
    }

    #[rstest]
    fn geojson_swaps_to_longitude_first(records: Vec<NormalizedRecord>) {
        let text = to_geojson(&records).expect("render geojson");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse geojson");
        assert_eq!(value["type"], "FeatureCollection");
        let feature = &value["features"][1];
        assert_eq!(feature["geometry"]["coordinates"], json!([2.25, -1.5]));
        assert_eq!(feature["properties"]["type"], "hospital");
        assert_eq!(feature["properties"]["id"], "wikidata_Q2");
    }

    #[rstest]
    fn html_escapes_cells(records: Vec<NormalizedRecord>, exported_at: DateTime<Utc>) {
        let html = to_html(&records, exported_at);
        assert!(html.contains("<td>&lt;General&gt;</td>"));
        assert!(html.contains("<td>55.7558</td>"));
        assert!(html.contains("<strong>Military Facilities:</strong> 1"));
    }

    #[rstest]
    fn text_reports_round_to_four_places(
        records: Vec<NormalizedRecord>,
        exported_at: DateTime<Utc>,
    ) {
        let txt = to_txt(&records, exported_at);
        assert!(txt.contains("1. Fort \"Alpha\""));
        assert!(txt.contains("   Coordinates: 55.7558, 37.6173"));

        let md = to_markdown(&records, exported_at);
        assert!(md.contains("- **Hospitals:** 1"));
        assert!(md.contains("| hospital | <General> | Wikidata Entity | -1.5000 | 2.2500 | Wikidata |"));
    }

    #[rstest]
    fn row_builders_terminate_each_line(
        records: Vec<NormalizedRecord>,
        exported_at: DateTime<Utc>,
    ) {
        let csv = to_csv(&records);
        assert!(csv.ends_with("2.25,Wikidata"));

        let md = to_markdown(&records, exported_at);
        assert!(md.contains(
            "| military | Fort \"Alpha\" | barracks | 55.7558 | 37.6173 | OpenStreetMap |\n\
             | hospital | <General> | Wikidata Entity | -1.5000 | 2.2500 | Wikidata |\n\n---"
        ));

        let html = to_html(&records, exported_at);
        assert_eq!(html.matches("<tr>").count(), 3);

        let readme = bundle_readme("report", 2, exported_at);
        assert!(readme.contains(
            "- report.csv - Excel/Google Sheets format\n- report.json - JSON format with metadata\n"
        ));
    }

    #[rstest]
    fn empty_results_are_rejected(exported_at: DateTime<Utc>) {
        assert!(matches!(
            render(ExportFormat::Csv, &[], exported_at),
            Err(ExportError::NoResults)
        ));
    }

    #[rstest]
    #[case("md", ExportFormat::Markdown)]
    #[case("GeoJSON", ExportFormat::GeoJson)]
    #[case("text", ExportFormat::Txt)]
    fn parses_format_names(#[case] raw: &str, #[case] expected: ExportFormat) {
        assert_eq!(raw.parse::<ExportFormat>(), Ok(expected));
    }

    #[rstest]
    fn readme_lists_every_file(exported_at: DateTime<Utc>) {
        let readme = bundle_readme("report", 2, exported_at);
        for format in ExportFormat::ALL {
            assert!(readme.contains(&format!("report.{}", format.extension())));
        }
        assert_eq!(default_basename(exported_at), "point_zero_2024-05-01T12-30-00");
    }
}
