//! Search command implementation for the Point Zero CLI.

use std::io::{Cursor, Write};
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pointzero_core::export::{self, ExportFormat};
use pointzero_core::{
    Category, NormalizedRecord, ParseKindError, SearchEvent, SearchObserver, SearchRequest,
    Source, share,
};
use pointzero_data::http::{ReqwestTransport, RetryPolicy, TransportConfig};
use pointzero_data::providers::DEFAULT_OVERPASS_MIRRORS;
use pointzero_data::{Orchestrator, PacingPolicy};
use serde::{Deserialize, Serialize};
use url::Url;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::{
    ARG_CATEGORIES, ARG_FORMAT, ARG_GEONAMES_USERNAME, ARG_LATITUDE, ARG_LONGITUDE,
    ARG_NAMED_ONLY, ARG_OUTPUT, ARG_OVERPASS_MIRRORS, ARG_PACE_AFTER_MS, ARG_PACE_BEFORE_MS,
    ARG_PROVIDERS, ARG_RADIUS, ARG_SHARE_BASE_URL, ARG_TIMEOUT_SECS, ARG_USER_AGENT, CliError,
    ENV_LATITUDE, ENV_LONGITUDE,
};

/// Radius used when none is configured.
pub(crate) const DEFAULT_RADIUS_KM: f64 = 10.0;

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "search",
    long_about = "Query the enabled providers for military and hospital \
                 facilities within a radius of a point, then print or save \
                 the results. Every option can also come from a \
                 configuration file or POINTZERO_CMDS_SEARCH_* environment \
                 variables.",
    about = "Search around a point"
)]
#[ortho_config(prefix = "POINTZERO")]
pub(crate) struct SearchArgs {
    /// Centre latitude in decimal degrees.
    #[arg(long = ARG_LATITUDE, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) latitude: Option<f64>,
    /// Centre longitude in decimal degrees.
    #[arg(long = ARG_LONGITUDE, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) longitude: Option<f64>,
    /// Search radius in kilometres (default 10).
    #[arg(long = ARG_RADIUS, value_name = "km")]
    #[serde(default)]
    pub(crate) radius_km: Option<f64>,
    /// Comma-separated categories: military, hospital (default both).
    #[arg(long = ARG_CATEGORIES, value_name = "list")]
    #[serde(default)]
    pub(crate) categories: Option<String>,
    /// Comma-separated providers: osm, geonames, wikidata (default osm).
    #[arg(long = ARG_PROVIDERS, value_name = "list")]
    #[serde(default)]
    pub(crate) providers: Option<String>,
    /// GeoNames account name; required when GeoNames is enabled.
    #[arg(long = ARG_GEONAMES_USERNAME, value_name = "name")]
    #[serde(default)]
    pub(crate) geonames_username: Option<String>,
    /// Comma-separated Overpass interpreter URLs, tried in order.
    #[arg(long = ARG_OVERPASS_MIRRORS, value_name = "urls")]
    #[serde(default)]
    pub(crate) overpass_mirrors: Option<String>,
    /// Wait before each provider call, in milliseconds.
    #[arg(long = ARG_PACE_BEFORE_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) pace_before_ms: Option<u64>,
    /// Wait after each provider call, in milliseconds.
    #[arg(long = ARG_PACE_AFTER_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) pace_after_ms: Option<u64>,
    /// HTTP request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// User agent sent to every provider.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Report format: csv, json, geojson, html, txt, md or zip.
    #[arg(long = ARG_FORMAT, value_name = "format")]
    #[serde(default)]
    pub(crate) format: Option<String>,
    /// Write the report to this file instead of standard output.
    #[arg(long = ARG_OUTPUT, short = 'o', value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Drop records without a name from the report.
    #[arg(long = ARG_NAMED_ONLY)]
    #[serde(default)]
    pub(crate) named_only: bool,
    /// Print a link reproducing this search against the given page URL.
    #[arg(long = ARG_SHARE_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) share_base_url: Option<String>,
}

impl SearchArgs {
    pub(crate) fn into_config(self) -> Result<SearchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SearchConfig::try_from(merged)
    }
}

/// Shape of the report produced by a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportKind {
    /// One file in a single format.
    Single(ExportFormat),
    /// Every format plus a README in one ZIP archive.
    Bundle,
}

impl FromStr for ReportKind {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("zip") {
            return Ok(Self::Bundle);
        }
        value.parse().map(Self::Single)
    }
}

/// Resolved `search` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct SearchConfig {
    /// Request handed to the orchestrator.
    pub(crate) request: SearchRequest,
    /// Overpass mirrors in failover order.
    pub(crate) mirrors: Vec<Url>,
    /// Waits around each provider call.
    pub(crate) pacing: PacingPolicy,
    /// HTTP client settings.
    pub(crate) transport: TransportConfig,
    /// Report shape.
    pub(crate) report: ReportKind,
    /// Report destination; standard output when absent.
    pub(crate) output: Option<Utf8PathBuf>,
    /// Whether unnamed records are dropped from the report.
    pub(crate) named_only: bool,
    /// Page the share link points at.
    pub(crate) share_base_url: Option<Url>,
}

impl TryFrom<SearchArgs> for SearchConfig {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let latitude = args.latitude.ok_or(CliError::MissingArgument {
            field: ARG_LATITUDE,
            env: ENV_LATITUDE,
        })?;
        let longitude = args.longitude.ok_or(CliError::MissingArgument {
            field: ARG_LONGITUDE,
            env: ENV_LONGITUDE,
        })?;

        let mut request =
            SearchRequest::new(latitude, longitude, args.radius_km.unwrap_or(DEFAULT_RADIUS_KM));
        for category in parse_list::<Category>(args.categories.as_deref(), ARG_CATEGORIES)?
            .unwrap_or_else(|| Category::ALL.to_vec())
        {
            request = request.with_category(category);
        }
        for provider in parse_list::<Source>(args.providers.as_deref(), ARG_PROVIDERS)?
            .unwrap_or_else(|| vec![Source::OpenStreetMap])
        {
            request = request.with_provider(provider);
        }
        if let Some(username) = args.geonames_username {
            request = request.with_geonames_username(username);
        }

        let mirrors: Vec<Url> = match args.overpass_mirrors.as_deref() {
            Some(list) => split_list(list)
                .map(|mirror| parse_url(mirror, ARG_OVERPASS_MIRRORS))
                .collect::<Result<_, _>>()?,
            None => DEFAULT_OVERPASS_MIRRORS
                .iter()
                .map(|mirror| parse_url(mirror, ARG_OVERPASS_MIRRORS))
                .collect::<Result<_, _>>()?,
        };

        let defaults = PacingPolicy::default();
        let pacing = PacingPolicy {
            before: args
                .pace_before_ms
                .map_or(defaults.before, Duration::from_millis),
            after: args
                .pace_after_ms
                .map_or(defaults.after, Duration::from_millis),
        };

        let mut transport = TransportConfig::default();
        if let Some(secs) = args.timeout_secs {
            transport = transport.with_timeout(Duration::from_secs(secs));
        }
        if let Some(agent) = args.user_agent {
            transport = transport.with_user_agent(agent);
        }

        let report = resolve_report(args.format.as_deref(), args.output.as_deref())?;
        let share_base_url = args
            .share_base_url
            .as_deref()
            .map(|base| parse_url(base, ARG_SHARE_BASE_URL))
            .transpose()?;

        Ok(Self {
            request,
            mirrors,
            pacing,
            transport,
            report,
            output: args.output,
            named_only: args.named_only,
            share_base_url,
        })
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Parse a comma-separated list; `None` when the option is unset or blank.
fn parse_list<T>(list: Option<&str>, field: &'static str) -> Result<Option<Vec<T>>, CliError>
where
    T: FromStr<Err = ParseKindError>,
{
    let Some(list) = list else {
        return Ok(None);
    };
    let items = split_list(list)
        .map(|item| {
            item.parse()
                .map_err(|source| CliError::InvalidChoice { field, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((!items.is_empty()).then_some(items))
}

fn parse_url(value: &str, field: &'static str) -> Result<Url, CliError> {
    Url::parse(value).map_err(|source| CliError::InvalidUrl {
        field,
        value: value.to_owned(),
        source,
    })
}

/// Explicit format first, then the output extension, then JSON.
fn resolve_report(format: Option<&str>, output: Option<&Utf8Path>) -> Result<ReportKind, CliError> {
    if let Some(format) = format {
        return format.parse().map_err(|source| CliError::InvalidChoice {
            field: ARG_FORMAT,
            source,
        });
    }
    Ok(output
        .and_then(Utf8Path::extension)
        .and_then(|extension| extension.parse().ok())
        .unwrap_or(ReportKind::Single(ExportFormat::Json)))
}

/// Forwards search progress to the log.
#[derive(Debug, Default)]
pub(crate) struct ProgressLog;

impl SearchObserver for ProgressLog {
    fn on_event(&mut self, event: &SearchEvent) {
        match event {
            SearchEvent::Started { provider, category } => {
                log::info!("searching {category} objects via {provider}");
            }
            SearchEvent::Completed {
                provider,
                category,
                count,
            } => log::info!("{provider}: found {count} {category} objects"),
            SearchEvent::Failed {
                provider,
                category,
                reason,
            } => log::error!("{provider} {category} search failed: {reason}"),
            SearchEvent::Notice {
                provider,
                category,
                message,
            } => log::warn!("{provider} {category}: {message}"),
            SearchEvent::Finished { total } => log::info!("search complete: {total} objects"),
        }
    }
}

pub(super) async fn run_search(args: SearchArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let transport = ReqwestTransport::with_config(config.transport.clone())?;
    let orchestrator = Orchestrator::with_default_providers(
        Rc::new(transport),
        config.mirrors.clone(),
        RetryPolicy::default(),
    )
    .with_pacing(config.pacing);
    let mut stdout = std::io::stdout();
    run_search_with(&config, &orchestrator, Utc::now(), &mut stdout).await
}

pub(super) async fn run_search_with(
    config: &SearchConfig,
    orchestrator: &Orchestrator,
    now: DateTime<Utc>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let session = orchestrator
        .run_search(&config.request, &mut ProgressLog)
        .await?;
    let records: Vec<NormalizedRecord> = if config.named_only {
        session.results().named_only().cloned().collect()
    } else {
        session.results().records().to_vec()
    };

    if records.is_empty() {
        log::warn!("no results to export");
    } else {
        write_report(config, &records, now, writer)?;
    }

    if let Some(base) = &config.share_base_url {
        let link = share::encode(base, &config.request);
        if config.output.is_some() || config.report == ReportKind::Bundle {
            writeln!(writer, "share link: {link}").map_err(CliError::WriteOutput)?;
        } else {
            log::info!("share link: {link}");
        }
    }
    Ok(())
}

fn write_report(
    config: &SearchConfig,
    records: &[NormalizedRecord],
    now: DateTime<Utc>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let (path, contents) = match (config.report, &config.output) {
        (ReportKind::Single(format), None) => {
            let body = export::render(format, records, now)?;
            writer
                .write_all(body.as_bytes())
                .and_then(|()| writer.write_all(b"\n"))
                .map_err(CliError::WriteOutput)?;
            return Ok(());
        }
        (ReportKind::Single(format), Some(path)) => (
            path.clone(),
            export::render(format, records, now)?.into_bytes(),
        ),
        (ReportKind::Bundle, output) => {
            let basename = export::default_basename(now);
            let path = output
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from(format!("{basename}.zip")));
            (path, build_bundle(&basename, records, now)?)
        }
    };

    pointzero_fs::write_utf8_file(&path, &contents).map_err(|source| CliError::WriteReport {
        path: path.clone(),
        source,
    })?;
    writeln!(writer, "wrote {} records to {path}", records.len()).map_err(CliError::WriteOutput)
}

/// Render every format plus a README into an in-memory ZIP archive.
pub(crate) fn build_bundle(
    basename: &str,
    records: &[NormalizedRecord],
    now: DateTime<Utc>,
) -> Result<Vec<u8>, CliError> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for format in ExportFormat::ALL {
        let body = export::render(format, records, now)?;
        archive.start_file(format!("{basename}.{}", format.extension()), options)?;
        archive
            .write_all(body.as_bytes())
            .map_err(zip::result::ZipError::from)?;
    }
    archive.start_file("README.txt", options)?;
    archive
        .write_all(export::bundle_readme(basename, records.len(), now).as_bytes())
        .map_err(zip::result::ZipError::from)?;
    Ok(archive.finish()?.into_inner())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SearchConfig, CliError> {
    let merged = SearchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SearchConfig::try_from(merged)
}
