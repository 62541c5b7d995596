//! Command-line interface for the Point Zero OSINT aggregator.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod annotations;
mod error;
mod logging;
mod search;

pub use error::CliError;

use annotations::AnnotationsArgs;
use search::SearchArgs;

pub(crate) const ARG_LATITUDE: &str = "latitude";
pub(crate) const ARG_LONGITUDE: &str = "longitude";
pub(crate) const ARG_RADIUS: &str = "radius";
pub(crate) const ARG_CATEGORIES: &str = "categories";
pub(crate) const ARG_PROVIDERS: &str = "providers";
pub(crate) const ARG_GEONAMES_USERNAME: &str = "geonames-username";
pub(crate) const ARG_OVERPASS_MIRRORS: &str = "overpass-mirrors";
pub(crate) const ARG_PACE_BEFORE_MS: &str = "pace-before-ms";
pub(crate) const ARG_PACE_AFTER_MS: &str = "pace-after-ms";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const ARG_USER_AGENT: &str = "user-agent";
pub(crate) const ARG_FORMAT: &str = "format";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ARG_NAMED_ONLY: &str = "named-only";
pub(crate) const ARG_SHARE_BASE_URL: &str = "share-base-url";
pub(crate) const ARG_ANNOTATIONS_DB: &str = "db";

pub(crate) const ENV_LATITUDE: &str = "POINTZERO_CMDS_SEARCH_LATITUDE";
pub(crate) const ENV_LONGITUDE: &str = "POINTZERO_CMDS_SEARCH_LONGITUDE";

/// Run the Point Zero CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns a [`CliError`] when argument parsing, configuration, the search
/// itself or writing its output fails.
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    logging::init();
    match cli.command {
        Command::Search(args) => search::run_search(args).await,
        Command::Annotations(args) => annotations::run_annotations(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "pointzero",
    about = "Find military and hospital facilities around a point using open geodata",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query OpenStreetMap, GeoNames and Wikidata around a point.
    Search(SearchArgs),
    /// Inspect and maintain the cached record annotations.
    Annotations(AnnotationsArgs),
}

#[cfg(test)]
mod tests;
