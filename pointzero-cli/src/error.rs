//! Error types emitted by the Point Zero CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use pointzero_core::export::ExportError;
use pointzero_core::store::SqliteStoreError;
use pointzero_core::{ParseKindError, SearchRequestError};
use pointzero_data::http::TransportBuildError;
use thiserror::Error;

/// Errors emitted by the Point Zero CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A list option named an unknown category, provider or format.
    #[error("invalid --{field}: {source}")]
    InvalidChoice {
        field: &'static str,
        #[source]
        source: ParseKindError,
    },
    /// A URL option could not be parsed.
    #[error("invalid --{field} URL {value:?}: {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    /// The search request failed pre-flight validation.
    #[error("invalid search: {0}")]
    InvalidRequest(#[from] SearchRequestError),
    /// Constructing the HTTP transport failed.
    #[error(transparent)]
    BuildTransport(#[from] TransportBuildError),
    /// Rendering a report failed.
    #[error("failed to export results: {0}")]
    Export(#[from] ExportError),
    /// Building the ZIP bundle failed.
    #[error("failed to build ZIP bundle: {0}")]
    Bundle(#[from] zip::result::ZipError),
    /// Writing a report failed.
    #[error("failed to write {path:?}: {source}")]
    WriteReport {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Writing to standard output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
    /// Opening the annotation database failed.
    #[error(transparent)]
    OpenAnnotations(#[from] SqliteStoreError),
    /// Creating the directory holding the annotation database failed.
    #[error("failed to create directory for {path:?}: {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The annotation could not be stored.
    #[error("annotation for {record_id} was not stored; the cache is full")]
    AnnotationDropped { record_id: String },
    /// Serializing annotations failed.
    #[error("failed to serialize annotations: {0}")]
    SerializeAnnotations(#[source] serde_json::Error),
}
