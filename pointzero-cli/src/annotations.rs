//! `annotations` command: inspect and maintain the annotation cache.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Args, Subcommand};
use pointzero_core::annotation::{AnnotationCache, AnnotationKey, CacheWrite, Clock, SystemClock};
use pointzero_core::store::{KeyValueStore, SqliteStore};

use crate::{ARG_ANNOTATIONS_DB, CliError};

/// Database used when `--db` is not given.
pub(crate) const DEFAULT_ANNOTATIONS_DB: &str = "pointzero-annotations.db";

/// CLI arguments for the `annotations` subcommand.
#[derive(Debug, Clone, Args)]
pub(crate) struct AnnotationsArgs {
    /// SQLite database holding the cache.
    #[arg(long = ARG_ANNOTATIONS_DB, value_name = "path", default_value = DEFAULT_ANNOTATIONS_DB)]
    pub(crate) db: Utf8PathBuf,
    #[command(subcommand)]
    pub(crate) action: AnnotationAction,
}

/// Operations on the annotation cache.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub(crate) enum AnnotationAction {
    /// Print every cached annotation as JSON.
    List,
    /// Print one annotation if it is still fresh.
    Get {
        /// Record identifier, for example `osm_123`.
        record_id: String,
        /// Annotation provider key.
        provider: String,
    },
    /// Store an annotation, evicting the oldest entries when full.
    Put {
        /// Record identifier, for example `osm_123`.
        record_id: String,
        /// Annotation provider key.
        provider: String,
        /// Annotation text.
        text: String,
    },
    /// Delete one annotation.
    Remove {
        /// Record identifier, for example `osm_123`.
        record_id: String,
        /// Annotation provider key.
        provider: String,
    },
    /// Delete every expired or unreadable annotation.
    Prune,
}

pub(super) fn run_annotations(args: AnnotationsArgs) -> Result<(), CliError> {
    pointzero_fs::ensure_parent_dir(&args.db).map_err(|source| CliError::CreateDirectory {
        path: args.db.clone(),
        source,
    })?;
    let store = SqliteStore::open(args.db.as_std_path())?;
    let mut cache = AnnotationCache::new(store, SystemClock);
    let mut stdout = std::io::stdout();
    run_annotations_with(&mut cache, args.action, &mut stdout)
}

pub(super) fn run_annotations_with<S, C>(
    cache: &mut AnnotationCache<S, C>,
    action: AnnotationAction,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    S: KeyValueStore,
    C: Clock,
{
    let line = match action {
        AnnotationAction::List => {
            let entries = cache.list_all();
            serde_json::to_string_pretty(&entries).map_err(CliError::SerializeAnnotations)?
        }
        AnnotationAction::Get {
            record_id,
            provider,
        } => match cache.get(&AnnotationKey::new(record_id.as_str(), provider.as_str())) {
            Some(hit) => hit.text,
            None => format!("no annotation for {record_id} from {provider}"),
        },
        AnnotationAction::Put {
            record_id,
            provider,
            text,
        } => match cache.put(&AnnotationKey::new(record_id.as_str(), provider), &text) {
            CacheWrite::Stored => format!("stored annotation for {record_id}"),
            CacheWrite::StoredAfterEviction { evicted } => {
                format!("stored annotation for {record_id} after evicting {evicted}")
            }
            CacheWrite::Dropped => return Err(CliError::AnnotationDropped { record_id }),
        },
        AnnotationAction::Remove {
            record_id,
            provider,
        } => {
            cache.remove(&AnnotationKey::new(record_id.as_str(), provider));
            format!("removed annotation for {record_id}")
        }
        AnnotationAction::Prune => {
            let removed = cache.purge_expired();
            format!("removed {removed} expired annotations")
        }
    };
    writeln!(writer, "{line}").map_err(CliError::WriteOutput)
}
