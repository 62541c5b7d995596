//! Fixtures shared by the CLI unit tests.

use std::rc::Rc;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use pointzero_data::test_support::{RecordingDelay, StubAdapter};
use pointzero_data::{Orchestrator, PacingPolicy};
use tempfile::TempDir;

/// 2024-05-01T12:30:00Z.
pub(super) fn export_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_714_566_600, 0).expect("valid timestamp")
}

/// Orchestrator over `adapters` that never sleeps.
pub(super) fn orchestrator_with(adapters: Vec<StubAdapter>) -> Orchestrator {
    adapters.into_iter().fold(
        Orchestrator::new()
            .with_pacing(PacingPolicy::none())
            .with_delay(Rc::new(RecordingDelay::default())),
        |orchestrator, adapter| orchestrator.with_adapter(Box::new(adapter)),
    )
}

/// Temporary directory addressed through a UTF-8 path.
pub(super) fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    (tmp, root)
}
