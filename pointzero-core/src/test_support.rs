//! Deterministic doubles shared by unit and behaviour tests.

use std::{cell::Cell, rc::Rc};

use crate::{Category, NormalizedRecord, Source, annotation::Clock};

/// Manually advanced [`Clock`]. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    now: Rc<Cell<u64>>,
}

impl FixedClock {
    /// Start the clock at `millis` since the Unix epoch.
    pub fn new(millis: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(millis)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.now.set(self.now.get().saturating_add(millis));
    }

    /// Jump to an absolute time.
    pub fn set(&self, millis: u64) {
        self.now.set(millis);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }
}

/// A named military record from OpenStreetMap.
pub fn sample_military_record() -> NormalizedRecord {
    NormalizedRecord::new(
        Source::OpenStreetMap,
        123_456,
        Category::Military,
        Some("Test Military Base"),
        "barracks",
        55.7558,
        37.6173,
    )
}

/// An unnamed hospital record from GeoNames.
pub fn sample_hospital_record() -> NormalizedRecord {
    NormalizedRecord::new(
        Source::GeoNames,
        2_643_743,
        Category::Hospital,
        None,
        "hospital",
        51.5074,
        -0.1278,
    )
}
