//! Shared test harness modules for the Point Zero CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod annotations_unit;
mod helpers;
