//! Unit tests for the annotation cache commands.

use super::*;
use crate::annotations::{AnnotationAction, run_annotations_with};
use pointzero_core::annotation::{AnnotationCache, CachedAnnotation, MAX_AGE};
use pointzero_core::store::MemoryStore;
use pointzero_core::test_support::FixedClock;
use rstest::{fixture, rstest};

const START: u64 = 1_714_566_600_000;

type Cache = AnnotationCache<MemoryStore, FixedClock>;

#[fixture]
fn clock() -> FixedClock {
    FixedClock::new(START)
}

fn run(cache: &mut Cache, action: AnnotationAction) -> Result<String, CliError> {
    let mut out = Vec::new();
    run_annotations_with(cache, action, &mut out)?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}

fn put(record_id: &str, text: &str) -> AnnotationAction {
    AnnotationAction::Put {
        record_id: record_id.to_owned(),
        provider: "gemini".to_owned(),
        text: text.to_owned(),
    }
}

#[rstest]
fn put_then_get_round_trips(clock: FixedClock) {
    let mut cache = AnnotationCache::new(MemoryStore::new(), clock);

    let stored = run(&mut cache, put("osm_1", "A barracks complex.")).expect("put");
    assert_eq!(stored, "stored annotation for osm_1\n");

    let fetched = run(
        &mut cache,
        AnnotationAction::Get {
            record_id: "osm_1".to_owned(),
            provider: "gemini".to_owned(),
        },
    )
    .expect("get");
    assert_eq!(fetched, "A barracks complex.\n");
}

#[rstest]
fn missing_annotations_are_reported_as_text(clock: FixedClock) {
    let mut cache = AnnotationCache::new(MemoryStore::new(), clock);

    let fetched = run(
        &mut cache,
        AnnotationAction::Get {
            record_id: "wikidata_Q1".to_owned(),
            provider: "gemini".to_owned(),
        },
    )
    .expect("get");
    assert_eq!(fetched, "no annotation for wikidata_Q1 from gemini\n");
}

#[rstest]
fn list_prints_every_entry_as_json(clock: FixedClock) {
    let mut cache = AnnotationCache::new(MemoryStore::new(), clock);
    run(&mut cache, put("osm_1", "first")).expect("put first");
    run(&mut cache, put("osm_2", "second")).expect("put second");

    let listed = run(&mut cache, AnnotationAction::List).expect("list");
    let entries: Vec<CachedAnnotation> = serde_json::from_str(&listed).expect("JSON listing");
    let texts: Vec<_> = entries.iter().map(|entry| entry.text.as_str()).collect();
    assert_eq!(texts, ["first", "second"]);
    assert!(entries.iter().all(|entry| entry.created_at == START));
}

#[rstest]
fn remove_deletes_the_entry(clock: FixedClock) {
    let mut cache = AnnotationCache::new(MemoryStore::new(), clock);
    run(&mut cache, put("osm_1", "text")).expect("put");

    let removed = run(
        &mut cache,
        AnnotationAction::Remove {
            record_id: "osm_1".to_owned(),
            provider: "gemini".to_owned(),
        },
    )
    .expect("remove");
    assert_eq!(removed, "removed annotation for osm_1\n");
    assert!(cache.store().is_empty());
}

#[rstest]
fn prune_counts_expired_entries(clock: FixedClock) {
    let mut cache = AnnotationCache::new(MemoryStore::new(), clock.clone());
    run(&mut cache, put("osm_1", "old")).expect("put old");
    clock.advance(u64::try_from(MAX_AGE.as_millis()).expect("fits in u64"));
    run(&mut cache, put("osm_2", "fresh")).expect("put fresh");
    clock.advance(1);

    let pruned = run(&mut cache, AnnotationAction::Prune).expect("prune");
    assert_eq!(pruned, "removed 1 expired annotations\n");
    assert_eq!(cache.store().len(), 1);
}

#[rstest]
fn oversized_annotations_are_an_error(clock: FixedClock) {
    let mut cache = AnnotationCache::new(MemoryStore::with_quota(16), clock);

    let err = run(&mut cache, put("osm_1", "far too long for the quota")).expect_err("dropped");
    match err {
        CliError::AnnotationDropped { record_id } => assert_eq!(record_id, "osm_1"),
        other => panic!("expected AnnotationDropped, found {other:?}"),
    }
}
