mod support;

use futures::FutureExt;
use person_core::{
    Attribute, EnrichError, EnrichedValue, Enricher, LookupFailure, PersonDraft, PersonInput,
};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use support::{distant_deadline, Script, ScriptedSource};
use tokio::time::Instant;

fn kiska_draft() -> PersonDraft {
    PersonDraft::from_input(&PersonInput::new("Kiska", "Solevaya")).unwrap()
}

fn age(value: u32) -> Script {
    Script::Value(Some(EnrichedValue::Age(value)))
}

fn gender(value: &str) -> Script {
    Script::Value(Some(EnrichedValue::Gender(value.to_string())))
}

fn nationality(value: &str) -> Script {
    Script::Value(Some(EnrichedValue::Nationality(value.to_string())))
}

#[tokio::test(start_paused = true)]
async fn all_lookups_succeeding_fill_every_field() {
    let enricher = Enricher::new(ScriptedSource::kiska());
    let mut draft = kiska_draft();

    enricher.enrich(&mut draft, distant_deadline()).await.unwrap();

    assert_eq!(draft.age, Some(34));
    assert_eq!(draft.gender.as_deref(), Some("female"));
    assert_eq!(draft.nationality.as_deref(), Some("RU"));
    assert_eq!(draft.name, "Kiska");
    assert_eq!(draft.surname, "Solevaya");
}

#[tokio::test(start_paused = true)]
async fn merge_result_does_not_depend_on_completion_order() {
    let orders: [[u64; 3]; 3] = [[10, 20, 30], [30, 20, 10], [20, 30, 10]];
    let mut results = Vec::new();

    for [age_ms, gender_ms, nationality_ms] in orders {
        let source = ScriptedSource::new()
            .with(Attribute::Age, age_ms, age(41))
            .with(Attribute::Gender, gender_ms, gender("male"))
            .with(Attribute::Nationality, nationality_ms, nationality("KZ"));
        let mut draft = kiska_draft();
        Enricher::new(source)
            .enrich(&mut draft, distant_deadline())
            .await
            .unwrap();
        results.push(draft);
    }

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(results[0].age, Some(41));
    assert_eq!(results[0].gender.as_deref(), Some("male"));
    assert_eq!(results[0].nationality.as_deref(), Some("KZ"));
}

#[tokio::test(start_paused = true)]
async fn absent_nationality_is_not_an_error() {
    let source = ScriptedSource::new()
        .with(Attribute::Age, 5, age(34))
        .with(Attribute::Gender, 5, gender("female"))
        .with(Attribute::Nationality, 5, Script::Value(None));
    let mut draft = kiska_draft();

    Enricher::new(source)
        .enrich(&mut draft, distant_deadline())
        .await
        .unwrap();

    assert_eq!(draft.nationality, None);
    assert_eq!(draft.age, Some(34));
}

#[tokio::test(start_paused = true)]
async fn one_failure_keeps_sibling_values_but_reports_error() {
    let source = ScriptedSource::new()
        .with(Attribute::Age, 5, age(34))
        .with(Attribute::Gender, 10, Script::Fail("genderize is down"))
        .with(Attribute::Nationality, 20, nationality("RU"));
    let mut draft = kiska_draft();

    let err = Enricher::new(source)
        .enrich(&mut draft, distant_deadline())
        .await
        .unwrap_err();

    match err {
        EnrichError::Lookup(lookup) => assert_eq!(lookup.attribute, Attribute::Gender),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(draft.age, Some(34));
    assert_eq!(draft.nationality.as_deref(), Some("RU"));
    assert_eq!(draft.gender, None);
}

#[tokio::test(start_paused = true)]
async fn last_failure_to_arrive_is_reported() {
    let source = ScriptedSource::new()
        .with(Attribute::Age, 40, Script::Fail("agify is down"))
        .with(Attribute::Gender, 10, Script::Fail("genderize is down"))
        .with(Attribute::Nationality, 20, nationality("RU"));
    let mut draft = kiska_draft();

    let err = Enricher::new(source)
        .enrich(&mut draft, distant_deadline())
        .await
        .unwrap_err();

    assert!(matches!(err, EnrichError::Lookup(ref lookup) if lookup.attribute == Attribute::Age));
    assert!(err.to_string().contains("agify is down"));
}

#[tokio::test(start_paused = true)]
async fn hanging_lookup_is_cut_off_at_the_budget() {
    let budget = Duration::from_millis(3000);
    let source = ScriptedSource::new()
        .with(Attribute::Age, 5, age(34))
        .with(Attribute::Gender, 0, Script::Hang)
        .with(Attribute::Nationality, 5, nationality("RU"));
    let enricher = Enricher::new(source).with_budget(budget);
    let mut draft = kiska_draft();

    let started_at = Instant::now();
    let err = enricher
        .enrich(&mut draft, distant_deadline())
        .await
        .unwrap_err();
    let elapsed = started_at.elapsed();

    assert!(matches!(
        err,
        EnrichError::DeadlineExceeded { budget_ms: 3000, pending: 1 }
    ));
    assert!(elapsed >= budget);
    assert!(elapsed < budget + Duration::from_millis(50));
    assert_eq!(draft.age, Some(34));
    assert_eq!(draft.nationality.as_deref(), Some("RU"));
}

#[tokio::test(start_paused = true)]
async fn parent_deadline_shorter_than_budget_wins() {
    let source = ScriptedSource::new().with(Attribute::Nationality, 0, Script::Hang);
    let enricher = Enricher::new(source).with_budget(Duration::from_secs(3));
    let mut draft = kiska_draft();

    let started_at = Instant::now();
    let parent_deadline = started_at + Duration::from_millis(500);
    let err = enricher.enrich(&mut draft, parent_deadline).await.unwrap_err();

    assert!(matches!(err, EnrichError::DeadlineExceeded { budget_ms: 500, .. }));
    assert!(started_at.elapsed() < Duration::from_millis(550));
}

#[tokio::test(start_paused = true)]
async fn every_lookup_is_dispatched_exactly_once() {
    let source = std::sync::Arc::new(ScriptedSource::kiska());
    let enricher = Enricher::from_shared(source.clone());
    let mut draft = kiska_draft();

    enricher.enrich(&mut draft, distant_deadline()).await.unwrap();
    assert_eq!(source.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn worker_panic_is_raised_on_the_caller() {
    let source = ScriptedSource::new()
        .with(Attribute::Age, 0, age(34))
        .with(Attribute::Gender, 0, Script::Panic);
    let enricher = Enricher::new(source);
    let mut draft = kiska_draft();

    let outcome = AssertUnwindSafe(enricher.enrich(&mut draft, distant_deadline()))
        .catch_unwind()
        .await;

    let payload = outcome.expect_err("worker panic must propagate");
    let message = payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(message.contains("scripted gender lookup panic"));
}

#[tokio::test(start_paused = true)]
async fn worker_panic_surfaces_while_a_sibling_still_hangs() {
    let budget = Duration::from_secs(3);
    let source = ScriptedSource::new()
        .with(Attribute::Age, 0, Script::Hang)
        .with(Attribute::Gender, 20, Script::Panic)
        .with(Attribute::Nationality, 5, nationality("RU"));
    let enricher = Enricher::new(source).with_budget(budget);
    let mut draft = kiska_draft();

    let started_at = Instant::now();
    let outcome = AssertUnwindSafe(enricher.enrich(&mut draft, distant_deadline()))
        .catch_unwind()
        .await;

    let payload = outcome.expect_err("worker panic must propagate");
    assert!(payload
        .downcast_ref::<String>()
        .is_some_and(|message| message.contains("scripted gender lookup panic")));
    assert!(started_at.elapsed() < budget);
}

#[tokio::test(start_paused = true)]
async fn value_for_another_attribute_is_rejected() {
    let source = ScriptedSource::new()
        .with(Attribute::Age, 5, gender("male"))
        .with(Attribute::Gender, 5, gender("female"))
        .with(Attribute::Nationality, 5, nationality("RU"));
    let mut draft = kiska_draft();

    let err = Enricher::new(source)
        .enrich(&mut draft, distant_deadline())
        .await
        .unwrap_err();

    match err {
        EnrichError::Lookup(lookup) => {
            assert_eq!(lookup.attribute, Attribute::Age);
            assert!(matches!(
                lookup.failure,
                LookupFailure::MismatchedValue(Attribute::Gender)
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(draft.age, None);
    assert_eq!(draft.gender.as_deref(), Some("female"));
}
