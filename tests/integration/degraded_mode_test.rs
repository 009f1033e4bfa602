//! Behaviour while the record store or the generator is unavailable.

use std::sync::Arc;
use std::time::Duration;

use fitcoach::coach::{
    ContentGenerator, DraftClass, DraftContent, DraftFactory, GenerationError, GenerationRequest,
};
use fitcoach::coach::DraftSource;
use fitcoach::onboarding::{evaluate_gate, GateRule, NavigationHints, RemotePresence};
use fitcoach::records::CategoryPayload;
use fitcoach::storage::LocalCache;
use fitcoach::sync::{
    DataSource, MemoryRecordStore, MemoryRetryQueue, ReconciliationEngine, RetryQueue,
    WriteStatus,
};

use crate::harness::{ctx, engine, workout, workout_log};

#[tokio::test]
async fn test_outage_with_cached_plan_renders_plan() {
    let engine = engine();
    let ctx = ctx("u1");
    engine
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Full Body Strength")]))
        .await
        .unwrap();

    engine.store().set_online(false);
    let gate = evaluate_gate(&engine, &ctx, NavigationHints::default())
        .await
        .unwrap();

    assert!(gate.decision.is_allowed());
    assert_eq!(gate.signal.remote_has_any_data, RemotePresence::Unknown);
    assert!(matches!(gate.source, DataSource::Cache { .. }));
    assert_eq!(gate.snapshot.workout_plan.len(), 1);
}

#[tokio::test]
async fn test_outage_without_local_data_redirects() {
    let engine = engine();
    engine.store().set_online(false);
    let gate = evaluate_gate(&engine, &ctx("u1"), NavigationHints::default())
        .await
        .unwrap();
    assert!(!gate.decision.is_allowed());
    assert_eq!(gate.decision.rule, GateRule::NoSignal);
}

#[tokio::test]
async fn test_offline_saves_are_deferred_then_replayed() {
    let engine = engine();
    let ctx = ctx("u1");
    let owner = ctx.owner().unwrap().clone();
    engine.store().set_online(false);

    let first = engine
        .save(&ctx, CategoryPayload::WorkoutHistory(vec![workout_log("h1", true)]))
        .await
        .unwrap();
    assert!(matches!(first.remote, WriteStatus::Deferred { .. }));
    assert!(first.remote.notice().is_some());
    engine
        .save(&ctx, CategoryPayload::WorkoutHistory(vec![workout_log("h2", true)]))
        .await
        .unwrap();
    engine
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Old")]))
        .await
        .unwrap();
    engine
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w2", "New")]))
        .await
        .unwrap();
    // History writes fold into their union; plan writes collapse to the latest.
    assert_eq!(engine.queue().len().unwrap(), 2);

    // The cache already has everything.
    let offline = engine.load(&ctx).await.unwrap();
    assert_eq!(offline.snapshot.workout_history.len(), 2);

    engine.store().set_online(true);
    let report = engine.flush(&owner, true).await.unwrap();
    assert_eq!(report.synced, 2);
    assert_eq!(report.remaining, 0);

    let remote = engine.store().records(&owner);
    assert_eq!(remote.len(), 3);
    assert!(remote.iter().any(|r| r.item_id.as_str() == "w2"));
    assert!(!remote.iter().any(|r| r.item_id.as_str() == "w1"));
}

#[tokio::test]
async fn test_full_queue_never_loses_history() {
    let store = Arc::new(MemoryRecordStore::new());
    let engine = ReconciliationEngine::new(
        Arc::clone(&store),
        Arc::new(MemoryRetryQueue::with_limit(1)),
        LocalCache::in_memory().unwrap(),
    );
    let ctx = ctx("u1");
    let owner = ctx.owner().unwrap().clone();

    store.set_online(false);
    for id in ["h1", "h2"] {
        engine
            .save(&ctx, CategoryPayload::WorkoutHistory(vec![workout_log(id, true)]))
            .await
            .unwrap();
    }
    assert_eq!(engine.queue().len().unwrap(), 1);

    store.set_online(true);
    let report = engine.flush(&owner, true).await.unwrap();
    assert_eq!(report.synced, 1);

    let load = engine.load(&ctx).await.unwrap();
    assert_eq!(load.source, DataSource::Remote);
    let mut ids: Vec<_> = load
        .snapshot
        .workout_history
        .iter()
        .map(|e| e.id.as_str().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["h1", "h2"]);
}

#[tokio::test]
async fn test_slow_store_times_out_to_cache() {
    let engine = engine().with_store_timeout(Duration::from_millis(50));
    let ctx = ctx("u1");
    engine
        .apply_local(&ctx, &CategoryPayload::WorkoutPlan(vec![workout("w1", "A")]))
        .unwrap();

    engine.store().set_latency(Some(Duration::from_millis(500)));
    let load = engine.load(&ctx).await.unwrap();
    assert!(load.source.may_be_stale());
    assert_eq!(load.snapshot.workout_plan.len(), 1);
}

struct DownGenerator;

impl ContentGenerator for DownGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<DraftContent, GenerationError> {
        Err(GenerationError::Failed("service unavailable".to_string()))
    }
}

struct GarbageGenerator;

impl ContentGenerator for GarbageGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<DraftContent, GenerationError> {
        fitcoach::coach::generator::parse_content(request.class, "Sorry, I can't help with that.")
    }
}

#[tokio::test]
async fn test_generator_failures_fall_back_to_templates() {
    let request = GenerationRequest::new(DraftClass::Diet, "a vegan meal plan");

    let draft = DraftFactory::new(DownGenerator).draft(&request).await;
    assert_eq!(draft.source, DraftSource::Fallback);
    assert_eq!(draft.class(), DraftClass::Diet);
    assert!(!draft.title().is_empty());

    let draft = DraftFactory::new(GarbageGenerator).draft(&request).await;
    assert_eq!(draft.source, DraftSource::Fallback);
    let DraftContent::Diet(plan) = draft.content else {
        panic!("expected a diet plan");
    };
    assert!(!plan.meals.is_empty());
}
