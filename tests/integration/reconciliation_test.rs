//! Cache and remote store staying consistent across devices.

use std::sync::Arc;
use std::time::Duration;

use fitcoach::records::CategoryPayload;
use fitcoach::sync::{DataSource, MemoryRecordStore, ResetScope, WriteStatus};

use crate::harness::{ctx, device, meal_log, preferences, workout, workout_log};

#[tokio::test]
async fn test_fetch_after_save_on_another_device() {
    let store = Arc::new(MemoryRecordStore::new());
    let phone = device(&store);
    let laptop = device(&store);
    let ctx = ctx("u1");

    let report = phone
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Full Body Strength")]))
        .await
        .unwrap();
    assert_eq!(report.remote, WriteStatus::Synced);
    phone
        .save(&ctx, CategoryPayload::WorkoutHistory(vec![workout_log("h1", true)]))
        .await
        .unwrap();
    laptop
        .save(&ctx, CategoryPayload::WorkoutHistory(vec![workout_log("h2", true)]))
        .await
        .unwrap();

    let load = laptop.load(&ctx).await.unwrap();
    assert_eq!(load.source, DataSource::Remote);
    assert_eq!(load.snapshot.workout_plan, vec![workout("w1", "Full Body Strength")]);
    assert_eq!(load.snapshot.workout_history.len(), 2);
}

#[tokio::test]
async fn test_plan_replacement_propagates() {
    let store = Arc::new(MemoryRecordStore::new());
    let phone = device(&store);
    let laptop = device(&store);
    let ctx = ctx("u1");

    phone
        .save(
            &ctx,
            CategoryPayload::WorkoutPlan(vec![workout("w1", "A"), workout("w2", "B")]),
        )
        .await
        .unwrap();
    laptop.load(&ctx).await.unwrap();

    phone
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w2", "B")]))
        .await
        .unwrap();
    let load = laptop.load(&ctx).await.unwrap();
    assert_eq!(load.snapshot.workout_plan, vec![workout("w2", "B")]);
}

#[tokio::test]
async fn test_reset_keeps_history_everywhere() {
    let store = Arc::new(MemoryRecordStore::new());
    let phone = device(&store);
    let laptop = device(&store);
    let ctx = ctx("u1");

    phone
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "A")]))
        .await
        .unwrap();
    phone
        .save(&ctx, CategoryPayload::Preferences(preferences()))
        .await
        .unwrap();
    phone
        .save(&ctx, CategoryPayload::WorkoutHistory(vec![workout_log("h1", true)]))
        .await
        .unwrap();
    phone
        .save(&ctx, CategoryPayload::DietHistory(vec![meal_log("m1")]))
        .await
        .unwrap();
    let before = laptop.load(&ctx).await.unwrap().snapshot;
    assert!(before.preferences.is_some());

    let report = phone.reset(&ctx, ResetScope::AllExceptHistory).await.unwrap();
    assert_eq!(report.remote, Some(WriteStatus::Synced));

    for engine in [&phone, &laptop] {
        let after = engine.load(&ctx).await.unwrap().snapshot;
        assert!(after.workout_plan.is_empty());
        assert!(after.diet_plan.is_empty());
        assert!(after.preferences.is_none());
        assert_eq!(after.workout_history, before.workout_history);
        assert_eq!(after.diet_history, before.diet_history);
    }
}

#[tokio::test]
async fn test_local_write_during_fetch_is_kept() {
    let store = Arc::new(MemoryRecordStore::new());
    let phone = device(&store);
    let laptop = device(&store);
    let ctx = ctx("u1");

    laptop
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Remote")]))
        .await
        .unwrap();

    store.set_latency(Some(Duration::from_millis(150)));
    let (load, local) = tokio::join!(phone.load(&ctx), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        phone.apply_local(&ctx, &CategoryPayload::WorkoutPlan(vec![workout("w9", "Local")]))
    });
    load.unwrap();
    local.unwrap();

    let cached = phone.cache().snapshot(&ctx).unwrap();
    assert_eq!(cached.workout_plan, vec![workout("w9", "Local")]);
}

#[tokio::test]
async fn test_owners_are_isolated() {
    let store = Arc::new(MemoryRecordStore::new());
    let engine = device(&store);
    let alice = ctx("alice");
    let bob = ctx("bob");

    engine
        .save(&alice, CategoryPayload::WorkoutPlan(vec![workout("w1", "A")]))
        .await
        .unwrap();
    let load = engine.load(&bob).await.unwrap();
    assert!(load.snapshot.workout_plan.is_empty());
    assert!(!load.snapshot.has_any_data());
}
