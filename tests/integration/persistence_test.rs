//! State kept in the on-disk database across restarts.

use std::path::Path;
use std::sync::Arc;

use fitcoach::records::CategoryPayload;
use fitcoach::storage::{CacheKey, Database, DurableFlags, LocalCache};
use fitcoach::sync::{
    MemoryRecordStore, ReconciliationEngine, RetryQueue, SqliteRetryQueue, WriteStatus,
};
use tempfile::tempdir;

use crate::harness::{ctx, workout, workout_log};

type DiskEngine = ReconciliationEngine<MemoryRecordStore, SqliteRetryQueue>;

fn open(path: &Path, store: &Arc<MemoryRecordStore>) -> DiskEngine {
    let db = Database::open(path).unwrap();
    let cache = LocalCache::new(db.clone(), DurableFlags::new(db.clone()));
    ReconciliationEngine::new(
        Arc::clone(store),
        Arc::new(SqliteRetryQueue::new(db)),
        cache,
    )
}

#[tokio::test]
async fn test_queued_writes_replay_after_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fitcoach.db");
    let store = Arc::new(MemoryRecordStore::new());
    let ctx = ctx("u1");
    let owner = ctx.owner().unwrap().clone();

    {
        let engine = open(&path, &store);
        store.set_online(false);
        let report = engine
            .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Legs")]))
            .await
            .unwrap();
        assert!(matches!(report.remote, WriteStatus::Deferred { .. }));
        engine
            .save(&ctx, CategoryPayload::WorkoutHistory(vec![workout_log("h1", true)]))
            .await
            .unwrap();
        assert_eq!(engine.queue().len().unwrap(), 2);
    }

    store.set_online(true);
    let engine = open(&path, &store);
    assert_eq!(engine.queue().len().unwrap(), 2);

    let flushed = engine.flush(&owner, true).await.unwrap();
    assert_eq!(flushed.synced, 2);
    assert_eq!(flushed.remaining, 0);
    assert_eq!(store.records(&owner).len(), 2);
}

#[tokio::test]
async fn test_cache_and_flag_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fitcoach.db");
    let store = Arc::new(MemoryRecordStore::new());
    let ctx = ctx("u1");

    {
        let engine = open(&path, &store);
        engine
            .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Legs")]))
            .await
            .unwrap();
        engine
            .cache()
            .set(&ctx, CacheKey::OnboardingComplete, &true)
            .unwrap();
    }

    let engine = open(&path, &store);
    let snapshot = engine.cache().snapshot(&ctx).unwrap();
    assert_eq!(snapshot.workout_plan.len(), 1);
    assert_eq!(snapshot.workout_plan[0].title, "Legs");

    engine.cache().clear_all(&ctx).unwrap();
    assert!(engine.cache().snapshot(&ctx).unwrap().workout_plan.is_empty());
    assert!(engine.cache().onboarding_complete(&ctx).unwrap());
}
