//! Merge policies of the record store.

use chrono::NaiveDate;
use fitcoach::records::{
    CategoryPayload, DietPlan, DietType, ItemId, OwnerId, WorkoutHistoryEntry,
};
use fitcoach::sync::merge::{apply, dedupe_last_wins};
use fitcoach::sync::{MemoryRecordStore, RecordStore, ResetScope};

fn owner() -> OwnerId {
    OwnerId::new("u1").unwrap()
}

fn history(id: &str, completed: bool) -> WorkoutHistoryEntry {
    WorkoutHistoryEntry {
        id: ItemId::from(id),
        date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        workout: "Quick HIIT Burner".to_string(),
        duration: "20 min".to_string(),
        completed,
    }
}

fn diet(id: &str, title: &str) -> DietPlan {
    DietPlan {
        id: ItemId::from(id),
        title: title.to_string(),
        description: String::new(),
        diet_type: DietType::Balanced,
        calorie_range: "1800-2200".to_string(),
        meals: Vec::new(),
    }
}

#[tokio::test]
async fn test_history_upsert_example() {
    let store = MemoryRecordStore::new();
    let owner = owner();

    store
        .save(&owner, &CategoryPayload::WorkoutHistory(vec![history("h1", true)]))
        .await
        .unwrap();
    let summary = store
        .save(
            &owner,
            &CategoryPayload::WorkoutHistory(vec![history("h1", false), history("h2", true)]),
        )
        .await
        .unwrap();
    assert_eq!(summary.created_count, 1);
    assert_eq!(summary.updated_count, 1);

    let snapshot = store.fetch(&owner).await.unwrap();
    assert_eq!(snapshot.workout_history.len(), 2);
    let h1 = snapshot
        .workout_history
        .iter()
        .find(|e| e.id.as_str() == "h1")
        .unwrap();
    let h2 = snapshot
        .workout_history
        .iter()
        .find(|e| e.id.as_str() == "h2")
        .unwrap();
    assert!(!h1.completed);
    assert!(h2.completed);
}

#[tokio::test]
async fn test_replace_set_returns_last_saved_collection() {
    let store = MemoryRecordStore::new();
    let owner = owner();

    store
        .save(
            &owner,
            &CategoryPayload::DietPlan(vec![diet("d1", "Keto Kickstart"), diet("d2", "Vegan Week")]),
        )
        .await
        .unwrap();
    store
        .save(&owner, &CategoryPayload::DietPlan(vec![diet("d3", "Balanced Basics")]))
        .await
        .unwrap();

    let snapshot = store.fetch(&owner).await.unwrap();
    assert_eq!(snapshot.diet_plan, vec![diet("d3", "Balanced Basics")]);
}

#[tokio::test]
async fn test_replace_set_is_idempotent() {
    let store = MemoryRecordStore::new();
    let owner = owner();
    let payload = CategoryPayload::DietPlan(vec![diet("d1", "Keto Kickstart")]);

    store.save(&owner, &payload).await.unwrap();
    let once = store.fetch(&owner).await.unwrap();
    store.save(&owner, &payload).await.unwrap();
    let twice = store.fetch(&owner).await.unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_reset_all_except_history() {
    let store = MemoryRecordStore::new();
    let owner = owner();
    store
        .save(&owner, &CategoryPayload::DietPlan(vec![diet("d1", "Keto Kickstart")]))
        .await
        .unwrap();
    store
        .save(&owner, &CategoryPayload::WorkoutHistory(vec![history("h1", true)]))
        .await
        .unwrap();
    let before = store.fetch(&owner).await.unwrap();

    store.reset(&owner, ResetScope::AllExceptHistory).await.unwrap();
    let after = store.fetch(&owner).await.unwrap();
    assert!(after.workout_plan.is_empty());
    assert!(after.diet_plan.is_empty());
    assert!(after.preferences.is_none());
    assert_eq!(after.workout_history, before.workout_history);
    assert_eq!(after.diet_history, before.diet_history);
}

#[test]
fn test_duplicate_ids_in_one_save_collapse() {
    let items = dedupe_last_wins(vec![diet("d1", "First"), diet("d2", "Other"), diet("d1", "Second")]);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Second");
}

#[test]
fn test_local_merge_matches_store_policy() {
    let (stored, _) = apply(None, CategoryPayload::WorkoutHistory(vec![history("h1", true)]));
    let (merged, summary) = apply(
        Some(stored),
        CategoryPayload::WorkoutHistory(vec![history("h2", true)]),
    );
    assert_eq!(merged.len(), 2);
    assert_eq!(summary.created_count, 1);

    let (plan, _) = apply(None, CategoryPayload::DietPlan(vec![diet("d1", "A")]));
    let (plan, _) = apply(Some(plan), CategoryPayload::DietPlan(Vec::new()));
    assert!(plan.is_empty());
}
