//! Shared fixtures: in-process store and queue, sample records.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use fitcoach::records::{
    DietHistoryEntry, ItemId, OwnerId, Preferences, Workout, WorkoutHistoryEntry, WorkoutType,
};
use fitcoach::session::SessionContext;
use fitcoach::storage::LocalCache;
use fitcoach::sync::{MemoryRecordStore, MemoryRetryQueue, ReconciliationEngine};

pub type TestEngine = ReconciliationEngine<MemoryRecordStore, MemoryRetryQueue>;

/// A device: its own cache and queue against a shared store.
pub fn device(store: &Arc<MemoryRecordStore>) -> TestEngine {
    ReconciliationEngine::new(
        Arc::clone(store),
        Arc::new(MemoryRetryQueue::new()),
        LocalCache::in_memory().unwrap(),
    )
}

pub fn engine() -> TestEngine {
    device(&Arc::new(MemoryRecordStore::new()))
}

pub fn ctx(owner: &str) -> SessionContext {
    SessionContext::for_owner(OwnerId::new(owner).unwrap())
}

pub fn workout(id: &str, title: &str) -> Workout {
    Workout {
        id: ItemId::from(id),
        title: title.to_string(),
        description: String::new(),
        workout_type: WorkoutType::Strength,
        difficulty: "Intermediate".to_string(),
        duration: "45 min".to_string(),
        exercises: vec!["Squats".to_string(), "Push-ups".to_string()],
        focus_area: None,
    }
}

pub fn workout_log(id: &str, completed: bool) -> WorkoutHistoryEntry {
    WorkoutHistoryEntry {
        id: ItemId::from(id),
        date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        workout: "Full Body Strength".to_string(),
        duration: "45 min".to_string(),
        completed,
    }
}

pub fn meal_log(id: &str) -> DietHistoryEntry {
    DietHistoryEntry {
        id: ItemId::from(id),
        date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        meal_name: "Overnight oats".to_string(),
        diet_plan_name: "Balanced Basics".to_string(),
        completed: true,
    }
}

pub fn preferences() -> Preferences {
    Preferences {
        fitness_goal: Some("improve-fitness".to_string()),
        experience_level: Some("beginner".to_string()),
        workout_frequency: Some("2-3".to_string()),
        workout_duration: Some("30-45".to_string()),
        preferred_workout_types: vec![WorkoutType::Yoga],
        limitations: vec!["none".to_string()],
    }
}
