//! Merge policies applied to stored collections.
//!
//! The same functions serve the local cache and the in-process record store,
//! so both tiers agree on what a save means.

use crate::records::{sort_by_date_desc, CategoryPayload, ItemId, Keyed};
use std::collections::HashMap;

use super::SaveSummary;

/// Collapse duplicate ids inside one payload: the last occurrence wins and
/// keeps the position of the first.
pub fn dedupe_last_wins<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut index: HashMap<ItemId, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match index.get(item.item_id()) {
            Some(&pos) => out[pos] = item,
            None => {
                index.insert(item.item_id().clone(), out.len());
                out.push(item);
            }
        }
    }
    out
}

/// Replace-set: the incoming collection supersedes the stored one.
pub fn replace_set<T: Keyed>(stored: &[T], incoming: Vec<T>) -> (Vec<T>, SaveSummary) {
    let incoming = dedupe_last_wins(incoming);
    let mut summary = SaveSummary::default();
    for item in &incoming {
        if stored.iter().any(|s| s.item_id() == item.item_id()) {
            summary.updated_count += 1;
        } else {
            summary.created_count += 1;
        }
    }
    (incoming, summary)
}

/// Upsert-retain: incoming items overwrite stored items with the same id,
/// new ids are appended, unmentioned stored items stay.
pub fn upsert_retain<T: Keyed>(mut stored: Vec<T>, incoming: Vec<T>) -> (Vec<T>, SaveSummary) {
    let mut summary = SaveSummary::default();
    for item in incoming {
        match stored.iter().position(|s| s.item_id() == item.item_id()) {
            Some(pos) => {
                stored[pos] = item;
                summary.updated_count += 1;
            }
            None => {
                stored.push(item);
                summary.created_count += 1;
            }
        }
    }
    (stored, summary)
}

/// Merge `incoming` into the stored value of the same category.
pub fn apply(stored: Option<CategoryPayload>, incoming: CategoryPayload) -> (CategoryPayload, SaveSummary) {
    let category = incoming.category();
    let stored = match stored {
        Some(payload) if payload.category() == category => Some(payload),
        Some(other) => {
            tracing::warn!(
                "Stored {} does not match incoming {}; treating as empty",
                other.category(),
                category
            );
            None
        }
        None => None,
    };

    match (stored, incoming) {
        (Some(CategoryPayload::WorkoutPlan(old)), CategoryPayload::WorkoutPlan(new)) => {
            let (items, summary) = replace_set(&old, new);
            (CategoryPayload::WorkoutPlan(items), summary)
        }
        (_, CategoryPayload::WorkoutPlan(new)) => {
            let (items, summary) = replace_set(&[], new);
            (CategoryPayload::WorkoutPlan(items), summary)
        }
        (Some(CategoryPayload::DietPlan(old)), CategoryPayload::DietPlan(new)) => {
            let (items, summary) = replace_set(&old, new);
            (CategoryPayload::DietPlan(items), summary)
        }
        (_, CategoryPayload::DietPlan(new)) => {
            let (items, summary) = replace_set(&[], new);
            (CategoryPayload::DietPlan(items), summary)
        }
        (Some(CategoryPayload::WorkoutHistory(old)), CategoryPayload::WorkoutHistory(new)) => {
            let (mut items, summary) = upsert_retain(old, new);
            sort_by_date_desc(&mut items);
            (CategoryPayload::WorkoutHistory(items), summary)
        }
        (_, CategoryPayload::WorkoutHistory(new)) => {
            let (mut items, summary) = upsert_retain(Vec::new(), new);
            sort_by_date_desc(&mut items);
            (CategoryPayload::WorkoutHistory(items), summary)
        }
        (Some(CategoryPayload::DietHistory(old)), CategoryPayload::DietHistory(new)) => {
            let (mut items, summary) = upsert_retain(old, new);
            sort_by_date_desc(&mut items);
            (CategoryPayload::DietHistory(items), summary)
        }
        (_, CategoryPayload::DietHistory(new)) => {
            let (mut items, summary) = upsert_retain(Vec::new(), new);
            sort_by_date_desc(&mut items);
            (CategoryPayload::DietHistory(items), summary)
        }
        (stored, CategoryPayload::Preferences(prefs)) => {
            let summary = if stored.is_some() {
                SaveSummary {
                    created_count: 0,
                    updated_count: 1,
                }
            } else {
                SaveSummary {
                    created_count: 1,
                    updated_count: 0,
                }
            };
            (CategoryPayload::Preferences(prefs), summary)
        }
    }
}
