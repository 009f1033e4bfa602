//! Typed payloads per category, stored records and per-owner snapshots.

use super::types::{
    Category, Dated, DietHistoryEntry, DietPlan, ItemId, Keyed, OwnerId, Preferences,
    RecordError, Workout, WorkoutHistoryEntry,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Item id under which the single preferences record is stored.
pub const PREFERENCES_ITEM_ID: &str = "preferences";

/// The value written for one category in a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "data")]
pub enum CategoryPayload {
    WorkoutPlan(Vec<Workout>),
    DietPlan(Vec<DietPlan>),
    WorkoutHistory(Vec<WorkoutHistoryEntry>),
    DietHistory(Vec<DietHistoryEntry>),
    Preferences(Preferences),
}

impl CategoryPayload {
    /// Parse an untyped body for `category`.
    ///
    /// Items without an id get [`ItemId::derived`] from their content.
    pub fn from_json(category: Category, mut data: Value) -> Result<Self, RecordError> {
        if category.is_collection() && !data.is_array() {
            return Err(RecordError::MalformedPayload(format!(
                "{} expects an array of items",
                category.display_name()
            )));
        }
        if !category.is_collection() && !data.is_object() {
            return Err(RecordError::MalformedPayload(
                "preferences expects an object".to_string(),
            ));
        }

        assign_missing_ids(&mut data);
        let payload = match category {
            Category::WorkoutPlan => CategoryPayload::WorkoutPlan(serde_json::from_value(data)?),
            Category::DietPlan => CategoryPayload::DietPlan(serde_json::from_value(data)?),
            Category::WorkoutHistory => {
                CategoryPayload::WorkoutHistory(serde_json::from_value(data)?)
            }
            Category::DietHistory => CategoryPayload::DietHistory(serde_json::from_value(data)?),
            Category::Preferences => CategoryPayload::Preferences(serde_json::from_value(data)?),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Untyped body for the wire or the cache.
    pub fn to_json(&self) -> Result<Value, RecordError> {
        let value = match self {
            CategoryPayload::WorkoutPlan(items) => serde_json::to_value(items)?,
            CategoryPayload::DietPlan(items) => serde_json::to_value(items)?,
            CategoryPayload::WorkoutHistory(items) => serde_json::to_value(items)?,
            CategoryPayload::DietHistory(items) => serde_json::to_value(items)?,
            CategoryPayload::Preferences(prefs) => serde_json::to_value(prefs)?,
        };
        Ok(value)
    }

    /// Empty value for a category.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::WorkoutPlan => CategoryPayload::WorkoutPlan(Vec::new()),
            Category::DietPlan => CategoryPayload::DietPlan(Vec::new()),
            Category::WorkoutHistory => CategoryPayload::WorkoutHistory(Vec::new()),
            Category::DietHistory => CategoryPayload::DietHistory(Vec::new()),
            Category::Preferences => CategoryPayload::Preferences(Preferences::default()),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            CategoryPayload::WorkoutPlan(_) => Category::WorkoutPlan,
            CategoryPayload::DietPlan(_) => Category::DietPlan,
            CategoryPayload::WorkoutHistory(_) => Category::WorkoutHistory,
            CategoryPayload::DietHistory(_) => Category::DietHistory,
            CategoryPayload::Preferences(_) => Category::Preferences,
        }
    }

    /// Number of items carried; preferences count as one.
    pub fn len(&self) -> usize {
        match self {
            CategoryPayload::WorkoutPlan(items) => items.len(),
            CategoryPayload::DietPlan(items) => items.len(),
            CategoryPayload::WorkoutHistory(items) => items.len(),
            CategoryPayload::DietHistory(items) => items.len(),
            CategoryPayload::Preferences(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), RecordError> {
        match self {
            CategoryPayload::WorkoutPlan(items) => {
                for workout in items {
                    require(!workout.title.trim().is_empty(), "workout title")?;
                }
            }
            CategoryPayload::DietPlan(items) => {
                for plan in items {
                    require(!plan.title.trim().is_empty(), "diet plan title")?;
                }
            }
            CategoryPayload::WorkoutHistory(items) => {
                for entry in items {
                    require(!entry.id.as_str().is_empty(), "history item id")?;
                }
            }
            CategoryPayload::DietHistory(items) => {
                for entry in items {
                    require(!entry.id.as_str().is_empty(), "history item id")?;
                }
            }
            CategoryPayload::Preferences(_) => {}
        }
        Ok(())
    }

    /// Expand into stored records for `owner`.
    pub fn into_records(self, owner: &OwnerId, now: DateTime<Utc>) -> Vec<Record> {
        let category = self.category();
        let wrap = |item_id: ItemId, payload: RecordPayload| Record {
            owner: owner.clone(),
            category,
            item_id,
            payload,
            updated_at: now,
        };

        match self {
            CategoryPayload::WorkoutPlan(items) => items
                .into_iter()
                .map(|w| wrap(w.id.clone(), RecordPayload::Workout(w)))
                .collect(),
            CategoryPayload::DietPlan(items) => items
                .into_iter()
                .map(|d| wrap(d.id.clone(), RecordPayload::Diet(d)))
                .collect(),
            CategoryPayload::WorkoutHistory(items) => items
                .into_iter()
                .map(|e| wrap(e.id.clone(), RecordPayload::WorkoutLog(e)))
                .collect(),
            CategoryPayload::DietHistory(items) => items
                .into_iter()
                .map(|e| wrap(e.id.clone(), RecordPayload::DietLog(e)))
                .collect(),
            CategoryPayload::Preferences(prefs) => vec![wrap(
                ItemId::new(PREFERENCES_ITEM_ID),
                RecordPayload::Preferences(prefs),
            )],
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Give every id-less item in a collection body a content-derived id.
/// Identical items in one body are told apart by their occurrence.
fn assign_missing_ids(data: &mut Value) {
    let Some(items) = data.as_array_mut() else {
        return;
    };
    let mut seen: HashMap<String, usize> = HashMap::new();
    for item in items.iter_mut() {
        let Some(fields) = item.as_object_mut() else {
            continue;
        };
        if ["id", "itemId"]
            .iter()
            .any(|key| fields.get(*key).is_some_and(|v| !is_blank(v)))
        {
            continue;
        }
        fields.remove("id");
        fields.remove("itemId");

        let content = item.to_string();
        let occurrence = seen.entry(content.clone()).or_insert(0);
        let id = match *occurrence {
            0 => ItemId::derived(&content),
            n => ItemId::derived(&format!("{}#{}", content, n)),
        };
        *occurrence += 1;
        if let Some(fields) = item.as_object_mut() {
            fields.insert("id".to_string(), Value::String(id.as_str().to_string()));
        }
    }
}

fn require(ok: bool, field: &str) -> Result<(), RecordError> {
    if ok {
        Ok(())
    } else {
        Err(RecordError::MalformedPayload(format!("missing {}", field)))
    }
}

/// Body of a stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum RecordPayload {
    Workout(Workout),
    Diet(DietPlan),
    WorkoutLog(WorkoutHistoryEntry),
    DietLog(DietHistoryEntry),
    Preferences(Preferences),
}

/// A persisted, owner- and category-scoped item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub owner: OwnerId,
    pub category: Category,
    pub item_id: ItemId,
    pub payload: RecordPayload,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for Record {
    fn item_id(&self) -> &ItemId {
        &self.item_id
    }
}

/// Current value of every category for one owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    #[serde(default)]
    pub workout_plan: Vec<Workout>,
    #[serde(default)]
    pub diet_plan: Vec<DietPlan>,
    #[serde(default)]
    pub workout_history: Vec<WorkoutHistoryEntry>,
    #[serde(default)]
    pub diet_history: Vec<DietHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl UserSnapshot {
    /// Rebuild a snapshot from stored records (any order).
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut snapshot = UserSnapshot::default();
        for record in records {
            match &record.payload {
                RecordPayload::Workout(w) => snapshot.workout_plan.push(w.clone()),
                RecordPayload::Diet(d) => snapshot.diet_plan.push(d.clone()),
                RecordPayload::WorkoutLog(e) => snapshot.workout_history.push(e.clone()),
                RecordPayload::DietLog(e) => snapshot.diet_history.push(e.clone()),
                RecordPayload::Preferences(p) => snapshot.preferences = Some(p.clone()),
            }
        }
        snapshot.sort_history();
        snapshot
    }

    /// Whether any category holds data.
    pub fn has_any_data(&self) -> bool {
        self.has_plan_data()
            || !self.workout_history.is_empty()
            || !self.diet_history.is_empty()
            || self.preferences.is_some()
    }

    /// Whether either plan category holds items.
    pub fn has_plan_data(&self) -> bool {
        !self.workout_plan.is_empty() || !self.diet_plan.is_empty()
    }

    /// Value of one category; `None` only for absent preferences.
    pub fn get(&self, category: Category) -> Option<CategoryPayload> {
        match category {
            Category::WorkoutPlan => Some(CategoryPayload::WorkoutPlan(self.workout_plan.clone())),
            Category::DietPlan => Some(CategoryPayload::DietPlan(self.diet_plan.clone())),
            Category::WorkoutHistory => {
                Some(CategoryPayload::WorkoutHistory(self.workout_history.clone()))
            }
            Category::DietHistory => Some(CategoryPayload::DietHistory(self.diet_history.clone())),
            Category::Preferences => self.preferences.clone().map(CategoryPayload::Preferences),
        }
    }

    /// Overwrite one category.
    pub fn set(&mut self, payload: CategoryPayload) {
        match payload {
            CategoryPayload::WorkoutPlan(items) => self.workout_plan = items,
            CategoryPayload::DietPlan(items) => self.diet_plan = items,
            CategoryPayload::WorkoutHistory(items) => self.workout_history = items,
            CategoryPayload::DietHistory(items) => self.diet_history = items,
            CategoryPayload::Preferences(prefs) => self.preferences = Some(prefs),
        }
    }

    /// Empty one category.
    pub fn clear(&mut self, category: Category) {
        match category {
            Category::WorkoutPlan => self.workout_plan.clear(),
            Category::DietPlan => self.diet_plan.clear(),
            Category::WorkoutHistory => self.workout_history.clear(),
            Category::DietHistory => self.diet_history.clear(),
            Category::Preferences => self.preferences = None,
        }
    }

    /// Order history by event date, newest first.
    pub fn sort_history(&mut self) {
        sort_by_date_desc(&mut self.workout_history);
        sort_by_date_desc(&mut self.diet_history);
    }
}

/// Stable sort by event date, newest first.
pub fn sort_by_date_desc<T: Dated>(items: &mut [T]) {
    items.sort_by(|a, b| b.event_date().cmp(&a.event_date()));
}
