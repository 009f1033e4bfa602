//! Record model: owners, categories, typed payloads and snapshots.

pub mod payload;
pub mod types;

pub use payload::{
    sort_by_date_desc, CategoryPayload, Record, RecordPayload, UserSnapshot, PREFERENCES_ITEM_ID,
};
pub use types::{
    Category, Dated, DietHistoryEntry, DietPlan, DietType, ItemId, Keyed, Meal, MealType,
    MergePolicy, OwnerId, Preferences, RecordError, Workout, WorkoutHistoryEntry, WorkoutType,
};
