//! Owner, category and item types shared by the cache, the remote store and
//! the conversation layer.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when a payload crosses the store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Missing required field or wrong shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Category tag outside the closed set
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

impl RecordError {
    /// HTTP-equivalent status for boundary rejections.
    pub fn status_code(&self) -> u16 {
        400
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::MalformedPayload(err.to_string())
    }
}

/// Stable per-user partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create an owner id, rejecting blank values.
    pub fn new(id: impl Into<String>) -> Result<Self, RecordError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(RecordError::MalformedPayload(
                "owner id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one logical item (a workout, a meal log entry, ...).
///
/// Items decoded without an id get one derived from their content, so the
/// same body always yields the same id. Freshly generated drafts use
/// [`ItemId::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Synthesize a fresh id.
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8]))
    }

    /// Stable id for an item body that carries none.
    pub fn derived(content: &str) -> Self {
        let hash = Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes());
        Self(format!("item-{}", hash.simple()))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older clients stored numeric ids.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) if text.trim().is_empty() => Ok(ItemId::generate()),
            Raw::Text(text) => Ok(ItemId(text)),
            Raw::Number(n) => Ok(ItemId(n.to_string())),
        }
    }
}

/// How a save for a category is merged into stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The saved collection fully supersedes the stored one
    ReplaceSet,
    /// Items are upserted by id; unmentioned items are retained
    AppendUpsert,
    /// Exactly one value per owner, created or overwritten
    SingletonUpsert,
}

/// Closed set of record categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    WorkoutPlan,
    DietPlan,
    WorkoutHistory,
    DietHistory,
    Preferences,
}

impl Category {
    /// All categories in a stable order.
    pub fn all() -> &'static [Category] {
        &[
            Category::WorkoutPlan,
            Category::DietPlan,
            Category::WorkoutHistory,
            Category::DietHistory,
            Category::Preferences,
        ]
    }

    /// Fixed merge policy for this category.
    pub fn merge_policy(&self) -> MergePolicy {
        match self {
            Category::WorkoutPlan | Category::DietPlan => MergePolicy::ReplaceSet,
            Category::WorkoutHistory | Category::DietHistory => MergePolicy::AppendUpsert,
            Category::Preferences => MergePolicy::SingletonUpsert,
        }
    }

    /// History categories are append-only for the owner's lifetime.
    pub fn is_history(&self) -> bool {
        matches!(self, Category::WorkoutHistory | Category::DietHistory)
    }

    /// Whether values of this category are ordered sequences.
    pub fn is_collection(&self) -> bool {
        !matches!(self, Category::Preferences)
    }

    /// Tag used on the wire and in the remote document store.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Category::WorkoutPlan => "workout",
            Category::DietPlan => "dietPlan",
            Category::WorkoutHistory => "workoutHistory",
            Category::DietHistory => "dietHistory",
            Category::Preferences => "preferences",
        }
    }

    /// Human-readable name for log lines and user messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::WorkoutPlan => "workout plan",
            Category::DietPlan => "diet plan",
            Category::WorkoutHistory => "workout history",
            Category::DietHistory => "diet history",
            Category::Preferences => "preferences",
        }
    }
}

impl FromStr for Category {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workout" | "workoutPlan" | "WorkoutPlan" => Ok(Category::WorkoutPlan),
            "dietPlan" | "DietPlan" => Ok(Category::DietPlan),
            "workoutHistory" | "WorkoutHistory" => Ok(Category::WorkoutHistory),
            "dietHistory" | "DietHistory" => Ok(Category::DietHistory),
            "preferences" | "Preferences" => Ok(Category::Preferences),
            other => Err(RecordError::UnknownCategory(other.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Workout discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    #[default]
    Strength,
    Hiit,
    Yoga,
    Core,
}

impl WorkoutType {
    pub fn all() -> &'static [WorkoutType] {
        &[
            WorkoutType::Strength,
            WorkoutType::Hiit,
            WorkoutType::Yoga,
            WorkoutType::Core,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkoutType::Strength => "strength",
            WorkoutType::Hiit => "hiit",
            WorkoutType::Yoga => "yoga",
            WorkoutType::Core => "core",
        }
    }
}

impl std::fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Diet style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DietType {
    #[default]
    Balanced,
    Keto,
    Vegan,
    Paleo,
    Intermittent,
}

impl DietType {
    pub fn label(&self) -> &'static str {
        match self {
            DietType::Balanced => "balanced",
            DietType::Keto => "keto",
            DietType::Vegan => "vegan",
            DietType::Paleo => "paleo",
            DietType::Intermittent => "intermittent",
        }
    }
}

impl std::fmt::Display for DietType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Slot a meal occupies in the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    /// Informational entry such as a fasting window
    Note,
}

/// A workout in the owner's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    #[serde(default = "ItemId::generate", alias = "itemId")]
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub workout_type: WorkoutType,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub exercises: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
}

/// One meal inside a diet plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub meal_type: MealType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// A diet plan in the owner's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlan {
    #[serde(default = "ItemId::generate", alias = "itemId")]
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub diet_type: DietType,
    #[serde(default)]
    pub calorie_range: String,
    #[serde(default)]
    pub meals: Vec<Meal>,
}

/// A completed (or skipped) workout on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutHistoryEntry {
    #[serde(default = "ItemId::generate", alias = "itemId")]
    pub id: ItemId,
    pub date: NaiveDate,
    #[serde(default)]
    pub workout: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub completed: bool,
}

/// A logged meal on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietHistoryEntry {
    #[serde(default = "ItemId::generate", alias = "itemId")]
    pub id: ItemId,
    pub date: NaiveDate,
    #[serde(default)]
    pub meal_name: String,
    #[serde(default)]
    pub diet_plan_name: String,
    #[serde(default)]
    pub completed: bool,
}

/// Questionnaire answers and standing restrictions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_duration: Option<String>,
    #[serde(default)]
    pub preferred_workout_types: Vec<WorkoutType>,
    #[serde(default)]
    pub limitations: Vec<String>,
}

/// Items addressable by a stable id.
pub trait Keyed {
    fn item_id(&self) -> &ItemId;
}

/// Items that describe an event on a calendar day.
pub trait Dated {
    fn event_date(&self) -> NaiveDate;
}

impl Keyed for Workout {
    fn item_id(&self) -> &ItemId {
        &self.id
    }
}

impl Keyed for DietPlan {
    fn item_id(&self) -> &ItemId {
        &self.id
    }
}

impl Keyed for WorkoutHistoryEntry {
    fn item_id(&self) -> &ItemId {
        &self.id
    }
}

impl Keyed for DietHistoryEntry {
    fn item_id(&self) -> &ItemId {
        &self.id
    }
}

impl Dated for WorkoutHistoryEntry {
    fn event_date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for DietHistoryEntry {
    fn event_date(&self) -> NaiveDate {
        self.date
    }
}
