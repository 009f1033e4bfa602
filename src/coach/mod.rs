//! Assistant drafts: generation, confirmation and commit.
//!
//! A draft is an assistant-suggested workout or diet plan that lives only in
//! conversation state until the user confirms it.

pub mod assistant;
pub mod conversation;
pub mod fallback;
pub mod generator;
pub mod intent;

pub use assistant::{ChatReply, Coach, ReplyKind};
pub use conversation::{Conversation, ConversationState, TurnAction};
pub use generator::{
    ChatCompletionsGenerator, ConfiguredGenerator, ContentGenerator, DraftFactory,
    GenerationError, GenerationRequest, TemplateGenerator,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::records::{Category, CategoryPayload, DietPlan, ItemId, Workout};

/// Which plan collection a draft belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftClass {
    Workout,
    Diet,
}

impl DraftClass {
    /// Category a committed draft lands in.
    pub fn category(&self) -> Category {
        match self {
            DraftClass::Workout => Category::WorkoutPlan,
            DraftClass::Diet => Category::DietPlan,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DraftClass::Workout => "workout",
            DraftClass::Diet => "diet plan",
        }
    }
}

impl std::fmt::Display for DraftClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Structured content of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", content = "content", rename_all = "lowercase")]
pub enum DraftContent {
    Workout(Workout),
    Diet(DietPlan),
}

impl DraftContent {
    pub fn class(&self) -> DraftClass {
        match self {
            DraftContent::Workout(_) => DraftClass::Workout,
            DraftContent::Diet(_) => DraftClass::Diet,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            DraftContent::Workout(w) => &w.title,
            DraftContent::Diet(d) => &d.title,
        }
    }

    /// Give the content a fresh item id.
    pub fn with_new_id(mut self) -> Self {
        match &mut self {
            DraftContent::Workout(w) => w.id = ItemId::generate(),
            DraftContent::Diet(d) => d.id = ItemId::generate(),
        }
        self
    }

    pub fn item_id(&self) -> &ItemId {
        match self {
            DraftContent::Workout(w) => &w.id,
            DraftContent::Diet(d) => &d.id,
        }
    }

    /// Append this item to the current plan collection.
    ///
    /// Plans are replace-set, so the result is the full collection to save.
    pub fn appended_to(self, current: Option<CategoryPayload>) -> CategoryPayload {
        match (self, current) {
            (DraftContent::Workout(w), Some(CategoryPayload::WorkoutPlan(mut plan))) => {
                plan.push(w);
                CategoryPayload::WorkoutPlan(plan)
            }
            (DraftContent::Workout(w), _) => CategoryPayload::WorkoutPlan(vec![w]),
            (DraftContent::Diet(d), Some(CategoryPayload::DietPlan(mut plan))) => {
                plan.push(d);
                CategoryPayload::DietPlan(plan)
            }
            (DraftContent::Diet(d), _) => CategoryPayload::DietPlan(vec![d]),
        }
    }

    /// Human-readable summary shown when asking for confirmation.
    pub fn summary(&self) -> String {
        match self {
            DraftContent::Workout(w) => {
                let mut text = format!(
                    "Here's a {} {} workout:\n\n**{}**\n{}\n\nExercises:\n",
                    if w.difficulty.is_empty() {
                        "custom".to_string()
                    } else {
                        w.difficulty.to_lowercase()
                    },
                    w.workout_type.label(),
                    w.title,
                    w.description
                );
                for (i, exercise) in w.exercises.iter().enumerate() {
                    text.push_str(&format!("{}. {}\n", i + 1, exercise));
                }
                text.push_str("\nAdd this to your collection?");
                text
            }
            DraftContent::Diet(d) => {
                let mut text = format!(
                    "Here's a {} plan ({} calories):\n\n**{}**\n{}\n\nMeals:\n",
                    d.diet_type.label(),
                    d.calorie_range,
                    d.title,
                    d.description
                );
                for meal in &d.meals {
                    text.push_str(&format!("- {}\n", meal.title));
                }
                text.push_str("\nAdd this to your collection?");
                text
            }
        }
    }
}

/// How a draft was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftSource {
    Generated,
    /// Built from a template after the generator failed
    Fallback,
}

/// An unpersisted suggestion awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: Uuid,
    pub content: DraftContent,
    pub source: DraftSource,
    /// Restrictions the draft was generated under
    pub restrictions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(content: DraftContent, source: DraftSource, restrictions: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            source,
            restrictions,
            created_at: Utc::now(),
        }
    }

    pub fn class(&self) -> DraftClass {
        self.content.class()
    }

    pub fn title(&self) -> &str {
        self.content.title()
    }
}
