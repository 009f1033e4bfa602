//! Onboarding questionnaire steps.

use serde::{Deserialize, Serialize};

/// Steps in the onboarding questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum QuestionnaireStep {
    /// Welcome screen with overview
    #[default]
    Welcome,
    FitnessGoal,
    ExperienceLevel,
    WorkoutFrequency,
    WorkoutDuration,
    /// Preferred workout types (multiple choice)
    WorkoutTypes,
    /// Physical limitations (multiple choice)
    Limitations,
    Complete,
}

/// One selectable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub id: &'static str,
    pub label: &'static str,
}

const fn option(id: &'static str, label: &'static str) -> AnswerOption {
    AnswerOption { id, label }
}

const FITNESS_GOALS: &[AnswerOption] = &[
    option("lose-weight", "Lose Weight"),
    option("build-muscle", "Build Muscle"),
    option("improve-fitness", "Improve Overall Fitness"),
    option("increase-endurance", "Increase Endurance"),
];

const EXPERIENCE_LEVELS: &[AnswerOption] = &[
    option("beginner", "Beginner (New to fitness)"),
    option("intermediate", "Intermediate (Some experience)"),
    option("advanced", "Advanced (Experienced)"),
];

const FREQUENCIES: &[AnswerOption] = &[
    option("2-3", "2-3 times per week"),
    option("3-4", "3-4 times per week"),
    option("5+", "5+ times per week"),
];

const DURATIONS: &[AnswerOption] = &[
    option("15-30", "15-30 minutes"),
    option("30-45", "30-45 minutes"),
    option("45-60", "45-60 minutes"),
    option("60+", "60+ minutes"),
];

const WORKOUT_TYPES: &[AnswerOption] = &[
    option("strength", "Strength Training"),
    option("hiit", "HIIT/Cardio"),
    option("yoga", "Yoga/Flexibility"),
    option("core", "Core/Abs"),
];

const LIMITATIONS: &[AnswerOption] = &[
    option("none", "No limitations"),
    option("knee", "Knee issues"),
    option("back", "Back problems"),
    option("shoulder", "Shoulder issues"),
    option("equipment", "Limited equipment"),
    option("space", "Limited space"),
];

impl QuestionnaireStep {
    /// Get all steps in order.
    pub fn all() -> &'static [QuestionnaireStep] {
        &[
            QuestionnaireStep::Welcome,
            QuestionnaireStep::FitnessGoal,
            QuestionnaireStep::ExperienceLevel,
            QuestionnaireStep::WorkoutFrequency,
            QuestionnaireStep::WorkoutDuration,
            QuestionnaireStep::WorkoutTypes,
            QuestionnaireStep::Limitations,
            QuestionnaireStep::Complete,
        ]
    }

    /// Get the step index (0-based).
    pub fn index(&self) -> usize {
        Self::all().iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> Option<QuestionnaireStep> {
        Self::all().get(self.index() + 1).copied()
    }

    pub fn previous(&self) -> Option<QuestionnaireStep> {
        self.index().checked_sub(1).map(|i| Self::all()[i])
    }

    pub fn title(&self) -> &'static str {
        match self {
            QuestionnaireStep::Welcome => "Welcome",
            QuestionnaireStep::FitnessGoal => "Fitness Goal",
            QuestionnaireStep::ExperienceLevel => "Experience Level",
            QuestionnaireStep::WorkoutFrequency => "Workout Frequency",
            QuestionnaireStep::WorkoutDuration => "Workout Duration",
            QuestionnaireStep::WorkoutTypes => "Workout Types",
            QuestionnaireStep::Limitations => "Limitations",
            QuestionnaireStep::Complete => "All Set!",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QuestionnaireStep::Welcome => "A few questions so your first plan fits you.",
            QuestionnaireStep::FitnessGoal => "What is your main fitness goal?",
            QuestionnaireStep::ExperienceLevel => "How experienced are you with working out?",
            QuestionnaireStep::WorkoutFrequency => "How often do you want to work out?",
            QuestionnaireStep::WorkoutDuration => "How long should a workout be?",
            QuestionnaireStep::WorkoutTypes => "Which kinds of workouts do you enjoy?",
            QuestionnaireStep::Limitations => "Anything we should work around?",
            QuestionnaireStep::Complete => "Your plan is ready.",
        }
    }

    /// Answers offered on this step; empty for informational steps.
    pub fn options(&self) -> &'static [AnswerOption] {
        match self {
            QuestionnaireStep::FitnessGoal => FITNESS_GOALS,
            QuestionnaireStep::ExperienceLevel => EXPERIENCE_LEVELS,
            QuestionnaireStep::WorkoutFrequency => FREQUENCIES,
            QuestionnaireStep::WorkoutDuration => DURATIONS,
            QuestionnaireStep::WorkoutTypes => WORKOUT_TYPES,
            QuestionnaireStep::Limitations => LIMITATIONS,
            QuestionnaireStep::Welcome | QuestionnaireStep::Complete => &[],
        }
    }

    pub fn is_multi_select(&self) -> bool {
        matches!(
            self,
            QuestionnaireStep::WorkoutTypes | QuestionnaireStep::Limitations
        )
    }

    /// Whether an answer is known for this step.
    pub fn accepts(&self, answer: &str) -> bool {
        self.options().iter().any(|o| o.id == answer)
    }

    /// Check if this step can be skipped.
    pub fn is_skippable(&self) -> bool {
        match self {
            QuestionnaireStep::Welcome => false,
            QuestionnaireStep::FitnessGoal => true,
            // Plan generation needs these three
            QuestionnaireStep::ExperienceLevel => false,
            QuestionnaireStep::WorkoutFrequency => false,
            QuestionnaireStep::WorkoutDuration => false,
            QuestionnaireStep::WorkoutTypes => true,
            QuestionnaireStep::Limitations => true,
            QuestionnaireStep::Complete => false,
        }
    }

    pub fn is_last(&self) -> bool {
        *self == QuestionnaireStep::Complete
    }
}

impl std::fmt::Display for QuestionnaireStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}
