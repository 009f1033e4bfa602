//! Onboarding: the first-run questionnaire, the gate that decides whether a
//! user still needs it, and the flows that complete or restart it.

pub mod flow;
pub mod gate;
pub mod steps;

pub use flow::{complete_onboarding, evaluate_gate, reset_for_reonboarding, GateReport, OnboardingOutcome};
pub use gate::{
    resolve, GateDecision, GateOutcome, GateRule, NavigationHints, OnboardingSignal,
    RemotePresence,
};
pub use steps::{AnswerOption, QuestionnaireStep};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{Preferences, WorkoutType};

/// Errors raised while answering the questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("'{answer}' is not an option for {step}")]
    UnknownOption {
        step: QuestionnaireStep,
        answer: String,
    },

    #[error("{0} has no answers")]
    NotAnswerable(QuestionnaireStep),

    #[error("{0} needs an answer")]
    Required(QuestionnaireStep),
}

/// State of the questionnaire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireState {
    pub current_step: QuestionnaireStep,
    pub completed_steps: Vec<QuestionnaireStep>,
    pub answers: Preferences,
}

impl QuestionnaireState {
    pub fn is_step_complete(&self, step: QuestionnaireStep) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Whether the step has an answer recorded.
    pub fn is_answered(&self, step: QuestionnaireStep) -> bool {
        let a = &self.answers;
        match step {
            QuestionnaireStep::FitnessGoal => a.fitness_goal.is_some(),
            QuestionnaireStep::ExperienceLevel => a.experience_level.is_some(),
            QuestionnaireStep::WorkoutFrequency => a.workout_frequency.is_some(),
            QuestionnaireStep::WorkoutDuration => a.workout_duration.is_some(),
            QuestionnaireStep::WorkoutTypes => !a.preferred_workout_types.is_empty(),
            QuestionnaireStep::Limitations => !a.limitations.is_empty(),
            QuestionnaireStep::Welcome | QuestionnaireStep::Complete => true,
        }
    }

    /// Get progress as a percentage (0-100).
    pub fn progress_percent(&self) -> u8 {
        let total = QuestionnaireStep::all().len();
        ((self.completed_steps.len() * 100) / total) as u8
    }
}

fn workout_type_from_id(id: &str) -> Option<WorkoutType> {
    WorkoutType::all().iter().copied().find(|t| t.label() == id)
}

/// Questionnaire controller producing a [`Preferences`] record.
#[derive(Debug, Clone, Default)]
pub struct OnboardingQuestionnaire {
    state: QuestionnaireState,
}

impl OnboardingQuestionnaire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: QuestionnaireState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &QuestionnaireState {
        &self.state
    }

    pub fn current_step(&self) -> QuestionnaireStep {
        self.state.current_step
    }

    pub fn preferences(&self) -> &Preferences {
        &self.state.answers
    }

    pub fn is_complete(&self) -> bool {
        self.state.current_step.is_last()
    }

    /// Record an answer for the current step.
    ///
    /// Multi-select steps toggle the option; choosing "none" for limitations
    /// clears the others.
    pub fn answer(&mut self, value: &str) -> Result<(), AnswerError> {
        let step = self.state.current_step;
        if step.options().is_empty() {
            return Err(AnswerError::NotAnswerable(step));
        }
        if !step.accepts(value) {
            return Err(AnswerError::UnknownOption {
                step,
                answer: value.to_string(),
            });
        }

        let answers = &mut self.state.answers;
        match step {
            QuestionnaireStep::FitnessGoal => answers.fitness_goal = Some(value.to_string()),
            QuestionnaireStep::ExperienceLevel => {
                answers.experience_level = Some(value.to_string())
            }
            QuestionnaireStep::WorkoutFrequency => {
                answers.workout_frequency = Some(value.to_string())
            }
            QuestionnaireStep::WorkoutDuration => {
                answers.workout_duration = Some(value.to_string())
            }
            QuestionnaireStep::WorkoutTypes => {
                if let Some(t) = workout_type_from_id(value) {
                    toggle(&mut answers.preferred_workout_types, t);
                }
            }
            QuestionnaireStep::Limitations => {
                if value == "none" {
                    answers.limitations = vec!["none".to_string()];
                } else {
                    answers.limitations.retain(|l| l != "none");
                    toggle(&mut answers.limitations, value.to_string());
                }
            }
            QuestionnaireStep::Welcome | QuestionnaireStep::Complete => {}
        }
        Ok(())
    }

    /// Complete the current step and advance.
    pub fn next(&mut self) -> Result<QuestionnaireStep, AnswerError> {
        let step = self.state.current_step;
        if !step.is_skippable() && !self.state.is_answered(step) {
            return Err(AnswerError::Required(step));
        }
        if !self.state.completed_steps.contains(&step) {
            self.state.completed_steps.push(step);
        }
        if let Some(next) = step.next() {
            self.state.current_step = next;
        }
        Ok(self.state.current_step)
    }

    /// Go back to the previous step.
    pub fn back(&mut self) -> QuestionnaireStep {
        if let Some(prev) = self.state.current_step.previous() {
            self.state.current_step = prev;
        }
        self.state.current_step
    }

    /// Skip the current step if it is optional.
    pub fn skip(&mut self) -> Result<QuestionnaireStep, AnswerError> {
        let step = self.state.current_step;
        if !step.is_skippable() {
            return Err(AnswerError::Required(step));
        }
        if let Some(next) = step.next() {
            self.state.current_step = next;
        }
        Ok(self.state.current_step)
    }

    pub fn progress_percent(&self) -> u8 {
        self.state.progress_percent()
    }

    pub fn restart(&mut self) {
        self.state = QuestionnaireState::default();
    }

    pub fn into_preferences(self) -> Preferences {
        self.state.answers
    }
}

fn toggle<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if let Some(pos) = items.iter().position(|i| *i == item) {
        items.remove(pos);
    } else {
        items.push(item);
    }
}

/// Check submitted preferences against the questionnaire.
///
/// Experience, frequency and duration are required; every answer must be one
/// of the offered options.
pub fn validate_preferences(preferences: &Preferences) -> Result<(), AnswerError> {
    let single = [
        (QuestionnaireStep::FitnessGoal, &preferences.fitness_goal),
        (QuestionnaireStep::ExperienceLevel, &preferences.experience_level),
        (QuestionnaireStep::WorkoutFrequency, &preferences.workout_frequency),
        (QuestionnaireStep::WorkoutDuration, &preferences.workout_duration),
    ];
    for (step, value) in single {
        match value {
            Some(v) if !step.accepts(v) => {
                return Err(AnswerError::UnknownOption {
                    step,
                    answer: v.clone(),
                })
            }
            None if !step.is_skippable() => return Err(AnswerError::Required(step)),
            _ => {}
        }
    }
    for limitation in &preferences.limitations {
        if !QuestionnaireStep::Limitations.accepts(limitation) {
            return Err(AnswerError::UnknownOption {
                step: QuestionnaireStep::Limitations,
                answer: limitation.clone(),
            });
        }
    }
    Ok(())
}
