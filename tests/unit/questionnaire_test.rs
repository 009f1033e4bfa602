//! Onboarding questionnaire.

use fitcoach::onboarding::{
    validate_preferences, AnswerError, OnboardingQuestionnaire, QuestionnaireStep,
};
use fitcoach::records::WorkoutType;

fn answered() -> OnboardingQuestionnaire {
    let mut q = OnboardingQuestionnaire::new();
    q.next().unwrap();
    for answer in ["lose-weight", "intermediate", "2-3", "15-30"] {
        q.answer(answer).unwrap();
        q.next().unwrap();
    }
    q
}

#[test]
fn test_progress_counts_completed_steps() {
    let mut q = OnboardingQuestionnaire::new();
    assert_eq!(q.progress_percent(), 0);
    q.next().unwrap();
    assert_eq!(q.progress_percent(), 12);

    let q = answered();
    assert_eq!(q.current_step(), QuestionnaireStep::WorkoutTypes);
    assert_eq!(q.progress_percent(), 62);
}

#[test]
fn test_optional_steps_can_be_skipped() {
    let mut q = answered();
    assert_eq!(q.skip().unwrap(), QuestionnaireStep::Limitations);
    assert_eq!(q.skip().unwrap(), QuestionnaireStep::Complete);
    assert!(q.is_complete());

    let prefs = q.into_preferences();
    assert!(prefs.preferred_workout_types.is_empty());
    assert!(validate_preferences(&prefs).is_ok());
}

#[test]
fn test_multi_select_toggles() {
    let mut q = answered();
    q.answer("strength").unwrap();
    q.answer("hiit").unwrap();
    q.answer("strength").unwrap();
    assert_eq!(q.preferences().preferred_workout_types, vec![WorkoutType::Hiit]);
    q.next().unwrap();

    q.answer("none").unwrap();
    q.answer("back").unwrap();
    assert_eq!(q.preferences().limitations, vec!["back".to_string()]);
}

#[test]
fn test_answers_must_be_offered_options() {
    let mut q = answered();
    assert_eq!(
        q.answer("pilates"),
        Err(AnswerError::UnknownOption {
            step: QuestionnaireStep::WorkoutTypes,
            answer: "pilates".to_string(),
        })
    );

    let mut prefs = answered().into_preferences();
    prefs.workout_frequency = Some("daily".to_string());
    assert!(matches!(
        validate_preferences(&prefs),
        Err(AnswerError::UnknownOption { .. })
    ));
}

#[test]
fn test_restart_clears_answers() {
    let mut q = answered();
    q.restart();
    assert_eq!(q.current_step(), QuestionnaireStep::Welcome);
    assert!(q.preferences().fitness_goal.is_none());
}
