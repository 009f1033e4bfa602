//! Keyword classification of chat input.

use super::DraftClass;
use crate::records::{DietType, WorkoutType};

const WORKOUT_KEYWORDS: &[&str] = &[
    "workout", "routine", "plan", "exercise", "abs", "cardio", "leg", "training", "hiit", "yoga",
    "stretch",
];

const DIET_KEYWORDS: &[&str] = &[
    "diet", "meal", "nutrition", "eat", "food", "calorie", "recipe", "keto", "vegan", "paleo",
    "fasting",
];

const AFFIRMATIVE: &[&str] = &[
    "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "confirm", "absolutely", "definitely",
];

// "add" alone also starts new requests ("add a diet plan too").
const AFFIRMATIVE_PHRASES: &[&str] = &[
    "sounds good",
    "go ahead",
    "do it",
    "looks good",
    "add it",
    "add this",
    "add that",
];

const NEGATION: &[&str] = &[
    "no", "not", "dont", "nope", "nah", "never", "without", "cant", "cannot", "wont", "avoid",
];

/// Words that introduce the thing to avoid: "no dairy", "without nuts".
const EXCLUSION_MARKERS: &[&str] = &["no", "without", "avoid", "skip", "exclude"];

/// Words that introduce an allergen or intolerance: "allergic to shellfish".
const ALLERGY_MARKERS: &[&str] = &["allergic", "intolerant", "allergy"];

/// Standalone restriction words.
const RESTRICTION_WORDS: &[&str] = &[
    "gluten", "dairy", "lactose", "nuts", "peanut", "peanuts", "shellfish", "soy", "eggs",
    "vegetarian", "vegan", "halal", "kosher", "knee", "knees", "shoulder", "shoulders",
    "wrist", "ankle", "hip", "injury", "injured", "pain", "pregnant", "equipment",
];

/// Words that never name a restriction after a marker.
const FILLER: &[&str] = &[
    "thanks", "thank", "thx", "way", "not", "it", "this", "that", "the", "a", "an", "more",
    "worries", "problem", "need", "i", "im", "please", "sorry", "one", "good", "to", "any", "me",
    "of", "with", "and", "but", "want", "like", "something", "else", "other", "different",
    "really", "just", "think", "now", "later", "thats",
];

/// Lowercased words with apostrophes removed.
pub fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\'', "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_prefix_match(tokens: &[String], keywords: &[&str]) -> bool {
    tokens
        .iter()
        .any(|t| keywords.iter().any(|k| t.starts_with(k)))
}

fn has_token(tokens: &[String], words: &[&str]) -> bool {
    tokens.iter().any(|t| words.contains(&t.as_str()))
}

/// Draft class the user is asking for, if any. Diet wins when both match.
pub fn classify(text: &str) -> Option<DraftClass> {
    let tokens = tokens(text);
    if has_prefix_match(&tokens, DIET_KEYWORDS) {
        Some(DraftClass::Diet)
    } else if has_prefix_match(&tokens, WORKOUT_KEYWORDS) {
        Some(DraftClass::Workout)
    } else {
        None
    }
}

/// Whether `text` names the other kind of plan than `class` and not `class`
/// itself. Generic words like "plan" count for neither.
pub fn asks_for_other(text: &str, class: DraftClass) -> bool {
    let tokens = tokens(text);
    let specific = |keywords: &[&str]| {
        tokens
            .iter()
            .any(|t| keywords.iter().any(|k| *k != "plan" && t.starts_with(k)))
    };
    let (own, other) = match class {
        DraftClass::Workout => (WORKOUT_KEYWORDS, DIET_KEYWORDS),
        DraftClass::Diet => (DIET_KEYWORDS, WORKOUT_KEYWORDS),
    };
    specific(other) && !specific(own)
}

pub fn has_negation(text: &str) -> bool {
    has_token(&tokens(text), NEGATION)
}

/// Confirmation of a pending draft. Any negation disqualifies.
pub fn is_affirmative(text: &str) -> bool {
    let tokens = tokens(text);
    if has_token(&tokens, NEGATION) {
        return false;
    }
    if has_token(&tokens, AFFIRMATIVE) {
        return true;
    }
    let joined = tokens.join(" ");
    AFFIRMATIVE_PHRASES.iter().any(|p| joined.contains(p))
}

/// Dietary or physical restrictions mentioned in `text`, in order.
pub fn extract_restrictions(text: &str) -> Vec<String> {
    let tokens = tokens(text);
    let mut found: Vec<String> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let token = token.as_str();
        if EXCLUSION_MARKERS.contains(&token) || ALLERGY_MARKERS.contains(&token) {
            let target = tokens[i + 1..]
                .iter()
                .take(2)
                .find(|t| !FILLER.contains(&t.as_str()))
                .filter(|t| {
                    let t = t.as_str();
                    !EXCLUSION_MARKERS.contains(&t)
                        && !ALLERGY_MARKERS.contains(&t)
                        && !NEGATION.contains(&t)
                });
            if let Some(target) = target {
                push_unique(&mut found, format!("no {}", target));
            }
        } else if RESTRICTION_WORDS.contains(&token) && !found.iter().any(|r| r.ends_with(token)) {
            push_unique(&mut found, token.to_string());
        }
    }
    found
}

fn push_unique(found: &mut Vec<String>, restriction: String) {
    if !found.contains(&restriction) {
        found.push(restriction);
    }
}

pub fn has_restriction_language(text: &str) -> bool {
    !extract_restrictions(text).is_empty()
}

pub fn detect_workout_type(text: &str) -> Option<WorkoutType> {
    let tokens = tokens(text);
    if has_token(&tokens, &["abs", "core"]) {
        Some(WorkoutType::Core)
    } else if has_token(&tokens, &["cardio", "hiit"]) {
        Some(WorkoutType::Hiit)
    } else if has_prefix_match(&tokens, &["stretch", "yoga", "flexib"]) {
        Some(WorkoutType::Yoga)
    } else if has_prefix_match(&tokens, &["strength", "muscle", "lift"]) {
        Some(WorkoutType::Strength)
    } else {
        None
    }
}

pub fn detect_diet_type(text: &str) -> Option<DietType> {
    let joined = tokens(text).join(" ");
    if joined.contains("keto") || joined.contains("low carb") {
        Some(DietType::Keto)
    } else if joined.contains("vegan") || joined.contains("plant based") {
        Some(DietType::Vegan)
    } else if joined.contains("paleo") || joined.contains("caveman") {
        Some(DietType::Paleo)
    } else if joined.contains("intermittent") || joined.contains("fasting") {
        Some(DietType::Intermittent)
    } else if joined.contains("balanced") {
        Some(DietType::Balanced)
    } else {
        None
    }
}

/// Body area the user mentioned.
pub fn detect_focus_area(text: &str) -> Option<&'static str> {
    let tokens = tokens(text);
    if has_token(&tokens, &["abs", "core"]) {
        Some("Core")
    } else if has_prefix_match(&tokens, &["leg", "glute", "squat"]) {
        Some("Lower Body")
    } else if has_prefix_match(&tokens, &["arm", "chest", "shoulder", "bicep", "tricep"]) {
        Some("Upper Body")
    } else if has_token(&tokens, &["cardio", "hiit", "endurance"]) {
        Some("Cardio")
    } else {
        None
    }
}

/// Difficulty implied by the wording.
pub fn detect_intensity(text: &str) -> Option<&'static str> {
    let tokens = tokens(text);
    if has_token(&tokens, &["easy", "beginner", "gentle", "light"]) {
        Some("Beginner")
    } else if has_token(&tokens, &["hard", "intense", "advanced", "challenging", "brutal"]) {
        Some("Advanced")
    } else {
        None
    }
}

/// Generation prompt built from the request and accumulated restrictions.
pub fn enrich_prompt(class: DraftClass, text: &str, restrictions: &[String]) -> String {
    let mut prompt = text.trim().to_string();

    match class {
        DraftClass::Workout => {
            if let Some(area) = detect_focus_area(text) {
                prompt.push_str(&format!("\nFocus area: {}.", area));
            }
            if let Some(level) = detect_intensity(text) {
                prompt.push_str(&format!("\nDifficulty: {}.", level));
            }
        }
        DraftClass::Diet => {
            if let Some(diet) = detect_diet_type(text) {
                prompt.push_str(&format!("\nDiet type: {}.", diet));
            }
        }
    }

    if !restrictions.is_empty() {
        prompt.push_str(&format!(
            "\nThe user has these restrictions, respect all of them: {}.",
            restrictions.join(", ")
        ));
    }
    prompt
}
