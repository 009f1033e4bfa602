//! Deterministic templates used when the generator fails.

use super::generator::GenerationRequest;
use super::{DraftClass, DraftContent};
use crate::records::{DietPlan, DietType, ItemId, Meal, MealType, Workout, WorkoutType};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn fallback_workout(workout_type: WorkoutType) -> Workout {
    let (title, description, difficulty, duration, exercises) =
        match workout_type {
            WorkoutType::Core => (
                "Core Crusher Workout",
                "A focused abdominal workout to strengthen your core and improve stability.",
                "Intermediate",
                "25-30 min",
                strings(&[
                    "3 sets of 20 crunches",
                    "3 sets of 30-second planks",
                    "3 sets of 15 Russian twists",
                    "3 sets of 12 leg raises",
                    "3 sets of 20 bicycle crunches",
                    "3 sets of 15 mountain climbers",
                ]),
            ),
            WorkoutType::Hiit => (
                "Quick HIIT Burner",
                "High-intensity interval training to boost cardio fitness and burn calories.",
                "Intermediate",
                "20-25 min",
                strings(&[
                    "30 sec jumping jacks, 15 sec rest",
                    "30 sec high knees, 15 sec rest",
                    "30 sec burpees, 15 sec rest",
                    "30 sec mountain climbers, 15 sec rest",
                    "30 sec squat jumps, 15 sec rest",
                    "Repeat circuit 4 times",
                ]),
            ),
            WorkoutType::Yoga => (
                "Flexibility Flow",
                "A yoga flow to improve flexibility and balance while reducing stress.",
                "Beginner",
                "30-35 min",
                strings(&[
                    "5 min warm-up with gentle stretches",
                    "5 min sun salutations",
                    "1 min each side warrior II pose",
                    "1 min each side triangle pose",
                    "5 min balance poses",
                    "5 min seated stretches",
                    "5 min final relaxation",
                ]),
            ),
            WorkoutType::Strength => (
                "Full Body Strength",
                "A balanced strength training workout targeting all major muscle groups.",
                "Intermediate",
                "40-45 min",
                strings(&[
                    "3 sets of 12 squats",
                    "3 sets of 10 push-ups",
                    "3 sets of 10 dumbbell rows",
                    "3 sets of 10 lunges per leg",
                    "3 sets of 10 shoulder presses",
                    "3 sets of 10 glute bridges",
                    "3 sets of 30-second planks",
                ]),
            ),
        };

    Workout {
        id: ItemId::generate(),
        title: title.to_string(),
        description: description.to_string(),
        workout_type,
        difficulty: difficulty.to_string(),
        duration: duration.to_string(),
        exercises,
        focus_area: None,
    }
}

fn meal(meal_type: MealType, title: &str, description: &str, ingredients: &[&str]) -> Meal {
    Meal {
        meal_type,
        title: title.to_string(),
        description: description.to_string(),
        ingredients: strings(ingredients),
    }
}

pub fn fallback_diet(diet_type: DietType) -> DietPlan {
    let (title, description, calorie_range, meals) = match diet_type {
        DietType::Keto => (
            "Low-Carb Keto Diet Plan",
            "High fat, moderate protein and very low carbohydrates to promote ketosis.",
            "1800-2200",
            vec![
                meal(
                    MealType::Breakfast,
                    "Avocado & Egg Bowl",
                    "A hearty breakfast bowl with healthy fats.",
                    &["2 eggs", "1/2 avocado", "2 strips bacon", "1/4 cup spinach"],
                ),
                meal(
                    MealType::Lunch,
                    "Keto Cobb Salad",
                    "A filling salad with plenty of protein and healthy fats.",
                    &["2 cups mixed greens", "4 oz grilled chicken", "1 hard-boiled egg", "1/2 avocado"],
                ),
                meal(
                    MealType::Dinner,
                    "Butter-Basted Steak & Vegetables",
                    "Protein with low-carb vegetables.",
                    &["6 oz ribeye steak", "1 tbsp butter", "1 cup roasted broccoli"],
                ),
                meal(
                    MealType::Snack,
                    "Keto Fat Bombs",
                    "A quick energy boost with healthy fats.",
                    &["2 tbsp coconut oil", "1 tbsp almond butter", "1 tbsp cocoa powder"],
                ),
            ],
        ),
        DietType::Vegan => (
            "Plant-Based Vegan Meal Plan",
            "Complete plant protein sources and essential nutrients without animal products.",
            "1800-2200",
            vec![
                meal(
                    MealType::Breakfast,
                    "Berry Protein Smoothie Bowl",
                    "A protein-rich breakfast to fuel your morning.",
                    &["1 banana", "1 cup mixed berries", "1 scoop plant protein", "1 tbsp chia seeds"],
                ),
                meal(
                    MealType::Lunch,
                    "Quinoa Buddha Bowl",
                    "Complete protein with diverse vegetables.",
                    &["1 cup cooked quinoa", "1/2 cup roasted chickpeas", "1 cup mixed vegetables"],
                ),
                meal(
                    MealType::Dinner,
                    "Lentil & Vegetable Curry",
                    "A warming, protein-rich dinner.",
                    &["1 cup cooked lentils", "2 cups mixed vegetables", "1 can coconut milk"],
                ),
                meal(
                    MealType::Snack,
                    "Hummus & Veggie Sticks",
                    "Protein and fiber.",
                    &["1/4 cup hummus", "Carrot sticks", "Cucumber slices"],
                ),
            ],
        ),
        DietType::Paleo => (
            "Hunter-Gatherer Paleo Plan",
            "Whole, unprocessed foods modelled on ancestral eating patterns.",
            "2000-2400",
            vec![
                meal(
                    MealType::Breakfast,
                    "Sweet Potato Hash with Eggs",
                    "Quality protein and unprocessed carbs.",
                    &["2 eggs", "1 medium sweet potato", "1/4 onion", "1/2 bell pepper"],
                ),
                meal(
                    MealType::Lunch,
                    "Grilled Chicken & Vegetable Bowl",
                    "Lean protein and seasonal vegetables.",
                    &["5 oz grilled chicken breast", "2 cups mixed greens", "1/2 avocado"],
                ),
                meal(
                    MealType::Dinner,
                    "Grass-Fed Beef & Roasted Vegetables",
                    "Quality protein and vegetables.",
                    &["5 oz grass-fed beef", "2 cups roasted vegetables", "1 tbsp ghee"],
                ),
                meal(
                    MealType::Snack,
                    "Mixed Nuts & Berries",
                    "A simple, nutrient-dense snack.",
                    &["1/4 cup mixed nuts", "1/2 cup mixed berries"],
                ),
            ],
        ),
        DietType::Intermittent => (
            "16/8 Intermittent Fasting Plan",
            "An 8-hour eating window followed by a 16-hour fast.",
            "1800-2200",
            vec![
                meal(
                    MealType::Breakfast,
                    "Breaking Fast Protein Bowl (12pm)",
                    "A nutrient-dense meal to break your fast.",
                    &["3 eggs scrambled", "1/2 avocado", "1/2 cup sweet potato", "1 cup spinach"],
                ),
                meal(
                    MealType::Lunch,
                    "Hearty Protein & Greens (3pm)",
                    "A satisfying mid-day meal.",
                    &["5 oz grilled chicken or tofu", "2 cups mixed greens", "1/4 cup quinoa"],
                ),
                meal(
                    MealType::Dinner,
                    "Balanced Evening Meal (7pm)",
                    "The final meal before the fast.",
                    &["5 oz salmon", "1 cup broccoli", "1/2 cup brown rice"],
                ),
                meal(
                    MealType::Note,
                    "Fasting Window (8pm-12pm)",
                    "Only water, black coffee or unsweetened tea.",
                    &["Water", "Black coffee", "Unsweetened tea"],
                ),
            ],
        ),
        DietType::Balanced => (
            "Balanced Nutrition Plan",
            "Balanced macronutrients for overall health and energy.",
            "1800-2200",
            vec![
                meal(
                    MealType::Breakfast,
                    "Greek Yogurt Breakfast Bowl",
                    "Protein with complex carbohydrates.",
                    &["1 cup Greek yogurt", "1/4 cup granola", "1/2 cup mixed berries"],
                ),
                meal(
                    MealType::Lunch,
                    "Mediterranean Chicken Wrap",
                    "Lean protein, whole grains and vegetables.",
                    &["4 oz grilled chicken", "1 whole grain wrap", "1/4 cup hummus"],
                ),
                meal(
                    MealType::Dinner,
                    "Baked Salmon with Quinoa & Vegetables",
                    "Lean protein, complex carbs and fiber.",
                    &["5 oz salmon fillet", "1/2 cup cooked quinoa", "1 cup roasted vegetables"],
                ),
                meal(
                    MealType::Snack,
                    "Apple with Almond Butter",
                    "Fiber and healthy fats.",
                    &["1 medium apple", "1 tbsp almond butter"],
                ),
            ],
        ),
    };

    DietPlan {
        id: ItemId::generate(),
        title: title.to_string(),
        description: description.to_string(),
        diet_type,
        calorie_range: calorie_range.to_string(),
        meals,
    }
}

/// Template draft for a request, tailored with whatever the request states.
pub fn fallback_for(request: &GenerationRequest) -> DraftContent {
    let note = if request.restrictions.is_empty() {
        None
    } else {
        Some(format!(" Adjusted for: {}.", request.restrictions.join(", ")))
    };

    match request.class {
        DraftClass::Workout => {
            let mut workout = fallback_workout(request.workout_type.unwrap_or_default());
            workout.focus_area = request.focus_area.clone();
            if let Some(level) = &request.difficulty {
                workout.difficulty = level.clone();
            }
            if let Some(note) = note {
                workout.description.push_str(&note);
            }
            DraftContent::Workout(workout)
        }
        DraftClass::Diet => {
            let mut diet = fallback_diet(request.diet_type.unwrap_or_default());
            if let Some(note) = note {
                diet.description.push_str(&note);
            }
            DraftContent::Diet(diet)
        }
    }
}
