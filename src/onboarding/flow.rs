//! Onboarding flows that touch the cache and the record store.

use futures::future::join_all;
use serde::Serialize;

use super::gate::{resolve, GateDecision, NavigationHints, OnboardingSignal};
use super::validate_preferences;
use crate::coach::{ContentGenerator, DraftClass, DraftContent, DraftFactory, GenerationRequest};
use crate::records::{CategoryPayload, Preferences, RecordError, UserSnapshot, WorkoutType};
use crate::session::SessionContext;
use crate::storage::CacheKey;
use crate::sync::{
    DataSource, ReconciliationEngine, RecordStore, ResetReport, ResetScope, RetryQueue,
    SaveReport, SyncError,
};

/// Most workouts generated for a new plan.
pub const MAX_ONBOARDING_WORKOUTS: usize = 3;

/// Result of a gate check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateReport {
    pub decision: GateDecision,
    pub signal: OnboardingSignal,
    pub source: DataSource,
    /// Data for the plan view when allowed
    pub snapshot: UserSnapshot,
}

/// Load the owner's data and decide whether the plan view may be shown.
///
/// Repairs the onboarding flag when plan data exists without it.
pub async fn evaluate_gate<S, Q>(
    engine: &ReconciliationEngine<S, Q>,
    ctx: &SessionContext,
    hints: NavigationHints,
) -> Result<GateReport, SyncError>
where
    S: RecordStore,
    Q: RetryQueue,
{
    let load = engine.load(ctx).await?;

    let signal = OnboardingSignal {
        local_flag: engine.cache().onboarding_complete(ctx)?,
        local_has_plan_data: load.snapshot.has_plan_data(),
        remote_has_any_data: load.remote,
        came_from_onboarding_flow: hints.came_from_onboarding_flow,
        explicit_bypass: hints.explicit_bypass,
    };
    let decision = resolve(&signal);

    if decision.repair_flag {
        engine.cache().set(ctx, CacheKey::OnboardingComplete, &true)?;
        tracing::info!("Repaired onboarding flag for session {}", ctx.namespace());
    }
    tracing::debug!("Gate {:?} by rule: {}", decision.outcome, decision.rule);

    Ok(GateReport {
        decision,
        signal,
        source: load.source,
        snapshot: load.snapshot,
    })
}

/// Result of completing onboarding.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingOutcome {
    pub preferences: SaveReport,
    pub plan: SaveReport,
    pub workouts_created: usize,
    /// Pass to the next gate check
    pub hints: NavigationHints,
}

fn onboarding_request(preferences: &Preferences, workout_type: WorkoutType) -> GenerationRequest {
    let mut text = format!("A {} workout", workout_type);
    if let Some(goal) = &preferences.fitness_goal {
        text.push_str(&format!(" to {}", goal.replace('-', " ")));
    }
    if let Some(duration) = &preferences.workout_duration {
        text.push_str(&format!(", {} minutes", duration));
    }
    GenerationRequest::new(DraftClass::Workout, text)
        .with_workout_type(workout_type)
        .with_preferences(preferences)
}

/// Save questionnaire answers with an initial workout plan and mark
/// onboarding complete.
pub async fn complete_onboarding<S, Q, G>(
    engine: &ReconciliationEngine<S, Q>,
    factory: &DraftFactory<G>,
    ctx: &SessionContext,
    preferences: Preferences,
) -> Result<OnboardingOutcome, SyncError>
where
    S: RecordStore,
    Q: RetryQueue,
    G: ContentGenerator,
{
    validate_preferences(&preferences)
        .map_err(|e| SyncError::Record(RecordError::MalformedPayload(e.to_string())))?;

    let types: Vec<WorkoutType> = if preferences.preferred_workout_types.is_empty() {
        WorkoutType::all().to_vec()
    } else {
        preferences.preferred_workout_types.clone()
    };
    let requests: Vec<GenerationRequest> = types
        .into_iter()
        .take(MAX_ONBOARDING_WORKOUTS)
        .map(|t| onboarding_request(&preferences, t))
        .collect();

    let drafts = join_all(requests.iter().map(|r| factory.draft(r))).await;
    let workouts: Vec<_> = drafts
        .into_iter()
        .filter_map(|d| match d.content {
            DraftContent::Workout(w) => Some(w),
            DraftContent::Diet(_) => None,
        })
        .collect();
    let workouts_created = workouts.len();

    let preferences = engine
        .save(ctx, CategoryPayload::Preferences(preferences))
        .await?;
    let plan = engine
        .save(ctx, CategoryPayload::WorkoutPlan(workouts))
        .await?;
    engine.cache().set(ctx, CacheKey::OnboardingComplete, &true)?;

    tracing::info!(
        "Onboarding complete for session {} with {} workouts",
        ctx.namespace(),
        workouts_created
    );

    Ok(OnboardingOutcome {
        preferences,
        plan,
        workouts_created,
        hints: NavigationHints::after_onboarding(),
    })
}

/// Clear plans and preferences so the user can onboard again. History stays.
pub async fn reset_for_reonboarding<S, Q>(
    engine: &ReconciliationEngine<S, Q>,
    ctx: &SessionContext,
) -> Result<ResetReport, SyncError>
where
    S: RecordStore,
    Q: RetryQueue,
{
    let report = engine.reset(ctx, ResetScope::AllExceptHistory).await?;
    engine.cache().remove(ctx, CacheKey::OnboardingComplete)?;
    tracing::info!("Reset onboarding for session {}", ctx.namespace());
    Ok(report)
}
