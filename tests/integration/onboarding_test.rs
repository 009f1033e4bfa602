//! Onboarding across outages, cache loss and devices.

use std::sync::Arc;

use fitcoach::coach::{DraftFactory, TemplateGenerator};
use fitcoach::onboarding::{
    complete_onboarding, evaluate_gate, GateOutcome, GateRule, NavigationHints, RemotePresence,
};
use fitcoach::sync::{DataSource, MemoryRecordStore, WriteStatus};

use crate::harness::{ctx, device, preferences};

#[tokio::test]
async fn test_completion_survives_outage_and_cache_clear() {
    let store = Arc::new(MemoryRecordStore::new());
    let phone = device(&store);
    let factory = DraftFactory::new(TemplateGenerator);
    let ctx = ctx("u1");

    store.set_online(false);
    let outcome = complete_onboarding(&phone, &factory, &ctx, preferences())
        .await
        .unwrap();
    assert!(matches!(outcome.plan.remote, WriteStatus::Deferred { .. }));
    assert_eq!(outcome.workouts_created, 1);

    // Right after completion the caller passes the onboarding hints.
    let report = evaluate_gate(&phone, &ctx, outcome.hints).await.unwrap();
    assert_eq!(report.decision.rule, GateRule::ExplicitBypass);

    phone.cache().clear_all(&ctx).unwrap();
    let report = evaluate_gate(&phone, &ctx, NavigationHints::default())
        .await
        .unwrap();
    assert_eq!(report.decision.outcome, GateOutcome::Allow);
    assert_eq!(report.decision.rule, GateRule::LocalFlag);
    assert_eq!(report.signal.remote_has_any_data, RemotePresence::Unknown);
    assert!(matches!(report.source, DataSource::Cache { .. }));
}

#[tokio::test]
async fn test_second_device_sees_onboarding_after_replay() {
    let store = Arc::new(MemoryRecordStore::new());
    let phone = device(&store);
    let tablet = device(&store);
    let factory = DraftFactory::new(TemplateGenerator);
    let ctx = ctx("u1");
    let owner = ctx.owner().unwrap().clone();

    store.set_online(false);
    complete_onboarding(&phone, &factory, &ctx, preferences())
        .await
        .unwrap();

    store.set_online(true);
    let before = evaluate_gate(&tablet, &ctx, NavigationHints::default())
        .await
        .unwrap();
    assert_eq!(before.decision.outcome, GateOutcome::RedirectToOnboarding);

    let flushed = phone.flush(&owner, true).await.unwrap();
    assert_eq!(flushed.remaining, 0);

    let after = evaluate_gate(&tablet, &ctx, NavigationHints::default())
        .await
        .unwrap();
    assert_eq!(after.decision.rule, GateRule::RemoteData);
    assert_eq!(after.snapshot.workout_plan.len(), 1);
    assert!(after.snapshot.preferences.is_some());
    assert!(!after.decision.repair_flag);
}

#[tokio::test]
async fn test_plan_without_flag_is_repaired_once() {
    let store = Arc::new(MemoryRecordStore::new());
    let phone = device(&store);
    let factory = DraftFactory::new(TemplateGenerator);
    let ctx = ctx("u1");

    complete_onboarding(&phone, &factory, &ctx, preferences())
        .await
        .unwrap();
    phone
        .cache()
        .remove(&ctx, fitcoach::storage::CacheKey::OnboardingComplete)
        .unwrap();
    assert!(!phone.cache().onboarding_complete(&ctx).unwrap());

    store.set_online(false);
    let first = evaluate_gate(&phone, &ctx, NavigationHints::default())
        .await
        .unwrap();
    assert_eq!(first.decision.rule, GateRule::LocalPlanData);
    assert!(first.decision.repair_flag);

    let second = evaluate_gate(&phone, &ctx, NavigationHints::default())
        .await
        .unwrap();
    assert_eq!(second.decision.rule, GateRule::LocalFlag);
    assert!(!second.decision.repair_flag);
}
