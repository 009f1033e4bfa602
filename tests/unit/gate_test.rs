//! Onboarding gate decision table.

use fitcoach::onboarding::{
    resolve, GateOutcome, GateRule, NavigationHints, OnboardingSignal, RemotePresence,
};

fn signal() -> OnboardingSignal {
    OnboardingSignal::default()
}

#[test]
fn test_remote_data_alone_allows() {
    let decision = resolve(&OnboardingSignal {
        remote_has_any_data: RemotePresence::Present,
        ..signal()
    });
    assert_eq!(decision.outcome, GateOutcome::Allow);
}

#[test]
fn test_all_false_redirects() {
    let decision = resolve(&OnboardingSignal {
        remote_has_any_data: RemotePresence::Absent,
        ..signal()
    });
    assert_eq!(decision.outcome, GateOutcome::RedirectToOnboarding);
    assert_eq!(decision.rule, GateRule::NoSignal);
}

#[test]
fn test_unknown_remote_with_local_flag_allows() {
    let decision = resolve(&OnboardingSignal {
        remote_has_any_data: RemotePresence::Unknown,
        local_flag: true,
        ..signal()
    });
    assert!(decision.is_allowed());
    assert_eq!(decision.rule, GateRule::LocalFlag);
}

#[test]
fn test_unknown_remote_without_local_signal_redirects() {
    let decision = resolve(&signal());
    assert_eq!(decision.outcome, GateOutcome::RedirectToOnboarding);
}

#[test]
fn test_rules_apply_in_order() {
    let hints = NavigationHints::after_onboarding();
    let decision = resolve(&OnboardingSignal {
        explicit_bypass: hints.explicit_bypass,
        came_from_onboarding_flow: hints.came_from_onboarding_flow,
        remote_has_any_data: RemotePresence::Absent,
        ..signal()
    });
    assert_eq!(decision.rule, GateRule::ExplicitBypass);

    let decision = resolve(&OnboardingSignal {
        came_from_onboarding_flow: true,
        ..signal()
    });
    assert_eq!(decision.rule, GateRule::CameFromOnboarding);

    let decision = resolve(&OnboardingSignal {
        remote_has_any_data: RemotePresence::Present,
        local_flag: true,
        local_has_plan_data: true,
        ..signal()
    });
    assert_eq!(decision.rule, GateRule::RemoteData);
    assert!(!decision.repair_flag);
}

#[test]
fn test_plan_data_without_flag_repairs() {
    let decision = resolve(&OnboardingSignal {
        local_has_plan_data: true,
        remote_has_any_data: RemotePresence::Unknown,
        ..signal()
    });
    assert!(decision.is_allowed());
    assert_eq!(decision.rule, GateRule::LocalPlanData);
    assert!(decision.repair_flag);

    // The flag alone never asks for a repair.
    let decision = resolve(&OnboardingSignal {
        local_flag: true,
        local_has_plan_data: true,
        ..signal()
    });
    assert_eq!(decision.rule, GateRule::LocalFlag);
    assert!(!decision.repair_flag);
}
