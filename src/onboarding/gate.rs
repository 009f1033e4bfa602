//! Onboarding gate: decides whether the main plan view may be shown or the
//! user must go through onboarding first.
//!
//! [`resolve`] is a pure ordered decision table over an [`OnboardingSignal`];
//! the first matching rule wins.

use serde::{Deserialize, Serialize};

/// What the remote store told us about the owner's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemotePresence {
    /// Fetch succeeded and at least one category has data
    Present,
    /// Fetch succeeded and every category is empty
    Absent,
    /// Fetch failed or was not attempted
    #[default]
    Unknown,
}

impl RemotePresence {
    pub fn from_fetch(has_any_data: bool) -> Self {
        if has_any_data {
            RemotePresence::Present
        } else {
            RemotePresence::Absent
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RemotePresence::Unknown)
    }
}

/// Point-in-time inputs to the gate. Recomputed on every evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSignal {
    pub local_flag: bool,
    pub local_has_plan_data: bool,
    pub remote_has_any_data: RemotePresence,
    pub came_from_onboarding_flow: bool,
    pub explicit_bypass: bool,
}

/// Navigation provenance supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationHints {
    #[serde(default)]
    pub came_from_onboarding_flow: bool,
    #[serde(default)]
    pub explicit_bypass: bool,
}

impl NavigationHints {
    /// Hint set right after onboarding completes.
    pub fn after_onboarding() -> Self {
        Self {
            came_from_onboarding_flow: true,
            explicit_bypass: true,
        }
    }
}

/// Gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateOutcome {
    Allow,
    RedirectToOnboarding,
}

/// Which rule decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateRule {
    ExplicitBypass,
    CameFromOnboarding,
    RemoteData,
    LocalFlag,
    LocalPlanData,
    NoSignal,
}

impl GateRule {
    pub fn description(&self) -> &'static str {
        match self {
            GateRule::ExplicitBypass => "explicit bypass",
            GateRule::CameFromOnboarding => "arrived from onboarding",
            GateRule::RemoteData => "remote store has data",
            GateRule::LocalFlag => "onboarding flag set",
            GateRule::LocalPlanData => "cached plan data without flag",
            GateRule::NoSignal => "no completion signal",
        }
    }
}

impl std::fmt::Display for GateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Result of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub outcome: GateOutcome,
    pub rule: GateRule,
    /// The durable flag should be rewritten
    pub repair_flag: bool,
}

impl GateDecision {
    fn allow(rule: GateRule) -> Self {
        Self {
            outcome: GateOutcome::Allow,
            rule,
            repair_flag: false,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == GateOutcome::Allow
    }
}

/// Decide redirect-vs-allow.
///
/// Remote presence only counts when known; an unknown remote falls through
/// to the local rules.
pub fn resolve(signal: &OnboardingSignal) -> GateDecision {
    if signal.explicit_bypass {
        return GateDecision::allow(GateRule::ExplicitBypass);
    }
    if signal.came_from_onboarding_flow {
        return GateDecision::allow(GateRule::CameFromOnboarding);
    }
    if signal.remote_has_any_data == RemotePresence::Present {
        return GateDecision::allow(GateRule::RemoteData);
    }
    if signal.local_flag {
        return GateDecision::allow(GateRule::LocalFlag);
    }
    if signal.local_has_plan_data {
        return GateDecision {
            outcome: GateOutcome::Allow,
            rule: GateRule::LocalPlanData,
            repair_flag: true,
        };
    }
    GateDecision {
        outcome: GateOutcome::RedirectToOnboarding,
        rule: GateRule::NoSignal,
        repair_flag: false,
    }
}
