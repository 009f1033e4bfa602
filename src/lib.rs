//! FitCoach - offline-tolerant data core for a personal fitness and
//! nutrition coach.
//!
//! Keeps a device-local cache consistent with a remote record store, decides
//! whether a user still needs onboarding, and runs the draft/confirm
//! conversation through which the coach adds workouts and meal plans.

pub mod api;
pub mod coach;
pub mod onboarding;
pub mod records;
pub mod session;
pub mod storage;
pub mod sync;

// Re-export commonly used types
pub use api::{Api, ApiError, DataRequest, DataResponse};
pub use coach::{Coach, Conversation, DraftFactory};
pub use onboarding::{resolve, GateDecision, OnboardingQuestionnaire, OnboardingSignal};
pub use records::{Category, CategoryPayload, OwnerId, UserSnapshot};
pub use session::SessionContext;
pub use storage::{AppConfig, LocalCache};
pub use sync::{ReconciliationEngine, SyncError, WriteStatus};
