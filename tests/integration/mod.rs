//! Integration test modules.

mod api_test;
mod degraded_mode_test;
mod draft_lifecycle_test;
mod harness;
mod http_store_test;
mod onboarding_test;
mod persistence_test;
mod reconciliation_test;
