//! Unit test modules.

mod conversation_test;
mod gate_test;
mod merge_policy_test;
mod questionnaire_test;
