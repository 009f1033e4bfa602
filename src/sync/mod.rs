//! Remote record store access and reconciliation with the local cache.

pub mod engine;
pub mod http;
pub mod merge;
pub mod queue;
pub mod remote;

pub use engine::{DataSource, FlushReport, LoadReport, ReconciliationEngine, ResetReport, SaveReport};
pub use http::{ConfiguredStore, HttpRecordStore};
pub use queue::{MemoryRetryQueue, PendingOp, PendingWrite, RetryQueue, SqliteRetryQueue};
pub use remote::{MemoryRecordStore, RecordStore};

use crate::records::{Category, RecordError};
use crate::storage::DatabaseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connectivity, authorization or timeout failure talking to the store
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// Payload rejected at the boundary
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Operation needs a signed-in owner
    #[error("No owner for this session")]
    NoOwner,

    /// Local persistence failure
    #[error("Local storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Failures that leave the write eligible for a later retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Record(RecordError::from(err))
    }
}

/// Outcome counts of a save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub created_count: usize,
    pub updated_count: usize,
}

/// What a reset removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetScope {
    /// One category
    Category(Category),
    /// Every category except the history logs
    AllExceptHistory,
}

impl ResetScope {
    /// Wire value for the "all" sentinel.
    pub const ALL_WIRE: &'static str = "all";

    /// Categories this scope may delete. History is never included.
    pub fn categories(&self) -> Vec<Category> {
        match self {
            ResetScope::Category(category) if category.is_history() => Vec::new(),
            ResetScope::Category(category) => vec![*category],
            ResetScope::AllExceptHistory => Category::all()
                .iter()
                .copied()
                .filter(|c| !c.is_history())
                .collect(),
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            ResetScope::Category(category) => category.wire_name(),
            ResetScope::AllExceptHistory => Self::ALL_WIRE,
        }
    }

    pub fn parse(s: &str) -> Result<Self, RecordError> {
        if s == Self::ALL_WIRE {
            Ok(ResetScope::AllExceptHistory)
        } else {
            Ok(ResetScope::Category(s.parse()?))
        }
    }
}

/// Result of a reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub deleted_count: usize,
    pub categories: Vec<Category>,
}

/// Remote outcome of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WriteStatus {
    /// Remote store accepted the write
    Synced,
    /// Queued for retry; the local cache already has it
    Deferred { reason: String },
    /// Exhausted retries or rejected by the store
    Failed { reason: String },
    /// No owner yet, so nothing to send
    LocalOnly,
}

impl WriteStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, WriteStatus::Synced)
    }

    /// Non-blocking notice for the user, if any.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            WriteStatus::Synced | WriteStatus::LocalOnly => None,
            WriteStatus::Deferred { .. } => Some("Saved on this device; will sync when online"),
            WriteStatus::Failed { .. } => Some("Saved on this device; syncing has not succeeded yet"),
        }
    }
}

impl std::fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStatus::Synced => write!(f, "synced"),
            WriteStatus::Deferred { reason } => write!(f, "deferred ({})", reason),
            WriteStatus::Failed { reason } => write!(f, "failed ({})", reason),
            WriteStatus::LocalOnly => write!(f, "local only"),
        }
    }
}
