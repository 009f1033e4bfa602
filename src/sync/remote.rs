//! Authoritative record store interface and the in-process implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use super::merge::{replace_set, upsert_retain};
use super::{ResetScope, ResetSummary, SaveSummary, SyncError};
use crate::records::{CategoryPayload, MergePolicy, OwnerId, Record, UserSnapshot};

/// Remote document store holding every owner's records.
///
/// Implementations must make each operation idempotent under retry.
pub trait RecordStore: Send + Sync {
    /// Current value of every category for `owner`.
    fn fetch(
        &self,
        owner: &OwnerId,
    ) -> impl std::future::Future<Output = Result<UserSnapshot, SyncError>> + Send;

    /// Merge `payload` into the owner's records using its category's policy.
    fn save(
        &self,
        owner: &OwnerId,
        payload: &CategoryPayload,
    ) -> impl std::future::Future<Output = Result<SaveSummary, SyncError>> + Send;

    /// Delete the owner's records in `scope`. History is never deleted.
    fn reset(
        &self,
        owner: &OwnerId,
        scope: ResetScope,
    ) -> impl std::future::Future<Output = Result<ResetSummary, SyncError>> + Send;
}

/// In-process record store.
///
/// Applies the same merge policies as a real deployment. Tests use the
/// outage toggle and the artificial latency to drive degraded paths.
pub struct MemoryRecordStore {
    records: Mutex<HashMap<OwnerId, Vec<Record>>>,
    online: AtomicBool,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            latency: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    /// Delay applied to every subsequent call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Number of operations attempted so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Stored records for an owner, for inspection.
    pub fn records(&self, owner: &OwnerId) -> Vec<Record> {
        self.lock().get(owner).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<OwnerId, Vec<Record>>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<(), SyncError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.is_online() {
            Ok(())
        } else {
            Err(SyncError::StoreUnavailable("store offline".to_string()))
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    async fn fetch(&self, owner: &OwnerId) -> Result<UserSnapshot, SyncError> {
        self.enter().await?;
        let records = self.lock();
        Ok(records
            .get(owner)
            .map(UserSnapshot::from_records)
            .unwrap_or_default())
    }

    async fn save(&self, owner: &OwnerId, payload: &CategoryPayload) -> Result<SaveSummary, SyncError> {
        payload.validate()?;
        self.enter().await?;

        let category = payload.category();
        let incoming = payload.clone().into_records(owner, Utc::now());

        let mut records = self.lock();
        let rows = records.entry(owner.clone()).or_default();
        let (stored, mut kept): (Vec<Record>, Vec<Record>) =
            rows.drain(..).partition(|r| r.category == category);

        let (merged, summary) = match category.merge_policy() {
            MergePolicy::ReplaceSet => replace_set(&stored, incoming),
            MergePolicy::AppendUpsert | MergePolicy::SingletonUpsert => {
                upsert_retain(stored, incoming)
            }
        };

        kept.extend(merged);
        *rows = kept;
        Ok(summary)
    }

    async fn reset(&self, owner: &OwnerId, scope: ResetScope) -> Result<ResetSummary, SyncError> {
        self.enter().await?;

        let categories = scope.categories();
        let mut records = self.lock();
        let rows = records.entry(owner.clone()).or_default();
        let before = rows.len();
        rows.retain(|r| !categories.contains(&r.category));

        Ok(ResetSummary {
            deleted_count: before - rows.len(),
            categories,
        })
    }
}
