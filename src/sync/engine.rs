//! Reconciliation between the local cache and the remote record store.
//!
//! Reads prefer the remote store and fall back to the cache. Writes land in
//! the cache first and are then propagated; a write the store cannot take
//! right now is parked in the retry queue.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::merge;
use super::queue::{PendingOp, RetryQueue};
use super::remote::RecordStore;
use super::{ResetScope, SaveSummary, SyncError, WriteStatus};
use crate::onboarding::RemotePresence;
use crate::records::{Category, CategoryPayload, OwnerId, UserSnapshot};
use crate::session::SessionContext;
use crate::storage::{CacheKey, LocalCache};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a load's data came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum DataSource {
    /// Remote snapshot reconciled into the cache
    Remote,
    /// Local cache only; the remote state is unknown
    Cache { reason: String },
    /// A newer load for the same owner started; this result was discarded
    Superseded,
}

impl DataSource {
    /// Whether the data may lag the remote store.
    pub fn may_be_stale(&self) -> bool {
        !matches!(self, DataSource::Remote)
    }

    pub fn description(&self) -> &'static str {
        match self {
            DataSource::Remote => "Synced",
            DataSource::Cache { .. } => "Offline copy",
            DataSource::Superseded => "Superseded",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Result of [`ReconciliationEngine::load`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub snapshot: UserSnapshot,
    pub source: DataSource,
    pub remote: RemotePresence,
    /// Categories kept local because writes for them are still queued
    pub skipped: Vec<Category>,
}

/// Result of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub category: Category,
    /// Effect on the local cache
    pub local: SaveSummary,
    pub remote: WriteStatus,
}

/// Result of a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReport {
    pub cleared: Vec<Category>,
    /// The scope named only history, so nothing was touched
    pub refused: bool,
    pub remote: Option<WriteStatus>,
}

/// Result of replaying queued writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub synced: usize,
    /// Failed again, still within the backoff schedule
    pub deferred: usize,
    /// Failed again with the backoff schedule exhausted
    pub failed: usize,
    /// Rejected by the store and removed
    pub dropped: usize,
    pub remaining: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.synced += other.synced;
        self.deferred += other.deferred;
        self.failed += other.failed;
        self.dropped += other.dropped;
        self.remaining += other.remaining;
    }
}

/// Keeps the local cache and the remote store consistent.
pub struct ReconciliationEngine<S, Q> {
    store: Arc<S>,
    queue: Arc<Q>,
    cache: LocalCache,
    store_timeout: Duration,
    /// Latest load started per owner
    generations: Mutex<HashMap<OwnerId, u64>>,
}

impl<S: RecordStore, Q: RetryQueue> ReconciliationEngine<S, Q> {
    pub fn new(store: Arc<S>, queue: Arc<Q>, cache: LocalCache) -> Self {
        Self {
            store,
            queue,
            cache,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            generations: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Load every category for the session.
    ///
    /// On a successful fetch the remote snapshot overwrites the cache, except
    /// for keys written locally after the fetch began and categories with
    /// queued writes. On failure the cache is returned untouched.
    pub async fn load(&self, ctx: &SessionContext) -> Result<LoadReport, SyncError> {
        let Some(owner) = ctx.owner() else {
            return Ok(LoadReport {
                snapshot: self.cache.snapshot(ctx)?,
                source: DataSource::Cache {
                    reason: "no owner for this session".to_string(),
                },
                remote: RemotePresence::Unknown,
                skipped: Vec::new(),
            });
        };

        let generation = self.begin_load(owner);

        // Queued writes go first so the snapshot reflects them.
        if let Err(e) = self.flush(owner, false).await {
            tracing::warn!("Could not replay pending writes for {}: {}", owner, e);
        }

        let fetched_at = self.cache.current_seq()?;
        let result = self.bounded(self.store.fetch(owner)).await;

        if !self.is_latest_load(owner, generation) {
            tracing::debug!("Discarding superseded fetch for {}", owner);
            return Ok(LoadReport {
                snapshot: self.cache.snapshot(ctx)?,
                source: DataSource::Superseded,
                remote: RemotePresence::Unknown,
                skipped: Vec::new(),
            });
        }

        let remote = match result {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!("Remote fetch failed for {}, using local cache: {}", owner, e);
                return Ok(LoadReport {
                    snapshot: self.cache.snapshot(ctx)?,
                    source: DataSource::Cache {
                        reason: e.to_string(),
                    },
                    remote: RemotePresence::Unknown,
                    skipped: Vec::new(),
                });
            }
        };

        let pending = self.queue.pending_categories(owner)?;
        let mut skipped = Vec::new();
        for category in Category::all() {
            if pending.contains(category) {
                skipped.push(*category);
                continue;
            }
            let value = match remote.get(*category) {
                Some(payload) => Some(payload.to_json()?),
                None => None,
            };
            let applied =
                self.cache
                    .apply_remote(ctx, CacheKey::for_category(*category), value, fetched_at)?;
            if !applied {
                tracing::debug!("Kept newer local {} for {}", category, owner);
            }
        }
        if !skipped.is_empty() {
            tracing::info!(
                "Kept {} local categories with pending writes for {}",
                skipped.len(),
                owner
            );
        }

        Ok(LoadReport {
            snapshot: self.cache.snapshot(ctx)?,
            source: DataSource::Remote,
            remote: RemotePresence::from_fetch(remote.has_any_data()),
            skipped,
        })
    }

    /// Apply a save to the cache, then propagate it to the store.
    ///
    /// Never fails because the store is down; the remote outcome is reported
    /// in [`SaveReport::remote`].
    pub async fn save(
        &self,
        ctx: &SessionContext,
        payload: CategoryPayload,
    ) -> Result<SaveReport, SyncError> {
        let category = payload.category();
        let local = self.apply_local(ctx, &payload)?;
        let remote = match ctx.owner() {
            Some(owner) => self.propagate(owner, PendingOp::Save { payload }).await,
            None => WriteStatus::LocalOnly,
        };
        Ok(SaveReport {
            category,
            local,
            remote,
        })
    }

    /// Merge `payload` into the cache with its category's policy.
    pub fn apply_local(
        &self,
        ctx: &SessionContext,
        payload: &CategoryPayload,
    ) -> Result<SaveSummary, SyncError> {
        payload.validate()?;
        let incoming = payload.clone();
        let summary = self
            .cache
            .update_payload(ctx, payload.category(), |stored| merge::apply(stored, incoming))?;
        Ok(summary)
    }

    /// Clear the categories in `scope` locally and remotely.
    ///
    /// History categories are never cleared; a scope naming only history is
    /// a no-op.
    pub async fn reset(
        &self,
        ctx: &SessionContext,
        scope: ResetScope,
    ) -> Result<ResetReport, SyncError> {
        let categories = scope.categories();
        if categories.is_empty() {
            tracing::info!("Ignoring reset of {}: history is append-only", scope.wire_name());
            return Ok(ResetReport {
                cleared: Vec::new(),
                refused: true,
                remote: None,
            });
        }

        for category in &categories {
            self.cache.remove(ctx, CacheKey::for_category(*category))?;
        }

        let remote = match ctx.owner() {
            Some(owner) => self.propagate(owner, PendingOp::Reset { scope }).await,
            None => WriteStatus::LocalOnly,
        };

        Ok(ResetReport {
            cleared: categories,
            refused: false,
            remote: Some(remote),
        })
    }

    /// Replay queued writes for `owner` in order.
    ///
    /// Stops at the first write the store cannot take. Writes whose backoff
    /// has not elapsed are left alone unless `force` is set.
    pub async fn flush(&self, owner: &OwnerId, force: bool) -> Result<FlushReport, SyncError> {
        let mut report = FlushReport::default();
        let now = Utc::now();

        for write in self.queue.pending(owner)? {
            if !force && !write.is_due(now) {
                break;
            }

            match self.send(owner, &write.op).await {
                Ok(()) => {
                    self.queue.complete(write.id)?;
                    report.synced += 1;
                }
                Err(e) if e.is_retryable() => {
                    let exhausted = self
                        .queue
                        .bump_attempt(write.id)?
                        .map(|w| w.is_exhausted())
                        .unwrap_or(false);
                    if exhausted {
                        tracing::warn!(
                            "Pending {} for {} keeps failing: {}",
                            write.op.describe(),
                            owner,
                            e
                        );
                        report.failed += 1;
                    } else {
                        report.deferred += 1;
                    }
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "Store rejected pending {} for {}, dropping it: {}",
                        write.op.describe(),
                        owner,
                        e
                    );
                    self.queue.complete(write.id)?;
                    report.dropped += 1;
                }
            }
        }

        report.remaining = self.queue.pending(owner)?.len();
        if report.synced > 0 {
            tracing::info!("Replayed {} pending writes for {}", report.synced, owner);
        }
        Ok(report)
    }

    /// Replay due writes for every owner with a queue.
    pub async fn flush_all(&self) -> Result<FlushReport, SyncError> {
        let mut total = FlushReport::default();
        for owner in self.queue.owners()? {
            total.absorb(self.flush(&owner, false).await?);
        }
        Ok(total)
    }

    async fn propagate(&self, owner: &OwnerId, op: PendingOp) -> WriteStatus {
        // Earlier queued writes must reach the store before this one.
        let has_backlog = match self.queue.pending(owner) {
            Ok(pending) => !pending.is_empty(),
            Err(e) => {
                tracing::warn!("Could not read retry queue for {}: {}", owner, e);
                false
            }
        };
        if has_backlog {
            return self.enqueue_and_flush(owner, op).await;
        }

        match self.send(owner, &op).await {
            Ok(()) => WriteStatus::Synced,
            Err(e) if e.is_retryable() => self.defer(owner, op, e.to_string()),
            Err(e) => {
                tracing::warn!("Store rejected {} for {}: {}", op.describe(), owner, e);
                WriteStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn defer(&self, owner: &OwnerId, op: PendingOp, reason: String) -> WriteStatus {
        let description = op.describe();
        match self.queue.enqueue(owner, op) {
            Ok(_) => {
                tracing::info!("Deferred {} for {}: {}", description, owner, reason);
                WriteStatus::Deferred { reason }
            }
            Err(e) => {
                tracing::warn!("Could not queue {} for {}: {}", description, owner, e);
                WriteStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn enqueue_and_flush(&self, owner: &OwnerId, op: PendingOp) -> WriteStatus {
        let write = match self.queue.enqueue(owner, op) {
            Ok(write) => write,
            Err(e) => {
                return WriteStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if let Err(e) = self.flush(owner, false).await {
            return WriteStatus::Deferred {
                reason: e.to_string(),
            };
        }

        match self.queue.pending(owner) {
            Ok(pending) if pending.iter().any(|w| w.id == write.id) => WriteStatus::Deferred {
                reason: "waiting behind earlier pending writes".to_string(),
            },
            Ok(_) => WriteStatus::Synced,
            Err(e) => WriteStatus::Deferred {
                reason: e.to_string(),
            },
        }
    }

    async fn send(&self, owner: &OwnerId, op: &PendingOp) -> Result<(), SyncError> {
        match op {
            PendingOp::Save { payload } => {
                let summary = self.bounded(self.store.save(owner, payload)).await?;
                tracing::debug!(
                    "Store took {} for {}: {} created, {} updated",
                    payload.category(),
                    owner,
                    summary.created_count,
                    summary.updated_count
                );
                Ok(())
            }
            PendingOp::Reset { scope } => {
                if scope.categories().is_empty() {
                    return Ok(());
                }
                self.bounded(self.store.reset(owner, *scope)).await?;
                Ok(())
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::StoreUnavailable(format!(
                "store call timed out after {:?}",
                self.store_timeout
            ))),
        }
    }

    fn begin_load(&self, owner: &OwnerId) -> u64 {
        let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        let generation = generations.entry(owner.clone()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_latest_load(&self, owner: &OwnerId, generation: u64) -> bool {
        let generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        generations.get(owner).copied() == Some(generation)
    }
}

impl<S, Q> ReconciliationEngine<S, Q>
where
    S: RecordStore + 'static,
    Q: RetryQueue + 'static,
{
    /// Apply a save to the cache now and propagate it on a background task.
    pub fn save_in_background(
        self: &Arc<Self>,
        ctx: &SessionContext,
        payload: CategoryPayload,
    ) -> Result<(SaveSummary, JoinHandle<WriteStatus>), SyncError> {
        let local = self.apply_local(ctx, &payload)?;
        let engine = Arc::clone(self);
        let owner = ctx.owner().cloned();

        let handle = tokio::spawn(async move {
            match owner {
                Some(owner) => engine.propagate(&owner, PendingOp::Save { payload }).await,
                None => WriteStatus::LocalOnly,
            }
        });

        Ok((local, handle))
    }
}
