//! Queue of writes waiting for the remote store.
//!
//! A write that fails with `StoreUnavailable` is parked here after the
//! local cache has already taken it. Flushing replays the queue per owner in
//! FIFO order with a fixed backoff schedule.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use super::{merge, ResetScope, SyncError};
use crate::records::{Category, CategoryPayload, OwnerId};
use crate::storage::{Database, DatabaseError};

/// Maximum number of queued writes.
pub const MAX_QUEUE_SIZE: usize = 50;

/// Retry intervals in seconds for backoff.
pub const RETRY_INTERVALS: &[u64] = &[30, 60, 120, 300];

/// Delay before the next attempt after `attempts` failures.
pub fn retry_delay(attempts: u32) -> Duration {
    let idx = (attempts.max(1) - 1) as usize;
    let secs = RETRY_INTERVALS
        .get(idx)
        .copied()
        .unwrap_or(RETRY_INTERVALS[RETRY_INTERVALS.len() - 1]);
    Duration::seconds(secs as i64)
}

/// A remote operation to replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PendingOp {
    Save { payload: CategoryPayload },
    Reset { scope: ResetScope },
}

impl PendingOp {
    /// Category whose queued saves fold into one write. Resets never fold.
    pub fn coalesce_key(&self) -> Option<Category> {
        match self {
            PendingOp::Save { payload } => Some(payload.category()),
            PendingOp::Reset { .. } => None,
        }
    }

    /// Fold a newer save of the same category into this one.
    ///
    /// Uses the category's merge policy: plans and preferences keep the
    /// newer payload, history keeps the union of both.
    pub fn fold(&self, newer: PendingOp) -> PendingOp {
        match (self, newer) {
            (PendingOp::Save { payload: older }, PendingOp::Save { payload })
                if older.category() == payload.category() =>
            {
                PendingOp::Save {
                    payload: merge::apply(Some(older.clone()), payload).0,
                }
            }
            (_, newer) => newer,
        }
    }

    /// History saves carry entries the store has never seen and are never
    /// evicted from a full queue.
    pub fn is_evictable(&self) -> bool {
        !matches!(self, PendingOp::Save { payload } if payload.category().is_history())
    }

    /// Categories whose remote state is behind while this op is queued.
    pub fn categories(&self) -> Vec<Category> {
        match self {
            PendingOp::Save { payload } => vec![payload.category()],
            PendingOp::Reset { scope } => scope.categories(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PendingOp::Save { payload } => format!("save {}", payload.category()),
            PendingOp::Reset { scope } => format!("reset {}", scope.wire_name()),
        }
    }
}

/// A queued write.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub id: Uuid,
    pub owner: OwnerId,
    pub op: PendingOp,
    /// Failed attempts so far
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
}

impl PendingWrite {
    pub fn new(owner: OwnerId, op: PendingOp) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            op,
            attempts: 0,
            queued_at: now,
            next_attempt_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at <= now
    }

    /// Whether the backoff schedule has been used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempts as usize >= RETRY_INTERVALS.len()
    }

    fn record_failure(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.next_attempt_at = now + retry_delay(self.attempts);
    }
}

/// Storage for pending writes.
pub trait RetryQueue: Send + Sync {
    /// Queue `op`, folding in an earlier save of the same category.
    ///
    /// When full, the oldest evictable write is dropped. History saves are
    /// kept even past the limit.
    fn enqueue(&self, owner: &OwnerId, op: PendingOp) -> Result<PendingWrite, SyncError>;

    /// Writes for `owner` in FIFO order.
    fn pending(&self, owner: &OwnerId) -> Result<Vec<PendingWrite>, SyncError>;

    /// Remove a write that reached the store.
    fn complete(&self, id: Uuid) -> Result<(), SyncError>;

    /// Record a failed attempt and push the next attempt out.
    fn bump_attempt(&self, id: Uuid) -> Result<Option<PendingWrite>, SyncError>;

    /// Owners with queued writes.
    fn owners(&self) -> Result<Vec<OwnerId>, SyncError>;

    fn len(&self) -> Result<usize, SyncError>;

    fn is_empty(&self) -> Result<bool, SyncError> {
        Ok(self.len()? == 0)
    }

    /// Categories with at least one queued write for `owner`.
    fn pending_categories(&self, owner: &OwnerId) -> Result<HashSet<Category>, SyncError> {
        Ok(self
            .pending(owner)?
            .iter()
            .flat_map(|w| w.op.categories())
            .collect())
    }
}

/// In-process queue, lost on restart.
pub struct MemoryRetryQueue {
    writes: Mutex<VecDeque<PendingWrite>>,
    limit: usize,
}

impl MemoryRetryQueue {
    pub fn new() -> Self {
        Self::with_limit(MAX_QUEUE_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            writes: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<PendingWrite>>, SyncError> {
        self.writes
            .lock()
            .map_err(|_| {
                SyncError::Storage(DatabaseError::ConnectionFailed(
                    "queue lock poisoned".to_string(),
                ))
            })
    }
}

impl Default for MemoryRetryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryQueue for MemoryRetryQueue {
    fn enqueue(&self, owner: &OwnerId, op: PendingOp) -> Result<PendingWrite, SyncError> {
        let mut writes = self.lock()?;

        let mut op = op;
        if let Some(category) = op.coalesce_key() {
            if let Some(pos) = writes
                .iter()
                .position(|w| w.owner == *owner && w.op.coalesce_key() == Some(category))
            {
                if let Some(earlier) = writes.remove(pos) {
                    op = earlier.op.fold(op);
                }
            }
        }

        if writes.len() >= self.limit {
            match writes.iter().position(|w| w.op.is_evictable()) {
                Some(pos) => {
                    if let Some(dropped) = writes.remove(pos) {
                        tracing::warn!(
                            "Retry queue full; dropping oldest pending {} for {}",
                            dropped.op.describe(),
                            dropped.owner
                        );
                    }
                }
                None => tracing::warn!(
                    "Retry queue over its limit of {} with history writes only",
                    self.limit
                ),
            }
        }

        let write = PendingWrite::new(owner.clone(), op);
        writes.push_back(write.clone());
        Ok(write)
    }

    fn pending(&self, owner: &OwnerId) -> Result<Vec<PendingWrite>, SyncError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|w| w.owner == *owner)
            .cloned()
            .collect())
    }

    fn complete(&self, id: Uuid) -> Result<(), SyncError> {
        self.lock()?.retain(|w| w.id != id);
        Ok(())
    }

    fn bump_attempt(&self, id: Uuid) -> Result<Option<PendingWrite>, SyncError> {
        let mut writes = self.lock()?;
        let now = Utc::now();
        let updated = writes.iter_mut().find(|w| w.id == id).map(|w| {
            w.record_failure(now);
            w.clone()
        });
        Ok(updated)
    }

    fn owners(&self) -> Result<Vec<OwnerId>, SyncError> {
        let mut owners: Vec<OwnerId> = Vec::new();
        for write in self.lock()?.iter() {
            if !owners.contains(&write.owner) {
                owners.push(write.owner.clone());
            }
        }
        Ok(owners)
    }

    fn len(&self) -> Result<usize, SyncError> {
        Ok(self.lock()?.len())
    }
}

/// Queue persisted in the local database, surviving restarts.
pub struct SqliteRetryQueue {
    db: Database,
    limit: usize,
}

impl SqliteRetryQueue {
    pub fn new(db: Database) -> Self {
        Self::with_limit(db, MAX_QUEUE_SIZE)
    }

    pub fn with_limit(db: Database, limit: usize) -> Self {
        Self {
            db,
            limit: limit.max(1),
        }
    }
}

type PendingRow = (String, String, String, u32, String, String);

fn row_to_write(row: PendingRow) -> Result<PendingWrite, DatabaseError> {
    let (id, owner, op_json, attempts, queued_str, next_str) = row;
    let parse_time = |s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))
    };

    Ok(PendingWrite {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::DeserializationError(e.to_string()))?,
        owner: OwnerId::new(owner)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?,
        op: serde_json::from_str(&op_json)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?,
        attempts,
        queued_at: parse_time(&queued_str)?,
        next_attempt_at: parse_time(&next_str)?,
    })
}

const SELECT_PENDING: &str = "SELECT id, owner, op_json, attempts, queued_at, next_attempt_at
     FROM pending_writes";

impl RetryQueue for SqliteRetryQueue {
    fn enqueue(&self, owner: &OwnerId, op: PendingOp) -> Result<PendingWrite, SyncError> {
        let coalesce_key = op.coalesce_key().map(|c| c.wire_name());
        let limit = self.limit as i64;

        let (write, dropped) = self.db.transaction(|tx| {
            let mut op = op;
            if let Some(key) = coalesce_key {
                let earlier: Option<String> = {
                    use rusqlite::OptionalExtension;
                    tx.query_row(
                        "SELECT op_json FROM pending_writes WHERE owner = ?1 AND category = ?2
                         ORDER BY position LIMIT 1",
                        params![owner.as_str(), key],
                        |row| row.get(0),
                    )
                    .optional()?
                };
                if let Some(json) = earlier {
                    let earlier: PendingOp = serde_json::from_str(&json)
                        .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
                    op = earlier.fold(op);
                }
                tx.execute(
                    "DELETE FROM pending_writes WHERE owner = ?1 AND category = ?2",
                    params![owner.as_str(), key],
                )?;
            }

            let write = PendingWrite::new(owner.clone(), op);
            let op_json = serde_json::to_string(&write.op)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

            let count: i64 =
                tx.query_row("SELECT COUNT(*) FROM pending_writes", [], |row| row.get(0))?;
            let dropped = if count >= limit {
                tx.execute(
                    "DELETE FROM pending_writes WHERE position = (
                         SELECT MIN(position) FROM pending_writes
                         WHERE category IS NULL OR category NOT IN (?1, ?2))",
                    params![
                        Category::WorkoutHistory.wire_name(),
                        Category::DietHistory.wire_name()
                    ],
                )?
            } else {
                0
            };

            tx.execute(
                "INSERT INTO pending_writes
                 (id, position, owner, category, op_json, attempts, queued_at, next_attempt_at)
                 VALUES (?1, (SELECT COALESCE(MAX(position), 0) + 1 FROM pending_writes),
                         ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    write.id.to_string(),
                    owner.as_str(),
                    coalesce_key,
                    op_json,
                    write.attempts,
                    write.queued_at.to_rfc3339(),
                    write.next_attempt_at.to_rfc3339(),
                ],
            )?;
            Ok((write, dropped))
        })?;

        if dropped > 0 {
            tracing::warn!("Retry queue full; dropped oldest pending write");
        }
        Ok(write)
    }

    fn pending(&self, owner: &OwnerId) -> Result<Vec<PendingWrite>, SyncError> {
        let writes = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{} WHERE owner = ?1 ORDER BY position", SELECT_PENDING))?;
            let rows = stmt
                .query_map(params![owner.as_str()], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?
                .collect::<Result<Vec<PendingRow>, _>>()?;
            rows.into_iter().map(row_to_write).collect()
        })?;
        Ok(writes)
    }

    fn complete(&self, id: Uuid) -> Result<(), SyncError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM pending_writes WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn bump_attempt(&self, id: Uuid) -> Result<Option<PendingWrite>, SyncError> {
        let updated = self.db.transaction(|tx| {
            let row: Option<PendingRow> = {
                use rusqlite::OptionalExtension;
                tx.query_row(
                    &format!("{} WHERE id = ?1", SELECT_PENDING),
                    params![id.to_string()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()?
            };
            let Some(row) = row else {
                return Ok(None);
            };

            let mut write = row_to_write(row)?;
            write.record_failure(Utc::now());
            tx.execute(
                "UPDATE pending_writes SET attempts = ?1, next_attempt_at = ?2 WHERE id = ?3",
                params![
                    write.attempts,
                    write.next_attempt_at.to_rfc3339(),
                    id.to_string()
                ],
            )?;
            Ok(Some(write))
        })?;
        Ok(updated)
    }

    fn owners(&self) -> Result<Vec<OwnerId>, SyncError> {
        let owners = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT owner FROM pending_writes GROUP BY owner ORDER BY MIN(position)",
            )?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        owners
            .into_iter()
            .map(|o| OwnerId::new(o).map_err(SyncError::from))
            .collect()
    }

    fn len(&self) -> Result<usize, SyncError> {
        let count: i64 = self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM pending_writes", [], |row| row.get(0))?)
        })?;
        Ok(count as usize)
    }
}
