//! Device-local cache with SQLite backing.
//!
//! Values are JSON documents keyed by `(namespace, key)`, where the
//! namespace comes from the [`SessionContext`]. Every write takes the next
//! value of a global write clock so a reconciliation can tell whether a
//! local write landed after its remote fetch started.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::records::{Category, CategoryPayload, UserSnapshot};
use crate::session::SessionContext;
use crate::storage::database::{Database, DatabaseError};
use crate::storage::flags::DurableFlags;

/// Namespace older builds wrote unprefixed keys into.
pub const LEGACY_NAMESPACE: &str = "";

/// Keys held in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    WorkoutPlan,
    DietPlan,
    WorkoutHistory,
    DietHistory,
    Preferences,
    OnboardingComplete,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::WorkoutPlan => "workoutPlan",
            CacheKey::DietPlan => "dietPlan",
            CacheKey::WorkoutHistory => "workoutHistory",
            CacheKey::DietHistory => "dietHistory",
            CacheKey::Preferences => "preferences",
            CacheKey::OnboardingComplete => "onboardingComplete",
        }
    }

    /// Unprefixed name used by older builds, if any.
    pub fn legacy_name(&self) -> Option<&'static str> {
        match self {
            CacheKey::WorkoutPlan => Some("initialWorkoutPlan"),
            CacheKey::OnboardingComplete => Some("onboardingComplete"),
            _ => None,
        }
    }

    pub fn for_category(category: Category) -> Self {
        match category {
            Category::WorkoutPlan => CacheKey::WorkoutPlan,
            Category::DietPlan => CacheKey::DietPlan,
            Category::WorkoutHistory => CacheKey::WorkoutHistory,
            Category::DietHistory => CacheKey::DietHistory,
            Category::Preferences => CacheKey::Preferences,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            CacheKey::WorkoutPlan => Some(Category::WorkoutPlan),
            CacheKey::DietPlan => Some(Category::DietPlan),
            CacheKey::WorkoutHistory => Some(Category::WorkoutHistory),
            CacheKey::DietHistory => Some(Category::DietHistory),
            CacheKey::Preferences => Some(Category::Preferences),
            CacheKey::OnboardingComplete => None,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cached value with its write metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub seq: i64,
    pub updated_at: DateTime<Utc>,
}

/// Owner-namespaced local cache.
#[derive(Clone)]
pub struct LocalCache {
    db: Database,
    flags: DurableFlags,
}

impl LocalCache {
    pub fn new(db: Database, flags: DurableFlags) -> Self {
        Self { db, flags }
    }

    /// Cache and flags on a fresh in-memory database.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let db = Database::open_in_memory()?;
        let flags = DurableFlags::new(db.clone());
        Ok(Self::new(db, flags))
    }

    pub fn flags(&self) -> &DurableFlags {
        &self.flags
    }

    /// Raw entry for `key`, migrating a legacy unprefixed value on miss.
    pub fn get_entry(
        &self,
        ctx: &SessionContext,
        key: CacheKey,
    ) -> Result<Option<CacheEntry>, DatabaseError> {
        let namespace = ctx.namespace();
        let migrate_legacy = ctx.owner().is_some();

        let (entry, migrated) = self.db.transaction(|tx| {
            if let Some(entry) = read_entry(tx, &namespace, key.as_str())? {
                return Ok((live(entry), false));
            }
            let legacy = match key.legacy_name() {
                Some(name) if migrate_legacy => name,
                _ => return Ok((None, false)),
            };
            let Some(old) = read_entry(tx, LEGACY_NAMESPACE, legacy)? else {
                return Ok((None, false));
            };

            let seq = write_entry(tx, &namespace, key.as_str(), &old.value)?;
            tx.execute(
                "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![LEGACY_NAMESPACE, legacy],
            )?;
            Ok((
                live(CacheEntry {
                    value: old.value,
                    seq,
                    updated_at: Utc::now(),
                }),
                true,
            ))
        })?;

        if migrated {
            tracing::info!("Migrated legacy cache key {} into {}", key, namespace);
            if key == CacheKey::OnboardingComplete {
                if let Some(entry) = &entry {
                    self.sync_onboarding_flag(ctx, is_truthy(&entry.value))?;
                }
            }
        }

        Ok(entry)
    }

    /// Typed value for `key`; unreadable values are treated as absent.
    pub fn get<T: DeserializeOwned>(
        &self,
        ctx: &SessionContext,
        key: CacheKey,
    ) -> Result<Option<T>, DatabaseError> {
        let Some(entry) = self.get_entry(ctx, key)? else {
            return Ok(None);
        };
        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache value for {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Collection value for `key`; missing or unreadable values are empty.
    pub fn get_collection<T: DeserializeOwned>(
        &self,
        ctx: &SessionContext,
        key: CacheKey,
    ) -> Result<Vec<T>, DatabaseError> {
        Ok(self.get::<Vec<T>>(ctx, key)?.unwrap_or_default())
    }

    /// Store a value, returning its write sequence.
    pub fn set<T: Serialize>(
        &self,
        ctx: &SessionContext,
        key: CacheKey,
        value: &T,
    ) -> Result<i64, DatabaseError> {
        let value = serde_json::to_value(value)?;
        let namespace = ctx.namespace();
        let seq = self
            .db
            .transaction(|tx| write_entry(tx, &namespace, key.as_str(), &value))?;

        if key == CacheKey::OnboardingComplete {
            self.sync_onboarding_flag(ctx, is_truthy(&value))?;
        }
        Ok(seq)
    }

    /// Remove a key.
    ///
    /// The row is kept as a tombstone so an older remote snapshot cannot
    /// bring the value back.
    pub fn remove(&self, ctx: &SessionContext, key: CacheKey) -> Result<(), DatabaseError> {
        let namespace = ctx.namespace();
        self.db
            .transaction(|tx| write_entry(tx, &namespace, key.as_str(), &Value::Null))?;

        if key == CacheKey::OnboardingComplete {
            if let Some(owner) = ctx.owner() {
                self.flags.clear(&DurableFlags::onboarding_flag_name(owner))?;
            }
        }
        Ok(())
    }

    /// Drop every key in the session's namespace. Durable flags survive.
    pub fn clear_all(&self, ctx: &SessionContext) -> Result<usize, DatabaseError> {
        let namespace = ctx.namespace();
        self.db.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM cache_entries WHERE namespace = ?1",
                params![namespace],
            )?)
        })
    }

    /// Latest write sequence handed out.
    pub fn current_seq(&self) -> Result<i64, DatabaseError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT seq FROM cache_clock WHERE id = 1", [], |row| {
                row.get(0)
            })?)
        })
    }

    /// Write a value fetched from the remote store unless a local write
    /// newer than `fetched_at` exists. `None` removes the key.
    pub fn apply_remote(
        &self,
        ctx: &SessionContext,
        key: CacheKey,
        value: Option<Value>,
        fetched_at: i64,
    ) -> Result<bool, DatabaseError> {
        let namespace = ctx.namespace();
        let value = value.unwrap_or(Value::Null);
        self.db.transaction(|tx| {
            if let Some(existing) = read_entry(tx, &namespace, key.as_str())? {
                if existing.seq > fetched_at {
                    return Ok(false);
                }
                if existing.value == value {
                    return Ok(true);
                }
            } else if value.is_null() {
                return Ok(true);
            }
            write_entry(tx, &namespace, key.as_str(), &value)?;
            Ok(true)
        })
    }

    /// Stored value of a category; collections are never `None`.
    pub fn load_payload(
        &self,
        ctx: &SessionContext,
        category: Category,
    ) -> Result<Option<CategoryPayload>, DatabaseError> {
        let key = CacheKey::for_category(category);
        match self.get_entry(ctx, key)? {
            Some(entry) => Ok(Some(decode_payload(category, entry.value))),
            None if category.is_collection() => Ok(Some(CategoryPayload::empty(category))),
            None => Ok(None),
        }
    }

    /// Overwrite a category with `payload`.
    pub fn store_payload(
        &self,
        ctx: &SessionContext,
        payload: &CategoryPayload,
    ) -> Result<i64, DatabaseError> {
        let value = payload
            .to_json()
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        self.set(ctx, CacheKey::for_category(payload.category()), &value)
    }

    /// Read-modify-write one category atomically.
    ///
    /// `f` receives the stored value (collections default to empty) and
    /// returns the value to store plus a result passed back to the caller.
    pub fn update_payload<R, F>(
        &self,
        ctx: &SessionContext,
        category: Category,
        f: F,
    ) -> Result<R, DatabaseError>
    where
        F: FnOnce(Option<CategoryPayload>) -> (CategoryPayload, R),
    {
        // Run the legacy shim outside the write transaction.
        self.get_entry(ctx, CacheKey::for_category(category))?;

        let namespace = ctx.namespace();
        let key = CacheKey::for_category(category);
        self.db.transaction(|tx| {
            let stored = match read_entry(tx, &namespace, key.as_str())?.and_then(live) {
                Some(entry) => Some(decode_payload(category, entry.value)),
                None if category.is_collection() => Some(CategoryPayload::empty(category)),
                None => None,
            };
            let (next, result) = f(stored);
            let value = next
                .to_json()
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
            write_entry(tx, &namespace, key.as_str(), &value)?;
            Ok(result)
        })
    }

    /// Every category as currently cached.
    pub fn snapshot(&self, ctx: &SessionContext) -> Result<UserSnapshot, DatabaseError> {
        let mut snapshot = UserSnapshot::default();
        for category in Category::all() {
            if let Some(payload) = self.load_payload(ctx, *category)? {
                snapshot.set(payload);
            }
        }
        snapshot.sort_history();
        Ok(snapshot)
    }

    /// Local onboarding flag: the cached key or the unexpired durable flag.
    pub fn onboarding_complete(&self, ctx: &SessionContext) -> Result<bool, DatabaseError> {
        let cached = self
            .get_entry(ctx, CacheKey::OnboardingComplete)?
            .map(|entry| is_truthy(&entry.value))
            .unwrap_or(false);
        if cached {
            return Ok(true);
        }
        match ctx.owner() {
            Some(owner) => self.flags.is_onboarding_complete(owner),
            None => Ok(false),
        }
    }

    fn sync_onboarding_flag(&self, ctx: &SessionContext, value: bool) -> Result<(), DatabaseError> {
        let Some(owner) = ctx.owner() else {
            return Ok(());
        };
        let name = DurableFlags::onboarding_flag_name(owner);
        if value {
            self.flags.set(&name, true)
        } else {
            self.flags.clear(&name)
        }
    }
}

fn read_entry(
    tx: &Transaction<'_>,
    namespace: &str,
    key: &str,
) -> Result<Option<CacheEntry>, DatabaseError> {
    let row: Option<(String, i64, String)> = tx
        .query_row(
            "SELECT value, seq, updated_at FROM cache_entries WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((value_json, seq, updated_str)) = row else {
        return Ok(None);
    };

    let value = serde_json::from_str(&value_json)
        .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_str)
        .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?
        .with_timezone(&Utc);

    Ok(Some(CacheEntry {
        value,
        seq,
        updated_at,
    }))
}

fn write_entry(
    tx: &Transaction<'_>,
    namespace: &str,
    key: &str,
    value: &Value,
) -> Result<i64, DatabaseError> {
    tx.execute("UPDATE cache_clock SET seq = seq + 1 WHERE id = 1", [])?;
    let seq: i64 = tx.query_row("SELECT seq FROM cache_clock WHERE id = 1", [], |row| {
        row.get(0)
    })?;

    tx.execute(
        "INSERT OR REPLACE INTO cache_entries (namespace, key, value, seq, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            namespace,
            key,
            serde_json::to_string(value)?,
            seq,
            Utc::now().to_rfc3339()
        ],
    )?;

    Ok(seq)
}

/// Tombstones read as absent.
fn live(entry: CacheEntry) -> Option<CacheEntry> {
    if entry.value.is_null() {
        None
    } else {
        Some(entry)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn decode_payload(category: Category, value: Value) -> CategoryPayload {
    match CategoryPayload::from_json(category, value) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Discarding unreadable cached {}: {}", category.display_name(), e);
            CategoryPayload::empty(category)
        }
    }
}
