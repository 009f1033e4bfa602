//! Durable boolean flags that outlive a cache wipe.
//!
//! Each flag carries an expiry; an expired flag reads as absent.

use crate::records::OwnerId;
use crate::storage::database::{Database, DatabaseError};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

/// Default lifetime of a flag.
pub const DEFAULT_FLAG_TTL_DAYS: i64 = 30;

/// Store for durable flags.
#[derive(Clone)]
pub struct DurableFlags {
    db: Database,
    ttl: Duration,
}

impl DurableFlags {
    pub fn new(db: Database) -> Self {
        Self::with_ttl(db, Duration::days(DEFAULT_FLAG_TTL_DAYS))
    }

    pub fn with_ttl(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Name of the onboarding-complete flag for an owner.
    pub fn onboarding_flag_name(owner: &OwnerId) -> String {
        format!("user_{}_onboardingComplete", owner)
    }

    /// Set a flag with the default lifetime.
    pub fn set(&self, name: &str, value: bool) -> Result<(), DatabaseError> {
        self.set_until(name, value, Utc::now() + self.ttl)
    }

    /// Set a flag that expires at `expires_at`.
    pub fn set_until(
        &self,
        name: &str,
        value: bool,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO durable_flags (name, value, expires_at) VALUES (?1, ?2, ?3)",
                params![name, value, expires_at.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Read a flag; expired or missing flags are `None`.
    pub fn get(&self, name: &str) -> Result<Option<bool>, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM durable_flags WHERE name = ?1 AND expires_at > ?2",
                    params![name, now],
                    |row| row.get::<_, bool>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn clear(&self, name: &str) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM durable_flags WHERE name = ?1", params![name])?;
            Ok(())
        })
    }

    /// Delete expired flags. Returns the number removed.
    pub fn cleanup_expired(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM durable_flags WHERE expires_at <= ?1",
                params![now],
            )?)
        })
    }

    /// Whether the owner's onboarding flag is set and unexpired.
    pub fn is_onboarding_complete(&self, owner: &OwnerId) -> Result<bool, DatabaseError> {
        Ok(self
            .get(&Self::onboarding_flag_name(owner))?
            .unwrap_or(false))
    }
}
