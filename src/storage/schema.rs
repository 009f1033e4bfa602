//! Database schema definitions for the local store.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Namespaced key-value cache (one row per owner namespace and key)
CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    seq INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
);

-- Monotonic write clock for cache_entries
CREATE TABLE IF NOT EXISTS cache_clock (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    seq INTEGER NOT NULL
);

INSERT OR IGNORE INTO cache_clock (id, seq) VALUES (1, 0);

-- Flags that outlive a cache wipe until they expire
CREATE TABLE IF NOT EXISTS durable_flags (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL,
    expires_at TEXT NOT NULL
);

-- Writes waiting for the remote store to come back
CREATE TABLE IF NOT EXISTS pending_writes (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    owner TEXT NOT NULL,
    category TEXT,
    op_json TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    queued_at TEXT NOT NULL,
    next_attempt_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pending_writes_owner ON pending_writes(owner, position);
CREATE INDEX IF NOT EXISTS idx_durable_flags_expiry ON durable_flags(expires_at);
"#;

/// SQL for creating the schema version table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;
