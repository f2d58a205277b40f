//! Schema migrations for the SQLite-backed stores (§6).

/// A single migration: raw SQL applied once, in order, inside `execute_batch`.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "reference documents, embedding cache, rules, classifications, audit log",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "bucket assignments and rule effectiveness tracking",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));

CREATE TABLE IF NOT EXISTS reference_documents (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    content_hash TEXT NOT NULL UNIQUE,
    metadata TEXT NOT NULL,
    severity_label TEXT NOT NULL,
    created_at TEXT NOT NULL,
    embedding BLOB,
    bucket_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_reference_documents_hash ON reference_documents(content_hash);
CREATE INDEX IF NOT EXISTS idx_reference_documents_bucket ON reference_documents(bucket_id);

CREATE TABLE IF NOT EXISTS embedding_cache (
    cache_key TEXT PRIMARY KEY,
    vector BLOB NOT NULL,
    stored_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    priority INTEGER NOT NULL,
    conditions TEXT NOT NULL,
    combinator TEXT NOT NULL,
    override_severity TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rules_active ON rules(active);

CREATE TABLE IF NOT EXISTS classifications (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    severity TEXT NOT NULL,
    confidence REAL NOT NULL,
    warning_level TEXT NOT NULL,
    routing TEXT NOT NULL,
    rationale TEXT NOT NULL,
    matched_rule_ids TEXT NOT NULL,
    created_at TEXT NOT NULL,
    human_reviewed_severity TEXT,
    human_reviewed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_classifications_document ON classifications(document_id);

CREATE TABLE IF NOT EXISTS audit_events (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_events_session ON audit_events(session_id);
CREATE INDEX IF NOT EXISTS idx_audit_events_occurred ON audit_events(occurred_at);
"#;

const MIGRATION_V2_UP: &str = r#"
UPDATE schema_version SET version = 2, applied_at = datetime('now');

CREATE TABLE IF NOT EXISTS buckets (
    id TEXT PRIMARY KEY,
    severity TEXT NOT NULL,
    centroid BLOB NOT NULL,
    member_count INTEGER NOT NULL DEFAULT 0,
    stale INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_buckets_severity ON buckets(severity);

CREATE TABLE IF NOT EXISTS rule_effectiveness (
    rule_id TEXT PRIMARY KEY REFERENCES rules(id) ON DELETE CASCADE,
    times_matched INTEGER NOT NULL DEFAULT 0,
    times_upheld_on_review INTEGER NOT NULL DEFAULT 0,
    times_overturned_on_review INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
"#;

fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply every migration whose version exceeds the database's current `schema_version`.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn).unwrap_or(0);
    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(version = migration.version, description = migration.description, "applying migration");
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }
    Ok(applied)
}
