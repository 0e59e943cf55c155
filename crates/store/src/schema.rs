//! Schema creation and additive migration
//!
//! Schema creation is idempotent (`CREATE TABLE IF NOT EXISTS` throughout).
//! Migration is a single additive step: databases created before the
//! `tags` / `chamber` / `context` columns existed get them added with their
//! defaults. There are no destructive migrations.

use crate::map_err;
use nautilus_core::Result;
use rusqlite::Connection;

/// Full schema, applied on every open.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS gravity (
    path                TEXT NOT NULL,
    line_start          INTEGER NOT NULL DEFAULT 0,
    line_end            INTEGER NOT NULL DEFAULT 0,
    access_count        INTEGER NOT NULL DEFAULT 0,
    reference_count     INTEGER NOT NULL DEFAULT 0,
    explicit_importance REAL NOT NULL DEFAULT 0.0,
    last_accessed_at    TEXT,
    last_written_at     TEXT,
    created_at          TEXT NOT NULL,
    superseded_by       TEXT,
    tags                TEXT NOT NULL DEFAULT '[]',
    chamber             TEXT NOT NULL DEFAULT 'unknown',
    PRIMARY KEY (path, line_start, line_end)
);

CREATE INDEX IF NOT EXISTS idx_gravity_path ON gravity(path);
CREATE INDEX IF NOT EXISTS idx_gravity_chamber ON gravity(chamber);

CREATE TABLE IF NOT EXISTS access_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    path        TEXT NOT NULL,
    line_start  INTEGER NOT NULL DEFAULT 0,
    line_end    INTEGER NOT NULL DEFAULT 0,
    accessed_at TEXT NOT NULL,
    query       TEXT,
    score       REAL,
    context     TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_access_log_path ON access_log(path);
CREATE INDEX IF NOT EXISTS idx_access_log_accessed_at ON access_log(accessed_at);

CREATE TABLE IF NOT EXISTS mirrors (
    event_key   TEXT NOT NULL,
    granularity TEXT NOT NULL,
    path        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (event_key, granularity)
);

CREATE INDEX IF NOT EXISTS idx_mirrors_path ON mirrors(path);
"#;

/// Columns that may be missing in pre-existing databases, with the default
/// each gets when added.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("gravity", "tags", "TEXT NOT NULL DEFAULT '[]'"),
    ("gravity", "chamber", "TEXT NOT NULL DEFAULT 'unknown'"),
    ("access_log", "context", "TEXT NOT NULL DEFAULT '{}'"),
];

/// Create missing tables and run the additive migration.
///
/// Returns the list of columns that were added, for logging.
pub fn initialize(conn: &Connection) -> Result<Vec<String>> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| map_err("schema init", e))?;
    migrate(conn)
}

/// Add any missing additive columns.
fn migrate(conn: &Connection) -> Result<Vec<String>> {
    let mut added = Vec::new();
    for (table, column, definition) in ADDITIVE_COLUMNS {
        if !has_column(conn, table, column)? {
            let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
            conn.execute(&sql, [])
                .map_err(|e| map_err("additive migration", e))?;
            added.push(format!("{}.{}", table, column));
        }
    }
    Ok(added)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| map_err("table_info", e))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| map_err("table_info", e))?;
    while let Some(row) = rows.next().map_err(|e| map_err("table_info", e))? {
        let name: String = row.get(1).map_err(|e| map_err("table_info", e))?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
