//! On-disk migration and reopen behavior.

use nautilus_store::{Store, CHUNK_COLUMNS};
use rusqlite::Connection;

#[test]
fn legacy_database_gains_additive_columns() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nautilus.db");

    // A database written before tags/chamber/context existed.
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE gravity (
                path TEXT NOT NULL,
                line_start INTEGER NOT NULL DEFAULT 0,
                line_end INTEGER NOT NULL DEFAULT 0,
                access_count INTEGER NOT NULL DEFAULT 0,
                reference_count INTEGER NOT NULL DEFAULT 0,
                explicit_importance REAL NOT NULL DEFAULT 0.0,
                last_accessed_at TEXT,
                last_written_at TEXT,
                created_at TEXT NOT NULL,
                superseded_by TEXT,
                PRIMARY KEY (path, line_start, line_end)
            );
            CREATE TABLE access_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                line_start INTEGER NOT NULL DEFAULT 0,
                line_end INTEGER NOT NULL DEFAULT 0,
                accessed_at TEXT NOT NULL,
                query TEXT,
                score REAL
            );
            INSERT INTO gravity (path, access_count, created_at)
                VALUES ('memory/old.md', 7, '2025-06-01T00:00:00+00:00');
            "#,
        )
        .unwrap();
    }

    // Opening migrates additively; existing data survives.
    let store = Store::open(&db_path).unwrap();
    let record = store
        .read(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM gravity WHERE path = 'memory/old.md'",
                    CHUNK_COLUMNS
                ),
                [],
                nautilus_store::chunk_from_row,
            )
            .map_err(|e| nautilus_store::map_err("get", e))
        })
        .unwrap();
    assert_eq!(record.access_count, 7);
    assert!(record.tags.is_empty());
    assert_eq!(record.chamber, nautilus_core::Chamber::Unknown);

    // Mirrors table was created alongside.
    let mirrors: i64 = store
        .read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM mirrors", [], |row| row.get(0))
                .map_err(|e| nautilus_store::map_err("count", e))
        })
        .unwrap();
    assert_eq!(mirrors, 0);
}

#[test]
fn reopen_preserves_data_and_wal_mode() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nautilus.db");
    {
        let store = Store::open(&db_path).unwrap();
        store
            .write(|conn| {
                conn.execute(
                    "INSERT INTO gravity (path, created_at) \
                     VALUES ('a.md', '2026-01-01T00:00:00+00:00')",
                    [],
                )
                .map_err(|e| nautilus_store::map_err("insert", e))?;
                Ok(())
            })
            .unwrap();
    }

    let store = Store::open(&db_path).unwrap();
    let count: i64 = store
        .read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM gravity", [], |row| row.get(0))
                .map_err(|e| nautilus_store::map_err("count", e))
        })
        .unwrap();
    assert_eq!(count, 1);

    let journal_mode: String = store
        .read(|conn| {
            conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| nautilus_store::map_err("pragma", e))
        })
        .unwrap();
    assert_eq!(journal_mode.to_lowercase(), "wal");
    assert!(store.db_size() > 0);
}
