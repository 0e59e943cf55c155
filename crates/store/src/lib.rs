//! Embedded SQLite store for Nautilus
//!
//! Durable persistence with many-reader/one-writer concurrency and crash
//! safety. The store exclusively owns all persistent data: gravity records,
//! the append-only access log, and mirror rows. Engine components hold only
//! transient borrows of the store within a single operation.
//!
//! Concurrency comes from SQLite itself: write-ahead logging for concurrent
//! reads, a multi-second busy timeout for lock contention, and serialized
//! writes. `rusqlite::Connection` is not `Sync`, so the connection sits
//! behind a mutex; a multi-threaded caller may instead open one `Store` per
//! thread against the same path.
//!
//! Failure model: an operation that cannot succeed after the busy-timeout
//! retries fails with `StoreUnavailable`. Corruption surfaces as
//! `StoreCorrupt` and is never auto-repaired.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod rows;
pub mod schema;

pub use rows::{chunk_from_row, mirror_from_row, CHUNK_COLUMNS};

use chrono::{DateTime, Duration, Utc};
use nautilus_core::{NautilusError, Result};
use rusqlite::{Connection, ErrorCode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Lock-contention window before a statement fails busy, in milliseconds.
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Bounded retry count for write transactions that fail busy even after
/// the timeout.
const MAX_WRITE_ATTEMPTS: u32 = 3;

// ============================================================================
// Error mapping
// ============================================================================

/// Classify a driver error into the Nautilus error model.
///
/// Busy/locked → `StoreUnavailable` (retryable). Corrupt/not-a-database and
/// malformed-row conversions → `StoreCorrupt`. Missing rows → `NotFound`.
/// Everything else is treated as transient unavailability with the driver
/// error preserved as source.
pub fn map_err(op: &str, e: rusqlite::Error) -> NautilusError {
    match &e {
        rusqlite::Error::SqliteFailure(ffi, _) => match ffi.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                NautilusError::store_unavailable_with_source(format!("{}: busy", op), e)
            }
            ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                NautilusError::store_corrupt(format!("{}: {}", op, e))
            }
            _ => NautilusError::store_unavailable_with_source(op.to_string(), e),
        },
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => {
            NautilusError::store_corrupt(format!("{}: malformed row: {}", op, e))
        }
        rusqlite::Error::QueryReturnedNoRows => {
            NautilusError::not_found(op.to_string())
        }
        _ => NautilusError::store_unavailable_with_source(op.to_string(), e),
    }
}

// ============================================================================
// Store
// ============================================================================

/// Counts reported by [`Store::vacuum`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VacuumStats {
    /// Access-log rows older than the retention threshold that were pruned
    pub pruned_log_rows: usize,
    /// Chunks with zero activity that were pruned
    pub pruned_chunks: usize,
}

/// Handle to the embedded database.
pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    /// Open or create the database at `db_path`.
    ///
    /// Creates parent directories and the schema if absent, enables WAL for
    /// concurrent reads, and sets the busy timeout. Additive migration runs
    /// on every open and is a no-op once the columns exist.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NautilusError::store_unavailable_with_source(
                    format!("create state dir {}", parent.display()),
                    e,
                )
            })?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| map_err("open database", e))?;
        Self::configure(conn, db_path.to_path_buf())
    }

    /// Open an ephemeral in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| map_err("open in-memory database", e))?;
        Self::configure(conn, PathBuf::from(":memory:"))
    }

    fn configure(conn: Connection, path: PathBuf) -> Result<Self> {
        // WAL allows readers during a write; NORMAL sync is durable enough
        // under WAL. In-memory databases reject WAL, hence the fallback.
        let pragmas = format!(
            "PRAGMA journal_mode = WAL;\n\
             PRAGMA busy_timeout = {};\n\
             PRAGMA synchronous = NORMAL;\n\
             PRAGMA foreign_keys = ON;",
            BUSY_TIMEOUT_MS
        );
        if let Err(e) = conn.execute_batch(&pragmas) {
            if path != Path::new(":memory:") {
                return Err(map_err("pragma init", e));
            }
        }

        let added = schema::initialize(&conn)?;
        if !added.is_empty() {
            tracing::info!(
                target: "nautilus::store",
                columns = ?added,
                "additive schema migration applied"
            );
        }

        Ok(Store {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Database file size in bytes; 0 for in-memory databases.
    pub fn db_size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        // A poisoned mutex means a panic mid-write; continuing would risk
        // acting on a half-applied state.
        self.conn.lock().map_err(|_| {
            NautilusError::store_unavailable("connection mutex poisoned")
        })
    }

    /// Run a read-only closure against the connection.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run a single-statement write closure. Each call is atomic.
    pub fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a serializable write transaction.
    ///
    /// Retries transient busy failures up to a bounded count before
    /// surfacing `StoreUnavailable`. The closure may run more than once and
    /// must not carry side effects outside the store.
    pub fn transaction<T>(&self, f: impl Fn(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let mut attempt = 1;
        loop {
            let result = Self::run_transaction(&mut conn, &f);
            match result {
                Err(ref e) if e.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::warn!(
                        target: "nautilus::store",
                        attempt,
                        error = %e,
                        "write transaction busy, retrying"
                    );
                    attempt += 1;
                    std::thread::sleep(std::time::Duration::from_millis(50 * attempt as u64));
                }
                other => return other,
            }
        }
    }

    fn run_transaction<T>(
        conn: &mut Connection,
        f: &impl Fn(&Connection) -> Result<T>,
    ) -> Result<T> {
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(|e| map_err("begin transaction", e))?;
        let value = f(&tx)?;
        tx.commit().map_err(|e| map_err("commit", e))?;
        Ok(value)
    }

    /// Run `PRAGMA integrity_check` and surface anything but "ok" as
    /// corruption.
    pub fn integrity_check(&self) -> Result<()> {
        self.read(|conn| {
            let verdict: String = conn
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))
                .map_err(|e| map_err("integrity_check", e))?;
            if verdict == "ok" {
                Ok(())
            } else {
                Err(NautilusError::store_corrupt(verdict))
            }
        })
    }

    /// Prune access-log rows older than `retention_days` and chunks with
    /// zero activity (never accessed, written, or boosted).
    pub fn vacuum(&self, retention_days: u32, now: DateTime<Utc>) -> Result<VacuumStats> {
        let cutoff = now - Duration::days(retention_days as i64);
        self.transaction(|conn| {
            let pruned_log_rows = conn
                .execute(
                    "DELETE FROM access_log WHERE accessed_at < ?1",
                    [&cutoff],
                )
                .map_err(|e| map_err("vacuum access_log", e))?;
            let pruned_chunks = conn
                .execute(
                    "DELETE FROM gravity \
                     WHERE access_count = 0 AND reference_count = 0 \
                       AND explicit_importance = 0.0 \
                       AND last_accessed_at IS NULL AND last_written_at IS NULL",
                    [],
                )
                .map_err(|e| map_err("vacuum gravity", e))?;
            Ok(VacuumStats {
                pruned_log_rows,
                pruned_chunks,
            })
        })
    }
}
