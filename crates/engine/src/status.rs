//! Aggregate status report over the store

use nautilus_core::Result;
use nautilus_store::{map_err, Store};
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot of store-wide counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Database file path
    pub db_path: String,
    /// Database file size in bytes (0 for in-memory)
    pub db_size_bytes: u64,
    /// Tracked chunks
    pub chunk_count: u64,
    /// Sum of per-chunk access counts
    pub access_total: u64,
    /// Rows in the access log
    pub access_log_rows: u64,
    /// Chunk counts per chamber
    pub chambers: BTreeMap<String, u64>,
    /// Chunks carrying at least one tag
    pub tagged_chunks: u64,
    /// Distinct mirrored events
    pub mirror_events: u64,
    /// Mirror rows
    pub mirror_rows: u64,
}

/// Collect the status counters.
pub fn status(store: &Store) -> Result<StatusReport> {
    store.read(|conn| {
        let single = |sql: &str| -> Result<u64> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|v| v.max(0) as u64)
                .map_err(|e| map_err("status", e))
        };

        let chunk_count = single("SELECT COUNT(*) FROM gravity")?;
        let access_total = single("SELECT COALESCE(SUM(access_count), 0) FROM gravity")?;
        let access_log_rows = single("SELECT COUNT(*) FROM access_log")?;
        let tagged_chunks = single("SELECT COUNT(*) FROM gravity WHERE tags != '[]'")?;
        let mirror_events = single("SELECT COUNT(DISTINCT event_key) FROM mirrors")?;
        let mirror_rows = single("SELECT COUNT(*) FROM mirrors")?;

        let mut chambers = BTreeMap::new();
        let mut stmt = conn
            .prepare("SELECT chamber, COUNT(*) FROM gravity GROUP BY chamber")
            .map_err(|e| map_err("status", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| map_err("status", e))?;
        for row in rows {
            let (chamber, count) = row.map_err(|e| map_err("status", e))?;
            chambers.insert(chamber, count.max(0) as u64);
        }

        Ok(StatusReport {
            db_path: store.path().display().to_string(),
            db_size_bytes: store.db_size(),
            chunk_count,
            access_total,
            access_log_rows,
            chambers,
            tagged_chunks,
            mirror_events,
            mirror_rows,
        })
    })
}
