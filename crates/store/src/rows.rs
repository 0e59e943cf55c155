//! Typed row mappers shared by the engine modules
//!
//! Chunk rows are read by gravity, doors, chambers, pipeline, and status;
//! the column list and its mapper live here so the shape is defined once.

use chrono::{DateTime, Utc};
use nautilus_core::{Chamber, ChunkKey, Granularity, GravityRecord, MirrorEntry};
use rusqlite::Row;

/// Column list matching [`chunk_from_row`], in order.
pub const CHUNK_COLUMNS: &str = "path, line_start, line_end, access_count, reference_count, \
     explicit_importance, last_accessed_at, last_written_at, created_at, \
     superseded_by, tags, chamber";

/// Map one `gravity` row into a [`GravityRecord`].
///
/// Malformed persisted JSON in the `tags` column surfaces as a conversion
/// failure, which the store classifies as corruption.
pub fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<GravityRecord> {
    let tags_json: String = row.get(10)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    let chamber: String = row.get(11)?;

    Ok(GravityRecord {
        key: ChunkKey {
            path: row.get(0)?,
            line_start: row.get(1)?,
            line_end: row.get(2)?,
        },
        access_count: row.get(3)?,
        reference_count: row.get(4)?,
        explicit_importance: row.get(5)?,
        last_accessed_at: row.get::<_, Option<DateTime<Utc>>>(6)?,
        last_written_at: row.get::<_, Option<DateTime<Utc>>>(7)?,
        created_at: row.get(8)?,
        superseded_by: row.get(9)?,
        tags,
        chamber: Chamber::parse(&chamber),
    })
}

/// Map one `mirrors` row (`granularity, path` columns) into a
/// [`MirrorEntry`].
pub fn mirror_from_row(row: &Row<'_>) -> rusqlite::Result<MirrorEntry> {
    let granularity: String = row.get(0)?;
    let granularity = Granularity::parse(&granularity).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
        )
    })?;
    Ok(MirrorEntry {
        granularity,
        path: row.get(1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_chunk_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO gravity (path, line_start, line_end, access_count, \
             explicit_importance, created_at, tags, chamber) \
             VALUES ('a.md', 3, 9, 7, 1.5, '2026-01-01T00:00:00+00:00', \
             '[\"topic:memory\"]', 'corridor')",
            [],
        )
        .unwrap();

        let record = conn
            .query_row(
                &format!("SELECT {} FROM gravity WHERE path = 'a.md'", CHUNK_COLUMNS),
                [],
                chunk_from_row,
            )
            .unwrap();
        assert_eq!(record.key, ChunkKey::range("a.md", 3, 9).unwrap());
        assert_eq!(record.access_count, 7);
        assert_eq!(record.explicit_importance, 1.5);
        assert_eq!(record.tags, vec!["topic:memory"]);
        assert_eq!(record.chamber, Chamber::Corridor);
        assert!(record.last_written_at.is_none());
    }

    #[test]
    fn test_malformed_tags_is_conversion_failure() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO gravity (path, created_at, tags) \
             VALUES ('bad.md', '2026-01-01T00:00:00+00:00', 'not json')",
            [],
        )
        .unwrap();
        let result = conn.query_row(
            &format!("SELECT {} FROM gravity WHERE path = 'bad.md'", CHUNK_COLUMNS),
            [],
            chunk_from_row,
        );
        assert!(result.is_err());
    }
}
