//! Mirror index: linking granularities of one event
//!
//! A mirror associates up to three renditions of the same logical event
//! (the raw file, a corridor summary, and a vault lesson) under one stable
//! event key. Resolving any member path returns all siblings, so a search
//! hit on a verbose transcript can surface its distilled lesson and vice
//! versa.

use chrono::{DateTime, Utc};
use nautilus_core::{
    Granularity, MirrorEntry, MirrorSet, NautilusConfig, NautilusError, Result,
};
use nautilus_store::{map_err, mirror_from_row, Store};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

/// `corridor-2026-01-01.md` / `vault-2026-01-01.md` → capture the date.
static DATED_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:corridor|vault)-(\d{4}-\d{2}-\d{2})\.md$").expect("static pattern")
});

/// Counts reported by [`Mirrors::auto_link`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AutoLinkStats {
    /// Summary/lesson files examined
    pub scanned: usize,
    /// Mirror rows created or refreshed
    pub linked: usize,
}

/// Mirror operations bound to a store.
pub struct Mirrors<'s> {
    store: &'s Store,
}

impl<'s> Mirrors<'s> {
    /// Bind mirror operations to `store`.
    pub fn new(store: &'s Store) -> Self {
        Mirrors { store }
    }

    /// Link up to three granularities of one event atomically.
    ///
    /// Existing `(event_key, granularity)` rows are overwritten; replacing
    /// a row that pointed at a different path logs a conflict warning per
    /// the overwrite-and-warn policy.
    pub fn link(
        &self,
        event_key: &str,
        raw_path: &str,
        summary_path: Option<&str>,
        lesson_path: Option<&str>,
    ) -> Result<()> {
        if event_key.is_empty() {
            return Err(NautilusError::invalid_argument("event key must be non-empty"));
        }
        let now = Utc::now();
        let entries: Vec<(Granularity, &str)> = std::iter::once((Granularity::Raw, raw_path))
            .chain(summary_path.map(|p| (Granularity::Summary, p)))
            .chain(lesson_path.map(|p| (Granularity::Lesson, p)))
            .collect();

        self.store.transaction(|conn| {
            for (granularity, path) in &entries {
                self.upsert_row(conn, event_key, *granularity, path, now)?;
            }
            Ok(())
        })
    }

    /// Upsert a single granularity row. Used by promotion, which adds the
    /// summary/lesson next to an existing raw link.
    pub fn link_one(
        &self,
        event_key: &str,
        granularity: Granularity,
        path: &str,
    ) -> Result<()> {
        if event_key.is_empty() {
            return Err(NautilusError::invalid_argument("event key must be non-empty"));
        }
        let now = Utc::now();
        self.store
            .transaction(|conn| self.upsert_row(conn, event_key, granularity, path, now))
    }

    fn upsert_row(
        &self,
        conn: &rusqlite::Connection,
        event_key: &str,
        granularity: Granularity,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT path FROM mirrors WHERE event_key = ?1 AND granularity = ?2",
                rusqlite::params![event_key, granularity.as_str()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(map_err("check mirror", other)),
            })?;

        if let Some(existing) = existing {
            if existing != path {
                let conflict = NautilusError::MirrorConflict {
                    event_key: event_key.to_string(),
                    granularity: granularity.as_str().to_string(),
                    existing,
                    replacement: path.to_string(),
                };
                tracing::warn!(target: "nautilus::mirrors", "{}", conflict);
            }
        }

        conn.execute(
            "INSERT INTO mirrors (event_key, granularity, path, created_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(event_key, granularity) DO UPDATE SET \
             path = excluded.path, created_at = excluded.created_at",
            rusqlite::params![event_key, granularity.as_str(), path, now],
        )
        .map_err(|e| map_err("link mirror", e))?;
        Ok(())
    }

    /// Resolve a path or event key to all sibling granularities.
    ///
    /// When the argument matches an existing mirror path, its event key is
    /// resolved first. Siblings come back ordered raw → summary → lesson.
    ///
    /// # Errors
    ///
    /// `NotFound` when neither interpretation matches anything.
    pub fn resolve(&self, path_or_key: &str) -> Result<MirrorSet> {
        let event_key = match self.event_key_of(path_or_key)? {
            Some(key) => key,
            None => path_or_key.to_string(),
        };
        let mut mirrors = self.entries_for(&event_key)?;
        if mirrors.is_empty() {
            return Err(NautilusError::not_found(format!(
                "no mirror for '{}'",
                path_or_key
            )));
        }
        mirrors.sort_by_key(|entry| entry.granularity.order());
        Ok(MirrorSet { event_key, mirrors })
    }

    /// Resolve a path to its mirror set, returning `None` instead of
    /// `NotFound`. The search pipeline attaches mirrors only when present.
    pub fn resolve_path(&self, path: &str) -> Result<Option<MirrorSet>> {
        match self.resolve(path) {
            Ok(set) => Ok(Some(set)),
            Err(NautilusError::NotFound { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn event_key_of(&self, path: &str) -> Result<Option<String>> {
        self.store.read(|conn| {
            conn.query_row(
                "SELECT event_key FROM mirrors WHERE path = ?1 LIMIT 1",
                rusqlite::params![path],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(map_err("resolve mirror path", other)),
            })
        })
    }

    fn entries_for(&self, event_key: &str) -> Result<Vec<MirrorEntry>> {
        self.store.read(|conn| {
            let mut stmt = conn
                .prepare("SELECT granularity, path FROM mirrors WHERE event_key = ?1")
                .map_err(|e| map_err("resolve mirror", e))?;
            let rows = stmt
                .query_map(rusqlite::params![event_key], mirror_from_row)
                .map_err(|e| map_err("resolve mirror", e))?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(|e| map_err("resolve mirror", e))?);
            }
            Ok(entries)
        })
    }

    /// Remove all rows of an event.
    ///
    /// Returns the number of rows removed; removing a nonexistent key is
    /// not an error.
    pub fn unlink(&self, event_key: &str) -> Result<usize> {
        self.store.transaction(|conn| {
            conn.execute(
                "DELETE FROM mirrors WHERE event_key = ?1",
                rusqlite::params![event_key],
            )
            .map_err(|e| map_err("unlink mirror", e))
        })
    }

    /// Scan corridor and vault files for embedded dates and link them to
    /// their daily raw file when it exists.
    ///
    /// `memory/corridors/corridor-YYYY-MM-DD.md` links to
    /// `memory/YYYY-MM-DD.md` under `event_key = daily-YYYY-MM-DD`; vault
    /// files link analogously with granularity `lesson`.
    pub fn auto_link(&self, config: &NautilusConfig) -> Result<AutoLinkStats> {
        let mut stats = AutoLinkStats::default();
        let memory_root = config.memory_root();

        for (dir, granularity) in [
            (config.corridors_dir(), Granularity::Summary),
            (config.vaults_dir(), Granularity::Lesson),
        ] {
            if !dir.is_dir() {
                continue;
            }
            let entries = std::fs::read_dir(&dir).map_err(|e| {
                NautilusError::invalid_argument(format!(
                    "cannot scan {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let Some(caps) = DATED_SUMMARY.captures(&name) else {
                    continue;
                };
                stats.scanned += 1;
                let date = &caps[1];
                let raw_abs = memory_root.join(format!("{}.md", date));
                if !raw_abs.is_file() {
                    continue;
                }
                let event_key = format!("daily-{}", date);
                let raw_rel = config.relative_path(&raw_abs);
                let file_rel = config.relative_path(&entry.path());
                self.link_one(&event_key, Granularity::Raw, &raw_rel)?;
                self.link_one(&event_key, granularity, &file_rel)?;
                stats.linked += 1;
            }
        }

        tracing::debug!(
            target: "nautilus::mirrors",
            scanned = stats.scanned,
            linked = stats.linked,
            "auto-link pass complete"
        );
        Ok(stats)
    }
}

/// Event key for a memory file: `daily-YYYY-MM-DD` for dated files,
/// `file-<stem>` otherwise.
pub fn event_key_for_file(path: &str) -> String {
    static DATED_FILE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})$").expect("static pattern"));
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    if DATED_FILE.is_match(&stem) {
        format!("daily-{}", stem)
    } else {
        format!("file-{}", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_and_resolve_by_key() {
        let store = Store::open_in_memory().unwrap();
        let mirrors = Mirrors::new(&store);
        mirrors
            .link(
                "daily-2026-01-01",
                "memory/2026-01-01.md",
                Some("memory/corridors/corridor-2026-01-01.md"),
                None,
            )
            .unwrap();

        let set = mirrors.resolve("daily-2026-01-01").unwrap();
        assert_eq!(set.event_key, "daily-2026-01-01");
        assert_eq!(set.mirrors.len(), 2);
        assert_eq!(set.mirrors[0].granularity, Granularity::Raw);
        assert_eq!(set.mirrors[1].granularity, Granularity::Summary);
    }

    #[test]
    fn test_resolve_by_member_path_matches_key() {
        let store = Store::open_in_memory().unwrap();
        let mirrors = Mirrors::new(&store);
        mirrors
            .link("daily-2026-01-01", "memory/2026-01-01.md", None, Some("memory/vaults/vault-2026-01-01.md"))
            .unwrap();

        let by_path = mirrors.resolve("memory/vaults/vault-2026-01-01.md").unwrap();
        let by_key = mirrors.resolve("daily-2026-01-01").unwrap();
        assert_eq!(by_path, by_key);
    }

    #[test]
    fn test_link_overwrites_same_slot() {
        let store = Store::open_in_memory().unwrap();
        let mirrors = Mirrors::new(&store);
        mirrors.link("e", "a.md", Some("s1.md"), None).unwrap();
        mirrors.link("e", "a.md", Some("s2.md"), None).unwrap();

        let set = mirrors.resolve("e").unwrap();
        let summary: Vec<_> = set
            .mirrors
            .iter()
            .filter(|m| m.granularity == Granularity::Summary)
            .collect();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].path, "s2.md");
    }

    #[test]
    fn test_resolve_unknown_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let mirrors = Mirrors::new(&store);
        assert!(matches!(
            mirrors.resolve("nothing"),
            Err(NautilusError::NotFound { .. })
        ));
        assert_eq!(mirrors.resolve_path("nothing").unwrap(), None);
    }

    #[test]
    fn test_unlink_removes_event() {
        let store = Store::open_in_memory().unwrap();
        let mirrors = Mirrors::new(&store);
        mirrors.link("e", "a.md", Some("s.md"), Some("l.md")).unwrap();
        assert_eq!(mirrors.unlink("e").unwrap(), 3);
        assert!(mirrors.resolve("e").is_err());
        assert_eq!(mirrors.unlink("e").unwrap(), 0);
    }

    #[test]
    fn test_empty_event_key_rejected() {
        let store = Store::open_in_memory().unwrap();
        let mirrors = Mirrors::new(&store);
        assert!(mirrors.link("", "a.md", None, None).is_err());
    }

    #[test]
    fn test_auto_link_daily_files() {
        let store = Store::open_in_memory().unwrap();
        let mirrors = Mirrors::new(&store);
        let dir = tempfile::tempdir().unwrap();
        let mut config = NautilusConfig::default();
        config.workspace_dir = dir.path().to_path_buf();

        let memory = config.memory_root();
        std::fs::create_dir_all(config.corridors_dir()).unwrap();
        std::fs::write(memory.join("2026-01-01.md"), "raw day").unwrap();
        std::fs::write(
            config.corridors_dir().join("corridor-2026-01-01.md"),
            "summary",
        )
        .unwrap();
        // Dated corridor file without a raw counterpart: scanned, not linked.
        std::fs::write(
            config.corridors_dir().join("corridor-2026-02-02.md"),
            "summary",
        )
        .unwrap();

        let stats = mirrors.auto_link(&config).unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.linked, 1);

        let set = mirrors.resolve("daily-2026-01-01").unwrap();
        assert_eq!(set.mirrors.len(), 2);
        assert_eq!(set.mirrors[0].path, "memory/2026-01-01.md");
    }

    #[test]
    fn test_event_key_for_file() {
        assert_eq!(event_key_for_file("memory/2026-01-01.md"), "daily-2026-01-01");
        assert_eq!(event_key_for_file("memory/lessons.md"), "file-lessons");
    }
}
