//! Per-chunk importance tracking and re-ranking
//!
//! Gravity records how the agent actually uses memory (accesses, writes,
//! explicit boosts), computes an effective mass per chunk, and multiplies
//! retrieval scores by a logarithmic modifier of that mass.
//!
//! Access counts alone bias toward old, often-used files; recency alone
//! ignores what the agent references. The weighted base with an authority
//! boost lets newly-written content outrank stale but well-trodden chunks
//! for the first two days, then fall back to the access-weighted recency
//! curve.

use chrono::{DateTime, Duration, Utc};
use nautilus_core::{
    ChunkKey, GravityAnnotation, GravityConfig, NautilusError, Result, SearchResult,
};
use nautilus_core::GravityRecord;
use nautilus_store::{chunk_from_row, map_err, Store, CHUNK_COLUMNS};
use serde::Serialize;
use std::collections::HashMap;

/// Weight of one access in the mass base.
const ACCESS_WEIGHT: f64 = 0.3;
/// Weight of one cross-reference in the mass base.
const REFERENCE_WEIGHT: f64 = 0.5;
/// Writes younger than this many days earn the authority boost.
const AUTHORITY_WINDOW_DAYS: f64 = 2.0;
/// Chunks unaccessed for at least this long are decay candidates.
const DECAY_IDLE_DAYS: i64 = 30;
/// Chunks unwritten for at least this long are decay candidates.
const DECAY_UNWRITTEN_DAYS: i64 = 14;

// ============================================================================
// Pure scoring functions
// ============================================================================

/// Effective mass of a chunk at `now`.
///
/// ```text
/// base      = 0.3·access_count + 0.5·reference_count + explicit_importance
/// recency   = 1 / (1 + decay_rate · days_since_write)
/// authority = authority_boost if written < 2 days ago else 0
/// mass      = min(base · recency + authority, mass_cap)
/// ```
///
/// A chunk that has never been written uses its row creation time for the
/// recency curve and never earns the authority boost.
pub fn effective_mass(record: &GravityRecord, now: DateTime<Utc>, config: &GravityConfig) -> f64 {
    let base = ACCESS_WEIGHT * record.access_count as f64
        + REFERENCE_WEIGHT * record.reference_count as f64
        + record.explicit_importance;

    let write_anchor = record.last_written_at.unwrap_or(record.created_at);
    let days_since_write = days_between(write_anchor, now);
    let recency = 1.0 / (1.0 + config.decay_rate * days_since_write);

    let authority = match record.last_written_at {
        Some(written) if days_between(written, now) < AUTHORITY_WINDOW_DAYS => {
            config.authority_boost
        }
        _ => 0.0,
    };

    (base * recency + authority).min(config.mass_cap)
}

/// Score multiplier for a given mass: `1 + 0.1·ln(1 + mass)`.
///
/// `score_modifier(0) == 1.0` and the function is monotonic non-decreasing.
pub fn score_modifier(mass: f64) -> f64 {
    1.0 + 0.1 * (1.0 + mass.max(0.0)).ln()
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let seconds = (to - from).num_seconds().max(0) as f64;
    seconds / 86_400.0
}

/// Per-component breakdown of a chunk's mass, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MassBreakdown {
    /// Weighted sum of counters and explicit importance
    pub base: f64,
    /// Recency multiplier in (0, 1]
    pub recency: f64,
    /// Authority boost applied, or 0
    pub authority: f64,
    /// Days since the authority timestamp
    pub days_since_write: f64,
    /// Capped effective mass
    pub effective_mass: f64,
    /// Resulting score modifier
    pub modifier: f64,
}

/// Compute the full breakdown for one record.
pub fn mass_breakdown(
    record: &GravityRecord,
    now: DateTime<Utc>,
    config: &GravityConfig,
) -> MassBreakdown {
    let base = ACCESS_WEIGHT * record.access_count as f64
        + REFERENCE_WEIGHT * record.reference_count as f64
        + record.explicit_importance;
    let write_anchor = record.last_written_at.unwrap_or(record.created_at);
    let days_since_write = days_between(write_anchor, now);
    let recency = 1.0 / (1.0 + config.decay_rate * days_since_write);
    let authority = match record.last_written_at {
        Some(written) if days_between(written, now) < AUTHORITY_WINDOW_DAYS => {
            config.authority_boost
        }
        _ => 0.0,
    };
    let mass = (base * recency + authority).min(config.mass_cap);
    MassBreakdown {
        base,
        recency,
        authority,
        days_since_write,
        effective_mass: mass,
        modifier: score_modifier(mass),
    }
}

// ============================================================================
// Gravity
// ============================================================================

/// Importance tracker bound to a store for one logical operation.
pub struct Gravity<'s> {
    store: &'s Store,
    config: GravityConfig,
}

impl<'s> Gravity<'s> {
    /// Bind gravity operations to `store` with the given tunables.
    pub fn new(store: &'s Store, config: &GravityConfig) -> Self {
        Gravity {
            store,
            config: config.clone(),
        }
    }

    /// Record one retrieval use of a chunk.
    ///
    /// Upserts the chunk (created lazily on first touch), increments its
    /// access count, stamps `last_accessed_at`, and appends an access-log
    /// row carrying the query and score when known.
    pub fn record_access(
        &self,
        path: &str,
        lines: Option<(u32, u32)>,
        query: Option<&str>,
        score: Option<f64>,
    ) -> Result<()> {
        let key = key_for(path, lines)?;
        self.record_access_at(&key, query, score, Utc::now())
    }

    pub(crate) fn record_access_at(
        &self,
        key: &ChunkKey,
        query: Option<&str>,
        score: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store.transaction(|conn| {
            conn.execute(
                "INSERT INTO gravity \
                 (path, line_start, line_end, access_count, created_at, last_accessed_at) \
                 VALUES (?1, ?2, ?3, 1, ?4, ?4) \
                 ON CONFLICT(path, line_start, line_end) DO UPDATE SET \
                 access_count = access_count + 1, \
                 last_accessed_at = excluded.last_accessed_at",
                rusqlite::params![key.path, key.line_start, key.line_end, now],
            )
            .map_err(|e| map_err("record access", e))?;
            conn.execute(
                "INSERT INTO access_log (path, line_start, line_end, accessed_at, query, score) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![key.path, key.line_start, key.line_end, now, query, score],
            )
            .map_err(|e| map_err("append access log", e))?;
            Ok(())
        })
    }

    /// Register that a file was written.
    ///
    /// Stamps `last_written_at` on every chunk of the path; creates the
    /// whole-file chunk when the path is not yet tracked.
    pub fn record_write(&self, path: &str) -> Result<()> {
        self.record_write_at(path, Utc::now())
    }

    pub(crate) fn record_write_at(&self, path: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.transaction(|conn| {
            let updated = conn
                .execute(
                    "UPDATE gravity SET last_written_at = ?2 WHERE path = ?1",
                    rusqlite::params![path, now],
                )
                .map_err(|e| map_err("record write", e))?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO gravity (path, line_start, line_end, created_at, last_written_at) \
                     VALUES (?1, 0, 0, ?2, ?2)",
                    rusqlite::params![path, now],
                )
                .map_err(|e| map_err("create chunk on write", e))?;
            }
            Ok(())
        })
    }

    /// Increase a chunk's explicit importance by `amount` (≥ 0).
    ///
    /// The chunk is created when absent, so a boost is never silently lost.
    pub fn boost(&self, path: &str, amount: f64, lines: Option<(u32, u32)>) -> Result<()> {
        if amount < 0.0 || !amount.is_finite() {
            return Err(NautilusError::invalid_argument(format!(
                "boost amount must be a non-negative number, got {}",
                amount
            )));
        }
        let key = key_for(path, lines)?;
        let now = Utc::now();
        self.store.transaction(|conn| {
            conn.execute(
                "INSERT INTO gravity \
                 (path, line_start, line_end, explicit_importance, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(path, line_start, line_end) DO UPDATE SET \
                 explicit_importance = explicit_importance + excluded.explicit_importance",
                rusqlite::params![key.path, key.line_start, key.line_end, amount, now],
            )
            .map_err(|e| map_err("boost", e))?;
            Ok(())
        })
    }

    /// Apply one decay step.
    ///
    /// Chunks inactive for ≥ 30 days and unwritten for ≥ 14 days have their
    /// explicit importance multiplied by `(1 − decay_rate)`; activity in
    /// either window protects the chunk. Returns the number of chunks
    /// touched.
    pub fn decay(&self) -> Result<usize> {
        self.decay_at(Utc::now())
    }

    pub(crate) fn decay_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let idle_cutoff = now - Duration::days(DECAY_IDLE_DAYS);
        let written_cutoff = now - Duration::days(DECAY_UNWRITTEN_DAYS);
        let factor = 1.0 - self.config.decay_rate;
        let decayed = self.store.transaction(|conn| {
            conn.execute(
                "UPDATE gravity SET explicit_importance = explicit_importance * ?1 \
                 WHERE explicit_importance > 0 \
                   AND (last_accessed_at IS NULL OR last_accessed_at < ?2) \
                   AND (last_written_at IS NULL OR last_written_at < ?3)",
                rusqlite::params![factor, idle_cutoff, written_cutoff],
            )
            .map_err(|e| map_err("decay", e))
        })?;
        tracing::debug!(target: "nautilus::gravity", decayed, "decay step applied");
        Ok(decayed)
    }

    /// Fetch one chunk's record.
    ///
    /// # Errors
    ///
    /// `NotFound` when the chunk is not in the store.
    pub fn get(&self, path: &str, lines: Option<(u32, u32)>) -> Result<GravityRecord> {
        let key = key_for(path, lines)?;
        self.store.read(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM gravity \
                     WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                    CHUNK_COLUMNS
                ),
                rusqlite::params![key.path, key.line_start, key.line_end],
                chunk_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    NautilusError::not_found(format!("chunk {}", key))
                }
                other => map_err("get chunk", other),
            })
        })
    }

    /// Load the gravity records for a set of keys, as a snapshot.
    ///
    /// Missing chunks are simply absent from the map; `rerank` treats them
    /// as pass-through.
    pub fn load(&self, keys: &[ChunkKey]) -> Result<HashMap<ChunkKey, GravityRecord>> {
        self.store.read(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM gravity \
                     WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                    CHUNK_COLUMNS
                ))
                .map_err(|e| map_err("load gravity", e))?;
            let mut snapshot = HashMap::with_capacity(keys.len());
            for key in keys {
                let record = stmt
                    .query_row(
                        rusqlite::params![key.path, key.line_start, key.line_end],
                        chunk_from_row,
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(map_err("load gravity", other)),
                    })?;
                if let Some(record) = record {
                    snapshot.insert(key.clone(), record);
                }
            }
            Ok(snapshot)
        })
    }

    /// Re-rank results against the current store state.
    ///
    /// Convenience wrapper over [`Gravity::load`] + [`rerank_with`]; store
    /// failures degrade to pass-through annotations rather than failing the
    /// caller.
    pub fn rerank(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let keys: Vec<ChunkKey> = results.iter().map(|r| r.key()).collect();
        let snapshot = match self.load(&keys) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    target: "nautilus::gravity",
                    error = %e,
                    "gravity snapshot unavailable, passing results through"
                );
                HashMap::new()
            }
        };
        rerank_with(results, &snapshot, Utc::now(), &self.config)
    }
}

/// Re-rank `results` against a preloaded gravity snapshot.
///
/// Each record is annotated with `{effective_mass, modifier, superseded}`
/// and its score multiplied by the modifier. Chunks absent from the
/// snapshot pass through with modifier 1.0. Output is sorted by adjusted
/// score descending, ties broken by `last_written_at` descending, then by
/// path ascending.
pub fn rerank_with(
    results: Vec<SearchResult>,
    snapshot: &HashMap<ChunkKey, GravityRecord>,
    now: DateTime<Utc>,
    config: &GravityConfig,
) -> Vec<SearchResult> {
    let mut ranked: Vec<(SearchResult, Option<DateTime<Utc>>)> = results
        .into_iter()
        .map(|mut result| {
            let record = snapshot.get(&result.key());
            let (annotation, written) = match record {
                Some(record) => {
                    let mass = effective_mass(record, now, config);
                    (
                        GravityAnnotation {
                            effective_mass: mass,
                            modifier: score_modifier(mass),
                            superseded: record.superseded_by.is_some(),
                        },
                        record.last_written_at,
                    )
                }
                None => (GravityAnnotation::pass_through(), None),
            };
            result.score = result.original_score * annotation.modifier;
            result.gravity = Some(annotation);
            (result, written)
        })
        .collect();

    ranked.sort_by(|(a, a_written), (b, b_written)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_written.cmp(a_written))
            .then_with(|| a.path.cmp(&b.path))
    });

    ranked.into_iter().map(|(result, _)| result).collect()
}

fn key_for(path: &str, lines: Option<(u32, u32)>) -> Result<ChunkKey> {
    match lines {
        Some((start, end)) => ChunkKey::range(path, start, end),
        None => Ok(ChunkKey::whole_file(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nautilus_core::RetrievedChunk;

    fn test_config() -> GravityConfig {
        GravityConfig::default()
    }

    fn record_at(now: DateTime<Utc>) -> GravityRecord {
        GravityRecord::new(ChunkKey::whole_file("a.md"), now)
    }

    fn result(path: &str, score: f64) -> SearchResult {
        SearchResult::from_retrieved(RetrievedChunk {
            path: path.to_string(),
            line_start: 0,
            line_end: 0,
            score,
            snippet: String::new(),
        })
    }

    #[test]
    fn test_score_modifier_at_zero() {
        assert_eq!(score_modifier(0.0), 1.0);
    }

    #[test]
    fn test_score_modifier_monotonic() {
        let mut last = score_modifier(0.0);
        for mass in [0.5, 1.0, 5.0, 20.0, 100.0] {
            let m = score_modifier(mass);
            assert!(m >= last, "modifier not monotonic at mass {}", mass);
            last = m;
        }
    }

    #[test]
    fn test_effective_mass_of_fresh_record_is_zero() {
        let now = Utc::now();
        let record = record_at(now);
        assert_eq!(effective_mass(&record, now, &test_config()), 0.0);
    }

    #[test]
    fn test_effective_mass_authority_window() {
        let now = Utc::now();
        let config = test_config();

        let mut written_now = record_at(now);
        written_now.last_written_at = Some(now);
        let fresh = effective_mass(&written_now, now, &config);

        let mut written_long_ago = record_at(now - Duration::days(40));
        written_long_ago.last_written_at = Some(now - Duration::days(40));
        let stale = effective_mass(&written_long_ago, now, &config);

        // Both have zero base; only the fresh write earns the boost.
        assert_eq!(fresh, config.authority_boost);
        assert_eq!(stale, 0.0);
    }

    #[test]
    fn test_effective_mass_no_authority_without_write() {
        let now = Utc::now();
        let record = record_at(now); // created now, never written
        assert_eq!(effective_mass(&record, now, &test_config()), 0.0);
    }

    #[test]
    fn test_effective_mass_recency_discounts_base() {
        let now = Utc::now();
        let config = test_config();
        let mut record = record_at(now - Duration::days(30));
        record.access_count = 10;
        record.last_written_at = Some(now - Duration::days(30));
        // base 3.0, recency 1/(1 + 0.05·30) = 0.4
        let mass = effective_mass(&record, now, &config);
        assert!((mass - 1.2).abs() < 1e-6, "mass was {}", mass);
    }

    #[test]
    fn test_effective_mass_capped() {
        let now = Utc::now();
        let config = test_config();
        let mut record = record_at(now);
        record.explicit_importance = 1e9;
        record.last_written_at = Some(now);
        assert_eq!(effective_mass(&record, now, &config), config.mass_cap);
    }

    #[test]
    fn test_record_access_creates_chunk_and_log_row() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        gravity
            .record_access("memory/a.md", None, Some("hello"), Some(0.9))
            .unwrap();

        let record = gravity.get("memory/a.md", None).unwrap();
        assert_eq!(record.access_count, 1);
        assert!(record.last_accessed_at.is_some());

        let log_rows: i64 = store
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM access_log", [], |row| row.get(0))
                    .map_err(|e| map_err("count", e))
            })
            .unwrap();
        assert_eq!(log_rows, 1);
    }

    #[test]
    fn test_record_access_increments() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        for _ in 0..3 {
            gravity.record_access("a.md", None, None, None).unwrap();
        }
        assert_eq!(gravity.get("a.md", None).unwrap().access_count, 3);
    }

    #[test]
    fn test_record_write_creates_whole_file_chunk() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        gravity.record_write("b.md").unwrap();
        let record = gravity.get("b.md", None).unwrap();
        assert!(record.last_written_at.is_some());
        assert_eq!(record.access_count, 0);
    }

    #[test]
    fn test_record_write_touches_all_chunks_of_path() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        gravity.record_access("c.md", Some((1, 10)), None, None).unwrap();
        gravity.record_access("c.md", Some((20, 30)), None, None).unwrap();
        gravity.record_write("c.md").unwrap();
        assert!(gravity.get("c.md", Some((1, 10))).unwrap().last_written_at.is_some());
        assert!(gravity.get("c.md", Some((20, 30))).unwrap().last_written_at.is_some());
        // No extra whole-file chunk was created.
        assert!(gravity.get("c.md", None).is_err());
    }

    #[test]
    fn test_boost_rejects_negative() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        assert!(gravity.boost("a.md", -1.0, None).is_err());
    }

    #[test]
    fn test_boost_accumulates() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        gravity.boost("a.md", 1.0, None).unwrap();
        gravity.boost("a.md", 0.5, None).unwrap();
        let record = gravity.get("a.md", None).unwrap();
        assert!((record.explicit_importance - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_decay_respects_activity_windows() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        let now = Utc::now();
        let stale = now - Duration::days(100);
        let fresh_access = now - Duration::days(3);

        store
            .write(|conn| {
                conn.execute(
                    "INSERT INTO gravity \
                     (path, created_at, explicit_importance, last_accessed_at, last_written_at) \
                     VALUES ('stale.md', ?1, 2.0, ?1, ?1)",
                    rusqlite::params![stale],
                )
                .map_err(|e| map_err("seed", e))?;
                conn.execute(
                    "INSERT INTO gravity \
                     (path, created_at, explicit_importance, last_accessed_at, last_written_at) \
                     VALUES ('active.md', ?1, 2.0, ?2, ?1)",
                    rusqlite::params![stale, fresh_access],
                )
                .map_err(|e| map_err("seed", e))?;
                Ok(())
            })
            .unwrap();

        let decayed = gravity.decay_at(now).unwrap();
        assert_eq!(decayed, 1);
        let stale_record = gravity.get("stale.md", None).unwrap();
        assert!((stale_record.explicit_importance - 1.9).abs() < 1e-9);
        let active_record = gravity.get("active.md", None).unwrap();
        assert_eq!(active_record.explicit_importance, 2.0);
    }

    #[test]
    fn test_repeated_decay_compounds() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        let now = Utc::now();
        let stale = now - Duration::days(100);
        store
            .write(|conn| {
                conn.execute(
                    "INSERT INTO gravity \
                     (path, created_at, explicit_importance, last_accessed_at, last_written_at) \
                     VALUES ('z.md', ?1, 2.0, ?1, ?1)",
                    rusqlite::params![stale],
                )
                .map_err(|e| map_err("seed", e))
            })
            .unwrap();
        for _ in 0..10 {
            gravity.decay_at(now).unwrap();
        }
        let record = gravity.get("z.md", None).unwrap();
        let expected = 2.0 * 0.95f64.powi(10);
        assert!(
            (record.explicit_importance - expected).abs() < 1e-9,
            "importance {} vs expected {}",
            record.explicit_importance,
            expected
        );
    }

    #[test]
    fn test_rerank_preserves_result_set() {
        let store = Store::open_in_memory().unwrap();
        let gravity = Gravity::new(&store, &test_config());
        let results = vec![result("a.md", 0.9), result("b.md", 0.8), result("c.md", 0.7)];
        let ranked = gravity.rerank(results);
        assert_eq!(ranked.len(), 3);
        // Unknown chunks pass through with modifier 1.0 and keep order.
        assert_eq!(ranked[0].path, "a.md");
        assert_eq!(ranked[0].gravity.unwrap().modifier, 1.0);
        assert_eq!(ranked[2].path, "c.md");
    }

    #[test]
    fn test_rerank_higher_gravity_wins_equal_scores() {
        let now = Utc::now();
        let config = test_config();
        let mut heavy = GravityRecord::new(ChunkKey::whole_file("heavy.md"), now);
        heavy.access_count = 50;
        heavy.last_written_at = Some(now);
        let light = GravityRecord::new(ChunkKey::whole_file("light.md"), now);

        let mut snapshot = HashMap::new();
        snapshot.insert(heavy.key.clone(), heavy);
        snapshot.insert(light.key.clone(), light);

        let ranked = rerank_with(
            vec![result("light.md", 0.5), result("heavy.md", 0.5)],
            &snapshot,
            now,
            &config,
        );
        assert_eq!(ranked[0].path, "heavy.md");
        assert!(ranked[0].gravity.unwrap().modifier > ranked[1].gravity.unwrap().modifier);
    }

    #[test]
    fn test_rerank_tie_breaks_by_path() {
        let ranked = rerank_with(
            vec![result("b.md", 0.5), result("a.md", 0.5)],
            &HashMap::new(),
            Utc::now(),
            &test_config(),
        );
        assert_eq!(ranked[0].path, "a.md");
        assert_eq!(ranked[1].path, "b.md");
    }

    #[test]
    fn test_rerank_marks_superseded() {
        let now = Utc::now();
        let mut record = GravityRecord::new(ChunkKey::whole_file("old.md"), now);
        record.superseded_by = Some("new.md".to_string());
        let mut snapshot = HashMap::new();
        snapshot.insert(record.key.clone(), record);

        let ranked = rerank_with(vec![result("old.md", 0.5)], &snapshot, now, &test_config());
        assert!(ranked[0].gravity.unwrap().superseded);
    }
}
