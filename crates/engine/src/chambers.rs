//! Temporal chambers: classification and LLM-driven promotion
//!
//! Files move through three chambers as they age: atrium (fresh), corridor
//! (recent), vault (old). Classification is a pure function of file age;
//! promotion and crystallization call the summarizer to distill corridor
//! and vault files into `memory/corridors/` and `memory/vaults/`, linking
//! the output to its source through the mirror index.
//!
//! Chamber ordering is monotonic: a file never returns to a younger chamber
//! on re-classification, even if its mtime moves backwards.

use crate::mirrors::{event_key_for_file, Mirrors};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use nautilus_core::{
    Chamber, ChamberConfig, Granularity, NautilusConfig, NautilusError, Result, Summarizer,
    SummaryMode,
};
use nautilus_store::{map_err, Store};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files shorter than this are not worth a summarizer call.
const MIN_PROMOTABLE_BYTES: u64 = 100;

/// A `YYYY-MM-DD` date embedded in a file stem, used as the age fallback
/// when mtime is unavailable or synthetic.
static STEM_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("static pattern"));

// ============================================================================
// Pure classification
// ============================================================================

/// Classify an age against the chamber boundaries.
pub fn classify_age(age: Duration, config: &ChamberConfig) -> Chamber {
    if age <= Duration::hours(config.atrium_max_hours as i64) {
        Chamber::Atrium
    } else if age <= Duration::days(config.corridor_max_days as i64) {
        Chamber::Corridor
    } else {
        Chamber::Vault
    }
}

/// Monotonic merge of a stored chamber with a fresh classification:
/// known chambers only move forward, and `Unknown` never overwrites a
/// known value.
fn merge_chamber(stored: Chamber, fresh: Chamber) -> Chamber {
    match (stored, fresh) {
        (Chamber::Unknown, fresh) => fresh,
        (stored, Chamber::Unknown) => stored,
        (stored, fresh) if fresh.rank() > stored.rank() => fresh,
        (stored, _) => stored,
    }
}

// ============================================================================
// Chambers
// ============================================================================

/// Counts reported by [`Chambers::classify_all`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ClassifyStats {
    /// Files examined
    pub scanned: usize,
    /// Chunk rows whose chamber changed
    pub updated: usize,
    /// Whole-file chunks created for files not yet tracked
    pub created: usize,
}

/// Outcome of one promotion or crystallization pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromotionReport {
    /// Candidate source paths, in scan order
    pub candidates: Vec<String>,
    /// Output files actually written (empty on dry runs)
    pub written: Vec<String>,
    /// Candidates skipped because the summarizer declined
    pub declined: usize,
    /// Per-file summarizer failures; the pass continued past each
    pub errors: Vec<String>,
}

/// Chamber operations bound to a store and configuration.
pub struct Chambers<'s> {
    store: &'s Store,
    config: &'s NautilusConfig,
}

impl<'s> Chambers<'s> {
    /// Bind chamber operations to `store` under `config`.
    pub fn new(store: &'s Store, config: &'s NautilusConfig) -> Self {
        Chambers { store, config }
    }

    /// Classify one workspace-relative path by its current age.
    ///
    /// Returns `Unknown` when no age can be determined for the file.
    pub fn classify(&self, rel_path: &str) -> Chamber {
        self.classify_at(rel_path, Utc::now())
    }

    pub(crate) fn classify_at(&self, rel_path: &str, now: DateTime<Utc>) -> Chamber {
        let abs = self.config.workspace_dir.join(rel_path);
        match file_age(&abs, now) {
            Some(age) => classify_age(age, &self.config.chambers),
            None => Chamber::Unknown,
        }
    }

    /// Walk the memory tree and set `chamber` on every known chunk,
    /// creating whole-file chunks for files not yet in the store.
    pub fn classify_all(&self) -> Result<ClassifyStats> {
        let now = Utc::now();
        let mut stats = ClassifyStats::default();

        // Snapshot the stored chambers so the monotonic merge sees the
        // previous classification.
        let stored: HashMap<String, Chamber> = self.store.read(|conn| {
            let mut stmt = conn
                .prepare("SELECT DISTINCT path, chamber FROM gravity")
                .map_err(|e| map_err("load chambers", e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| map_err("load chambers", e))?;
            let mut map = HashMap::new();
            for row in rows {
                let (path, chamber) = row.map_err(|e| map_err("load chambers", e))?;
                map.insert(path, Chamber::parse(&chamber));
            }
            Ok(map)
        })?;

        let mut updates: Vec<(String, Chamber, bool)> = Vec::new();
        for file in memory_files(&self.config.memory_root()) {
            let rel = self.config.relative_path(&file);
            stats.scanned += 1;
            let fresh = match file_age(&file, now) {
                Some(age) => classify_age(age, &self.config.chambers),
                None => Chamber::Unknown,
            };
            match stored.get(&rel) {
                Some(&previous) => {
                    let merged = merge_chamber(previous, fresh);
                    if merged != previous {
                        updates.push((rel, merged, false));
                    }
                }
                None => updates.push((rel, fresh, true)),
            }
        }

        self.store.transaction(|conn| {
            for (rel, chamber, create) in &updates {
                if *create {
                    conn.execute(
                        "INSERT INTO gravity (path, line_start, line_end, created_at, chamber) \
                         VALUES (?1, 0, 0, ?2, ?3) \
                         ON CONFLICT(path, line_start, line_end) DO UPDATE SET \
                         chamber = excluded.chamber",
                        rusqlite::params![rel, now, chamber.as_str()],
                    )
                    .map_err(|e| map_err("create chunk", e))?;
                } else {
                    conn.execute(
                        "UPDATE gravity SET chamber = ?2 WHERE path = ?1",
                        rusqlite::params![rel, chamber.as_str()],
                    )
                    .map_err(|e| map_err("set chamber", e))?;
                }
            }
            Ok(())
        })?;

        for (_, _, created) in &updates {
            if *created {
                stats.created += 1;
            } else {
                stats.updated += 1;
            }
        }
        tracing::debug!(
            target: "nautilus::chambers",
            scanned = stats.scanned,
            updated = stats.updated,
            created = stats.created,
            "classification pass complete"
        );
        Ok(stats)
    }

    /// Promote corridor-age files into `memory/corridors/`.
    ///
    /// Candidates are corridor-classified files whose name does not begin
    /// with `corridor-` and which have no summary mirror yet. Each is
    /// summarized in corridor mode and written next to a refreshed mirror
    /// link; declined summaries skip silently. Idempotent: the mirror check
    /// makes repeated runs write nothing new.
    pub fn promote(&self, summarizer: &dyn Summarizer, dry_run: bool) -> Result<PromotionReport> {
        self.run_distillation(summarizer, SummaryMode::Corridor, dry_run)
    }

    /// Crystallize vault-age files into `memory/vaults/`. Analogous to
    /// [`Chambers::promote`] with vault mode and granularity `lesson`.
    pub fn crystallize(
        &self,
        summarizer: &dyn Summarizer,
        dry_run: bool,
    ) -> Result<PromotionReport> {
        self.run_distillation(summarizer, SummaryMode::Vault, dry_run)
    }

    fn run_distillation(
        &self,
        summarizer: &dyn Summarizer,
        mode: SummaryMode,
        dry_run: bool,
    ) -> Result<PromotionReport> {
        let mut report = PromotionReport::default();
        if !summarizer.is_enabled() {
            tracing::info!(
                target: "nautilus::chambers",
                mode = mode.as_str(),
                "summarizer disabled, skipping"
            );
            return Ok(report);
        }

        let (target_chamber, prefix, granularity, out_dir) = match mode {
            SummaryMode::Corridor => (
                Chamber::Corridor,
                "corridor-",
                Granularity::Summary,
                self.config.corridors_dir(),
            ),
            SummaryMode::Vault => (
                Chamber::Vault,
                "vault-",
                Granularity::Lesson,
                self.config.vaults_dir(),
            ),
        };

        let mirrors = Mirrors::new(self.store);
        let now = Utc::now();

        for file in memory_files(&self.config.memory_root()) {
            // Derived artifacts are never re-distilled.
            if is_under(&file, &self.config.corridors_dir())
                || is_under(&file, &self.config.vaults_dir())
            {
                continue;
            }
            let name = match file.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with(prefix) {
                continue;
            }
            let age = match file_age(&file, now) {
                Some(age) => age,
                None => continue,
            };
            if classify_age(age, &self.config.chambers) != target_chamber {
                continue;
            }
            if std::fs::metadata(&file).map(|m| m.len()).unwrap_or(0) < MIN_PROMOTABLE_BYTES {
                continue;
            }

            let rel = self.config.relative_path(&file);
            if self.has_granularity(&mirrors, &rel, granularity)? {
                continue;
            }
            report.candidates.push(rel.clone());
            if dry_run {
                continue;
            }

            let content = match std::fs::read_to_string(&file) {
                Ok(content) => content,
                Err(e) => {
                    report.errors.push(format!("{}: {}", rel, e));
                    continue;
                }
            };
            let truncated = truncate_to_budget(&content, mode.input_budget());

            match summarizer.summarize(truncated, mode) {
                Ok(Some(summary)) => {
                    let out_abs = out_dir.join(output_name(&file, prefix));
                    let out_rel = self.config.relative_path(&out_abs);
                    self.write_summary(&out_abs, &rel, &file, mode, &summary)?;

                    let event_key = event_key_for_file(&rel);
                    mirrors.link_one(&event_key, Granularity::Raw, &rel)?;
                    mirrors.link_one(&event_key, granularity, &out_rel)?;

                    tracing::info!(
                        target: "nautilus::chambers",
                        source = %rel,
                        output = %out_rel,
                        mode = mode.as_str(),
                        "distilled memory file"
                    );
                    report.written.push(out_rel);
                }
                Ok(None) => {
                    report.declined += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "nautilus::chambers",
                        source = %rel,
                        error = %e,
                        "summarizer failed, continuing"
                    );
                    report.errors.push(format!("{}: {}", rel, e));
                }
            }
        }

        Ok(report)
    }

    fn has_granularity(
        &self,
        mirrors: &Mirrors<'_>,
        rel: &str,
        granularity: Granularity,
    ) -> Result<bool> {
        Ok(mirrors
            .resolve_path(rel)?
            .map(|set| set.mirrors.iter().any(|m| m.granularity == granularity))
            .unwrap_or(false))
    }

    fn write_summary(
        &self,
        out_abs: &Path,
        source_rel: &str,
        source_abs: &Path,
        mode: SummaryMode,
        summary: &str,
    ) -> Result<()> {
        let parent = out_abs.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| {
            NautilusError::invalid_argument(format!(
                "cannot create {}: {}",
                parent.display(),
                e
            ))
        })?;
        let mtime = std::fs::metadata(source_abs)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let body = format!(
            "---\nsource: {}\nsource_mtime: {}\nmode: {}\n---\n\n{}\n",
            source_rel,
            mtime,
            mode.as_str(),
            summary.trim()
        );
        std::fs::write(out_abs, body).map_err(|e| {
            NautilusError::invalid_argument(format!(
                "cannot write {}: {}",
                out_abs.display(),
                e
            ))
        })
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Age of a file at `now`: mtime when plausible, else a `YYYY-MM-DD` date
/// embedded in the file stem, else unknown.
fn file_age(abs: &Path, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(modified) = std::fs::metadata(abs).and_then(|m| m.modified()) {
        let modified: DateTime<Utc> = modified.into();
        // Epoch mtimes come from synthetic archives; fall through to the
        // filename date.
        if modified.timestamp() > 0 {
            return Some((now - modified).max(Duration::zero()));
        }
    }
    let stem = abs.file_stem()?.to_str()?;
    let caps = STEM_DATE.captures(stem)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some((now - midnight).max(Duration::zero()))
}

/// Regular files in the memory tree, hidden entries skipped, in sorted
/// order for deterministic passes.
pub(crate) fn memory_files(memory_root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(memory_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with('.'))
                .unwrap_or(false)
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn is_under(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir)
}

/// Truncate to at most `budget` bytes on a char boundary.
fn truncate_to_budget(text: &str, budget: usize) -> &str {
    if text.len() <= budget {
        return text;
    }
    let mut end = budget;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// `memory/2026-01-01.md` with prefix `corridor-` → `corridor-2026-01-01.md`.
fn output_name(source: &Path, prefix: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "memory".to_string());
    format!("{}{}.md", prefix, stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime_sim::set_mtime_days_ago;

    /// Test helper: rewrite a file's mtime `days` into the past.
    mod filetime_sim {
        use std::path::Path;
        use std::time::{Duration, SystemTime};

        pub fn set_mtime_days_ago(path: &Path, days: u64) {
            let target = SystemTime::now() - Duration::from_secs(days * 86_400);
            let file = std::fs::File::options().write(true).open(path).unwrap();
            file.set_modified(target).unwrap();
        }
    }

    struct FixedSummarizer(Option<String>);

    impl Summarizer for FixedSummarizer {
        fn summarize(&self, _text: &str, _mode: SummaryMode) -> Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    fn workspace() -> (tempfile::TempDir, NautilusConfig) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NautilusConfig::default();
        config.workspace_dir = dir.path().to_path_buf();
        config.state_dir = dir.path().join("state");
        std::fs::create_dir_all(config.memory_root()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_classify_age_boundaries() {
        let config = ChamberConfig::default();
        assert_eq!(classify_age(Duration::hours(1), &config), Chamber::Atrium);
        assert_eq!(classify_age(Duration::hours(48), &config), Chamber::Atrium);
        assert_eq!(classify_age(Duration::hours(49), &config), Chamber::Corridor);
        assert_eq!(classify_age(Duration::days(7), &config), Chamber::Corridor);
        assert_eq!(classify_age(Duration::days(8), &config), Chamber::Vault);
        assert_eq!(classify_age(Duration::days(400), &config), Chamber::Vault);
    }

    #[test]
    fn test_merge_chamber_is_monotonic() {
        assert_eq!(merge_chamber(Chamber::Vault, Chamber::Atrium), Chamber::Vault);
        assert_eq!(merge_chamber(Chamber::Atrium, Chamber::Corridor), Chamber::Corridor);
        assert_eq!(merge_chamber(Chamber::Unknown, Chamber::Atrium), Chamber::Atrium);
        assert_eq!(merge_chamber(Chamber::Corridor, Chamber::Unknown), Chamber::Corridor);
    }

    #[test]
    fn test_file_age_falls_back_to_stem_date() {
        let now = Utc::now();
        // Nonexistent file with a dated name still classifies.
        let age = file_age(Path::new("/nonexistent/2020-06-15.md"), now).unwrap();
        assert!(age > Duration::days(365));
        assert!(file_age(Path::new("/nonexistent/notes.md"), now).is_none());
    }

    #[test]
    fn test_classify_all_creates_and_updates() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let memory = config.memory_root();
        std::fs::write(memory.join("fresh.md"), "today's notes").unwrap();
        std::fs::write(memory.join("old.md"), "older notes").unwrap();
        set_mtime_days_ago(&memory.join("old.md"), 30);

        let chambers = Chambers::new(&store, &config);
        let stats = chambers.classify_all().unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.created, 2);

        let chamber_of = |path: &str| -> Chamber {
            store
                .read(|conn| {
                    conn.query_row(
                        "SELECT chamber FROM gravity WHERE path = ?1",
                        [path],
                        |row| row.get::<_, String>(0),
                    )
                    .map(|s| Chamber::parse(&s))
                    .map_err(|e| map_err("get", e))
                })
                .unwrap()
        };
        assert_eq!(chamber_of("memory/fresh.md"), Chamber::Atrium);
        assert_eq!(chamber_of("memory/old.md"), Chamber::Vault);

        // Second run changes nothing.
        let stats = chambers.classify_all().unwrap();
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.created, 0);
    }

    #[test]
    fn test_promote_writes_corridor_and_links_mirror() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let memory = config.memory_root();
        let source = memory.join("2026-01-01.md");
        std::fs::write(&source, "x".repeat(500)).unwrap();
        set_mtime_days_ago(&source, 5);

        let chambers = Chambers::new(&store, &config);
        let summarizer = FixedSummarizer(Some("a distilled summary".to_string()));

        let report = chambers.promote(&summarizer, false).unwrap();
        assert_eq!(report.candidates, vec!["memory/2026-01-01.md"]);
        assert_eq!(report.written, vec!["memory/corridors/corridor-2026-01-01.md"]);

        let written = std::fs::read_to_string(
            config.corridors_dir().join("corridor-2026-01-01.md"),
        )
        .unwrap();
        assert!(written.starts_with("---\nsource: memory/2026-01-01.md\n"));
        assert!(written.contains("mode: corridor"));
        assert!(written.contains("a distilled summary"));

        let mirrors = Mirrors::new(&store);
        let set = mirrors.resolve("daily-2026-01-01").unwrap();
        let granularities: Vec<_> = set.mirrors.iter().map(|m| m.granularity).collect();
        assert_eq!(granularities, vec![Granularity::Raw, Granularity::Summary]);
    }

    #[test]
    fn test_promote_is_idempotent() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let source = config.memory_root().join("2026-01-01.md");
        std::fs::write(&source, "y".repeat(500)).unwrap();
        set_mtime_days_ago(&source, 5);

        let chambers = Chambers::new(&store, &config);
        let summarizer = FixedSummarizer(Some("summary".to_string()));
        let first = chambers.promote(&summarizer, false).unwrap();
        assert_eq!(first.written.len(), 1);
        let second = chambers.promote(&summarizer, false).unwrap();
        assert!(second.candidates.is_empty());
        assert!(second.written.is_empty());
    }

    #[test]
    fn test_promote_dry_run_lists_same_candidates() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let source = config.memory_root().join("2026-01-01.md");
        std::fs::write(&source, "z".repeat(500)).unwrap();
        set_mtime_days_ago(&source, 5);

        let chambers = Chambers::new(&store, &config);
        let summarizer = FixedSummarizer(Some("summary".to_string()));
        let dry = chambers.promote(&summarizer, true).unwrap();
        assert_eq!(dry.candidates, vec!["memory/2026-01-01.md"]);
        assert!(dry.written.is_empty());
        assert!(!config.corridors_dir().join("corridor-2026-01-01.md").exists());

        let wet = chambers.promote(&summarizer, false).unwrap();
        assert_eq!(wet.candidates, dry.candidates);
    }

    #[test]
    fn test_promote_skips_when_summarizer_declines() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let source = config.memory_root().join("quiet.md");
        std::fs::write(&source, "q".repeat(500)).unwrap();
        set_mtime_days_ago(&source, 5);

        let chambers = Chambers::new(&store, &config);
        let report = chambers.promote(&FixedSummarizer(None), false).unwrap();
        assert_eq!(report.declined, 1);
        assert!(report.written.is_empty());
    }

    #[test]
    fn test_promote_skips_small_and_prefixed_files() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let memory = config.memory_root();
        std::fs::write(memory.join("tiny.md"), "short").unwrap();
        set_mtime_days_ago(&memory.join("tiny.md"), 5);
        std::fs::write(memory.join("corridor-done.md"), "c".repeat(500)).unwrap();
        set_mtime_days_ago(&memory.join("corridor-done.md"), 5);

        let chambers = Chambers::new(&store, &config);
        let summarizer = FixedSummarizer(Some("s".to_string()));
        let report = chambers.promote(&summarizer, false).unwrap();
        assert!(report.candidates.is_empty());
    }

    #[test]
    fn test_crystallize_uses_vault_mode_and_lesson() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let source = config.memory_root().join("2025-11-20.md");
        std::fs::write(&source, "v".repeat(500)).unwrap();
        set_mtime_days_ago(&source, 60);

        let chambers = Chambers::new(&store, &config);
        let summarizer = FixedSummarizer(Some("a lesson".to_string()));
        let report = chambers.crystallize(&summarizer, false).unwrap();
        assert_eq!(report.written, vec!["memory/vaults/vault-2025-11-20.md"]);

        let mirrors = Mirrors::new(&store);
        let set = mirrors.resolve("daily-2025-11-20").unwrap();
        assert!(set
            .mirrors
            .iter()
            .any(|m| m.granularity == Granularity::Lesson));
    }

    #[test]
    fn test_disabled_summarizer_skips_cleanly() {
        let (_dir, config) = workspace();
        let store = Store::open_in_memory().unwrap();
        let source = config.memory_root().join("2026-01-01.md");
        std::fs::write(&source, "w".repeat(500)).unwrap();
        set_mtime_days_ago(&source, 5);

        let chambers = Chambers::new(&store, &config);
        let report = chambers
            .promote(&nautilus_core::traits::DisabledSummarizer, false)
            .unwrap();
        assert!(report.candidates.is_empty());
        assert!(report.written.is_empty());
    }
}
