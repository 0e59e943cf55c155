//! Context doors: regex-driven tag classification and filtering
//!
//! A pattern table maps context tags (`project:*`, `person:*`, `system:*`,
//! `topic:*`) to case-insensitive regexes. Doors classify query text into
//! tags, batch-tag memory files by their content prefix, and filter search
//! results by tag overlap so unrelated topics stop polluting recall.

use chrono::Utc;
use nautilus_core::{NautilusConfig, NautilusError, Result, SearchResult};
use nautilus_store::{map_err, Store};
use regex::RegexBuilder;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// How much of a file is read for classification.
const PREFIX_LIMIT_BYTES: usize = 5 * 1024;

/// Context match assigned to untagged files: middling weight, kept rather
/// than dropped.
const UNTAGGED_PASS_THROUGH: f64 = 0.5;

/// Built-in pattern table used when the config supplies none.
const BUILTIN_PATTERNS: &[(&str, &[&str])] = &[
    ("project:nautilus", &[r"\bnautilus\b", r"\bmemory engine\b"]),
    ("system:daemon", &[r"\bdaemon\b", r"\bscheduler\b", r"\bcron\b"]),
    ("system:database", &[r"\bsqlite\b", r"\bdatabase\b", r"\bschema\b"]),
    ("topic:memory", &[r"\bmemor(y|ies)\b", r"\brecall\b", r"\bremember\b"]),
    ("topic:search", &[r"\bsearch\b", r"\bretriev(e|al)\b", r"\bquery\b"]),
    ("topic:planning", &[r"\bplan(ning)?\b", r"\btodo\b", r"\broadmap\b"]),
    ("topic:errors", &[r"\berror\b", r"\bfail(ure|ed)?\b", r"\bbug\b"]),
    ("topic:sessions", &[r"\bsession\b", r"\btranscript\b"]),
];

// ============================================================================
// PatternTable
// ============================================================================

/// Compiled tag → regex table.
#[derive(Debug)]
pub struct PatternTable {
    entries: Vec<(String, Vec<regex::Regex>)>,
}

impl PatternTable {
    /// The built-in default set.
    pub fn builtin() -> Self {
        let entries = BUILTIN_PATTERNS
            .iter()
            .map(|(tag, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .expect("builtin pattern")
                    })
                    .collect();
                (tag.to_string(), compiled)
            })
            .collect();
        PatternTable { entries }
    }

    /// Compile a configured table.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` naming the tag and pattern that failed to compile.
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut entries = Vec::with_capacity(map.len());
        for (tag, patterns) in map {
            let mut compiled = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        NautilusError::invalid_argument(format!(
                            "bad pattern for tag '{}': {}: {}",
                            tag, pattern, e
                        ))
                    })?;
                compiled.push(regex);
            }
            entries.push((tag.clone(), compiled));
        }
        Ok(PatternTable { entries })
    }

    /// Table from config: the configured map when present, else builtin.
    pub fn from_config(config: &NautilusConfig) -> Result<Self> {
        match &config.pattern_table {
            Some(map) => Self::from_map(map),
            None => Ok(Self::builtin()),
        }
    }

    /// Classify text into tags.
    ///
    /// Tags with at least one matching pattern come back ordered by
    /// descending match count, ties broken lexicographically; each tag at
    /// most once.
    pub fn classify(&self, text: &str) -> Vec<String> {
        let mut matched: Vec<(usize, &str)> = self
            .entries
            .iter()
            .filter_map(|(tag, patterns)| {
                let hits = patterns.iter().filter(|p| p.is_match(text)).count();
                (hits > 0).then_some((hits, tag.as_str()))
            })
            .collect();
        matched.sort_by(|(hits_a, tag_a), (hits_b, tag_b)| {
            hits_b.cmp(hits_a).then_with(|| tag_a.cmp(tag_b))
        });
        matched.into_iter().map(|(_, tag)| tag.to_string()).collect()
    }
}

// ============================================================================
// Doors
// ============================================================================

/// Counts reported by [`Doors::auto_tag`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AutoTagStats {
    /// Files examined
    pub scanned: usize,
    /// Files whose persisted tags changed
    pub tagged: usize,
    /// Whole-file chunks created for files not yet tracked
    pub created: usize,
}

/// Door operations bound to a store and configuration.
pub struct Doors<'s> {
    store: &'s Store,
    config: &'s NautilusConfig,
    table: PatternTable,
}

impl<'s> Doors<'s> {
    /// Bind door operations to `store` under `config`, compiling the
    /// configured pattern table.
    pub fn new(store: &'s Store, config: &'s NautilusConfig) -> Result<Self> {
        Ok(Doors {
            store,
            config,
            table: PatternTable::from_config(config)?,
        })
    }

    /// Classify free text into context tags.
    pub fn classify(&self, text: &str) -> Vec<String> {
        self.table.classify(text)
    }

    /// Classify a file by a bounded prefix of its content.
    pub fn classify_file(&self, rel_path: &str) -> Result<Vec<String>> {
        let abs = self.config.workspace_dir.join(rel_path);
        let prefix = read_prefix(&abs)?;
        Ok(self.table.classify(&prefix))
    }

    /// Scan the memory tree, classify every file, and persist the union of
    /// new and existing tags on each file's chunks.
    pub fn auto_tag(&self) -> Result<AutoTagStats> {
        let mut stats = AutoTagStats::default();
        let now = Utc::now();

        for file in crate::chambers::memory_files(&self.config.memory_root()) {
            let rel = self.config.relative_path(&file);
            stats.scanned += 1;
            let prefix = match read_prefix(&file) {
                Ok(prefix) => prefix,
                Err(e) => {
                    tracing::warn!(
                        target: "nautilus::doors",
                        path = %rel,
                        error = %e,
                        "skipping unreadable file"
                    );
                    continue;
                }
            };
            let fresh = self.table.classify(&prefix);

            // Per-chunk merge so line-range chunks keep their own history.
            let chunks: Vec<(u32, u32, Vec<String>)> = self.store.read(|conn| {
                let mut stmt = conn
                    .prepare("SELECT line_start, line_end, tags FROM gravity WHERE path = ?1")
                    .map_err(|e| map_err("load tags", e))?;
                let rows = stmt
                    .query_map([&rel], |row| {
                        Ok((
                            row.get::<_, u32>(0)?,
                            row.get::<_, u32>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })
                    .map_err(|e| map_err("load tags", e))?;
                let mut chunks = Vec::new();
                for row in rows {
                    let (start, end, tags_json) =
                        row.map_err(|e| map_err("load tags", e))?;
                    let tags: Vec<String> =
                        serde_json::from_str(&tags_json).unwrap_or_default();
                    chunks.push((start, end, tags));
                }
                Ok(chunks)
            })?;

            if chunks.is_empty() {
                if fresh.is_empty() {
                    continue;
                }
                let tags_json = serde_json::to_string(&fresh)
                    .map_err(|e| NautilusError::invalid_argument(e.to_string()))?;
                self.store.transaction(|conn| {
                    conn.execute(
                        "INSERT INTO gravity (path, line_start, line_end, created_at, tags) \
                         VALUES (?1, 0, 0, ?2, ?3) \
                         ON CONFLICT(path, line_start, line_end) DO UPDATE SET \
                         tags = excluded.tags",
                        rusqlite::params![rel, now, tags_json],
                    )
                    .map_err(|e| map_err("tag file", e))?;
                    Ok(())
                })?;
                stats.created += 1;
                stats.tagged += 1;
                continue;
            }

            let updates: Vec<(u32, u32, String)> = chunks
                .iter()
                .filter_map(|(start, end, existing)| {
                    let merged = merge_tags(existing, &fresh);
                    if merged == *existing {
                        return None;
                    }
                    serde_json::to_string(&merged)
                        .ok()
                        .map(|json| (*start, *end, json))
                })
                .collect();
            if updates.is_empty() {
                continue;
            }
            self.store.transaction(|conn| {
                for (start, end, tags_json) in &updates {
                    conn.execute(
                        "UPDATE gravity SET tags = ?4 \
                         WHERE path = ?1 AND line_start = ?2 AND line_end = ?3",
                        rusqlite::params![rel, start, end, tags_json],
                    )
                    .map_err(|e| map_err("tag chunk", e))?;
                }
                Ok(())
            })?;
            stats.tagged += 1;
        }

        tracing::debug!(
            target: "nautilus::doors",
            scanned = stats.scanned,
            tagged = stats.tagged,
            "auto-tag pass complete"
        );
        Ok(stats)
    }

    /// Filter results by overlap with `query_tags`.
    ///
    /// Overlapping files keep a `context_match` of `overlap / |query_tags|`;
    /// untagged files pass through at 0.5; tagged files with no overlap
    /// drop. With no query tags the input is returned unchanged apart from
    /// a stable sort by score.
    pub fn filter(
        &self,
        results: Vec<SearchResult>,
        query_tags: &[String],
    ) -> Result<Vec<SearchResult>> {
        let mut kept = if query_tags.is_empty() {
            results
        } else {
            let query: HashSet<&str> = query_tags.iter().map(String::as_str).collect();
            let mut tag_cache: HashMap<String, Vec<String>> = HashMap::new();
            let mut kept = Vec::with_capacity(results.len());
            for mut result in results {
                let file_tags = match tag_cache.get(&result.path) {
                    Some(tags) => tags.clone(),
                    None => {
                        let tags = self.file_tags(&result.path)?;
                        tag_cache.insert(result.path.clone(), tags.clone());
                        tags
                    }
                };
                if file_tags.is_empty() {
                    result.context_match = Some(UNTAGGED_PASS_THROUGH);
                    kept.push(result);
                    continue;
                }
                let overlap = file_tags
                    .iter()
                    .filter(|tag| query.contains(tag.as_str()))
                    .count();
                if overlap >= 1 {
                    result.context_match = Some(overlap as f64 / query_tags.len() as f64);
                    kept.push(result);
                }
            }
            kept
        };
        kept.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }

    /// Union of persisted tags across all chunks of a path, in stored
    /// order.
    pub fn file_tags(&self, path: &str) -> Result<Vec<String>> {
        self.store.read(|conn| {
            let mut stmt = conn
                .prepare("SELECT tags FROM gravity WHERE path = ?1")
                .map_err(|e| map_err("file tags", e))?;
            let rows = stmt
                .query_map([path], |row| row.get::<_, String>(0))
                .map_err(|e| map_err("file tags", e))?;
            let mut union: Vec<String> = Vec::new();
            for row in rows {
                let tags_json = row.map_err(|e| map_err("file tags", e))?;
                let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
                union = merge_tags(&union, &tags);
            }
            Ok(union)
        })
    }
}

/// Merge two tag lists, deduplicating with last-seen priority: a tag that
/// reappears later takes the later position.
fn merge_tags(existing: &[String], fresh: &[String]) -> Vec<String> {
    let combined: Vec<&String> = existing.iter().chain(fresh.iter()).collect();
    let mut keep: Vec<String> = Vec::new();
    for (index, tag) in combined.iter().enumerate() {
        let last = combined
            .iter()
            .rposition(|other| other == tag)
            .unwrap_or(index);
        if last == index {
            keep.push((*tag).clone());
        }
    }
    keep
}

fn read_prefix(abs: &std::path::Path) -> Result<String> {
    use std::io::Read;
    let mut file = std::fs::File::open(abs).map_err(|e| {
        NautilusError::invalid_argument(format!("cannot open {}: {}", abs.display(), e))
    })?;
    let mut buffer = vec![0u8; PREFIX_LIMIT_BYTES];
    let mut read = 0;
    loop {
        match file.read(&mut buffer[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(NautilusError::invalid_argument(format!(
                    "cannot read {}: {}",
                    abs.display(),
                    e
                )))
            }
        }
        if read == buffer.len() {
            break;
        }
    }
    buffer.truncate(read);
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
