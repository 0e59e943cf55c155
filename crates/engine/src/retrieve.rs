//! Built-in scan retriever
//!
//! The search pipeline treats base retrieval as an injected collaborator;
//! this module provides the default implementation so the CLI works out of
//! the box. Recall queries get memory-specific normalization: embedded
//! `YYYY-MM-DD` dates survive as whole terms (memory files are keyed by
//! day, and the date may only appear in the file name), filler words common
//! in recall phrasing are dropped, and matching is by substring so
//! "gravity" still finds "gravity-related". No index is maintained; search
//! works via full scan, and any real search backend can replace it through
//! the `BaseRetriever` seam.

use crate::chambers::memory_files;
use nautilus_core::{BaseRetriever, NautilusConfig, Result, RetrievedChunk};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;

/// Longest snippet returned with a candidate, in characters.
const SNIPPET_MAX_CHARS: usize = 160;

/// Filler words that recall phrasing adds but memory files share equally.
const QUERY_STOPWORDS: &[&str] = &[
    "the", "and", "for", "was", "were", "what", "when", "where", "who", "how",
    "did", "does", "about", "that", "with", "have", "had", "from",
];

/// A day key embedded in a query, kept as one term.
static DATE_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("static pattern"));

/// Full-scan keyword retriever over the memory tree.
pub struct ScanRetriever {
    workspace_dir: PathBuf,
    memory_root: PathBuf,
}

impl ScanRetriever {
    /// Build a retriever for the configured workspace.
    pub fn new(config: &NautilusConfig) -> Self {
        ScanRetriever {
            workspace_dir: config.workspace_dir.clone(),
            memory_root: config.memory_root(),
        }
    }
}

impl BaseRetriever for ScanRetriever {
    fn retrieve(&self, query: &str, max_results: usize) -> Result<Vec<RetrievedChunk>> {
        let terms = query_terms(query);
        if terms.is_empty() || !self.memory_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<RetrievedChunk> = Vec::new();
        for file in memory_files(&self.memory_root) {
            let content = match std::fs::read_to_string(&file) {
                Ok(content) => content,
                // Binary or unreadable files are not memory text.
                Err(_) => continue,
            };
            let rel = file
                .strip_prefix(&self.workspace_dir)
                .unwrap_or(&file)
                .to_string_lossy()
                .replace('\\', "/");
            if let Some(found) = match_file(&terms, &rel, &content) {
                candidates.push(RetrievedChunk {
                    path: rel,
                    line_start: 0,
                    line_end: 0,
                    score: found.score,
                    snippet: found.snippet,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        candidates.truncate(max_results);
        Ok(candidates)
    }
}

/// Normalize a recall query into search terms.
///
/// Dates come out first and whole; the remainder is lowercased, split on
/// non-alphanumerics, stripped of stopwords and one-letter fragments, and
/// deduplicated in order.
fn query_terms(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut terms: Vec<String> = DATE_TERM
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect();
    let without_dates = DATE_TERM.replace_all(&lowered, " ");
    terms.extend(
        without_dates
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 2 && !QUERY_STOPWORDS.contains(t))
            .map(String::from),
    );
    let mut seen = HashSet::new();
    terms.retain(|t| seen.insert(t.clone()));
    terms
}

struct FileMatch {
    score: f64,
    snippet: String,
}

/// Score one memory file against the query terms in a single pass.
///
/// Term hits are counted per line by substring, the first matching line
/// becomes the snippet, and the path itself counts as one hit per term it
/// contains (a dated query finds its daily file even when the body never
/// repeats the date). Score is query coverage scaled by a log of the total
/// hit count, so breadth beats repetition.
fn match_file(terms: &[String], rel_path: &str, content: &str) -> Option<FileMatch> {
    let mut hits = vec![0usize; terms.len()];
    let mut snippet_line: Option<&str> = None;

    for line in content.lines() {
        let lowered = line.to_lowercase();
        let mut line_hit = false;
        for (index, term) in terms.iter().enumerate() {
            let count = lowered.matches(term.as_str()).count();
            if count > 0 {
                hits[index] += count;
                line_hit = true;
            }
        }
        if line_hit && snippet_line.is_none() && !line.trim().is_empty() {
            snippet_line = Some(line);
        }
    }

    let path_lower = rel_path.to_lowercase();
    for (index, term) in terms.iter().enumerate() {
        if path_lower.contains(term.as_str()) {
            hits[index] += 1;
        }
    }

    let matched = hits.iter().filter(|&&h| h > 0).count();
    if matched == 0 {
        return None;
    }
    let total: usize = hits.iter().sum();
    let coverage = matched as f64 / terms.len() as f64;
    let score = coverage * (1.0 + 0.1 * (1.0 + total as f64).ln());

    let snippet = snippet_line
        .or_else(|| content.lines().find(|line| !line.trim().is_empty()))
        .map(clip_snippet)
        .unwrap_or_default();
    Some(FileMatch { score, snippet })
}

fn clip_snippet(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= SNIPPET_MAX_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(SNIPPET_MAX_CHARS).collect()
    }
}
