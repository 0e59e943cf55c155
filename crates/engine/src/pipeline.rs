//! Search pipeline orchestration
//!
//! One query flows through ordered stages, each annotating or re-ranking
//! without silently dropping (only the context filter removes results, and
//! only when context tags are in play):
//!
//! ```text
//! query → Doors.classify → base retrieve → record accesses
//!       → Gravity rerank → Doors.filter → chamber preference
//!       → Mirrors.resolve → top-N
//! ```
//!
//! Failure semantics: a retriever failure aborts with `RetrievalFailed`;
//! store failures while recording accesses, filtering, or resolving mirrors
//! are logged and swallowed so the query still answers. Trapdoor mode skips
//! context classification entirely for explicit recall.

use crate::chambers::Chambers;
use crate::doors::Doors;
use crate::gravity::{rerank_with, Gravity};
use crate::mirrors::Mirrors;
use chrono::Utc;
use nautilus_core::{
    BaseRetriever, Chamber, ChunkKey, NautilusConfig, Result, SearchResult,
};
use nautilus_store::Store;
use std::collections::HashMap;

/// Adjusted scores within this relative window count as a near-tie for the
/// chamber preference stage.
const NEAR_TIE_WINDOW: f64 = 0.05;

/// Options for one search call.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Maximum results returned
    pub n: usize,
    /// Bypass context filtering for explicit recall
    pub trapdoor: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            n: 10,
            trapdoor: false,
        }
    }
}

/// Search orchestrator bound to a store, config, and base retriever.
pub struct Pipeline<'s> {
    store: &'s Store,
    config: &'s NautilusConfig,
    retriever: &'s dyn BaseRetriever,
}

impl<'s> Pipeline<'s> {
    /// Bind the pipeline to its collaborators.
    pub fn new(
        store: &'s Store,
        config: &'s NautilusConfig,
        retriever: &'s dyn BaseRetriever,
    ) -> Self {
        Pipeline {
            store,
            config,
            retriever,
        }
    }

    /// Run the full pipeline for `query`.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let now = Utc::now();
        let doors = Doors::new(self.store, self.config)?;

        // Stage 1: context classification (skipped in trapdoor mode).
        let context_tags = if options.trapdoor {
            Vec::new()
        } else {
            doors.classify(query)
        };

        // Stage 2: base retrieval.
        let cap = (options.n * 3).max(self.config.search.minimum_candidates);
        let retrieved = self.retriever.retrieve(query, cap)?;
        tracing::debug!(
            target: "nautilus::pipeline",
            query,
            candidates = retrieved.len(),
            tags = ?context_tags,
            trapdoor = options.trapdoor,
            "base retrieval complete"
        );
        let results: Vec<SearchResult> = retrieved
            .into_iter()
            .map(SearchResult::from_retrieved)
            .collect();

        // The gravity snapshot is taken before accesses are recorded, so a
        // search ranks against the state it found; its own accesses are
        // reflected in the next search.
        let gravity = Gravity::new(self.store, &self.config.gravity);
        let keys: Vec<ChunkKey> = results.iter().map(|r| r.key()).collect();
        let snapshot = match gravity.load(&keys) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    target: "nautilus::pipeline",
                    error = %e,
                    "gravity snapshot unavailable, ranking without it"
                );
                HashMap::new()
            }
        };

        // Stage 3: record accesses. Store failures must not abort the query.
        for result in &results {
            if let Err(e) = gravity.record_access_at(
                &result.key(),
                Some(query),
                Some(result.original_score),
                now,
            ) {
                tracing::warn!(
                    target: "nautilus::pipeline",
                    path = %result.path,
                    error = %e,
                    "failed to record access"
                );
            }
        }

        // Stage 4: gravity re-rank.
        let mut results = rerank_with(results, &snapshot, now, &self.config.gravity);

        // Stage 5: context filter.
        if !context_tags.is_empty() {
            match doors.filter(results.clone(), &context_tags) {
                Ok(filtered) => results = filtered,
                Err(e) => {
                    tracing::warn!(
                        target: "nautilus::pipeline",
                        error = %e,
                        "context filter unavailable, keeping all results"
                    );
                }
            }
        }

        // Stage 6: chamber preference among near-ties.
        let chambers = Chambers::new(self.store, self.config);
        for result in &mut results {
            let stored = snapshot
                .get(&result.key())
                .map(|record| record.chamber)
                .unwrap_or(Chamber::Unknown);
            let chamber = match stored {
                Chamber::Unknown => chambers.classify(&result.path),
                known => known,
            };
            result.chamber = Some(chamber);
        }
        prefer_fresh_among_ties(&mut results);

        // Stage 7: mirror resolution.
        let mirrors = Mirrors::new(self.store);
        for result in &mut results {
            match mirrors.resolve_path(&result.path) {
                Ok(set) => result.mirrors = set,
                Err(e) => {
                    tracing::warn!(
                        target: "nautilus::pipeline",
                        path = %result.path,
                        error = %e,
                        "mirror resolution unavailable"
                    );
                }
            }
        }

        // Stage 8: truncate.
        results.truncate(options.n);
        Ok(results)
    }
}

/// Stable-sort by chamber (atrium < corridor < vault, unknown last) within
/// runs of results whose adjusted scores lie within 5% of the run head.
/// High-confidence matches keep their rank; fresh material wins near-ties.
fn prefer_fresh_among_ties(results: &mut [SearchResult]) {
    let mut start = 0;
    while start < results.len() {
        let head_score = results[start].score;
        let mut end = start + 1;
        while end < results.len() && results[end].score >= head_score * (1.0 - NEAR_TIE_WINDOW) {
            end += 1;
        }
        results[start..end].sort_by_key(|result| {
            result.chamber.unwrap_or(Chamber::Unknown).rank()
        });
        start = end;
    }
}
