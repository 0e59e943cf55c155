//! The `Nautilus` entry point
//!
//! One struct ties the store, configuration, and the two injected
//! collaborators together and exposes the stable in-process API: `search`,
//! `status`, `maintain`, the single-chunk gravity operations, and the
//! per-component subcommand surfaces. The CLI is a thin adapter over this
//! type; embedding callers use it directly.

use crate::chambers::{Chambers, ClassifyStats, PromotionReport};
use crate::doors::{AutoTagStats, Doors};
use crate::gravity::{mass_breakdown, Gravity, MassBreakdown};
use crate::maintain::{maintain, MaintainOptions, MaintainReport};
use crate::mirrors::{AutoLinkStats, Mirrors};
use crate::pipeline::{Pipeline, SearchOptions};
use crate::retrieve::ScanRetriever;
use crate::status::{status, StatusReport};
use crate::summarize::ApiSummarizer;
use chrono::Utc;
use nautilus_core::{
    BaseRetriever, Chamber, GravityRecord, MirrorSet, NautilusConfig, Result, SearchResult,
    Summarizer,
};
use nautilus_store::{Store, VacuumStats};

/// Handle to one Nautilus instance.
///
/// # Example
///
/// ```no_run
/// use nautilus_engine::{Nautilus, SearchOptions};
/// use nautilus_core::NautilusConfig;
///
/// fn main() -> nautilus_core::Result<()> {
///     let nautilus = Nautilus::open(NautilusConfig::load()?)?;
///     let results = nautilus.search("deploy checklist", &SearchOptions::default())?;
///     for result in results {
///         println!("{:.3}  {}", result.score, result.path);
///     }
///     Ok(())
/// }
/// ```
pub struct Nautilus {
    config: NautilusConfig,
    store: Store,
    retriever: Box<dyn BaseRetriever>,
    summarizer: Box<dyn Summarizer>,
}

impl Nautilus {
    /// Open with the default collaborators: the built-in scan retriever and
    /// the configured API summarizer.
    pub fn open(config: NautilusConfig) -> Result<Self> {
        let retriever = Box::new(ScanRetriever::new(&config));
        let summarizer = Box::new(ApiSummarizer::new(&config.summarizer));
        Self::with_collaborators(config, retriever, summarizer)
    }

    /// Open with injected collaborators. Tests stub both seams this way.
    pub fn with_collaborators(
        config: NautilusConfig,
        retriever: Box<dyn BaseRetriever>,
        summarizer: Box<dyn Summarizer>,
    ) -> Result<Self> {
        config.validate()?;
        let store = Store::open(&config.db_path())?;
        Ok(Nautilus {
            config,
            store,
            retriever,
            summarizer,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &NautilusConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    // ========================================================================
    // Top-level operations
    // ========================================================================

    /// Run the search pipeline.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        Pipeline::new(&self.store, &self.config, self.retriever.as_ref())
            .search(query, options)
    }

    /// Collect store-wide counters.
    pub fn status(&self) -> Result<StatusReport> {
        status(&self.store)
    }

    /// Run the maintenance batch.
    pub fn maintain(&self, options: &MaintainOptions) -> MaintainReport {
        maintain(
            &self.store,
            &self.config,
            self.summarizer.as_ref(),
            options,
        )
    }

    /// Prune old access-log rows and zero-activity chunks.
    pub fn vacuum(&self) -> Result<VacuumStats> {
        self.store
            .vacuum(self.config.access_log_retention_days, Utc::now())
    }

    // ========================================================================
    // Gravity
    // ========================================================================

    /// Record one retrieval use of a chunk.
    pub fn record_access(
        &self,
        path: &str,
        lines: Option<(u32, u32)>,
        query: Option<&str>,
        score: Option<f64>,
    ) -> Result<()> {
        Gravity::new(&self.store, &self.config.gravity).record_access(path, lines, query, score)
    }

    /// Register that a file was written.
    pub fn record_write(&self, path: &str) -> Result<()> {
        Gravity::new(&self.store, &self.config.gravity).record_write(path)
    }

    /// Increase a chunk's explicit importance.
    pub fn boost(&self, path: &str, amount: f64, lines: Option<(u32, u32)>) -> Result<()> {
        Gravity::new(&self.store, &self.config.gravity).boost(path, amount, lines)
    }

    /// Apply one decay step; returns the number of chunks touched.
    pub fn decay(&self) -> Result<usize> {
        Gravity::new(&self.store, &self.config.gravity).decay()
    }

    /// Fetch a chunk's record with its mass breakdown.
    pub fn gravity_of(
        &self,
        path: &str,
        lines: Option<(u32, u32)>,
    ) -> Result<(GravityRecord, MassBreakdown)> {
        let record = Gravity::new(&self.store, &self.config.gravity).get(path, lines)?;
        let breakdown = mass_breakdown(&record, Utc::now(), &self.config.gravity);
        Ok((record, breakdown))
    }

    // ========================================================================
    // Chambers
    // ========================================================================

    /// Classify one workspace-relative path by age.
    pub fn classify(&self, path: &str) -> Chamber {
        Chambers::new(&self.store, &self.config).classify(path)
    }

    /// Classify the whole memory tree.
    pub fn classify_all(&self) -> Result<ClassifyStats> {
        Chambers::new(&self.store, &self.config).classify_all()
    }

    /// Promote corridor-age files.
    pub fn promote(&self, dry_run: bool) -> Result<PromotionReport> {
        Chambers::new(&self.store, &self.config).promote(self.summarizer.as_ref(), dry_run)
    }

    /// Crystallize vault-age files.
    pub fn crystallize(&self, dry_run: bool) -> Result<PromotionReport> {
        Chambers::new(&self.store, &self.config).crystallize(self.summarizer.as_ref(), dry_run)
    }

    // ========================================================================
    // Doors
    // ========================================================================

    /// Classify free text into context tags.
    pub fn doors_classify(&self, text: &str) -> Result<Vec<String>> {
        Ok(Doors::new(&self.store, &self.config)?.classify(text))
    }

    /// Batch-tag the memory tree.
    pub fn auto_tag(&self) -> Result<AutoTagStats> {
        Doors::new(&self.store, &self.config)?.auto_tag()
    }

    // ========================================================================
    // Mirrors
    // ========================================================================

    /// Link granularities of one event.
    pub fn mirrors_link(
        &self,
        event_key: &str,
        raw: &str,
        summary: Option<&str>,
        lesson: Option<&str>,
    ) -> Result<()> {
        Mirrors::new(&self.store).link(event_key, raw, summary, lesson)
    }

    /// Resolve a path or event key to its mirror set.
    pub fn mirrors_resolve(&self, path_or_key: &str) -> Result<MirrorSet> {
        Mirrors::new(&self.store).resolve(path_or_key)
    }

    /// Remove all rows of an event.
    pub fn mirrors_unlink(&self, event_key: &str) -> Result<usize> {
        Mirrors::new(&self.store).unlink(event_key)
    }

    /// Link dated corridor/vault files to their raw daily files.
    pub fn mirrors_auto_link(&self) -> Result<AutoLinkStats> {
        Mirrors::new(&self.store).auto_link(&self.config)
    }
}
