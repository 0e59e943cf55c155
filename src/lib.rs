//! # Nautilus
//!
//! An importance-weighted, context-aware memory retrieval engine for
//! long-lived AI agents. Nautilus re-ranks a base retrieval stream using
//! four cooperating layers (per-chunk **gravity**, temporal **chambers**
//! with LLM-driven promotion, regex **doors** for topical filtering, and a
//! **mirror** index linking granularities of one event) and persists that
//! state in a single embedded database so the ranking learns from how the
//! agent actually uses memory.
//!
//! # Quick Start
//!
//! ```no_run
//! use nautilus::{MaintainOptions, Nautilus, NautilusConfig, SearchOptions};
//!
//! fn main() -> nautilus::Result<()> {
//!     let nautilus = Nautilus::open(NautilusConfig::load()?)?;
//!
//!     // Importance-weighted search
//!     let results = nautilus.search("deploy checklist", &SearchOptions::default())?;
//!     for result in &results {
//!         println!("{:.3}  {}", result.score, result.path);
//!     }
//!
//!     // Tell the ranking what matters
//!     nautilus.record_write("memory/2026-08-01.md")?;
//!     nautilus.boost("memory/lessons.md", 2.0, None)?;
//!
//!     // One maintenance tick (the caller owns scheduling)
//!     let report = nautilus.maintain(&MaintainOptions::default());
//!     assert!(report.succeeded());
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! | Layer | Purpose | Key operations |
//! |-------|---------|----------------|
//! | **Gravity** | Per-chunk importance | `record_access`, `record_write`, `boost`, `decay` |
//! | **Chambers** | Temporal buckets | `classify`, `promote`, `crystallize` |
//! | **Doors** | Context tags | `doors_classify`, `auto_tag` |
//! | **Mirrors** | Granularity links | `mirrors_link`, `mirrors_resolve` |
//! | **Pipeline** | Staged search | `search` |
//!
//! The base retriever and the summarizer are injected collaborators
//! (`BaseRetriever`, `Summarizer`); defaults are provided, and either can be
//! stubbed for tests via [`Nautilus::with_collaborators`].
//!
//! Internal crates (core, store, engine) are re-exported here; only this
//! surface is stable.

pub use nautilus_core::{
    BaseRetriever, Chamber, ChunkKey, Granularity, GravityAnnotation, GravityRecord,
    MirrorEntry, MirrorSet, NautilusConfig, NautilusError, Result, RetrievedChunk,
    SearchResult, Summarizer, SummaryMode,
};
pub use nautilus_engine::{
    ApiSummarizer, MaintainOptions, MaintainReport, MassBreakdown, Nautilus, ScanRetriever,
    SearchOptions, StatusReport, StepOutcome,
};
pub use nautilus_store::{Store, VacuumStats};
