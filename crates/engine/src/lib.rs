//! Nautilus engine: gravity, chambers, doors, mirrors, and the pipeline
//!
//! This crate contains the four cooperating ranking layers and their
//! orchestration:
//! - `gravity`: per-chunk importance tracking and score re-ranking
//! - `chambers`: temporal classification and LLM-driven promotion
//! - `doors`: regex context tags and result filtering
//! - `mirrors`: granularity links between renditions of one event
//! - `pipeline`: the staged `search()` flow
//! - `maintain`: the idempotent upkeep batch
//! - `retrieve` / `summarize`: default collaborator implementations
//! - `nautilus`: the single entry-point handle tying it all together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chambers;
pub mod doors;
pub mod gravity;
pub mod maintain;
pub mod mirrors;
pub mod nautilus;
pub mod pipeline;
pub mod retrieve;
pub mod status;
pub mod summarize;

pub use chambers::{classify_age, Chambers, ClassifyStats, PromotionReport};
pub use doors::{AutoTagStats, Doors, PatternTable};
pub use gravity::{
    effective_mass, mass_breakdown, score_modifier, Gravity, MassBreakdown,
};
pub use maintain::{maintain, MaintainOptions, MaintainReport, StepOutcome};
pub use mirrors::{AutoLinkStats, Mirrors};
pub use nautilus::Nautilus;
pub use pipeline::{Pipeline, SearchOptions};
pub use retrieve::ScanRetriever;
pub use status::{status, StatusReport};
pub use summarize::ApiSummarizer;
