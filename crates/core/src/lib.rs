//! Core types for the Nautilus memory engine
//!
//! This crate defines the foundational vocabulary shared by every other
//! Nautilus crate:
//! - `ChunkKey` and `GravityRecord`: per-chunk importance state
//! - `Chamber` and `Granularity`: temporal and mirror classifications
//! - `SearchResult` and its annotations: the record flowing through the
//!   search pipeline
//! - `NautilusError` / `Result`: the unified fallible-call shape
//! - `NautilusConfig`: explicit configuration passed to every component
//! - `BaseRetriever` / `Summarizer`: the two injected collaborator seams

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{
    ChamberConfig, GravityConfig, NautilusConfig, SearchConfig, SummarizerConfig,
};
pub use error::{NautilusError, Result};
pub use traits::{BaseRetriever, DisabledSummarizer, Summarizer, SummaryMode};
pub use types::{
    Chamber, ChunkKey, Granularity, GravityAnnotation, GravityRecord, MirrorEntry, MirrorSet,
    RetrievedChunk, SearchResult,
};
