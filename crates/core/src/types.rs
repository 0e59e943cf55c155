//! Foundational value types for Nautilus
//!
//! This module defines:
//! - `ChunkKey`: value identity of a memory chunk (path + line range)
//! - `Chamber`: temporal bucket assigned by file age
//! - `Granularity`: mirror granularity (raw / summary / lesson)
//! - `GravityRecord`: the persisted importance state of one chunk
//! - `MirrorEntry` / `MirrorSet`: linked granularities of one event
//! - `RetrievedChunk`: what the base retriever returns
//! - `SearchResult`: the annotated record flowing through the pipeline
//!
//! All cross-references are by value key, never by reference: chunks are
//! identified by `(path, line_start, line_end)` throughout.

use crate::error::{NautilusError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ChunkKey
// ============================================================================

/// Value identity of a memory chunk
///
/// `path` is workspace-relative. `line_start == line_end == 0` denotes the
/// whole file. Chunks are created lazily on first access or write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    /// Workspace-relative path of the memory file
    pub path: String,
    /// First line of the chunk (1-based), or 0 for the whole file
    pub line_start: u32,
    /// Last line of the chunk (1-based), or 0 for the whole file
    pub line_end: u32,
}

impl ChunkKey {
    /// Key for the whole-file chunk of `path`
    pub fn whole_file(path: impl Into<String>) -> Self {
        ChunkKey {
            path: path.into(),
            line_start: 0,
            line_end: 0,
        }
    }

    /// Key for a line range within `path`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the range is inverted or uses 0 for
    /// only one bound (0 is reserved for whole-file chunks).
    pub fn range(path: impl Into<String>, line_start: u32, line_end: u32) -> Result<Self> {
        if (line_start == 0) != (line_end == 0) {
            return Err(NautilusError::invalid_argument(
                "line range must be 0:0 (whole file) or both bounds positive",
            ));
        }
        if line_start > line_end {
            return Err(NautilusError::invalid_argument(format!(
                "inverted line range {}:{}",
                line_start, line_end
            )));
        }
        Ok(ChunkKey {
            path: path.into(),
            line_start,
            line_end,
        })
    }

    /// Whether this key addresses the whole file
    pub fn is_whole_file(&self) -> bool {
        self.line_start == 0 && self.line_end == 0
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_file() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}:{}-{}", self.path, self.line_start, self.line_end)
        }
    }
}

// ============================================================================
// Chamber
// ============================================================================

/// Temporal bucket assigned by file age
///
/// Ordering is monotonic with age: atrium (youngest) → corridor → vault.
/// `Unknown` is assigned when the age of a file cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    /// Fresh material, younger than the atrium boundary (default 48h)
    Atrium,
    /// Recent material, younger than the corridor boundary (default 7d)
    Corridor,
    /// Everything older
    Vault,
    /// Age could not be determined
    Unknown,
}

impl Chamber {
    /// Stable string form, as persisted in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::Atrium => "atrium",
            Chamber::Corridor => "corridor",
            Chamber::Vault => "vault",
            Chamber::Unknown => "unknown",
        }
    }

    /// Parse the persisted string form
    ///
    /// Unrecognized values map to `Unknown` rather than erroring: the store
    /// column is additive-migrated and may predate a chamber vocabulary.
    pub fn parse(s: &str) -> Self {
        match s {
            "atrium" => Chamber::Atrium,
            "corridor" => Chamber::Corridor,
            "vault" => Chamber::Vault,
            _ => Chamber::Unknown,
        }
    }

    /// Preference rank for near-tie ordering: atrium < corridor < vault,
    /// unknown last
    pub fn rank(&self) -> u8 {
        match self {
            Chamber::Atrium => 0,
            Chamber::Corridor => 1,
            Chamber::Vault => 2,
            Chamber::Unknown => 3,
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Granularity
// ============================================================================

/// Mirror granularity: which rendition of an event a path holds
///
/// The set is closed; parsing anything else is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// The original file (daily log, transcript)
    Raw,
    /// Corridor summary produced by promotion
    Summary,
    /// Vault lesson produced by crystallization
    Lesson,
}

impl Granularity {
    /// Stable string form, as persisted in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Raw => "raw",
            Granularity::Summary => "summary",
            Granularity::Lesson => "lesson",
        }
    }

    /// Parse the persisted string form
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(Granularity::Raw),
            "summary" => Ok(Granularity::Summary),
            "lesson" => Ok(Granularity::Lesson),
            other => Err(NautilusError::invalid_argument(format!(
                "unknown granularity '{}', expected raw|summary|lesson",
                other
            ))),
        }
    }

    /// Resolution order: raw → summary → lesson
    pub fn order(&self) -> u8 {
        match self {
            Granularity::Raw => 0,
            Granularity::Summary => 1,
            Granularity::Lesson => 2,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// GravityRecord
// ============================================================================

/// Persisted importance state of one chunk
///
/// Counters and `explicit_importance` are non-negative by invariant.
/// `last_written_at` is the authority timestamp: the recency curve and the
/// authority boost are both computed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GravityRecord {
    /// Chunk identity
    pub key: ChunkKey,
    /// Number of retrieval uses
    pub access_count: u64,
    /// Reserved cross-reference counter; never written by shipped operations
    pub reference_count: u64,
    /// Human- or agent-assigned boost
    pub explicit_importance: f64,
    /// Last retrieval use, if any
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Last registered write, if any
    pub last_written_at: Option<DateTime<Utc>>,
    /// When the chunk row was created
    pub created_at: DateTime<Utc>,
    /// Path of a newer chunk replacing this one; reserved, never populated
    /// by shipped operations
    pub superseded_by: Option<String>,
    /// Ordered set of context tags (no duplicates)
    pub tags: Vec<String>,
    /// Temporal classification
    pub chamber: Chamber,
}

impl GravityRecord {
    /// Fresh record for a chunk first seen at `now`
    pub fn new(key: ChunkKey, now: DateTime<Utc>) -> Self {
        GravityRecord {
            key,
            access_count: 0,
            reference_count: 0,
            explicit_importance: 0.0,
            last_accessed_at: None,
            last_written_at: None,
            created_at: now,
            superseded_by: None,
            tags: Vec::new(),
            chamber: Chamber::Unknown,
        }
    }
}

// ============================================================================
// Mirrors
// ============================================================================

/// One granularity row of a mirrored event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorEntry {
    /// Which rendition this path holds
    pub granularity: Granularity,
    /// Workspace-relative path of the file at that granularity
    pub path: String,
}

/// All known granularities of one logical event
///
/// Entries are ordered raw → summary → lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSet {
    /// Stable identifier shared across granularities
    pub event_key: String,
    /// Sibling renditions, ordered by granularity
    pub mirrors: Vec<MirrorEntry>,
}

// ============================================================================
// Pipeline records
// ============================================================================

/// One candidate returned by the base retriever
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Workspace-relative path
    pub path: String,
    /// First matched line (1-based), 0 when the retriever scored whole files
    #[serde(default)]
    pub line_start: u32,
    /// Last matched line (1-based), 0 when the retriever scored whole files
    #[serde(default)]
    pub line_end: u32,
    /// Retriever score; higher is better
    pub score: f64,
    /// Matched excerpt
    pub snippet: String,
}

impl RetrievedChunk {
    /// Chunk key addressed by this candidate
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            path: self.path.clone(),
            line_start: self.line_start,
            line_end: self.line_end,
        }
    }
}

/// Gravity metadata attached to a result during re-ranking
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GravityAnnotation {
    /// Effective mass at rerank time
    pub effective_mass: f64,
    /// Multiplier applied to the retriever score (≥ 1.0)
    pub modifier: f64,
    /// Whether the chunk's `superseded_by` is set
    pub superseded: bool,
}

impl GravityAnnotation {
    /// Annotation for a chunk absent from the store: no mass, no change
    pub fn pass_through() -> Self {
        GravityAnnotation {
            effective_mass: 0.0,
            modifier: 1.0,
            superseded: false,
        }
    }
}

/// One search result, annotated monotonically by the pipeline stages
///
/// Components add fields, never mutate earlier ones: the retriever fills the
/// base record, gravity attaches `gravity` and adjusts `score` (keeping
/// `original_score`), doors attach `context_match`, chambers attach
/// `chamber`, mirrors attach `mirrors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Workspace-relative path
    pub path: String,
    /// First matched line (1-based), or 0
    pub line_start: u32,
    /// Last matched line (1-based), or 0
    pub line_end: u32,
    /// Gravity-adjusted score
    pub score: f64,
    /// Retriever score before adjustment
    pub original_score: f64,
    /// Matched excerpt
    pub snippet: String,
    /// Attached during gravity re-rank
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gravity: Option<GravityAnnotation>,
    /// Attached during context filtering (fraction of query tags matched;
    /// 0.5 pass-through for untagged files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_match: Option<f64>,
    /// Attached during chamber preference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chamber: Option<Chamber>,
    /// Attached during mirror resolution, when any sibling exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirrors: Option<MirrorSet>,
}

impl SearchResult {
    /// Lift a retriever candidate into an unannotated result
    pub fn from_retrieved(chunk: RetrievedChunk) -> Self {
        SearchResult {
            path: chunk.path,
            line_start: chunk.line_start,
            line_end: chunk.line_end,
            score: chunk.score,
            original_score: chunk.score,
            snippet: chunk.snippet,
            gravity: None,
            context_match: None,
            chamber: None,
            mirrors: None,
        }
    }

    /// Chunk key addressed by this result
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            path: self.path.clone(),
            line_start: self.line_start,
            line_end: self.line_end,
        }
    }
}
