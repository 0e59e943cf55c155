//! Error types for Nautilus
//!
//! One unified error enum for the whole engine, with `thiserror` providing
//! `Display` and `Error` implementations.
//!
//! ## Error categories
//!
//! - **Store**: transient unavailability (`StoreUnavailable`) vs. integrity
//!   failure (`StoreCorrupt`). Unavailability is surfaced only after bounded
//!   retries; corruption is never auto-repaired.
//! - **Validation**: bad paths, line ranges, granularities (`InvalidArgument`).
//! - **Collaborators**: base retriever (`RetrievalFailed`) and summarizer
//!   (`SummarizerUnavailable`) failures.
//! - **Lookup**: `NotFound` for resolve/gravity targets absent from the store.
//! - **Mirrors**: `MirrorConflict` when a link would replace an existing row
//!   with a different path. Policy is overwrite-plus-warning, so this variant
//!   is normally logged rather than returned.

use thiserror::Error;

/// Result type alias for Nautilus operations
pub type Result<T> = std::result::Result<T, NautilusError>;

/// Unified error type for all Nautilus operations
#[derive(Debug, Error)]
pub enum NautilusError {
    /// The store could not be reached or stayed locked past the busy
    /// timeout. Surfaced only after bounded retries; safe to retry later.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// What failed
        message: String,
        /// Optional underlying driver error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The store failed an integrity check. Callers must halt and report;
    /// auto-repair is never attempted.
    #[error("store corrupt: {message}")]
    StoreCorrupt {
        /// Description of the corruption
        message: String,
    },

    /// Bad input: unknown path, invalid line range, unknown granularity or
    /// tag. Not retryable; the input must be corrected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What's wrong with the input
        message: String,
    },

    /// The base retriever returned an error. Aborts the search pipeline.
    #[error("retrieval failed: {message}")]
    RetrievalFailed {
        /// Retriever-reported cause
        message: String,
    },

    /// The summarizer errored or timed out. Always local to one file during
    /// maintenance; the batch continues with the next candidate.
    #[error("summarizer unavailable: {message}")]
    SummarizerUnavailable {
        /// Summarizer-reported cause
        message: String,
    },

    /// A mirror link would replace an existing `(event_key, granularity)`
    /// row that points at a different path. Resolution policy is overwrite
    /// with a warning, so this is a reporting vehicle, not a hard failure.
    #[error("mirror conflict on {event_key}/{granularity}: {existing} replaced by {replacement}")]
    MirrorConflict {
        /// Event key of the conflicting row
        event_key: String,
        /// Granularity of the conflicting row
        granularity: String,
        /// Path previously linked
        existing: String,
        /// Path that replaced it
        replacement: String,
    },

    /// The resolve/gravity target does not exist in the store.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing entity
        what: String,
    },
}

impl NautilusError {
    /// Create a StoreUnavailable error without an underlying source
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        NautilusError::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a StoreUnavailable error wrapping a driver error
    pub fn store_unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        NautilusError::StoreUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a StoreCorrupt error
    pub fn store_corrupt(message: impl Into<String>) -> Self {
        NautilusError::StoreCorrupt {
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        NautilusError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a RetrievalFailed error
    pub fn retrieval_failed(message: impl Into<String>) -> Self {
        NautilusError::RetrievalFailed {
            message: message.into(),
        }
    }

    /// Create a SummarizerUnavailable error
    pub fn summarizer_unavailable(message: impl Into<String>) -> Self {
        NautilusError::SummarizerUnavailable {
            message: message.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(what: impl Into<String>) -> Self {
        NautilusError::NotFound { what: what.into() }
    }

    /// Stable kind name, used by verbose CLI output and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            NautilusError::StoreUnavailable { .. } => "StoreUnavailable",
            NautilusError::StoreCorrupt { .. } => "StoreCorrupt",
            NautilusError::InvalidArgument { .. } => "InvalidArgument",
            NautilusError::RetrievalFailed { .. } => "RetrievalFailed",
            NautilusError::SummarizerUnavailable { .. } => "SummarizerUnavailable",
            NautilusError::MirrorConflict { .. } => "MirrorConflict",
            NautilusError::NotFound { .. } => "NotFound",
        }
    }

    /// Check if this error may succeed on retry
    ///
    /// Only transient store unavailability qualifies. Validation and
    /// corruption errors never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NautilusError::StoreUnavailable { .. })
    }

    /// Check if this is a serious error requiring operator attention
    ///
    /// Corruption is the only variant that cannot be handled by retrying,
    /// fixing input, or skipping a file.
    pub fn is_serious(&self) -> bool {
        matches!(self, NautilusError::StoreCorrupt { .. })
    }

    /// Check if this error indicates bad caller input
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            NautilusError::InvalidArgument { .. } | NautilusError::NotFound { .. }
        )
    }

    /// Check if this error came from the store layer
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            NautilusError::StoreUnavailable { .. } | NautilusError::StoreCorrupt { .. }
        )
    }
}
