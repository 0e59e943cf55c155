//! Collaborator seams: base retriever and summarizer
//!
//! Both collaborators are dependency-injected so either can be stubbed for
//! tests. The traits are object-safe for use as `&dyn` / `Box<dyn>`.

use crate::error::Result;
use crate::types::RetrievedChunk;

// ============================================================================
// BaseRetriever
// ============================================================================

/// The opaque text-search function Nautilus re-ranks
///
/// Input: query string and a candidate cap. Output: ranked candidates with
/// workspace-relative paths, optional line ranges, scores (higher = better)
/// and snippets. A failing retriever aborts the search pipeline with
/// `RetrievalFailed`.
pub trait BaseRetriever: Send + Sync {
    /// Run the base retrieval for `query`, returning at most `max_results`
    /// candidates.
    fn retrieve(&self, query: &str, max_results: usize) -> Result<Vec<RetrievedChunk>>;
}

// ============================================================================
// Summarizer
// ============================================================================

/// Which summary a promotion pass is asking for
///
/// The mode selects the prompt policy and the input byte budget. Corridor
/// summaries condense a recent file; vault lessons distill an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// Condensed summary for corridor promotion
    Corridor,
    /// Distilled lesson for vault crystallization
    Vault,
}

impl SummaryMode {
    /// Stable string form, written into summary-file headers
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMode::Corridor => "corridor",
            SummaryMode::Vault => "vault",
        }
    }

    /// Input truncation budget in bytes for this mode
    pub fn input_budget(&self) -> usize {
        match self {
            SummaryMode::Corridor => 8 * 1024,
            SummaryMode::Vault => 6 * 1024,
        }
    }
}

/// The opaque local LLM call producing corridor and vault files
///
/// `Ok(None)` means the model declined (empty output); the caller skips the
/// file silently. `Err(SummarizerUnavailable)` means the call failed or
/// timed out; maintenance records it and continues. Search never invokes
/// the summarizer.
pub trait Summarizer: Send + Sync {
    /// Summarize `text` (already truncated to the mode's input budget).
    fn summarize(&self, text: &str, mode: SummaryMode) -> Result<Option<String>>;

    /// Whether this summarizer can produce output at all
    ///
    /// Disabled summarizers let promotion skip cleanly without per-file
    /// calls.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Summarizer that is configured off: promotion skips cleanly
pub struct DisabledSummarizer;

impl Summarizer for DisabledSummarizer {
    fn summarize(&self, _text: &str, _mode: SummaryMode) -> Result<Option<String>> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_budgets() {
        assert_eq!(SummaryMode::Corridor.input_budget(), 8192);
        assert_eq!(SummaryMode::Vault.input_budget(), 6144);
    }

    #[test]
    fn test_mode_str() {
        assert_eq!(SummaryMode::Corridor.as_str(), "corridor");
        assert_eq!(SummaryMode::Vault.as_str(), "vault");
    }

    #[test]
    fn test_disabled_summarizer_declines() {
        let s = DisabledSummarizer;
        assert!(!s.is_enabled());
        assert_eq!(s.summarize("text", SummaryMode::Corridor).unwrap(), None);
    }
}
