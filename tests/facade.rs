//! Smoke test over the public facade: open, ingest, search, maintain.

use nautilus::{
    BaseRetriever, MaintainOptions, Nautilus, NautilusConfig, Result, RetrievedChunk,
    SearchOptions, Summarizer, SummaryMode,
};

struct EchoRetriever;

impl BaseRetriever for EchoRetriever {
    fn retrieve(&self, _query: &str, _max_results: usize) -> Result<Vec<RetrievedChunk>> {
        Ok(vec![RetrievedChunk {
            path: "memory/notes.md".to_string(),
            line_start: 0,
            line_end: 0,
            score: 0.9,
            snippet: "a note".to_string(),
        }])
    }
}

struct SilentSummarizer;

impl Summarizer for SilentSummarizer {
    fn summarize(&self, _text: &str, _mode: SummaryMode) -> Result<Option<String>> {
        Ok(None)
    }
}

#[test]
fn facade_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = NautilusConfig::default();
    config.workspace_dir = dir.path().to_path_buf();
    config.state_dir = dir.path().join("state");
    std::fs::create_dir_all(config.memory_root()).unwrap();
    std::fs::write(config.memory_root().join("notes.md"), "a note about search").unwrap();

    let nautilus = Nautilus::with_collaborators(
        config,
        Box::new(EchoRetriever),
        Box::new(SilentSummarizer),
    )
    .unwrap();

    let results = nautilus
        .search("note", &SearchOptions::default())
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "memory/notes.md");

    nautilus.record_write("memory/notes.md").unwrap();
    nautilus.boost("memory/notes.md", 1.0, None).unwrap();
    let (record, breakdown) = nautilus.gravity_of("memory/notes.md", None).unwrap();
    assert!(record.explicit_importance >= 1.0);
    assert!(breakdown.modifier > 1.0);

    let report = nautilus.maintain(&MaintainOptions::default());
    assert!(report.succeeded(), "report: {:?}", report);

    let status = nautilus.status().unwrap();
    assert!(status.chunk_count >= 1);
    assert!(status.access_total >= 1);
}
