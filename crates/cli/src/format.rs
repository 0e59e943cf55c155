//! Human/JSON rendering of engine outputs.
//!
//! Two modes:
//! - **Human** (default): compact aligned lines for terminals
//! - **JSON** (`--json`): `serde_json::to_string_pretty` of the raw structs

use nautilus_core::{Chamber, GravityRecord, MirrorSet, NautilusError, SearchResult};
use nautilus_engine::{
    AutoLinkStats, AutoTagStats, ClassifyStats, MaintainReport, MassBreakdown, PromotionReport,
    StatusReport,
};
use nautilus_store::VacuumStats;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Aligned terminal lines
    Human,
    /// Pretty-printed JSON
    Json,
}

fn json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Format an error as a single-line summary; verbose mode adds the kind.
pub fn format_error(err: &NautilusError, mode: OutputMode, verbose: bool) -> String {
    match mode {
        OutputMode::Json => json(&serde_json::json!({
            "error": err.to_string(),
            "kind": err.kind(),
        })),
        OutputMode::Human if verbose => format!("error [{}]: {}", err.kind(), err),
        OutputMode::Human => format!("error: {}", err),
    }
}

/// Format search results.
pub fn format_results(results: &[SearchResult], mode: OutputMode, verbose: bool) -> String {
    if mode == OutputMode::Json {
        return json(&results);
    }
    if results.is_empty() {
        return "no results".to_string();
    }
    let mut out = String::new();
    for (index, result) in results.iter().enumerate() {
        let chamber = result
            .chamber
            .map(|c| c.as_str())
            .unwrap_or(Chamber::Unknown.as_str());
        out.push_str(&format!(
            "{:2}. {:.3}  [{}]  {}\n",
            index + 1,
            result.score,
            chamber,
            result.path
        ));
        if !result.snippet.is_empty() {
            out.push_str(&format!("      {}\n", result.snippet));
        }
        if verbose {
            if let Some(gravity) = &result.gravity {
                out.push_str(&format!(
                    "      mass {:.3}  modifier {:.3}  original {:.3}{}\n",
                    gravity.effective_mass,
                    gravity.modifier,
                    result.original_score,
                    if gravity.superseded { "  superseded" } else { "" }
                ));
            }
            if let Some(context_match) = result.context_match {
                out.push_str(&format!("      context match {:.2}\n", context_match));
            }
            if let Some(mirrors) = &result.mirrors {
                for entry in &mirrors.mirrors {
                    out.push_str(&format!(
                        "      mirror {}: {}\n",
                        entry.granularity, entry.path
                    ));
                }
            }
        }
    }
    out.trim_end().to_string()
}

/// Format the status report.
pub fn format_status(report: &StatusReport, mode: OutputMode) -> String {
    if mode == OutputMode::Json {
        return json(report);
    }
    let mut out = String::new();
    out.push_str(&format!("database     {}\n", report.db_path));
    out.push_str(&format!("size         {} bytes\n", report.db_size_bytes));
    out.push_str(&format!("chunks       {}\n", report.chunk_count));
    out.push_str(&format!("accesses     {} ({} log rows)\n", report.access_total, report.access_log_rows));
    out.push_str(&format!("tagged       {}\n", report.tagged_chunks));
    out.push_str(&format!(
        "mirrors      {} events, {} rows\n",
        report.mirror_events, report.mirror_rows
    ));
    out.push_str("chambers     ");
    if report.chambers.is_empty() {
        out.push_str("none");
    } else {
        let parts: Vec<String> = report
            .chambers
            .iter()
            .map(|(chamber, count)| format!("{} {}", chamber, count))
            .collect();
        out.push_str(&parts.join(", "));
    }
    out
}

/// Format the maintenance report.
pub fn format_maintain(report: &MaintainReport, mode: OutputMode) -> String {
    if mode == OutputMode::Json {
        return json(report);
    }
    let mut out = String::new();
    if report.dry_run {
        out.push_str("dry run\n");
    }
    for step in &report.steps {
        let mark = if step.ok { "ok " } else { "ERR" };
        out.push_str(&format!("{}  {:16} {}\n", mark, step.step, step.detail));
    }
    out.trim_end().to_string()
}

/// Format a gravity record with its mass breakdown.
pub fn format_gravity(
    record: &GravityRecord,
    breakdown: &MassBreakdown,
    mode: OutputMode,
) -> String {
    if mode == OutputMode::Json {
        return json(&serde_json::json!({
            "record": record,
            "breakdown": breakdown,
        }));
    }
    let mut out = String::new();
    out.push_str(&format!("chunk            {}\n", record.key));
    out.push_str(&format!("chamber          {}\n", record.chamber));
    out.push_str(&format!("accesses         {}\n", record.access_count));
    out.push_str(&format!("references       {}\n", record.reference_count));
    out.push_str(&format!("importance       {:.3}\n", record.explicit_importance));
    out.push_str(&format!("tags             {}\n", record.tags.join(", ")));
    out.push_str(&format!(
        "base {:.3} · recency {:.3} + authority {:.3} (written {:.1}d ago)\n",
        breakdown.base, breakdown.recency, breakdown.authority, breakdown.days_since_write
    ));
    out.push_str(&format!(
        "effective mass   {:.3}  →  modifier {:.3}",
        breakdown.effective_mass, breakdown.modifier
    ));
    out
}

/// Format a classify outcome for one file.
pub fn format_chamber(path: &str, chamber: Chamber, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json(&serde_json::json!({ "path": path, "chamber": chamber })),
        OutputMode::Human => format!("{}  {}", chamber, path),
    }
}

/// Format classify-all statistics.
pub fn format_classify_stats(stats: &ClassifyStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json(stats),
        OutputMode::Human => format!(
            "classified {} files ({} updated, {} created)",
            stats.scanned, stats.updated, stats.created
        ),
    }
}

/// Format a promotion/crystallization report.
pub fn format_promotion(report: &PromotionReport, dry_run: bool, mode: OutputMode) -> String {
    if mode == OutputMode::Json {
        return json(report);
    }
    let mut out = String::new();
    if dry_run {
        out.push_str(&format!("{} candidates:\n", report.candidates.len()));
        for candidate in &report.candidates {
            out.push_str(&format!("  {}\n", candidate));
        }
    } else {
        for written in &report.written {
            out.push_str(&format!("wrote {}\n", written));
        }
        out.push_str(&format!(
            "{} candidates, {} written, {} declined, {} errors",
            report.candidates.len(),
            report.written.len(),
            report.declined,
            report.errors.len()
        ));
    }
    out.trim_end().to_string()
}

/// Format classified tags.
pub fn format_tags(tags: &[String], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json(&tags),
        OutputMode::Human if tags.is_empty() => "no tags".to_string(),
        OutputMode::Human => tags.join("\n"),
    }
}

/// Format auto-tag statistics.
pub fn format_auto_tag(stats: &AutoTagStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json(stats),
        OutputMode::Human => format!(
            "scanned {} files, tagged {} ({} created)",
            stats.scanned, stats.tagged, stats.created
        ),
    }
}

/// Format a mirror set.
pub fn format_mirrors(set: &MirrorSet, mode: OutputMode) -> String {
    if mode == OutputMode::Json {
        return json(set);
    }
    let mut out = format!("{}\n", set.event_key);
    for entry in &set.mirrors {
        out.push_str(&format!("  {:8} {}\n", entry.granularity.as_str(), entry.path));
    }
    out.trim_end().to_string()
}

/// Format auto-link statistics.
pub fn format_auto_link(stats: &AutoLinkStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json(stats),
        OutputMode::Human => format!("scanned {}, linked {}", stats.scanned, stats.linked),
    }
}

/// Format vacuum statistics.
pub fn format_vacuum(stats: &VacuumStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json(stats),
        OutputMode::Human => format!(
            "pruned {} access-log rows, {} orphan chunks",
            stats.pruned_log_rows, stats.pruned_chunks
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nautilus_core::RetrievedChunk;

    #[test]
    fn test_format_error_modes() {
        let err = NautilusError::not_found("chunk a.md");
        assert_eq!(format_error(&err, OutputMode::Human, false), "error: not found: chunk a.md");
        assert!(format_error(&err, OutputMode::Human, true).contains("[NotFound]"));
        assert!(format_error(&err, OutputMode::Json, false).contains("\"kind\""));
    }

    #[test]
    fn test_format_results_human() {
        let result = SearchResult::from_retrieved(RetrievedChunk {
            path: "memory/a.md".to_string(),
            line_start: 0,
            line_end: 0,
            score: 0.912,
            snippet: "the line".to_string(),
        });
        let text = format_results(&[result], OutputMode::Human, false);
        assert!(text.contains("0.912"));
        assert!(text.contains("memory/a.md"));
        assert!(text.contains("the line"));
    }

    #[test]
    fn test_format_results_json_roundtrips() {
        let result = SearchResult::from_retrieved(RetrievedChunk {
            path: "a.md".to_string(),
            line_start: 0,
            line_end: 0,
            score: 0.5,
            snippet: String::new(),
        });
        let text = format_results(&[result], OutputMode::Json, false);
        let parsed: Vec<SearchResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0].path, "a.md");
    }

    #[test]
    fn test_format_empty_results() {
        assert_eq!(format_results(&[], OutputMode::Human, false), "no results");
    }
}
