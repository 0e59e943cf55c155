//! Idempotent maintenance batch
//!
//! One tick of upkeep: register recent writes, classify chambers, auto-tag,
//! decay, auto-link mirrors, and optionally promote/crystallize. Each step
//! is independently fault-tolerant: a failing step is recorded in the
//! report and the next step still runs. Scheduling is the caller's problem;
//! this function has no timing loop and concurrent runs must be prevented
//! by the caller.

use crate::chambers::Chambers;
use crate::doors::Doors;
use crate::gravity::Gravity;
use crate::mirrors::Mirrors;
use chrono::{DateTime, Duration, Utc};
use nautilus_core::{NautilusConfig, Result, Summarizer};
use nautilus_store::Store;
use serde::Serialize;

/// Options for one maintenance run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaintainOptions {
    /// Register writes for files modified within this many hours
    pub register_recent_hours: Option<u64>,
    /// Run promotion and crystallization at the end
    pub promote: bool,
    /// Report what would happen without mutating anything
    pub dry_run: bool,
}

/// Result of one maintenance step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Step name
    pub step: String,
    /// Whether the step completed
    pub ok: bool,
    /// Human-readable summary, or the error when `ok` is false
    pub detail: String,
}

/// Structured report of a maintenance run.
#[derive(Debug, Clone, Serialize)]
pub struct MaintainReport {
    /// Per-step outcomes, in execution order
    pub steps: Vec<StepOutcome>,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl MaintainReport {
    /// True when every step completed.
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.ok)
    }

    fn record(&mut self, step: &str, result: Result<String>) {
        match result {
            Ok(detail) => self.steps.push(StepOutcome {
                step: step.to_string(),
                ok: true,
                detail,
            }),
            Err(e) => {
                tracing::warn!(
                    target: "nautilus::maintain",
                    step,
                    error = %e,
                    "maintenance step failed, continuing"
                );
                self.steps.push(StepOutcome {
                    step: step.to_string(),
                    ok: false,
                    detail: e.to_string(),
                });
            }
        }
    }
}

/// Run the maintenance batch.
pub fn maintain(
    store: &Store,
    config: &NautilusConfig,
    summarizer: &dyn Summarizer,
    options: &MaintainOptions,
) -> MaintainReport {
    let mut report = MaintainReport {
        steps: Vec::new(),
        dry_run: options.dry_run,
    };
    let now = Utc::now();

    if let Some(hours) = options.register_recent_hours {
        report.record(
            "register_recent",
            register_recent(store, config, hours, now, options.dry_run),
        );
    }

    let chambers = Chambers::new(store, config);
    if options.dry_run {
        report.record("classify", Ok("skipped (dry-run)".to_string()));
        report.record("auto_tag", Ok("skipped (dry-run)".to_string()));
        report.record("decay", Ok("skipped (dry-run)".to_string()));
        report.record("auto_link", Ok("skipped (dry-run)".to_string()));
    } else {
        report.record(
            "classify",
            chambers.classify_all().map(|stats| {
                format!(
                    "classified {} files ({} updated, {} created)",
                    stats.scanned, stats.updated, stats.created
                )
            }),
        );
        report.record(
            "auto_tag",
            Doors::new(store, config)
                .and_then(|doors| doors.auto_tag())
                .map(|stats| {
                    format!("scanned {} files, tagged {}", stats.scanned, stats.tagged)
                }),
        );
        report.record(
            "decay",
            Gravity::new(store, &config.gravity)
                .decay()
                .map(|count| format!("decayed {} chunks", count)),
        );
        report.record(
            "auto_link",
            Mirrors::new(store).auto_link(config).map(|stats| {
                format!("scanned {}, linked {}", stats.scanned, stats.linked)
            }),
        );
    }

    if options.promote {
        report.record(
            "promote",
            chambers
                .promote(summarizer, options.dry_run)
                .map(promotion_detail),
        );
        report.record(
            "crystallize",
            chambers
                .crystallize(summarizer, options.dry_run)
                .map(promotion_detail),
        );
    }

    tracing::info!(
        target: "nautilus::maintain",
        steps = report.steps.len(),
        ok = report.succeeded(),
        dry_run = report.dry_run,
        "maintenance run complete"
    );
    report
}

fn promotion_detail(report: crate::chambers::PromotionReport) -> String {
    format!(
        "{} candidates, {} written, {} declined, {} errors",
        report.candidates.len(),
        report.written.len(),
        report.declined,
        report.errors.len()
    )
}

fn register_recent(
    store: &Store,
    config: &NautilusConfig,
    hours: u64,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<String> {
    let cutoff = now - Duration::hours(hours as i64);
    let gravity = Gravity::new(store, &config.gravity);
    let mut registered = 0usize;
    for file in crate::chambers::memory_files(&config.memory_root()) {
        let modified = match std::fs::metadata(&file).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(_) => continue,
        };
        if modified < cutoff {
            continue;
        }
        if !dry_run {
            gravity.record_write(&config.relative_path(&file))?;
        }
        registered += 1;
    }
    Ok(if dry_run {
        format!("would register {} recent writes", registered)
    } else {
        format!("registered {} recent writes", registered)
    })
}
