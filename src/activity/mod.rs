//! Durable activity record for a run.
//!
//! The aggregator owns an append-only sequence of [`ActivityEntry`] facts
//! for the life of the run. `render` is a pure function of the entries plus
//! a [`RunSummary`] snapshot; `write` overwrites the whole document so every
//! persisted state is complete and consistent, safe to call after each
//! iteration and again on interrupt.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::stats::UsageStats;

/// The narrative block keeps at most this many trailing lines.
pub const SUMMARY_WINDOW_LINES: usize = 30;

/// One immutable fact about the run, ordered by emission time.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEntry {
    IterationStart {
        iter: u32,
        total: u32,
    },
    IterationEnd {
        iter: u32,
        success: bool,
        complete: bool,
    },
    ToolCall {
        iter: u32,
        tool_name: String,
        summary: Option<String>,
    },
    /// Per-event values from one `result` record, not running totals.
    Stats {
        iter: u32,
        cost: Option<f64>,
        duration_ms: Option<u64>,
        tokens_in: Option<u64>,
        tokens_out: Option<u64>,
    },
    IterationError {
        iter: u32,
        message: String,
    },
    IterationSummary {
        iter: u32,
        text: String,
    },
}

impl ActivityEntry {
    /// The iteration this entry belongs to.
    pub fn iteration(&self) -> u32 {
        match self {
            ActivityEntry::IterationStart { iter, .. }
            | ActivityEntry::IterationEnd { iter, .. }
            | ActivityEntry::ToolCall { iter, .. }
            | ActivityEntry::Stats { iter, .. }
            | ActivityEntry::IterationError { iter, .. }
            | ActivityEntry::IterationSummary { iter, .. } => *iter,
        }
    }
}

/// Run-level counters rendered into the document header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub completed: u32,
    pub failed: u32,
    pub early_complete: bool,
    pub interrupted: bool,
    pub totals: UsageStats,
    /// None while the run is still in flight.
    pub finished_at: Option<DateTime<Local>>,
}

/// Append-only activity log with full-overwrite persistence.
pub struct ActivityLog {
    path: PathBuf,
    started_at: DateTime<Local>,
    entries: Vec<ActivityEntry>,
}

impl ActivityLog {
    /// Create an empty log that will persist to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            started_at: Local::now(),
            entries: Vec::new(),
        }
    }

    /// Append one entry. Entries are never removed or reordered.
    pub fn push(&mut self, entry: ActivityEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the full document. Deterministic: the same entries and the
    /// same summary always produce byte-identical output.
    pub fn render(&self, summary: &RunSummary) -> String {
        let mut doc = String::new();
        doc.push_str("# Ralph Activity Log\n\n");
        doc.push_str(&format!(
            "- Started: {}\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        ));
        match summary.finished_at {
            Some(finished) => {
                doc.push_str(&format!(
                    "- Finished: {}\n",
                    finished.format("%Y-%m-%d %H:%M:%S")
                ));
            }
            None => doc.push_str("- Finished: in progress\n"),
        }

        doc.push_str("\n## Run Summary\n\n");
        doc.push_str(&format!(
            "- Iterations: {} ({} completed, {} failed)\n",
            summary.completed + summary.failed,
            summary.completed,
            summary.failed
        ));
        if summary.early_complete {
            doc.push_str("- Early complete: completion marker detected\n");
        }
        if summary.interrupted {
            doc.push_str("- Interrupted by user\n");
        }
        if summary.totals.cost > 0.0 {
            doc.push_str(&format!("- Total cost: ${:.4}\n", summary.totals.cost));
        }
        if summary.totals.duration_ms > 0 {
            doc.push_str(&format!(
                "- Total duration: {:.1} minutes\n",
                summary.totals.duration_ms as f64 / 1000.0 / 60.0
            ));
        }
        if summary.totals.tokens_in > 0 || summary.totals.tokens_out > 0 {
            doc.push_str(&format!(
                "- Total tokens: {} in / {} out\n",
                summary.totals.tokens_in, summary.totals.tokens_out
            ));
        }

        // Sections ordered by iteration number, not emission order, so an
        // out-of-order flush still renders coherently.
        let mut iterations: Vec<u32> = self.entries.iter().map(ActivityEntry::iteration).collect();
        iterations.sort_unstable();
        iterations.dedup();

        for iter in iterations {
            self.render_iteration(&mut doc, iter);
        }

        doc
    }

    fn render_iteration(&self, doc: &mut String, iter: u32) {
        let entries: Vec<&ActivityEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.iteration() == iter)
            .collect();

        doc.push_str(&format!("\n## Iteration {}\n\n", iter));

        let end = entries.iter().find_map(|entry| match entry {
            ActivityEntry::IterationEnd { success, complete, .. } => Some((*success, *complete)),
            _ => None,
        });
        match end {
            Some((true, _)) => doc.push_str("- Status: ✓ succeeded\n"),
            Some((false, _)) => doc.push_str("- Status: ✗ failed\n"),
            None => doc.push_str("- Status: in progress\n"),
        }
        if matches!(end, Some((_, true))) {
            doc.push_str("- Completion marker detected\n");
        }

        let mut totals = UsageStats::default();
        for entry in &entries {
            if let ActivityEntry::Stats {
                cost,
                duration_ms,
                tokens_in,
                tokens_out,
                ..
            } = entry
            {
                totals.record(*cost, *duration_ms, *tokens_in, *tokens_out);
            }
        }
        if !totals.is_empty() {
            doc.push_str(&format!(
                "- Cost: ${:.4} | Duration: {:.1}s | Tokens: {} → {}\n",
                totals.cost,
                totals.duration_ms as f64 / 1000.0,
                totals.tokens_in,
                totals.tokens_out
            ));
        }

        let tool_calls: Vec<&ActivityEntry> = entries
            .iter()
            .copied()
            .filter(|entry| matches!(entry, ActivityEntry::ToolCall { .. }))
            .collect();
        if !tool_calls.is_empty() {
            doc.push_str("\n### Tool calls\n\n");
            for entry in tool_calls {
                if let ActivityEntry::ToolCall {
                    tool_name, summary, ..
                } = entry
                {
                    match summary {
                        Some(summary) => {
                            doc.push_str(&format!("- {} — {}\n", tool_name, summary));
                        }
                        None => doc.push_str(&format!("- {}\n", tool_name)),
                    }
                }
            }
        }

        let errors: Vec<&ActivityEntry> = entries
            .iter()
            .copied()
            .filter(|entry| matches!(entry, ActivityEntry::IterationError { .. }))
            .collect();
        if !errors.is_empty() {
            doc.push_str("\n### Errors\n\n");
            for entry in errors {
                if let ActivityEntry::IterationError { message, .. } = entry {
                    doc.push_str(&format!("- {}\n", message));
                }
            }
        }

        for entry in &entries {
            if let ActivityEntry::IterationSummary { text, .. } = entry {
                if !text.is_empty() {
                    doc.push_str("\n### Summary\n\n");
                    doc.push_str(text);
                    doc.push('\n');
                }
            }
        }
    }

    /// Overwrite the persisted document with the current full render.
    pub fn write(&self, summary: &RunSummary) -> Result<()> {
        fs::write(&self.path, self.render(summary))?;
        Ok(())
    }
}

/// Derive the narrative block from an iteration's accumulated text: the
/// trimmed non-blank lines, keeping at most the last
/// [`SUMMARY_WINDOW_LINES`], in order. A bounded window, not semantic
/// summarization.
pub fn extract_summary(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(SUMMARY_WINDOW_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stats_entry(iter: u32, cost: f64, duration_ms: u64) -> ActivityEntry {
        ActivityEntry::Stats {
            iter,
            cost: Some(cost),
            duration_ms: Some(duration_ms),
            tokens_in: Some(100),
            tokens_out: Some(50),
        }
    }

    #[test]
    fn test_render_is_pure() {
        let mut log = ActivityLog::new("activity.md");
        log.push(ActivityEntry::IterationStart { iter: 1, total: 3 });
        log.push(ActivityEntry::ToolCall {
            iter: 1,
            tool_name: "Bash".to_string(),
            summary: Some("cargo test".to_string()),
        });
        log.push(ActivityEntry::IterationEnd {
            iter: 1,
            success: true,
            complete: false,
        });

        let summary = RunSummary {
            completed: 1,
            ..RunSummary::default()
        };
        assert_eq!(log.render(&summary), log.render(&summary));
    }

    #[test]
    fn test_sections_ordered_by_iteration_not_emission() {
        let mut log = ActivityLog::new("activity.md");
        log.push(ActivityEntry::IterationEnd {
            iter: 2,
            success: true,
            complete: false,
        });
        log.push(ActivityEntry::IterationEnd {
            iter: 1,
            success: false,
            complete: false,
        });

        let doc = log.render(&RunSummary::default());
        let first = doc.find("## Iteration 1").unwrap();
        let second = doc.find("## Iteration 2").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_iteration_stats_aggregated_across_entries() {
        let mut log = ActivityLog::new("activity.md");
        log.push(stats_entry(1, 0.01, 500));
        log.push(stats_entry(1, 0.02, 300));
        log.push(ActivityEntry::IterationEnd {
            iter: 1,
            success: true,
            complete: false,
        });

        let doc = log.render(&RunSummary::default());
        assert!(doc.contains("Cost: $0.0300"));
        assert!(doc.contains("Duration: 0.8s"));
        assert!(doc.contains("Tokens: 200 → 100"));
    }

    #[test]
    fn test_tool_calls_rendered_in_emission_order() {
        let mut log = ActivityLog::new("activity.md");
        for name in ["Read", "Bash", "Edit"] {
            log.push(ActivityEntry::ToolCall {
                iter: 1,
                tool_name: name.to_string(),
                summary: None,
            });
        }

        let doc = log.render(&RunSummary::default());
        let read = doc.find("- Read").unwrap();
        let bash = doc.find("- Bash").unwrap();
        let edit = doc.find("- Edit").unwrap();
        assert!(read < bash && bash < edit);
    }

    #[test]
    fn test_errors_and_completion_marker() {
        let mut log = ActivityLog::new("activity.md");
        log.push(ActivityEntry::IterationError {
            iter: 1,
            message: "tool exploded".to_string(),
        });
        log.push(ActivityEntry::IterationEnd {
            iter: 1,
            success: true,
            complete: true,
        });

        let doc = log.render(&RunSummary::default());
        assert!(doc.contains("### Errors"));
        assert!(doc.contains("- tool exploded"));
        assert!(doc.contains("- Completion marker detected"));
    }

    #[test]
    fn test_in_progress_iteration_without_end_entry() {
        let mut log = ActivityLog::new("activity.md");
        log.push(ActivityEntry::IterationStart { iter: 1, total: 5 });

        let doc = log.render(&RunSummary::default());
        assert!(doc.contains("- Status: in progress"));
    }

    #[test]
    fn test_run_summary_lines() {
        let mut totals = UsageStats::default();
        totals.record(Some(0.5), Some(120_000), Some(1000), Some(400));
        let summary = RunSummary {
            completed: 2,
            failed: 1,
            early_complete: true,
            interrupted: false,
            totals,
            finished_at: None,
        };

        let log = ActivityLog::new("activity.md");
        let doc = log.render(&summary);
        assert!(doc.contains("- Iterations: 3 (2 completed, 1 failed)"));
        assert!(doc.contains("- Early complete: completion marker detected"));
        assert!(doc.contains("- Total cost: $0.5000"));
        assert!(doc.contains("- Total duration: 2.0 minutes"));
        assert!(doc.contains("- Total tokens: 1000 in / 400 out"));
        assert!(doc.contains("- Finished: in progress"));
    }

    #[test]
    fn test_write_overwrites_whole_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("activity.md");
        let mut log = ActivityLog::new(&path);

        log.push(ActivityEntry::IterationEnd {
            iter: 1,
            success: true,
            complete: false,
        });
        log.write(&RunSummary::default()).unwrap();
        let first = fs::read_to_string(&path).unwrap();

        log.push(ActivityEntry::IterationEnd {
            iter: 2,
            success: false,
            complete: false,
        });
        log.write(&RunSummary::default()).unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert!(first.contains("## Iteration 1"));
        assert!(!first.contains("## Iteration 2"));
        assert!(second.contains("## Iteration 1"));
        assert!(second.contains("## Iteration 2"));
        // Each write reflects complete state, never an append of fragments.
        assert!(second.starts_with("# Ralph Activity Log"));
    }

    #[test]
    fn test_extract_summary_trims_and_drops_blanks() {
        let text = "  first  \n\n   \nsecond\n";
        assert_eq!(extract_summary(text), "first\nsecond");
    }

    #[test]
    fn test_extract_summary_keeps_last_window() {
        let text: String = (1..=40).map(|i| format!("line {}\n", i)).collect();
        let summary = extract_summary(&text);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), SUMMARY_WINDOW_LINES);
        assert_eq!(lines[0], "line 11");
        assert_eq!(lines[29], "line 40");
    }

    #[test]
    fn test_extract_summary_empty_text() {
        assert_eq!(extract_summary(""), "");
        assert_eq!(extract_summary("\n\n  \n"), "");
    }

    #[test]
    fn test_empty_summary_text_not_rendered() {
        let mut log = ActivityLog::new("activity.md");
        log.push(ActivityEntry::IterationSummary {
            iter: 1,
            text: String::new(),
        });
        let doc = log.render(&RunSummary::default());
        assert!(!doc.contains("### Summary"));
    }

    #[test]
    fn test_entry_iteration_accessor() {
        let entry = ActivityEntry::ToolCall {
            iter: 7,
            tool_name: "Bash".to_string(),
            summary: None,
        };
        assert_eq!(entry.iteration(), 7);
    }
}
