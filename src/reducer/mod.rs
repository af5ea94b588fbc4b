//! Per-iteration event reducer.
//!
//! Folds the classified event stream of one agent invocation into
//! [`IterationState`]: deduplicated tool ledger, accumulated assistant text,
//! completion-marker detection, and summed usage statistics. Each event also
//! produces its console side-effect and, where the durable record cares,
//! an activity entry.

use std::collections::HashSet;

use crate::activity::{ActivityEntry, ActivityLog};
use crate::display::{self, RESULT_PREVIEW_MAX, ToolPreview};
use crate::events::StreamEvent;
use crate::stats::UsageStats;

/// Literal tokens whose presence in accumulated assistant text signals the
/// agent considers its task done.
pub const COMPLETION_MARKERS: [&str; 2] = ["RALPH_COMPLETE", "<promise>COMPLETE</promise>"];

/// Scan a full text buffer for any completion marker.
///
/// Always a scan over the whole buffer, never just the latest delta: a
/// marker may straddle the boundary between two appended text blocks.
pub fn contains_completion_marker(text: &str) -> bool {
    COMPLETION_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}

/// State owned by a single agent invocation, discarded when it ends.
///
/// The dedup sets are scoped to one iteration; the agent's ids carry no
/// cross-iteration identity.
#[derive(Debug, Default)]
pub struct IterationState {
    seen_tool_ids: HashSet<String>,
    seen_result_ids: HashSet<String>,
    seen_text: HashSet<String>,
    /// Append-only; grows without bound within the iteration.
    pub accumulated_text: String,
    /// Monotonic: once true, stays true for the rest of the iteration.
    pub complete: bool,
    /// Running sums over every `result` event observed this iteration.
    pub stats: UsageStats,
}

impl IterationState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Applies classified events, in stream order, to one iteration's state.
pub struct EventReducer<'a> {
    iteration: u32,
    verbose: bool,
    state: IterationState,
    activity: &'a mut ActivityLog,
}

impl<'a> EventReducer<'a> {
    pub fn new(iteration: u32, verbose: bool, activity: &'a mut ActivityLog) -> Self {
        Self {
            iteration,
            verbose,
            state: IterationState::new(),
            activity,
        }
    }

    pub fn state(&self) -> &IterationState {
        &self.state
    }

    /// Consume the reducer and hand back the final iteration state.
    pub fn finish(self) -> IterationState {
        self.state
    }

    /// Fold one event into the state. Called once per classified event,
    /// strictly in stream order.
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::AssistantText { text } => self.apply_text(text),
            StreamEvent::ToolUse { id, name, input } => self.apply_tool_use(id, name, input),
            StreamEvent::ToolResult {
                id,
                content,
                is_error,
            } => self.apply_tool_result(id, content, *is_error),
            StreamEvent::Result {
                cost,
                duration_ms,
                tokens_in,
                tokens_out,
            } => self.apply_result(*cost, *duration_ms, *tokens_in, *tokens_out),
            StreamEvent::Error { message } => {
                display::error_line(message);
                self.activity.push(ActivityEntry::IterationError {
                    iter: self.iteration,
                    message: message.clone(),
                });
            }
            StreamEvent::System {
                subtype,
                tool_count,
            } => {
                if self.verbose && subtype == "init" {
                    display::system_init(*tool_count);
                }
            }
            StreamEvent::Raw { text } => display::raw_line(text),
        }
    }

    fn apply_text(&mut self, text: &str) {
        // Exact-match dedup only. Near-duplicate or partially overlapping
        // re-sends are intentionally not suppressed.
        if !self.state.seen_text.insert(text.to_string()) {
            return;
        }
        self.state.accumulated_text.push_str(text);
        if !self.state.complete {
            self.state.complete = contains_completion_marker(&self.state.accumulated_text);
        }
        display::assistant_text(text);
    }

    fn apply_tool_use(&mut self, id: &str, name: &str, input: &serde_json::Value) {
        if !self.state.seen_tool_ids.insert(id.to_string()) {
            return;
        }
        let preview = ToolPreview::from_input(input);
        display::tool_call(name, preview.as_ref());
        self.activity.push(ActivityEntry::ToolCall {
            iter: self.iteration,
            tool_name: name.to_string(),
            summary: preview.map(|preview| preview.label().to_string()),
        });
    }

    fn apply_tool_result(&mut self, id: &str, content: &str, is_error: bool) {
        if !self.state.seen_result_ids.insert(id.to_string()) {
            return;
        }
        if is_error {
            display::tool_result(content, true);
            self.activity.push(ActivityEntry::IterationError {
                iter: self.iteration,
                message: display::truncate(content, RESULT_PREVIEW_MAX),
            });
        } else if self.verbose {
            // Successful results are display-only; the durable record keeps
            // failures and the final summary.
            display::tool_result(content, false);
        }
    }

    fn apply_result(
        &mut self,
        cost: Option<f64>,
        duration_ms: Option<u64>,
        tokens_in: Option<u64>,
        tokens_out: Option<u64>,
    ) {
        self.state.stats.record(cost, duration_ms, tokens_in, tokens_out);
        display::stats_line(cost, duration_ms, tokens_in, tokens_out);
        self.activity.push(ActivityEntry::Stats {
            iter: self.iteration,
            cost,
            duration_ms,
            tokens_in,
            tokens_out,
        });
    }
}
