//! Stream event vocabulary and classification.
//!
//! The agent CLI emits newline-delimited JSON records in its stream-json
//! output mode. This module turns one raw line into zero or more typed
//! [`StreamEvent`]s; the reducer consumes them in stream order.

pub mod classifier;

pub use classifier::classify_line;

use serde_json::Value;

/// One classified event from the agent's output stream.
///
/// Immutable once constructed. A single input line may yield several events
/// (an `assistant` payload carries a list of content blocks) or none (an
/// unrecognized record type).
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Session-level record, e.g. the init record listing available tools.
    System { subtype: String, tool_count: usize },
    /// A text block from the assistant.
    AssistantText { text: String },
    /// A tool invocation block from the assistant.
    ToolUse { id: String, name: String, input: Value },
    /// A tool result block echoed back on the user channel.
    ToolResult {
        id: String,
        content: String,
        is_error: bool,
    },
    /// A top-level error record.
    Error { message: String },
    /// End-of-turn usage record. Fields are individually optional; an
    /// iteration may carry several of these and they are all summed.
    Result {
        cost: Option<f64>,
        duration_ms: Option<u64>,
        tokens_in: Option<u64>,
        tokens_out: Option<u64>,
    },
    /// A line that is not JSON at all; passed through for display only.
    Raw { text: String },
}
