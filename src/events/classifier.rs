//! Stateless decoding of one stream line into typed events.
//!
//! The agent may interleave plain diagnostic text with its JSON stream, so
//! an undecodable line is not an error: it degrades to a `Raw` passthrough.
//! Unrecognized record types are dropped silently, so the agent's event
//! vocabulary can grow without breaking this consumer.

use serde_json::Value;

use super::StreamEvent;

/// Classify one raw line of agent output.
///
/// Returns zero events for blank lines and unrecognized record types, one
/// `Raw` event for non-JSON lines, and one event per recognized content
/// block otherwise.
pub fn classify_line(line: &str) -> Vec<StreamEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let data: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => {
            return vec![StreamEvent::Raw {
                text: trimmed.to_string(),
            }];
        }
    };

    match data.get("type").and_then(Value::as_str).unwrap_or("") {
        "system" => classify_system(&data),
        "assistant" => classify_assistant(&data),
        "user" => classify_user(&data),
        "result" => classify_result(&data),
        "error" => classify_error(&data),
        _ => Vec::new(),
    }
}

fn classify_system(data: &Value) -> Vec<StreamEvent> {
    let subtype = data
        .get("subtype")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let tool_count = data
        .get("tools")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    vec![StreamEvent::System { subtype, tool_count }]
}

fn classify_assistant(data: &Value) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for block in content_blocks(data) {
        match block.get("type").and_then(Value::as_str).unwrap_or("") {
            "text" => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or("");
                if !text.is_empty() {
                    events.push(StreamEvent::AssistantText {
                        text: text.to_string(),
                    });
                }
            }
            "tool_use" => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or("");
                if !id.is_empty() {
                    events.push(StreamEvent::ToolUse {
                        id: id.to_string(),
                        name: block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string(),
                        input: block.get("input").cloned().unwrap_or(Value::Null),
                    });
                }
            }
            _ => {}
        }
    }
    events
}

fn classify_user(data: &Value) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for block in content_blocks(data) {
        if block.get("type").and_then(Value::as_str) != Some("tool_result") {
            continue;
        }
        let id = block
            .get("tool_use_id")
            .and_then(Value::as_str)
            .unwrap_or("");
        if id.is_empty() {
            continue;
        }
        events.push(StreamEvent::ToolResult {
            id: id.to_string(),
            content: result_content(block.get("content")),
            is_error: block
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        });
    }
    events
}

fn classify_result(data: &Value) -> Vec<StreamEvent> {
    vec![StreamEvent::Result {
        cost: data.get("cost_usd").and_then(Value::as_f64),
        duration_ms: data.get("duration_ms").and_then(Value::as_u64),
        tokens_in: data.get("total_input_tokens").and_then(Value::as_u64),
        tokens_out: data.get("total_output_tokens").and_then(Value::as_u64),
    }]
}

fn classify_error(data: &Value) -> Vec<StreamEvent> {
    let message = match data.get("error") {
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    vec![StreamEvent::Error { message }]
}

/// Nested content blocks of an `assistant`/`user` record.
fn content_blocks(data: &Value) -> impl Iterator<Item = &Value> {
    data.get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
}

/// A tool result's content is either a plain string or a list of text
/// blocks; both flatten to one string.
fn result_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
