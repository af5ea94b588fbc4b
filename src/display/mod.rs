//! Console rendering for the loop runner.
//!
//! All operator-facing output goes through here: the startup banner,
//! per-iteration headers and footers, streamed assistant text, tool call
//! and result previews, statistics lines, and the end-of-run summary box.
//! Log records go to the log file, never to the console.

use chrono::Local;
use colored::*;
use serde_json::Value;

use crate::stats::UsageStats;

/// Command previews longer than this are cut with an ellipsis.
pub const COMMAND_PREVIEW_MAX: usize = 80;
/// Tool result lines and error previews longer than this are cut.
pub const RESULT_PREVIEW_MAX: usize = 100;
/// Multi-line tool results show at most this many lines.
pub const RESULT_MAX_LINES: usize = 10;

/// A short, input-shape-dependent preview of a tool invocation.
///
/// First matching field wins: command, then file path, then search pattern,
/// then URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPreview {
    Command(String),
    File(String),
    Pattern(String),
    Url(String),
}

impl ToolPreview {
    /// Derive a preview from a tool's input object, if any field matches.
    pub fn from_input(input: &Value) -> Option<ToolPreview> {
        let field = |name: &str| {
            input
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        if let Some(command) = field("command") {
            return Some(ToolPreview::Command(truncate(&command, COMMAND_PREVIEW_MAX)));
        }
        if let Some(path) = field("file_path").or_else(|| field("path")) {
            return Some(ToolPreview::File(path));
        }
        if let Some(pattern) = field("pattern") {
            return Some(ToolPreview::Pattern(pattern));
        }
        field("url").map(ToolPreview::Url)
    }

    /// The preview text without any glyph, as recorded in the activity log.
    pub fn label(&self) -> &str {
        match self {
            ToolPreview::Command(text)
            | ToolPreview::File(text)
            | ToolPreview::Pattern(text)
            | ToolPreview::Url(text) => text,
        }
    }

    fn glyph(&self) -> &'static str {
        match self {
            ToolPreview::Command(_) => "$",
            ToolPreview::File(_) => "📄",
            ToolPreview::Pattern(_) => "🔍",
            ToolPreview::Url(_) => "🌐",
        }
    }
}

/// Truncate to `max` characters, ellipsis included in the count.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Group a number's digits with commas: 1234567 -> "1,234,567".
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn banner(iterations: u32, prompt_file: &str) {
    let started = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    println!();
    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════╗"
            .blue()
            .bold()
    );
    println!(
        "{}",
        "║           🤖 Ralph Loop Runner                           ║"
            .blue()
            .bold()
    );
    println!(
        "{}",
        "╠══════════════════════════════════════════════════════════╣"
            .blue()
            .bold()
    );
    println!("{}", format!("║  Iterations: {:<44}║", iterations).blue());
    println!("{}", format!("║  Prompt:     {:<44}║", prompt_file).blue());
    println!("{}", format!("║  Started:    {:<44}║", started).blue());
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════╝"
            .blue()
            .bold()
    );
}

pub fn iteration_header(iteration: u32, total: u32) {
    let timestamp = Local::now().format("%H:%M:%S").to_string();
    let line = "═".repeat(60);
    println!();
    println!("{}", line.cyan());
    println!(
        "{}",
        format!("║{:^58}║", format!(" Iteration {}/{} ", iteration, total))
            .cyan()
            .bold()
    );
    println!(
        "{}",
        format!("║{:^58}║", format!("Started at {}", timestamp)).cyan()
    );
    println!("{}", line.cyan());
    println!();
}

pub fn iteration_footer(iteration: u32, success: bool) {
    let timestamp = Local::now().format("%H:%M:%S").to_string();
    let status = if success { "✓ Completed" } else { "✗ Failed" };
    let line = format!(
        "── End of iteration {} at {} {} ──",
        iteration, timestamp, status
    );
    println!();
    if success {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.red().bold());
    }
    println!();
}

pub fn assistant_text(text: &str) {
    for line in text.lines() {
        if line.trim().is_empty() {
            println!();
        } else {
            println!("  {}", line.white());
        }
    }
}

pub fn tool_call(name: &str, preview: Option<&ToolPreview>) {
    println!();
    println!("  {}", format!("🔧 {}", name).yellow().bold());
    if let Some(preview) = preview {
        println!(
            "{}",
            format!("     {} {}", preview.glyph(), preview.label()).dimmed()
        );
    }
}

/// Render a tool result: at most [`RESULT_MAX_LINES`] lines, each cut at
/// [`RESULT_PREVIEW_MAX`] characters, with a "+N more" trailer beyond that.
pub fn tool_result(content: &str, is_error: bool) {
    if is_error {
        println!("{}", "     ❌ Error:".red());
    }
    let lines: Vec<&str> = content.lines().collect();
    for line in lines.iter().take(RESULT_MAX_LINES) {
        let preview = truncate(line, RESULT_PREVIEW_MAX);
        if is_error {
            println!("{}", format!("     {}", preview).red());
        } else {
            println!("{}", format!("     {}", preview).dimmed());
        }
    }
    if lines.len() > RESULT_MAX_LINES {
        println!(
            "{}",
            format!("     ... (+{} more lines)", lines.len() - RESULT_MAX_LINES).dimmed()
        );
    }
}

pub fn error_line(message: &str) {
    println!();
    println!("{}", format!("  ❌ Error: {}", message).red().bold());
}

pub fn system_init(tool_count: usize) {
    println!(
        "{}",
        format!("  📋 Session started with {} tools", tool_count).cyan()
    );
}

pub fn raw_line(text: &str) {
    println!("{}", format!("  {}", text).dimmed());
}

/// One magenta statistics line for a `result` event. Absent fields are
/// simply omitted; nothing prints when every field is absent.
pub fn stats_line(
    cost: Option<f64>,
    duration_ms: Option<u64>,
    tokens_in: Option<u64>,
    tokens_out: Option<u64>,
) {
    let mut parts = Vec::new();
    if let Some(cost) = cost {
        parts.push(format!("💰 ${:.4}", cost));
    }
    if let Some(duration) = duration_ms {
        parts.push(format!("⏱️  {:.1}s", duration as f64 / 1000.0));
    }
    if let (Some(tokens_in), Some(tokens_out)) = (tokens_in, tokens_out) {
        parts.push(format!("📊 {}→{} tokens", tokens_in, tokens_out));
    }
    if !parts.is_empty() {
        println!();
        println!("{}", format!("  {}", parts.join(" | ")).magenta());
    }
}

pub fn early_complete_notice() {
    println!();
    println!(
        "{}",
        "🎉 Completion marker detected! All tasks done."
            .green()
            .bold()
    );
}

pub fn interrupted_notice() {
    println!();
    println!("{}", "⚠️  Stopping after interrupt...".yellow().bold());
}

pub fn summary(completed: u32, failed: u32, early_complete: bool, totals: &UsageStats) {
    let finished = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    println!();
    println!(
        "{}",
        "╔══════════════════════════════════════════════════════════╗"
            .blue()
            .bold()
    );
    println!(
        "{}",
        "║                    📊 Summary                            ║"
            .blue()
            .bold()
    );
    println!(
        "{}",
        "╠══════════════════════════════════════════════════════════╣"
            .blue()
            .bold()
    );
    println!(
        "{}",
        format!("║  Total iterations:  {:<37}║", completed + failed).blue()
    );

    let completed_line = format!("║  Completed:         {:<37}║", format!("{} ✓", completed));
    if completed > 0 {
        println!("{}", completed_line.green());
    } else {
        println!("{}", completed_line.blue());
    }

    let failed_line = format!("║  Failed:            {:<37}║", format!("{} ✗", failed));
    if failed > 0 {
        println!("{}", failed_line.red());
    } else {
        println!("{}", failed_line.blue());
    }

    if early_complete {
        println!(
            "{}",
            format!("║  Status:            {:<37}║", "🎉 Early complete!").green()
        );
    }

    if totals.cost > 0.0 {
        println!(
            "{}",
            format!("║  Total cost:        {:<37}║", format!("${:.4}", totals.cost)).magenta()
        );
    }
    if totals.duration_ms > 0 {
        let minutes = totals.duration_ms as f64 / 1000.0 / 60.0;
        println!(
            "{}",
            format!(
                "║  Total duration:    {:<37}║",
                format!("{:.1} minutes", minutes)
            )
            .magenta()
        );
    }
    if totals.tokens_in > 0 || totals.tokens_out > 0 {
        println!(
            "{}",
            format!(
                "║  Total tokens:      {:<37}║",
                format!(
                    "{} in / {} out",
                    thousands(totals.tokens_in),
                    thousands(totals.tokens_out)
                )
            )
            .magenta()
        );
    }

    println!("{}", format!("║  Finished at:       {:<37}║", finished).blue());
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════╝"
            .blue()
            .bold()
    );
    println!();
}
