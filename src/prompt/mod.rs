//! Prompt file loading.
//!
//! A missing prompt file is a startup-time fatal condition, caught before
//! any iteration runs and reported with a remediation hint.

use std::fs;
use std::path::Path;

use crate::error::{RalphrError, Result};

/// Default prompt file looked up in the working directory.
pub const DEFAULT_PROMPT_FILE: &str = "PROMPT.md";

/// Read the prompt text from `path`.
pub fn load(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RalphrError::Prompt(format!(
            "prompt file '{}' not found. Create it from the example: cp PROMPT.md.example {}",
            path.display(),
            path.display()
        )));
    }
    fs::read_to_string(path).map_err(|e| {
        RalphrError::Prompt(format!("failed to read '{}': {}", path.display(), e))
    })
}
