//! Usage statistics accumulated from the agent's `result` events.
//!
//! The same value type serves two lifetimes: per-iteration running sums
//! (reset with each fresh iteration) and the run-wide totals folded together
//! by the loop runner.

use serde::{Deserialize, Serialize};

/// Cost, latency, and token totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Total cost in USD
    pub cost: f64,
    /// Total wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Total input tokens
    pub tokens_in: u64,
    /// Total output tokens
    pub tokens_out: u64,
}

impl UsageStats {
    /// Add one `result` event's values. Absent fields contribute nothing.
    pub fn record(
        &mut self,
        cost: Option<f64>,
        duration_ms: Option<u64>,
        tokens_in: Option<u64>,
        tokens_out: Option<u64>,
    ) {
        if let Some(cost) = cost {
            self.cost += cost;
        }
        if let Some(duration) = duration_ms {
            self.duration_ms += duration;
        }
        if let Some(tokens) = tokens_in {
            self.tokens_in += tokens;
        }
        if let Some(tokens) = tokens_out {
            self.tokens_out += tokens;
        }
    }

    /// Fold another stats block into this one.
    pub fn absorb(&mut self, other: &UsageStats) {
        self.cost += other.cost;
        self.duration_ms += other.duration_ms;
        self.tokens_in += other.tokens_in;
        self.tokens_out += other.tokens_out;
    }

    /// True when no field has accumulated anything.
    pub fn is_empty(&self) -> bool {
        self.cost == 0.0 && self.duration_ms == 0 && self.tokens_in == 0 && self.tokens_out == 0
    }
}
