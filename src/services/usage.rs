//! Token and latency accounting.
//!
//! Token counts are estimates (four characters per token); they exist to
//! give operators a sense of prompt size, not to bill anyone.

use std::time::Duration;

/// Estimates the token count of `text` at four characters per token.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Estimated token usage of one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// System prompt.
    pub system: usize,
    /// Retrieved memory context.
    pub context: usize,
    /// Session transcript including the current message.
    pub history: usize,
    /// The current user message.
    pub prompt: usize,
    /// The reply.
    pub output: usize,
}

impl TokenUsage {
    /// Estimates the input side of a turn.
    #[must_use]
    pub fn estimate(system: &str, context: &str, history: &str, prompt: &str) -> Self {
        Self {
            system: estimate_tokens(system),
            context: estimate_tokens(context),
            history: estimate_tokens(history),
            prompt: estimate_tokens(prompt),
            output: 0,
        }
    }

    /// Sets the output estimate from the reply text.
    #[must_use]
    pub fn with_output(mut self, reply: &str) -> Self {
        self.output = estimate_tokens(reply);
        self
    }

    /// Total input tokens.
    #[must_use]
    pub const fn input_total(&self) -> usize {
        self.system + self.context + self.history + self.prompt
    }
}

/// Per-session usage counters.
#[derive(Debug, Clone, Default)]
pub struct UsageStats {
    retrieval_ms: Vec<f64>,
    turns: usize,
    input_tokens: usize,
    output_tokens: usize,
}

impl UsageStats {
    /// Creates empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one retrieval latency.
    pub fn record_retrieval(&mut self, elapsed: Duration) {
        self.retrieval_ms.push(elapsed.as_secs_f64() * 1000.0);
    }

    /// Records a completed turn.
    pub const fn record_turn(&mut self, usage: &TokenUsage) {
        self.turns += 1;
        self.input_tokens += usage.input_total();
        self.output_tokens += usage.output;
    }

    /// Number of recorded retrievals.
    #[must_use]
    pub fn retrievals(&self) -> usize {
        self.retrieval_ms.len()
    }

    /// Most recent retrieval latency in milliseconds.
    #[must_use]
    pub fn last_retrieval_ms(&self) -> Option<f64> {
        self.retrieval_ms.last().copied()
    }

    /// 95th percentile retrieval latency in milliseconds.
    #[must_use]
    pub fn p95_retrieval_ms(&self) -> Option<f64> {
        percentile_95(&self.retrieval_ms)
    }

    /// Completed turns.
    #[must_use]
    pub const fn turns(&self) -> usize {
        self.turns
    }

    /// Estimated input tokens across all turns.
    #[must_use]
    pub const fn input_tokens(&self) -> usize {
        self.input_tokens
    }

    /// Estimated output tokens across all turns.
    #[must_use]
    pub const fn output_tokens(&self) -> usize {
        self.output_tokens
    }
}

/// Nearest-rank 95th percentile: index `floor(0.95 * n)` of the sorted
/// values, clamped to the last element.
#[must_use]
pub fn percentile_95(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = (sorted.len() * 95 / 100).min(sorted.len() - 1);
    Some(sorted[index])
}
