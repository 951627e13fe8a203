//! Token usage tracking per session and model.

use std::collections::HashMap;

use crate::TokenUsage;

/// Tracks cumulative token usage, broken down by model.
#[derive(Debug, Clone, Default)]
pub struct TokenTracker {
    /// Total usage across all models.
    total: TokenUsage,
    /// Usage broken down by model id.
    by_model: HashMap<String, TokenUsage>,
    /// Number of model calls recorded.
    call_count: u64,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage from one model call.
    pub fn record(&mut self, model: &str, usage: &TokenUsage) {
        self.total.add(usage);
        self.call_count += 1;
        self.by_model.entry(model.to_string()).or_default().add(usage);
    }

    pub fn total(&self) -> &TokenUsage {
        &self.total
    }

    pub fn for_model(&self, model: &str) -> Option<&TokenUsage> {
        self.by_model.get(model)
    }

    /// Input plus output tokens.
    pub fn total_tokens(&self) -> u64 {
        self.total.total_tokens()
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn reset(&mut self) {
        self.total = TokenUsage::default();
        self.by_model.clear();
        self.call_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64, cache_read: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            cache_read_tokens: cache_read,
            cache_write_tokens: 0,
        }
    }

    #[test]
    fn records_totals_and_per_model() {
        let mut tracker = TokenTracker::new();
        tracker.record("sonnet", &usage(100, 20, 80));
        tracker.record("sonnet", &usage(50, 10, 0));
        tracker.record("haiku", &usage(5, 5, 0));

        assert_eq!(tracker.call_count(), 3);
        assert_eq!(tracker.total_tokens(), 190);
        assert_eq!(tracker.total().cache_read_tokens, 80);
        assert_eq!(tracker.for_model("sonnet").unwrap().input_tokens, 150);
        assert_eq!(tracker.for_model("haiku").unwrap().output_tokens, 5);
        assert!(tracker.for_model("opus").is_none());
    }

    #[test]
    fn reset_clears_counters() {
        let mut tracker = TokenTracker::new();
        tracker.record("sonnet", &usage(1, 1, 0));
        tracker.reset();
        assert_eq!(tracker.call_count(), 0);
        assert_eq!(tracker.total_tokens(), 0);
        assert!(tracker.for_model("sonnet").is_none());
    }
}
