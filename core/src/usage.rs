/// Token accounting and cost estimates for translation runs.
use serde::{Deserialize, Serialize};

/// Per-million-token prices plus the per-item heuristic used before a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub avg_tokens_per_item: u64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.15,
            output_per_million: 0.60,
            avg_tokens_per_item: 150,
        }
    }
}

impl Pricing {
    /// Rough pre-run estimate for `count` values. Advisory only.
    pub fn estimate(&self, count: usize) -> f64 {
        let tokens = count as f64 * self.avg_tokens_per_item as f64;
        tokens / 1_000_000.0 * self.output_per_million
    }

    /// Request count quoted next to the estimate.
    pub fn estimated_requests(&self, count: usize) -> usize {
        count.saturating_mul(2)
    }

    pub fn quote(&self, count: usize) -> CostEstimate {
        CostEstimate {
            keys: count,
            cost: self.estimate(count),
            requests: self.estimated_requests(count),
        }
    }
}

/// Figures shown when asking the user to confirm a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub keys: usize,
    pub cost: f64,
    pub requests: usize,
}

/// Token counts reported by the provider for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Exact counters for one run. Reset when a run starts and owned by its
/// worker until the run reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAccumulator {
    prompt_tokens: u64,
    completion_tokens: u64,
    requests: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub input: f64,
    pub output: f64,
    pub total: f64,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(completion_tokens);
        self.requests = self.requests.saturating_add(1);
    }

    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.record(usage.prompt_tokens, usage.completion_tokens);
    }

    pub fn prompt_tokens(&self) -> u64 {
        self.prompt_tokens
    }

    pub fn completion_tokens(&self) -> u64 {
        self.completion_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn cost(&self, pricing: &Pricing) -> CostBreakdown {
        let input = self.prompt_tokens as f64 / 1_000_000.0 * pricing.input_per_million;
        let output = self.completion_tokens as f64 / 1_000_000.0 * pricing.output_per_million;
        CostBreakdown {
            input,
            output,
            total: input + output,
        }
    }

    pub fn final_cost(&self, pricing: &Pricing) -> f64 {
        self.cost(pricing).total
    }
}
