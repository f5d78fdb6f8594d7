//! Token-based cost estimation.

use crate::config::BudgetConfig;

/// Linear price model over whitespace-separated word counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimator {
    tokens_per_word: f64,
    input_price_per_million: f64,
    output_price_per_million: f64,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::from_config(&BudgetConfig::default())
    }
}

impl CostEstimator {
    /// Creates an estimator from budget settings.
    pub fn from_config(config: &BudgetConfig) -> Self {
        Self {
            tokens_per_word: config.tokens_per_word,
            input_price_per_million: config.input_price_per_million,
            output_price_per_million: config.output_price_per_million,
        }
    }

    /// Approximate token count of `text`.
    pub fn tokens(&self, text: &str) -> f64 {
        text.split_whitespace().count() as f64 * self.tokens_per_word
    }

    /// Estimated price of one completion.
    pub fn estimate(&self, prompt: &str, response: &str) -> f64 {
        let input = self.tokens(prompt) / 1_000_000.0 * self.input_price_per_million;
        let output = self.tokens(response) / 1_000_000.0 * self.output_price_per_million;
        input + output
    }
}

/// Rounds `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
