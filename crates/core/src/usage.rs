//! # Usage Accounting
//!
//! Token and cost accounting for one research run. The ledger is owned by the
//! run and passed by `&mut` to every service call, so concurrent runs never
//! share counters.

use serde::{Deserialize, Serialize};

/// Token counts reported by a single completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Price per token, in the provider's billing currency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_token: f64,
    pub output_per_token: f64,
}

impl Pricing {
    pub fn new(input_per_token: f64, output_per_token: f64) -> Self {
        Self {
            input_per_token,
            output_per_token,
        }
    }

    /// Known list prices for models served through DashScope
    pub fn for_model(model: &str) -> Option<Pricing> {
        match model {
            "deepseek-v3" => Some(Pricing::new(0.002 / 1000.0, 0.008 / 1000.0)),
            "deepseek-r1" => Some(Pricing::new(0.004 / 1000.0, 0.016 / 1000.0)),
            _ => None,
        }
    }

    pub fn cost_of(&self, usage: &TokenUsage) -> f64 {
        self.input_per_token * usage.prompt_tokens as f64
            + self.output_per_token * usage.completion_tokens as f64
    }
}

/// Running totals for one research run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageLedger {
    /// Completion calls made, including ones that reported no usage
    pub calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Accumulated cost; zero when no pricing is known
    pub cost: f64,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completion call
    pub fn record(&mut self, usage: Option<&TokenUsage>, pricing: Option<&Pricing>) {
        self.calls += 1;
        if let Some(usage) = usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.completion_tokens += usage.completion_tokens;
            if let Some(pricing) = pricing {
                self.cost += pricing.cost_of(usage);
            }
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_accumulates() {
        let pricing = Pricing::new(0.5, 1.0);
        let mut ledger = UsageLedger::new();
        ledger.record(
            Some(&TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 4,
            }),
            Some(&pricing),
        );
        ledger.record(None, Some(&pricing));

        assert_eq!(ledger.calls, 2);
        assert_eq!(ledger.total_tokens(), 14);
        assert!((ledger.cost - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_pricing() {
        assert!(Pricing::for_model("deepseek-v3").is_some());
        assert!(Pricing::for_model("gpt-4o").is_none());
    }

    #[test]
    fn test_ledgers_are_independent() {
        let mut first = UsageLedger::new();
        let second = UsageLedger::new();
        first.record(Some(&TokenUsage::default()), None);
        assert_eq!(first.calls, 1);
        assert_eq!(second.calls, 0);
    }
}
