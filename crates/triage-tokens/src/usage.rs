use serde::{Deserialize, Serialize};

/// Token counts reported for one model call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Price per million tokens, in dollars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    pub fn input_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.input_per_million / 1_000_000.0
    }

    pub fn output_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.output_per_million / 1_000_000.0
    }
}

/// Running totals across the calls of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMeter {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub output_tokens: u64,
}

impl UsageMeter {
    pub fn record(&mut self, usage: &TokenUsage) {
        self.calls += 1;
        self.prompt_tokens += usage.prompt_tokens;
        self.output_tokens += usage.output_tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.output_tokens
    }

    pub fn estimated_cost(&self, pricing: &Pricing) -> f64 {
        pricing.input_cost(self.prompt_tokens) + pricing.output_cost(self.output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_accumulates() {
        let mut meter = UsageMeter::default();
        meter.record(&TokenUsage {
            prompt_tokens: 1_000,
            output_tokens: 200,
            total_tokens: 1_200,
        });
        meter.record(&TokenUsage {
            prompt_tokens: 500,
            output_tokens: 300,
            total_tokens: 800,
        });

        assert_eq!(meter.calls, 2);
        assert_eq!(meter.total_tokens(), 2_000);

        let pricing = Pricing {
            input_per_million: 1.0,
            output_per_million: 10.0,
        };
        let cost = meter.estimated_cost(&pricing);
        assert!((cost - (0.0015 + 0.005)).abs() < 1e-12);
    }
}
