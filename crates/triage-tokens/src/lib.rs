//! Token estimation and usage accounting

pub mod usage;

pub use usage::{Pricing, TokenUsage, UsageMeter};

use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Local token estimator (cl100k_base encoding).
///
/// Gemini tokenises differently, so this is only a fallback for when the
/// count-tokens endpoint is unreachable; expect it to be off by a few percent.
#[derive(Clone)]
pub struct TokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TokenEstimator {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            bpe: Arc::new(tiktoken_rs::cl100k_base()?),
        })
    }

    /// Estimate token count for a single string
    pub fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_estimation() {
        let estimator = TokenEstimator::new().unwrap();

        let count = estimator.estimate("Printer on floor 3 is jammed again");
        assert!(count > 0 && count < 20);

        assert_eq!(estimator.estimate(""), 0);
    }
}
