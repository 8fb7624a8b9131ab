//! Ordered, fallback-chained recovery of source and test code from
//! unstructured model output.
//!
//! The chain is a closed, order-sensitive set of strategies, tried
//! strictest-first. [`Extractor::extract`] never fails outward: when every
//! strategy rejects the text, an emergency fallback recovers whatever
//! fenced content exists, and failing that the raw response itself. The
//! caller decides whether an empty main-code result is fatal.

pub mod strategies;

use tracing::debug;

use crate::language::LanguageProfile;
use strategies::{
    DeclKeywordSplit, FencedBlockPair, SingleBlockFallback, Strategy, StrategyError,
    TaggedBlockPair, TestMarkerSplit, fenced_blocks,
};

/// The outcome of one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub main_code: String,
    pub test_code: String,
    /// Name of the strategy that produced this result.
    pub strategy: &'static str,
}

/// Walks the fixed strategy chain and degrades to emergency recovery.
pub struct Extractor {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// The strategy order is part of the contract: strictest first, so a
    /// well-formatted response never falls through to a lossy heuristic.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(FencedBlockPair),
                Box::new(TaggedBlockPair),
                Box::new(TestMarkerSplit),
                Box::new(DeclKeywordSplit),
                Box::new(SingleBlockFallback),
            ],
        }
    }

    /// First strategy to accept the text wins.
    fn try_strategies(
        &self,
        response: &str,
        profile: &LanguageProfile,
    ) -> Result<Extraction, StrategyError> {
        let mut last_err = StrategyError {
            strategy: "none",
            message: "no strategies configured".to_string(),
        };

        for strategy in &self.strategies {
            match strategy.extract(response, profile) {
                Ok((main_code, test_code)) => {
                    return Ok(Extraction {
                        main_code,
                        test_code,
                        strategy: strategy.name(),
                    });
                }
                Err(err) => {
                    debug!(strategy = strategy.name(), %err, "strategy rejected response");
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    /// Extract code from a model response, degrading through fallbacks
    /// rather than failing.
    pub fn extract(&self, response: &str, profile: &LanguageProfile) -> Extraction {
        match self.try_strategies(response, profile) {
            Ok(extraction) => extraction,
            Err(err) => {
                debug!(%err, "all strategies failed, using emergency recovery");
                self.emergency_fallback(response)
            }
        }
    }

    /// Outside the chain: any fenced content, else the raw trimmed text.
    fn emergency_fallback(&self, response: &str) -> Extraction {
        let blocks = fenced_blocks(response);
        if let Some(first) = blocks.first() {
            return Extraction {
                main_code: first.clone(),
                test_code: blocks.get(1).cloned().unwrap_or_default(),
                strategy: "emergency_fallback",
            };
        }

        Extraction {
            main_code: response.trim().to_string(),
            test_code: String::new(),
            strategy: "raw_response",
        }
    }
}
