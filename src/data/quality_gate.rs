// ============================================================
// Layer 4: Batch Quality Gate
// ============================================================
// Rejects degenerate batches where a single input token fills half
// or more of the slots. Packet captures contain long runs of the
// same token (keep-alives, padding) that would otherwise dominate
// whole training steps.

use std::collections::HashMap;

use crate::domain::token_stream::TokenId;

pub const DEFAULT_MAX_DOMINANT_SHARE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchQualityGate {
    /// A batch is rejected when its most frequent token's share of
    /// the batch is at or above this value.
    max_dominant_share: f64,
}

impl Default for BatchQualityGate {
    fn default() -> Self {
        Self { max_dominant_share: DEFAULT_MAX_DOMINANT_SHARE }
    }
}

impl BatchQualityGate {
    pub fn new(max_dominant_share: f64) -> Self {
        Self { max_dominant_share }
    }

    pub fn max_dominant_share(&self) -> f64 {
        self.max_dominant_share
    }

    /// Share of the batch taken by its most frequent token.
    pub fn dominant_share(inputs: &[TokenId]) -> f64 {
        if inputs.is_empty() {
            return 1.0;
        }
        let mut counts: HashMap<TokenId, usize> = HashMap::new();
        for &t in inputs {
            *counts.entry(t).or_insert(0) += 1;
        }
        let top = counts.values().copied().max().unwrap_or(0);
        top as f64 / inputs.len() as f64
    }

    /// An empty batch carries no information and is rejected.
    pub fn accepts(&self, inputs: &[TokenId]) -> bool {
        !inputs.is_empty() && Self::dominant_share(inputs) < self.max_dominant_share
    }
}
