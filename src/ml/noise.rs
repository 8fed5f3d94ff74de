// ============================================================
// Layer 5: Negative (Noise) Class Sampler
// ============================================================
// Draws the classes a true context token is contrasted against.
//
// Token ids from the external dictionary are assigned by
// descending frequency, so a log-uniform (Zipfian) distribution
// over ids approximates the unigram distribution:
//
//   P(c) = (ln(c + 2) - ln(c + 1)) / ln(V + 1)
//
// The sampled loss subtracts ln(expected count) = ln(k * P(c)) from
// every logit, which turns the sigmoid losses into a proper
// noise-contrastive estimate rather than plain negative sampling.
//
// Reference: Gutmann & Hyvärinen (2010) Noise-contrastive estimation
//            Jean et al. (2015) On Using Very Large Target Vocabulary

use burn::prelude::*;
use rand::Rng;

use crate::domain::token_stream::TokenId;

/// Noise ids for one training step plus the log-Q corrections the
/// loss needs.
#[derive(Debug, Clone)]
pub struct NoiseSample<B: Backend> {
    /// Sampled class ids: [num_negative]
    pub ids: Tensor<B, 1, Int>,

    /// ln(expected count) of each sampled id: [num_negative]
    pub sampled_log_q: Tensor<B, 1>,

    /// ln(expected count) of each true label: [batch_size]
    pub true_log_q: Tensor<B, 1>,
}

#[derive(Debug, Clone, Copy)]
pub struct LogUniformSampler {
    range_max: usize,
    log_range: f64,
}

impl LogUniformSampler {
    /// # Panics
    /// Panics if `range_max` is zero.
    pub fn new(range_max: usize) -> Self {
        assert!(range_max > 0, "noise sampler needs a non-empty vocabulary");
        Self { range_max, log_range: ((range_max + 1) as f64).ln() }
    }

    pub fn probability(&self, id: TokenId) -> f64 {
        let c = id as f64;
        ((c + 2.0).ln() - (c + 1.0).ln()) / self.log_range
    }

    pub fn draw_ids<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<TokenId> {
        (0..count)
            .map(|_| {
                let u: f64 = rng.gen();
                let id = ((u * self.log_range).exp() as usize).saturating_sub(1);
                id.min(self.range_max - 1) as TokenId
            })
            .collect()
    }

    pub fn log_expected_count(&self, id: TokenId, num_sampled: usize) -> f32 {
        (num_sampled as f64 * self.probability(id)).ln() as f32
    }

    /// Draw `num_sampled` noise ids and build the tensors for one step.
    pub fn sample<B: Backend, R: Rng + ?Sized>(
        &self,
        num_sampled: usize,
        true_labels: &[TokenId],
        rng:         &mut R,
        device:      &B::Device,
    ) -> NoiseSample<B> {
        let ids = self.draw_ids(num_sampled, rng);

        let sampled_log_q: Vec<f32> = ids
            .iter()
            .map(|&id| self.log_expected_count(id, num_sampled))
            .collect();
        let true_log_q: Vec<f32> = true_labels
            .iter()
            .map(|&id| self.log_expected_count(id, num_sampled))
            .collect();
        let ids: Vec<i32> = ids.into_iter().map(|id| id as i32).collect();

        NoiseSample {
            ids:           Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device),
            sampled_log_q: Tensor::<B, 1>::from_floats(sampled_log_q.as_slice(), device),
            true_log_q:    Tensor::<B, 1>::from_floats(true_log_q.as_slice(), device),
        }
    }
}
