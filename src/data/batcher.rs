// ============================================================
// Layer 4: Skip-Gram Batcher
// ============================================================
// Implements Burn's Batcher trait to convert sampled skip-gram
// pairs into backend tensors.
//
//   Input:  N SkipGramPairs
//   Output: inputs [N] and labels [N, 1]
//
// Token ids have already been checked against the vocabulary by
// the trainer, so the i32 conversion cannot truncate.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::sampler::{Batch, SkipGramPair};

/// A skip-gram batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct SkipGramBatch<B: Backend> {
    /// Center token ids: [batch_size]
    pub inputs: Tensor<B, 1, Int>,

    /// Context token ids: [batch_size, 1]
    pub labels: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct SkipGramBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SkipGramBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Convenience for the training loop, which works on whole batches.
    pub fn from_batch(&self, batch: &Batch) -> SkipGramBatch<B> {
        self.batch(batch.pairs().collect())
    }
}

impl<B: Backend> Batcher<SkipGramPair, SkipGramBatch<B>> for SkipGramBatcher<B> {
    fn batch(&self, items: Vec<SkipGramPair>) -> SkipGramBatch<B> {
        let batch_size = items.len();

        let inputs: Vec<i32> = items.iter().map(|p| p.input as i32).collect();
        let labels: Vec<i32> = items.iter().map(|p| p.label as i32).collect();

        let inputs = Tensor::<B, 1, Int>::from_ints(inputs.as_slice(), &self.device);
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        SkipGramBatch { inputs, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes() {
        let batcher = SkipGramBatcher::<TestBackend>::new(Default::default());
        let items = vec![
            SkipGramPair { input: 1, label: 0 },
            SkipGramPair { input: 1, label: 2 },
            SkipGramPair { input: 2, label: 1 },
            SkipGramPair { input: 2, label: 3 },
        ];
        let batch = batcher.batch(items);

        assert_eq!(batch.inputs.dims(), [4]);
        assert_eq!(batch.labels.dims(), [4, 1]);

        let labels: Vec<i64> = batch.labels.into_data().iter::<i64>().collect();
        assert_eq!(labels, vec![0, 2, 1, 3]);
    }
}
