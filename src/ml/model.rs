// ============================================================
// Layer 5: Skip-Gram Model
// ============================================================
// Input embeddings plus the output (context) weights and biases the
// NCE loss scores true and noise classes against. Only the input
// embeddings are exported once training ends.

use burn::{
    module::Param,
    prelude::*,
    tensor::{activation::log_sigmoid, Distribution},
};

use crate::ml::noise::NoiseSample;

#[derive(Config, Debug)]
pub struct SkipGramConfig {
    pub vocab_size:     usize,
    pub embedding_size: usize,
}

impl SkipGramConfig {
    /// Fresh parameters:
    ///   embeddings      ~ U(-1, 1)
    ///   context weights ~ N(0, 1/sqrt(d)) truncated at two std devs
    ///   context biases  = 0
    pub fn init<B: Backend>(&self, device: &B::Device) -> SkipGramModel<B> {
        let shape = [self.vocab_size, self.embedding_size];
        let std   = 1.0 / (self.embedding_size as f64).sqrt();

        let embeddings = Tensor::random(shape, Distribution::Uniform(-1.0, 1.0), device);
        let context_weights = truncated_normal(shape, std, device);
        let context_biases = Tensor::zeros([self.vocab_size], device);

        SkipGramModel {
            embeddings:      Param::from_tensor(embeddings),
            context_weights: Param::from_tensor(context_weights),
            context_biases:  Param::from_tensor(context_biases),
        }
    }
}

/// N(0, std) with every value beyond two std devs redrawn until none remain.
fn truncated_normal<B: Backend>(shape: [usize; 2], std: f64, device: &B::Device) -> Tensor<B, 2> {
    let bound = 2.0 * std;
    let mut values: Tensor<B, 2> = Tensor::random(shape, Distribution::Normal(0.0, std), device);
    loop {
        let outside = values.clone().abs().greater_elem(bound);
        if outside.clone().int().sum().into_scalar().elem::<i64>() == 0 {
            return values;
        }
        let redraw = Tensor::random(shape, Distribution::Normal(0.0, std), device);
        values = values.mask_where(outside, redraw);
    }
}

#[derive(Module, Debug)]
pub struct SkipGramModel<B: Backend> {
    /// [vocab_size, embedding_size], the artifact everything else consumes
    pub embeddings:      Param<Tensor<B, 2>>,
    /// [vocab_size, embedding_size], context-prediction output weights
    pub context_weights: Param<Tensor<B, 2>>,
    /// [vocab_size]
    pub context_biases:  Param<Tensor<B, 1>>,
}

impl<B: Backend> SkipGramModel<B> {
    pub fn shape(&self) -> [usize; 2] {
        self.embeddings.val().dims()
    }

    /// Mean sampled noise-contrastive loss over the batch.
    ///
    /// inputs: [batch], labels: [batch, 1]
    ///
    /// Per example: -ln σ(s_true) - Σ_k ln σ(-s_k), where every logit s
    /// is w·e + b - ln(expected count).
    pub fn nce_loss(
        &self,
        inputs: Tensor<B, 1, Int>,
        labels: Tensor<B, 2, Int>,
        noise:  NoiseSample<B>,
    ) -> Tensor<B, 1> {
        let [batch_size, _] = labels.dims();
        let [num_sampled]   = noise.ids.dims();
        let labels = labels.reshape([batch_size]);

        let embed = self.embeddings.val().select(0, inputs); // [batch, d]

        // True context logits: [batch]
        let true_w = self.context_weights.val().select(0, labels.clone());
        let true_b = self.context_biases.val().select(0, labels);
        let true_logits = (embed.clone() * true_w).sum_dim(1).reshape([batch_size])
            + true_b
            - noise.true_log_q;

        // Shared noise logits: [batch, num_sampled]
        let noise_w = self.context_weights.val().select(0, noise.ids.clone());
        let noise_b = self.context_biases.val().select(0, noise.ids);
        let noise_logits = embed.matmul(noise_w.transpose())
            + (noise_b - noise.sampled_log_q).reshape([1, num_sampled]);

        let true_term  = log_sigmoid(true_logits).neg();
        let noise_term = log_sigmoid(noise_logits.neg())
            .sum_dim(1)
            .reshape([batch_size])
            .neg();

        (true_term + noise_term).mean()
    }
}
