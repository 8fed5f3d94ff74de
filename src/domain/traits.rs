// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The trainers are written against these traits rather than
// against files on disk:
//   - TokenStreamSource  → file-backed loader, or an in-memory Vec
//   - FeatureShardSource → safetensors loader, or an in-memory Vec
//   - ClassifierModel    → random forest, Gaussian naive Bayes
//
// Sources are indexed rather than iterated so the bootstrap
// schedule can feed one shard first and then the rest in their
// original order.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::TrainingError;
use crate::domain::feature_shard::{FeatureShard, Label};
use crate::domain::token_stream::TokenStream;

// ─── TokenStreamSource ────────────────────────────────────────────────────────
/// An ordered collection of token streams, loaded one at a time.
pub trait TokenStreamSource {
    fn stream_count(&self) -> usize;

    fn load_stream(&self, index: usize) -> Result<TokenStream, TrainingError>;
}

impl TokenStreamSource for Vec<TokenStream> {
    fn stream_count(&self) -> usize {
        self.len()
    }

    fn load_stream(&self, index: usize) -> Result<TokenStream, TrainingError> {
        self.get(index)
            .cloned()
            .ok_or_else(|| TrainingError::stream_read(format!("#{index}"), "index out of range"))
    }
}

// ─── FeatureShardSource ───────────────────────────────────────────────────────
/// An ordered collection of labelled feature shards.
pub trait FeatureShardSource {
    fn shard_count(&self) -> usize;

    fn load_shard(&self, index: usize) -> Result<FeatureShard, TrainingError>;

    /// Labels only. File-backed sources can skip decoding the vectors.
    fn load_labels(&self, index: usize) -> Result<Vec<Label>, TrainingError> {
        Ok(self.load_shard(index)?.labels().to_vec())
    }
}

impl FeatureShardSource for Vec<FeatureShard> {
    fn shard_count(&self) -> usize {
        self.len()
    }

    fn load_shard(&self, index: usize) -> Result<FeatureShard, TrainingError> {
        self.get(index)
            .cloned()
            .ok_or_else(|| TrainingError::shard_read(format!("#{index}"), "index out of range"))
    }
}

// ─── ClassifierModel ──────────────────────────────────────────────────────────
/// How a model absorbs a new batch of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
    /// Add capacity, then fit only the new capacity on the batch.
    GrowEnsemble,
    /// Blend the batch's sufficient statistics into existing state.
    PartialFit,
}

/// An incrementally trainable binary classifier.
///
/// `rows` is row-major with `width` values per label.
pub trait ClassifierModel {
    fn name(&self) -> &'static str;

    fn update_rule(&self) -> UpdateRule;

    /// Current capacity (number of ensemble members, or 1 for
    /// statistics-based models once fitted).
    fn capacity(&self) -> usize;

    /// Ensemble-growth models only; statistics models ignore it.
    fn add_capacity(&mut self, _additional: usize) {}

    /// Fit the model's untrained capacity (ensemble) or reset and fit
    /// from scratch (statistics) on one batch.
    fn fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError>;

    /// Blend one more batch into the existing state.
    fn partial_fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError>;

    /// Probability that `row` is malicious.
    fn predict_proba(&self, row: &[f32]) -> f64;

    fn predict(&self, row: &[f32]) -> Label {
        Label::from(self.predict_proba(row) >= 0.5)
    }
}
