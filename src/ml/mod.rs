// ============================================================
// Layer 5: ML / Model Layer
// ============================================================
// Everything that learns.
//
//   model.rs        skip-gram embedding parameters + NCE loss (Burn)
//   noise.rs        log-uniform noise classes for the NCE loss
//   trainer.rs      per-file embedding training with checkpoints
//
//   classifier/     random forest and Gaussian naive Bayes
//   incremental.rs  shard-by-shard classifier training with
//                   buffered commits
//   evaluation.rs   confusion matrix, F1, ROC AUC, AP
//
// Burn code stays on the embedding side; the classifiers are
// plain Rust over row-major f32 slices.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Mikolov et al. (2013) word2vec

/// Skip-gram model and its sampled loss
pub mod model;

/// Log-uniform negative sampler
pub mod noise;

/// Embedding training loop (create / update)
pub mod trainer;

/// Incrementally trainable classifiers
pub mod classifier;

/// Buffered commit training over feature shards
pub mod incremental;

/// Held-out classifier metrics
pub mod evaluation;
