// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Everything that touches disk on behalf of the trainers:
//
//   checkpoint.rs        single-slot embedding checkpoints
//                        (Burn records + checkpoint.json)
//   embedding_store.rs   embeddings.safetensors export
//   classifier_store.rs  classifier JSON artifact
//   metrics.rs           loss.csv / evaluation.csv logging
//
// Reference: Burn Book §5 (Checkpointing)

/// Embedding model checkpoint slot
pub mod checkpoint;

/// Normalised embedding export
pub mod embedding_store;

/// Classifier artifact persistence
pub mod classifier_store;

/// CSV metrics logging
pub mod metrics;
