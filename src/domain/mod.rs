// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// training core works on. No burn types, no file I/O.
//
//   token_stream.rs  → TokenStream, Cursor
//   feature_shard.rs → FeatureShard, binary labels
//   embedding.rs     → EmbeddingMatrix and its normalised view
//   traits.rs        → sources and the ClassifierModel seam
//   error.rs         → TrainingError taxonomy

pub mod token_stream;

pub mod feature_shard;

pub mod embedding;

pub mod traits;

pub mod error;
