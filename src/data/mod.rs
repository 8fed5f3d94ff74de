// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything between files on disk and tensors / feature rows.
//
// Embedding side:
//
//   token files
//       │
//       ▼
//   TokenFileLoader       → one TokenStream per file
//       │
//       ▼
//   SkipGramBatchSampler  → ContextWindowBuffer walks the stream
//       │
//       ▼
//   BatchQualityGate      → rejects degenerate batches
//       │
//       ▼
//   SkipGramBatcher       → inputs [N], labels [N, 1]
//
// Classifier side:
//
//   feature shard files
//       │
//       ▼
//   ShardFileLoader       → one FeatureShard per file
//       │
//       ▼
//   ClassStartScanner     → first dual-class shard (bootstrap)

/// Token-stream and feature-shard file readers
pub mod loader;

/// Fixed-size ring buffer over one token stream
pub mod context_window;

/// Skip-gram (center, context) pair sampling
pub mod sampler;

/// Degenerate-batch rejection
pub mod quality_gate;

/// Burn Batcher: pairs → tensors
pub mod batcher;

/// First positive shard lookup and bootstrap ordering
pub mod class_scanner;
