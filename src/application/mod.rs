// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Workflow coordination only: each use case wires loaders,
// trainers and stores together for one CLI command and adds
// anyhow context to whatever the lower layers report.
//
//   embeddings  → TrainEmbeddingsUseCase
//   classifier  → TrainClassifierUseCase
//   scan        → ScanUseCase
//   evaluate    → EvaluateUseCase

// Skip-gram embedding training (create or update)
pub mod train_embeddings_use_case;

// Incremental classifier training session
pub mod train_classifier_use_case;

// Class-start shard lookup
pub mod scan_use_case;

// Held-out classifier evaluation
pub mod evaluate_use_case;

// Per-stage timing spans
pub mod stage;
