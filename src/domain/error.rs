// ============================================================
// Layer 3: Training Errors
// ============================================================
// Every failure the training core can report. The application
// layer wraps these in anyhow with file/stage context; the core
// itself never downgrades one of them to a warning.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)
//            thiserror crate documentation

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the sampler, trainers and their loaders.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Hyperparameters that make sampling or training impossible.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Missing, unreadable or shape-incompatible checkpoint.
    #[error("checkpoint error at '{path}': {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    /// No commit in the whole session contained a positive row.
    #[error("no positive (malicious) examples were found across {shards} shards")]
    NoPositiveExamples { shards: usize },

    /// The class-start scan found no dual-class shard to bootstrap from.
    #[error("no shard with a positive label exists to bootstrap the classifier")]
    BootstrapNotFound,

    #[error("cannot read feature shard '{path}': {reason}")]
    ShardRead { path: PathBuf, reason: String },

    #[error("cannot read token stream '{path}': {reason}")]
    StreamRead { path: PathBuf, reason: String },

    /// A bounded rejection loop ran out of attempts.
    #[error("sampling exhausted after {attempts} attempts: {what}")]
    SamplingExhausted { what: &'static str, attempts: usize },

    #[error("token stream has {len} tokens but the context window needs {span}")]
    StreamTooShort { len: usize, span: usize },

    #[error("token id {token} is outside the vocabulary [0, {vocab_size})")]
    TokenOutOfRange { token: i64, vocab_size: usize },

    #[error("feature width mismatch: expected {expected}, got {actual}")]
    FeatureWidthMismatch { expected: usize, actual: usize },

    /// Classifier artifact or embedding export could not be written or read.
    #[error("artifact error at '{path}': {reason}")]
    Artifact { path: PathBuf, reason: String },
}

impl TrainingError {
    pub fn checkpoint(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Checkpoint { path: path.into(), reason: reason.to_string() }
    }

    pub fn shard_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ShardRead { path: path.into(), reason: reason.to_string() }
    }

    pub fn stream_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StreamRead { path: path.into(), reason: reason.to_string() }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Artifact { path: path.into(), reason: reason.to_string() }
    }
}
