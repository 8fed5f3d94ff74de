// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Four subcommands:
//
//   embeddings  train (or, with --resume-from, update) the
//               skip-gram embedding
//   classifier  train a classifier incrementally over shards
//   scan        find the first shard with a malicious row
//   evaluate    score a classifier artifact on test shards
//
// Argument structs convert into application configs with From,
// so the application layer never sees clap types.

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    train_classifier_use_case::{ClassifierTrainConfig, TrainingSchedule},
    train_embeddings_use_case::EmbeddingTrainConfig,
};
use crate::ml::classifier::ClassifierKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train packet-token embeddings
    Embeddings(EmbeddingsArgs),

    /// Train a malicious-traffic classifier on feature shards
    Classifier(ClassifierArgs),

    /// Print the first shard containing a positive label
    Scan(ScanArgs),

    /// Evaluate a trained classifier on held-out shards
    Evaluate(EvaluateArgs),
}

// ─── embeddings ───────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct EmbeddingsArgs {
    /// Directory of token stream files (little-endian i64)
    #[arg(long, default_value = "data/tokens")]
    pub tokens_dir: String,

    /// Checkpoint slot; also receives embeddings.safetensors and loss.csv
    #[arg(long, default_value = "checkpoints/embeddings")]
    pub checkpoint_dir: String,

    /// Continue from the checkpoint in this directory instead of
    /// training from scratch
    #[arg(long)]
    pub resume_from: Option<String>,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Dictionary size; every token id must be below it
    #[arg(long, default_value_t = 50_000)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 128)]
    pub embedding_size: usize,

    /// Noise classes per step in the NCE loss
    #[arg(long, default_value_t = 64)]
    pub num_negative: usize,

    /// SGD steps per token file
    #[arg(long, default_value_t = 100_001)]
    pub num_steps: usize,

    /// Context tokens drawn per center token
    #[arg(long, default_value_t = 2)]
    pub num_skips: usize,

    /// Tokens considered on each side of the center
    #[arg(long, default_value_t = 1)]
    pub skip_window: usize,

    #[arg(long, default_value_t = 1.0)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.0)]
    pub momentum: f64,

    /// Steps between average-loss reports
    #[arg(long, default_value_t = 2000)]
    pub log_every: usize,

    /// Resamples allowed before a degenerate stream aborts training
    #[arg(long, default_value_t = 100)]
    pub max_batch_attempts: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<EmbeddingsArgs> for EmbeddingTrainConfig {
    fn from(a: EmbeddingsArgs) -> Self {
        EmbeddingTrainConfig {
            tokens_dir:         a.tokens_dir,
            checkpoint_dir:     a.checkpoint_dir,
            resume_from:        a.resume_from,
            batch_size:         a.batch_size,
            vocab_size:         a.vocab_size,
            embedding_size:     a.embedding_size,
            num_negative:       a.num_negative,
            num_steps:          a.num_steps,
            num_skips:          a.num_skips,
            skip_window:        a.skip_window,
            learning_rate:      a.lr,
            momentum:           a.momentum,
            log_every:          a.log_every,
            max_batch_attempts: a.max_batch_attempts,
            seed:               a.seed,
            ..EmbeddingTrainConfig::default()
        }
    }
}

// ─── classifier ───────────────────────────────────────────────────────────────
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    Forest,
    NaiveBayes,
}

impl From<KindArg> for ClassifierKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Forest => ClassifierKind::Forest,
            KindArg::NaiveBayes => ClassifierKind::NaiveBayes,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ScheduleArg {
    Accumulate,
    Bootstrap,
}

impl From<ScheduleArg> for TrainingSchedule {
    fn from(s: ScheduleArg) -> Self {
        match s {
            ScheduleArg::Accumulate => TrainingSchedule::Accumulate,
            ScheduleArg::Bootstrap => TrainingSchedule::Bootstrap,
        }
    }
}

#[derive(Args, Debug)]
pub struct ClassifierArgs {
    /// Directory of training shards (.safetensors)
    #[arg(long, default_value = "data/shards/train")]
    pub shards_dir: String,

    /// Directory receiving classifier.json
    #[arg(long, default_value = "checkpoints/classifier")]
    pub output_dir: String,

    #[arg(long, value_enum, default_value_t = KindArg::Forest)]
    pub kind: KindArg,

    /// accumulate: shards in order; bootstrap: first dual-class shard first.
    /// naive-bayes always bootstraps
    #[arg(long, value_enum, default_value_t = ScheduleArg::Accumulate)]
    pub schedule: ScheduleArg,

    /// Trees added per commit (forest only)
    #[arg(long, default_value_t = 10)]
    pub capacity_increment: usize,

    /// Buffered rows that trigger a commit once exceeded
    #[arg(long, default_value_t = 100_000)]
    pub max_rows_per_commit: usize,

    #[arg(long, default_value_t = 16)]
    pub max_depth: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<ClassifierArgs> for ClassifierTrainConfig {
    fn from(a: ClassifierArgs) -> Self {
        ClassifierTrainConfig {
            shards_dir:          a.shards_dir,
            output_dir:          a.output_dir,
            kind:                a.kind.into(),
            schedule:            a.schedule.into(),
            capacity_increment:  a.capacity_increment,
            max_rows_per_commit: a.max_rows_per_commit,
            max_depth:           a.max_depth,
            seed:                a.seed,
        }
    }
}

// ─── scan / evaluate ──────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[arg(long, default_value = "data/shards/train")]
    pub shards_dir: String,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Classifier artifact written by `classifier`
    #[arg(long, default_value = "checkpoints/classifier/classifier.json")]
    pub artifact: String,

    /// Directory of test shards (.safetensors)
    #[arg(long, default_value = "data/shards/test")]
    pub shards_dir: String,

    /// Directory receiving evaluation.csv
    #[arg(long, default_value = "checkpoints/classifier")]
    pub report_dir: String,

    /// Run label written to every CSV row
    #[arg(long, default_value = "run")]
    pub run: String,
}
