// ============================================================
// Layer 2: TrainEmbeddingsUseCase
// ============================================================
// Orchestrates embedding training end to end:
//
//   Step 1: List token files          (Layer 4 - data)
//   Step 2: Save config               (Layer 6 - infra)
//   Step 3: Build trainer             (Layer 5 - ml)
//   Step 4: create_model or           (Layer 5 - ml)
//           update_model(resume_from)
//   Step 5: Export embeddings         (Layer 6 - infra)

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
use serde::{Deserialize, Serialize};

use crate::application::stage::timed;
use crate::data::{loader::TokenFileLoader, quality_gate::DEFAULT_MAX_DOMINANT_SHARE};
use crate::infra::{
    checkpoint::CheckpointManager,
    embedding_store::{save_embeddings, EMBEDDINGS_FILE},
    metrics::{LossRecord, MetricsLogger},
};
use crate::ml::trainer::EmbeddingTrainer;

type TrainBackend = Autodiff<NdArray>;

pub const CONFIG_FILE: &str = "train_config.json";

// ─── Embedding Training Configuration ────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingTrainConfig {
    pub tokens_dir:         String,
    pub checkpoint_dir:     String,
    /// Checkpoint directory to continue from; None trains from scratch
    pub resume_from:        Option<String>,
    pub batch_size:         usize,
    pub vocab_size:         usize,
    pub embedding_size:     usize,
    pub num_negative:       usize,
    pub num_steps:          usize,
    pub num_skips:          usize,
    pub skip_window:        usize,
    pub learning_rate:      f64,
    pub momentum:           f64,
    pub log_every:          usize,
    pub max_batch_attempts: usize,
    pub max_dominant_share: f64,
    pub seed:               u64,
}

impl Default for EmbeddingTrainConfig {
    fn default() -> Self {
        Self {
            tokens_dir:         "data/tokens".to_string(),
            checkpoint_dir:     "checkpoints/embeddings".to_string(),
            resume_from:        None,
            batch_size:         128,
            vocab_size:         50_000,
            embedding_size:     128,
            num_negative:       64,
            num_steps:          100_001,
            num_skips:          2,
            skip_window:        1,
            learning_rate:      1.0,
            momentum:           0.0,
            log_every:          2000,
            max_batch_attempts: 100,
            max_dominant_share: DEFAULT_MAX_DOMINANT_SHARE,
            seed:               42,
        }
    }
}

// ─── TrainEmbeddingsUseCase ──────────────────────────────────────────────────
pub struct TrainEmbeddingsUseCase {
    config: EmbeddingTrainConfig,
}

impl TrainEmbeddingsUseCase {
    pub fn new(config: EmbeddingTrainConfig) -> Self {
        Self { config }
    }

    /// Train and export; returns the path of the exported matrix.
    pub fn execute(&self) -> Result<PathBuf> {
        let cfg = &self.config;

        // ── Step 1: Token files ───────────────────────────────────────────────
        let streams = TokenFileLoader::from_dir(&cfg.tokens_dir)
            .with_context(|| format!("Cannot list token files in '{}'", cfg.tokens_dir))?;
        if streams.files().is_empty() {
            bail!("No token files found in '{}'", cfg.tokens_dir);
        }
        tracing::info!("Found {} token files in '{}'", streams.files().len(), cfg.tokens_dir);

        // ── Step 2: Save config next to the checkpoint ────────────────────────
        fs::create_dir_all(&cfg.checkpoint_dir)
            .with_context(|| format!("Cannot create '{}'", cfg.checkpoint_dir))?;
        let config_path = PathBuf::from(&cfg.checkpoint_dir).join(CONFIG_FILE);
        fs::write(&config_path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", config_path.display()))?;

        // ── Step 3: Trainer ───────────────────────────────────────────────────
        let device = NdArrayDevice::default();
        let loss_log = MetricsLogger::<LossRecord>::new(&cfg.checkpoint_dir)?;
        let trainer = EmbeddingTrainer::<TrainBackend>::new(
            cfg.clone(),
            CheckpointManager::new(&cfg.checkpoint_dir),
            device,
        )
        .context("Invalid embedding training configuration")?
        .with_loss_log(loss_log);

        // ── Step 4: Train ─────────────────────────────────────────────────────
        let matrix = match &cfg.resume_from {
            None => timed("create_model", || {
                trainer
                    .create_model(&streams, cfg.vocab_size)
                    .context("Embedding training failed")
            })?,
            Some(dir) => {
                let resume_from = CheckpointManager::new(dir);
                timed("update_model", || {
                    trainer
                        .update_model(&streams, &resume_from, cfg.vocab_size)
                        .with_context(|| format!("Updating embeddings from '{dir}' failed"))
                })?
            }
        };

        // ── Step 5: Export ────────────────────────────────────────────────────
        let out = PathBuf::from(&cfg.checkpoint_dir).join(EMBEDDINGS_FILE);
        save_embeddings(&out, &matrix)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::embedding_store::load_embeddings;

    fn write_tokens(path: &std::path::Path, tokens: &[i64]) {
        let bytes: Vec<u8> = tokens.iter().flat_map(|t| t.to_le_bytes()).collect();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_train_then_resume_exports_embeddings() {
        let tokens = tempfile::tempdir().unwrap();
        write_tokens(&tokens.path().join("doc1.bin"), &(0..30).map(|i| i % 11).collect::<Vec<_>>());
        write_tokens(&tokens.path().join("doc2.bin"), &(0..30).map(|i| (i * 3) % 11).collect::<Vec<_>>());

        let out = tempfile::tempdir().unwrap();
        let cfg = EmbeddingTrainConfig {
            tokens_dir:     tokens.path().display().to_string(),
            checkpoint_dir: out.path().join("base").display().to_string(),
            batch_size:     8,
            vocab_size:     12,
            embedding_size: 3,
            num_negative:   3,
            num_steps:      3,
            log_every:      1,
            ..EmbeddingTrainConfig::default()
        };

        let exported = TrainEmbeddingsUseCase::new(cfg.clone()).execute().unwrap();
        let matrix = load_embeddings(&exported).unwrap();
        assert_eq!((matrix.vocab_size(), matrix.embedding_size()), (12, 3));
        assert!(out.path().join("base").join(CONFIG_FILE).is_file());
        assert!(out.path().join("base").join("loss.csv").is_file());

        let resumed = EmbeddingTrainConfig {
            checkpoint_dir: out.path().join("next").display().to_string(),
            resume_from:    Some(cfg.checkpoint_dir.clone()),
            ..cfg
        };
        TrainEmbeddingsUseCase::new(resumed).execute().unwrap();
        assert!(out.path().join("next").join(EMBEDDINGS_FILE).is_file());
    }

    #[test]
    fn test_empty_token_dir_fails() {
        let tokens = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cfg = EmbeddingTrainConfig {
            tokens_dir:     tokens.path().display().to_string(),
            checkpoint_dir: out.path().display().to_string(),
            ..EmbeddingTrainConfig::default()
        };
        assert!(TrainEmbeddingsUseCase::new(cfg).execute().is_err());
    }
}
