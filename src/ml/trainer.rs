// ============================================================
// Layer 5: Embedding Training Loop
// ============================================================
// Trains the skip-gram embedding one token file at a time.
//
//   for each file:
//     load parameters      fresh (first file of create_model)
//                          or checkpoint (everything else)
//     num_steps × {
//       gated skip-gram batch
//       noise ids + log-Q corrections
//       NCE loss → backward → SGD step
//     }
//     overwrite the checkpoint slot
//
// The checkpoint round trip between files is the continuity
// mechanism: parameters and optimizer state of file i+1 are
// exactly what was saved after file i.
//
// Key Burn insight:
//   - The optimizer is generic; both entry points build it the same
//     way so a saved optimizer record always fits the loader
//   - loss.backward() consumes the graph, so the scalar is read first
//
// Reference: Burn Book §5, Mikolov et al. (2013)

use burn::{
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::application::train_embeddings_use_case::EmbeddingTrainConfig;
use crate::data::{
    batcher::SkipGramBatcher, quality_gate::BatchQualityGate, sampler::SkipGramBatchSampler,
};
use crate::domain::{
    embedding::EmbeddingMatrix,
    error::TrainingError,
    token_stream::{Cursor, TokenStream},
    traits::TokenStreamSource,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{LossRecord, MetricsLogger},
};
use crate::ml::{
    model::{SkipGramConfig, SkipGramModel},
    noise::LogUniformSampler,
};

pub struct EmbeddingTrainer<B: AutodiffBackend> {
    cfg:         EmbeddingTrainConfig,
    sampler:     SkipGramBatchSampler,
    gate:        BatchQualityGate,
    checkpoints: CheckpointManager,
    loss_log:    Option<MetricsLogger<LossRecord>>,
    device:      B::Device,
}

impl<B: AutodiffBackend> EmbeddingTrainer<B> {
    /// Validates the sampler preconditions before anything is trained.
    pub fn new(
        cfg:         EmbeddingTrainConfig,
        checkpoints: CheckpointManager,
        device:      B::Device,
    ) -> Result<Self, TrainingError> {
        let sampler = SkipGramBatchSampler::new(cfg.batch_size, cfg.num_skips, cfg.skip_window)?;

        if cfg.log_every == 0 {
            return Err(TrainingError::Configuration("log_every must be > 0".into()));
        }
        if cfg.embedding_size == 0 {
            return Err(TrainingError::Configuration("embedding_size must be > 0".into()));
        }
        if cfg.num_negative == 0 {
            return Err(TrainingError::Configuration("num_negative must be > 0".into()));
        }
        if cfg.max_batch_attempts == 0 {
            return Err(TrainingError::Configuration("max_batch_attempts must be > 0".into()));
        }

        // Even with all centers distinct, one center fills num_skips slots.
        let best_share = cfg.num_skips as f64 / cfg.batch_size as f64;
        if best_share >= cfg.max_dominant_share {
            return Err(TrainingError::Configuration(format!(
                "no batch can pass the quality gate: {} of {} slots per center is at or above the {} dominant-share limit",
                cfg.num_skips, cfg.batch_size, cfg.max_dominant_share
            )));
        }

        let gate = BatchQualityGate::new(cfg.max_dominant_share);
        Ok(Self { cfg, sampler, gate, checkpoints, loss_log: None, device })
    }

    /// Also append every loss report to `loss.csv` through `logger`.
    pub fn with_loss_log(mut self, logger: MetricsLogger<LossRecord>) -> Self {
        self.loss_log = Some(logger);
        self
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Train from scratch over every stream in order.
    pub fn create_model<S: TokenStreamSource + ?Sized>(
        &self,
        streams:    &S,
        vocab_size: usize,
    ) -> Result<EmbeddingMatrix, TrainingError> {
        self.run(streams, vocab_size, None)
    }

    /// Continue training from the checkpoint in `resume_from`. Later
    /// files resume from this trainer's own slot.
    pub fn update_model<S: TokenStreamSource + ?Sized>(
        &self,
        streams:     &S,
        resume_from: &CheckpointManager,
        vocab_size:  usize,
    ) -> Result<EmbeddingMatrix, TrainingError> {
        self.run(streams, vocab_size, Some(resume_from))
    }

    fn run<S: TokenStreamSource + ?Sized>(
        &self,
        streams:     &S,
        vocab_size:  usize,
        resume_from: Option<&CheckpointManager>,
    ) -> Result<EmbeddingMatrix, TrainingError> {
        let count = streams.stream_count();
        if count == 0 {
            return Err(TrainingError::Configuration("no token streams to train on".into()));
        }
        if vocab_size == 0 {
            return Err(TrainingError::Configuration("vocab_size must be > 0".into()));
        }

        let noise = LogUniformSampler::new(vocab_size);
        let mut last: Option<SkipGramModel<B>> = None;

        for i in 0..count {
            let stream = streams.load_stream(i)?;
            if let Some(token) = stream.first_out_of_range(vocab_size) {
                return Err(TrainingError::TokenOutOfRange { token, vocab_size });
            }

            let (model, optim, files_before) = match (i, resume_from) {
                (0, None) => {
                    B::seed(self.cfg.seed);
                    (self.fresh_model(vocab_size), self.optimizer(), 0)
                }
                (0, Some(slot)) => self.resume(slot, vocab_size, self.optimizer())?,
                _ => self.resume(&self.checkpoints, vocab_size, self.optimizer())?,
            };

            tracing::info!(
                "Training on '{}' ({} tokens, file {}/{})",
                stream.source,
                stream.len(),
                i + 1,
                count
            );
            let (model, optim) = self.train_file(i, &stream, model, optim, &noise)?;

            let meta = self.checkpoints.save(&model, &optim, files_before + 1)?;
            tracing::info!(
                "Checkpoint generation {} saved to '{}'",
                meta.generation,
                self.checkpoints.dir().display()
            );
            last = Some(model);
        }

        let model = last.ok_or_else(|| TrainingError::Configuration("no token streams to train on".into()))?;
        Ok(Self::normalized_embeddings(&model))
    }

    fn fresh_model(&self, vocab_size: usize) -> SkipGramModel<B> {
        SkipGramConfig::new(vocab_size, self.cfg.embedding_size).init(&self.device)
    }

    // Same construction on every path so saved optimizer records always
    // load back into the optimizer that reads them.
    fn optimizer(&self) -> impl Optimizer<SkipGramModel<B>, B> {
        let mut sgd = SgdConfig::new();
        if self.cfg.momentum > 0.0 {
            sgd = sgd.with_momentum(Some(MomentumConfig::new().with_momentum(self.cfg.momentum)));
        }
        sgd.init::<B, SkipGramModel<B>>()
    }

    fn resume<O: Optimizer<SkipGramModel<B>, B>>(
        &self,
        slot:       &CheckpointManager,
        vocab_size: usize,
        optim:      O,
    ) -> Result<(SkipGramModel<B>, O, usize), TrainingError> {
        let (model, optim, meta) = slot.load(
            self.fresh_model(vocab_size),
            optim,
            vocab_size,
            self.cfg.embedding_size,
            &self.device,
        )?;
        Ok((model, optim, meta.files_trained))
    }

    fn train_file<O: Optimizer<SkipGramModel<B>, B>>(
        &self,
        file:      usize,
        stream:    &TokenStream,
        mut model: SkipGramModel<B>,
        mut optim: O,
        noise:     &LogUniformSampler,
    ) -> Result<(SkipGramModel<B>, O), TrainingError> {
        let batcher = SkipGramBatcher::<B>::new(self.device.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(self.cfg.seed.wrapping_add(file as u64));
        let mut cursor = Cursor::start();
        let mut loss_sum = 0.0f64;

        for step in 0..self.cfg.num_steps {
            let (next, batch) = self.sampler.sample_accepted(
                stream,
                cursor,
                &self.gate,
                self.cfg.max_batch_attempts,
                &mut rng,
            )?;
            cursor = next;

            let tensors = batcher.from_batch(&batch);
            let sample  = noise.sample::<B, _>(self.cfg.num_negative, batch.labels(), &mut rng, &self.device);
            let loss    = model.nce_loss(tensors.inputs, tensors.labels, sample);

            loss_sum += loss.clone().into_scalar().elem::<f64>();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(self.cfg.learning_rate, model, grads);

            if step % self.cfg.log_every == 0 {
                if step > 0 {
                    self.report_loss(file, step, loss_sum / self.cfg.log_every as f64)?;
                }
                loss_sum = 0.0;
            }
        }

        Ok((model, optim))
    }

    fn report_loss(&self, file: usize, step: usize, average_loss: f64) -> Result<(), TrainingError> {
        tracing::info!("Average loss at step {}: {:.6}", step, average_loss);
        if let Some(logger) = &self.loss_log {
            logger
                .log(&LossRecord { file, step, average_loss })
                .map_err(|e| TrainingError::artifact(logger.csv_path(), format!("{e:#}")))?;
        }
        Ok(())
    }

    fn normalized_embeddings(model: &SkipGramModel<B>) -> EmbeddingMatrix {
        let [vocab_size, embedding_size] = model.shape();
        let values: Vec<f32> = model.embeddings.val().into_data().iter::<f32>().collect();
        EmbeddingMatrix::from_values(vocab_size, embedding_size, values)
            .map(EmbeddingMatrix::normalized)
            .unwrap_or_else(|| unreachable!("tensor data matches its own shape"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_config() -> EmbeddingTrainConfig {
        EmbeddingTrainConfig {
            batch_size:     8,
            vocab_size:     16,
            embedding_size: 4,
            num_negative:   4,
            num_steps:      6,
            log_every:      2,
            ..EmbeddingTrainConfig::default()
        }
    }

    fn streams() -> Vec<TokenStream> {
        vec![
            TokenStream::new("a", (0..40).map(|i| i % 13).collect()),
            TokenStream::new("b", (0..30).map(|i| (i * 7) % 16).collect()),
        ]
    }

    fn trainer(dir: &std::path::Path) -> EmbeddingTrainer<TestBackend> {
        EmbeddingTrainer::new(tiny_config(), CheckpointManager::new(dir), Default::default()).unwrap()
    }

    fn assert_unit_rows(m: &EmbeddingMatrix) {
        for t in 0..m.vocab_size() {
            let norm: f32 = m.row(t).iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0, "row {t} has norm {norm}");
        }
    }

    #[test]
    fn test_invalid_sampler_config_fails_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EmbeddingTrainConfig { batch_size: 9, ..tiny_config() };
        let result = EmbeddingTrainer::<TestBackend>::new(cfg, CheckpointManager::new(dir.path()), Default::default());
        assert!(matches!(result, Err(TrainingError::Configuration(_))));
    }

    #[test]
    fn test_batch_that_can_never_pass_the_gate_is_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EmbeddingTrainConfig { batch_size: 4, num_skips: 2, ..tiny_config() };
        let result = EmbeddingTrainer::<TestBackend>::new(cfg, CheckpointManager::new(dir.path()), Default::default());
        assert!(matches!(result, Err(TrainingError::Configuration(_))));

        let cfg = EmbeddingTrainConfig { batch_size: 6, num_skips: 2, ..tiny_config() };
        assert!(EmbeddingTrainer::<TestBackend>::new(cfg, CheckpointManager::new(dir.path()), Default::default()).is_ok());
    }

    #[test]
    fn test_create_model_returns_normalized_matrix_and_saves_slot() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(dir.path());

        let matrix = trainer.create_model(&streams(), 16).unwrap();
        assert_eq!(matrix.vocab_size(), 16);
        assert_eq!(matrix.embedding_size(), 4);
        assert_unit_rows(&matrix);

        let meta = trainer.checkpoints().read_meta().unwrap();
        assert_eq!(meta.generation, 2);
        assert_eq!(meta.files_trained, 2);
    }

    #[test]
    fn test_update_model_resumes_from_another_slot() {
        let base = tempfile::tempdir().unwrap();
        trainer(base.path()).create_model(&streams(), 16).unwrap();

        let next = tempfile::tempdir().unwrap();
        let updater = trainer(next.path());
        let more = vec![TokenStream::new("c", (0..20).map(|i| i % 16).collect())];
        let matrix = updater.update_model(&more, &CheckpointManager::new(base.path()), 16).unwrap();

        assert_unit_rows(&matrix);
        assert_eq!(updater.checkpoints().read_meta().unwrap().files_trained, 3);
    }

    #[test]
    fn test_update_without_checkpoint_is_a_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = tempfile::tempdir().unwrap();
        let result = trainer(dir.path()).update_model(&streams(), &CheckpointManager::new(missing.path()), 16);
        assert!(matches!(result, Err(TrainingError::Checkpoint { .. })));
    }

    #[test]
    fn test_update_with_other_vocabulary_is_a_checkpoint_error() {
        let base = tempfile::tempdir().unwrap();
        trainer(base.path()).create_model(&streams(), 16).unwrap();

        let next = tempfile::tempdir().unwrap();
        let result = trainer(next.path()).update_model(&streams(), &CheckpointManager::new(base.path()), 20);
        assert!(matches!(result, Err(TrainingError::Checkpoint { .. })));
    }

    #[test]
    fn test_empty_stream_list_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let none: Vec<TokenStream> = Vec::new();
        assert!(matches!(
            trainer(dir.path()).create_model(&none, 16),
            Err(TrainingError::Configuration(_))
        ));
    }

    #[test]
    fn test_out_of_range_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = vec![TokenStream::new("bad", vec![1, 2, 3, 99, 4])];
        assert!(matches!(
            trainer(dir.path()).create_model(&bad, 16),
            Err(TrainingError::TokenOutOfRange { token: 99, vocab_size: 16 })
        ));
    }

    #[test]
    fn test_loss_reports_reach_the_csv() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::<LossRecord>::new(dir.path()).unwrap();
        let trainer = trainer(dir.path()).with_loss_log(logger);
        let one = vec![TokenStream::new("a", (0..40).map(|i| i % 13).collect())];
        trainer.create_model(&one, 16).unwrap();

        // 6 steps with log_every 2 → reports at steps 2 and 4
        let text = std::fs::read_to_string(dir.path().join("loss.csv")).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
