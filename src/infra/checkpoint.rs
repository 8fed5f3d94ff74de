// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// One checkpoint slot per directory. A save overwrites the slot.
//
//   <dir>/
//     skipgram_model.mpk.gz   model parameters
//     optimizer.mpk.gz        optimizer state
//     checkpoint.json         shape + generation metadata
//
// checkpoint.json is written last through a temp file and a
// rename, so a slot whose metadata is readable always has both
// records behind it. Loading reads the metadata first and refuses
// a slot whose vocabulary or embedding size differs from the
// requested model before touching the records.
//
// Records use full precision: the embedding values are the
// product, not an intermediate.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::TrainingError;
use crate::ml::model::SkipGramModel;

pub const MODEL_RECORD:     &str = "skipgram_model";
pub const OPTIMIZER_RECORD: &str = "optimizer";
pub const META_FILE:        &str = "checkpoint.json";

type SlotRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Contents of checkpoint.json.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub vocab_size:     usize,
    pub embedding_size: usize,
    /// Incremented by every save into this slot.
    pub generation:     u64,
    /// Token files trained into these parameters, counting resumed runs.
    pub files_trained:  usize,
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// True once a save has completed in this slot.
    pub fn exists(&self) -> bool {
        self.meta_path().is_file()
    }

    pub fn read_meta(&self) -> Result<CheckpointMeta, TrainingError> {
        let path = self.meta_path();
        let json = fs::read_to_string(&path)
            .map_err(|e| TrainingError::checkpoint(&path, format!("no checkpoint metadata ({e})")))?;
        serde_json::from_str(&json).map_err(|e| TrainingError::checkpoint(&path, e))
    }

    /// Overwrite the slot with `model` and `optim`.
    pub fn save<B, O>(
        &self,
        model:         &SkipGramModel<B>,
        optim:         &O,
        files_trained: usize,
    ) -> Result<CheckpointMeta, TrainingError>
    where
        B: AutodiffBackend,
        O: Optimizer<SkipGramModel<B>, B>,
    {
        fs::create_dir_all(&self.dir).map_err(|e| TrainingError::checkpoint(&self.dir, e))?;

        let generation = if self.exists() { self.read_meta()?.generation + 1 } else { 1 };
        let [vocab_size, embedding_size] = model.shape();

        SlotRecorder::new()
            .record(model.clone().into_record(), self.dir.join(MODEL_RECORD))
            .map_err(|e| TrainingError::checkpoint(&self.dir, e))?;
        SlotRecorder::new()
            .record(optim.to_record(), self.dir.join(OPTIMIZER_RECORD))
            .map_err(|e| TrainingError::checkpoint(&self.dir, e))?;

        let meta = CheckpointMeta { vocab_size, embedding_size, generation, files_trained };
        self.write_meta(&meta)?;

        tracing::debug!(
            "Saved checkpoint generation {} to '{}'",
            generation,
            self.dir.display()
        );
        Ok(meta)
    }

    /// Restore parameters and optimizer state into freshly built
    /// `model` and `optim` of the requested shape.
    pub fn load<B, O>(
        &self,
        model:          SkipGramModel<B>,
        optim:          O,
        vocab_size:     usize,
        embedding_size: usize,
        device:         &B::Device,
    ) -> Result<(SkipGramModel<B>, O, CheckpointMeta), TrainingError>
    where
        B: AutodiffBackend,
        O: Optimizer<SkipGramModel<B>, B>,
    {
        let meta = self.read_meta()?;
        if meta.vocab_size != vocab_size || meta.embedding_size != embedding_size {
            return Err(TrainingError::checkpoint(
                &self.dir,
                format!(
                    "checkpoint holds a {}x{} model, requested {}x{}",
                    meta.vocab_size, meta.embedding_size, vocab_size, embedding_size
                ),
            ));
        }

        let record = SlotRecorder::new()
            .load(self.dir.join(MODEL_RECORD), device)
            .map_err(|e| TrainingError::checkpoint(&self.dir, e))?;
        let model = model.load_record(record);
        if model.shape() != [vocab_size, embedding_size] {
            return Err(TrainingError::checkpoint(
                &self.dir,
                format!("model record has shape {:?}", model.shape()),
            ));
        }

        let record = SlotRecorder::new()
            .load(self.dir.join(OPTIMIZER_RECORD), device)
            .map_err(|e| TrainingError::checkpoint(&self.dir, e))?;
        let optim = optim.load_record(record);

        tracing::debug!(
            "Loaded checkpoint generation {} from '{}'",
            meta.generation,
            self.dir.display()
        );
        Ok((model, optim, meta))
    }

    fn write_meta(&self, meta: &CheckpointMeta) -> Result<(), TrainingError> {
        let path = self.meta_path();
        let tmp  = self.dir.join(format!("{META_FILE}.tmp"));
        let json = serde_json::to_string_pretty(meta).map_err(|e| TrainingError::checkpoint(&path, e))?;

        fs::write(&tmp, json).map_err(|e| TrainingError::checkpoint(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| TrainingError::checkpoint(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::SgdConfig;

    use crate::ml::model::SkipGramConfig;

    type TestBackend = Autodiff<NdArray>;

    fn embeddings(model: &SkipGramModel<TestBackend>) -> Vec<f32> {
        model.embeddings.val().into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_missing_slot_is_a_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let slot = CheckpointManager::new(dir.path().join("nothing-here"));
        assert!(!slot.exists());
        assert!(matches!(slot.read_meta(), Err(TrainingError::Checkpoint { .. })));
    }

    #[test]
    fn test_save_then_load_restores_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let slot = CheckpointManager::new(dir.path());
        let device = Default::default();

        let model: SkipGramModel<TestBackend> = SkipGramConfig::new(12, 3).init(&device);
        let optim = SgdConfig::new().init::<TestBackend, SkipGramModel<TestBackend>>();
        let meta = slot.save(&model, &optim, 1).unwrap();
        assert_eq!(meta.generation, 1);
        assert!(slot.exists());

        let fresh: SkipGramModel<TestBackend> = SkipGramConfig::new(12, 3).init(&device);
        let fresh_optim = SgdConfig::new().init::<TestBackend, SkipGramModel<TestBackend>>();
        let (loaded, _, loaded_meta) = slot.load(fresh, fresh_optim, 12, 3, &device).unwrap();

        assert_eq!(loaded_meta, meta);
        assert_eq!(embeddings(&loaded), embeddings(&model));
    }

    #[test]
    fn test_generation_increments_on_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let slot = CheckpointManager::new(dir.path());
        let device = Default::default();

        let model: SkipGramModel<TestBackend> = SkipGramConfig::new(5, 2).init(&device);
        let optim = SgdConfig::new().init::<TestBackend, SkipGramModel<TestBackend>>();
        slot.save(&model, &optim, 1).unwrap();
        let second = slot.save(&model, &optim, 2).unwrap();

        assert_eq!(second.generation, 2);
        assert_eq!(slot.read_meta().unwrap().files_trained, 2);
        assert!(!dir.path().join("checkpoint.json.tmp").exists());
    }

    #[test]
    fn test_shape_mismatch_is_a_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let slot = CheckpointManager::new(dir.path());
        let device = Default::default();

        let model: SkipGramModel<TestBackend> = SkipGramConfig::new(8, 2).init(&device);
        let optim = SgdConfig::new().init::<TestBackend, SkipGramModel<TestBackend>>();
        slot.save(&model, &optim, 1).unwrap();

        let other: SkipGramModel<TestBackend> = SkipGramConfig::new(9, 2).init(&device);
        let other_optim = SgdConfig::new().init::<TestBackend, SkipGramModel<TestBackend>>();
        let result = slot.load(other, other_optim, 9, 2, &device);
        assert!(matches!(result, Err(TrainingError::Checkpoint { .. })));
    }
}
