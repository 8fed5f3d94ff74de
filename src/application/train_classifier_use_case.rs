// ============================================================
// Layer 2: TrainClassifierUseCase
// ============================================================
// Orchestrates one classifier training session:
//
//   Step 1: List feature shards       (Layer 4 - data)
//   Step 2: Remove stale artifact     (Layer 6 - infra)
//   Step 3: Train incrementally       (Layer 5 - ml)
//           accumulate: shards in order
//           bootstrap:  class-start shard first
//   Step 4: Persist artifact          (Layer 6 - infra)
//
// The artifact is written only after Step 3 succeeds, so a failed
// session leaves no classifier behind.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::stage::timed;
use crate::data::loader::ShardFileLoader;
use crate::infra::classifier_store::{ClassifierStore, CLASSIFIER_FILE};
use crate::ml::{
    classifier::{Classifier, ClassifierKind},
    incremental::{CommitRecord, IncrementalClassifierTrainer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingSchedule {
    /// Every shard in order through the commit buffer; naive Bayes
    /// still bootstraps
    Accumulate,
    /// First dual-class shard fitted alone, then the rest
    Bootstrap,
}

// ─── Classifier Training Configuration ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierTrainConfig {
    pub shards_dir:          String,
    pub output_dir:          String,
    pub kind:                ClassifierKind,
    pub schedule:            TrainingSchedule,
    pub capacity_increment:  usize,
    pub max_rows_per_commit: usize,
    pub max_depth:           usize,
    pub seed:                u64,
}

impl Default for ClassifierTrainConfig {
    fn default() -> Self {
        Self {
            shards_dir:          "data/shards/train".to_string(),
            output_dir:          "checkpoints/classifier".to_string(),
            kind:                ClassifierKind::Forest,
            schedule:            TrainingSchedule::Accumulate,
            capacity_increment:  10,
            max_rows_per_commit: 100_000,
            max_depth:           16,
            seed:                42,
        }
    }
}

/// What a successful session produced.
#[derive(Debug)]
pub struct ClassifierTrainingSummary {
    pub artifact: PathBuf,
    pub commits:  Vec<CommitRecord>,
}

// ─── TrainClassifierUseCase ──────────────────────────────────────────────────
pub struct TrainClassifierUseCase {
    config: ClassifierTrainConfig,
}

impl TrainClassifierUseCase {
    pub fn new(config: ClassifierTrainConfig) -> Self {
        Self { config }
    }

    pub fn artifact_path(&self) -> PathBuf {
        PathBuf::from(&self.config.output_dir).join(CLASSIFIER_FILE)
    }

    pub fn execute(&self) -> Result<ClassifierTrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Shards ────────────────────────────────────────────────────
        let shards = ShardFileLoader::from_dir(&cfg.shards_dir)
            .with_context(|| format!("Cannot list feature shards in '{}'", cfg.shards_dir))?;
        if shards.files().is_empty() {
            bail!("No .safetensors shards found in '{}'", cfg.shards_dir);
        }
        tracing::info!("Found {} feature shards in '{}'", shards.files().len(), cfg.shards_dir);

        // ── Step 2: A failed session must not leave an old model behind ───────
        let store = ClassifierStore::new(self.artifact_path());
        store.remove_stale()?;

        // ── Step 3: Train ─────────────────────────────────────────────────────
        let trainer = IncrementalClassifierTrainer::new(cfg.capacity_increment, cfg.max_rows_per_commit)?;
        let model = Classifier::new(cfg.kind, cfg.max_depth, cfg.seed);

        let trained = timed("train_classifier", || {
            let result = match cfg.schedule {
                TrainingSchedule::Accumulate => trainer.train(model, &shards),
                TrainingSchedule::Bootstrap => trainer.train_bootstrapped(model, &shards),
            };
            result.context("Classifier training failed; no artifact was written")
        })?;

        // ── Step 4: Persist ───────────────────────────────────────────────────
        store.save(&trained.model)?;
        Ok(ClassifierTrainingSummary { artifact: store.path().to_path_buf(), commits: trained.commits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::tests::write_shard;
    use crate::domain::feature_shard::FeatureShard;
    use crate::domain::traits::ClassifierModel;
    use crate::ml::incremental::CommitTrigger;

    fn shard(rows: usize, positives: usize) -> FeatureShard {
        let vectors = (0..rows).map(|i| if i < positives { 9.0 } else { 1.0 + (i % 3) as f32 }).collect();
        let labels = (0..rows).map(|i| u8::from(i < positives)).collect();
        FeatureShard::new("s", 1, vectors, labels).unwrap()
    }

    fn config(shards: &std::path::Path, out: &std::path::Path, kind: ClassifierKind) -> ClassifierTrainConfig {
        ClassifierTrainConfig {
            shards_dir:          shards.display().to_string(),
            output_dir:          out.display().to_string(),
            kind,
            max_rows_per_commit: 10,
            ..ClassifierTrainConfig::default()
        }
    }

    #[test]
    fn test_all_negative_session_leaves_no_artifact() {
        let shards = tempfile::tempdir().unwrap();
        write_shard(&shards.path().join("s1.safetensors"), &shard(6, 0));
        write_shard(&shards.path().join("s2.safetensors"), &shard(8, 0));

        let out = tempfile::tempdir().unwrap();
        // Leftover from an earlier run must disappear too
        std::fs::write(out.path().join(CLASSIFIER_FILE), "{}").unwrap();

        let use_case = TrainClassifierUseCase::new(config(shards.path(), out.path(), ClassifierKind::Forest));
        assert!(use_case.execute().is_err());
        assert!(!use_case.artifact_path().exists());
    }

    #[test]
    fn test_forest_session_writes_loadable_artifact() {
        let shards = tempfile::tempdir().unwrap();
        write_shard(&shards.path().join("s1.safetensors"), &shard(8, 3));
        write_shard(&shards.path().join("s2.safetensors"), &shard(6, 0));

        let out = tempfile::tempdir().unwrap();
        let use_case = TrainClassifierUseCase::new(config(shards.path(), out.path(), ClassifierKind::Forest));
        let summary = use_case.execute().unwrap();

        assert_eq!(summary.commits.iter().map(|c| c.rows).sum::<usize>(), 14);
        let model = ClassifierStore::new(&summary.artifact).load().unwrap();
        assert_eq!(model.kind(), ClassifierKind::Forest);
        assert_eq!(model.predict(&[9.0]), 1);
    }

    #[test]
    fn test_bootstrap_schedule_with_naive_bayes() {
        let shards = tempfile::tempdir().unwrap();
        write_shard(&shards.path().join("s1.safetensors"), &shard(5, 0));
        write_shard(&shards.path().join("s2.safetensors"), &shard(6, 2));

        let out = tempfile::tempdir().unwrap();
        let cfg = ClassifierTrainConfig {
            schedule: TrainingSchedule::Bootstrap,
            ..config(shards.path(), out.path(), ClassifierKind::NaiveBayes)
        };
        let summary = TrainClassifierUseCase::new(cfg).execute().unwrap();

        assert_eq!(summary.commits[0].rows, 6);
        assert_eq!(summary.commits[0].positives, 2);
        assert!(summary.artifact.is_file());
    }

    #[test]
    fn test_naive_bayes_accumulate_still_starts_dual_class() {
        let shards = tempfile::tempdir().unwrap();
        write_shard(&shards.path().join("s1.safetensors"), &shard(4, 0));
        write_shard(&shards.path().join("s2.safetensors"), &shard(2, 1));

        let out = tempfile::tempdir().unwrap();
        let cfg = ClassifierTrainConfig {
            max_rows_per_commit: 3,
            ..config(shards.path(), out.path(), ClassifierKind::NaiveBayes)
        };
        let summary = TrainClassifierUseCase::new(cfg).execute().unwrap();

        assert_eq!(summary.commits[0].trigger, CommitTrigger::Bootstrap);
        assert_eq!((summary.commits[0].rows, summary.commits[0].positives), (2, 1));
        assert_eq!(summary.commits[1].rows, 4);
    }
}
