// ============================================================
// Layer 5: Incremental Classifier Training
// ============================================================
// Feeds feature shards to a ClassifierModel without ever holding
// the whole training set in memory at once.
//
// Shards are appended to an AccumulationBuffer. When the buffer
// holds MORE than max_rows_per_commit rows it is committed:
//
//   GrowEnsemble   add_capacity(capacity_increment); fit(buffer)
//   PartialFit     partial_fit(buffer)
//
// and cleared. Whatever is left after the last shard is committed
// once more. Example with max_rows_per_commit = 100 000:
//
//   shards [40k, 40k, 40k]  → one threshold commit of 120k
//   shards [30k, 30k]       → one final commit of 60k
//
// A run in which no commit carried a positive row fails with
// NoPositiveExamples; the caller must not persist anything then.
//
// Bootstrapped runs first fit the shard found by ClassStartScanner
// on its own and then continue with the remaining shards in order.
// PartialFit models always run bootstrapped.

use crate::data::class_scanner::ClassStartScanner;
use crate::domain::{
    error::TrainingError,
    feature_shard::{FeatureShard, Label, POSITIVE},
    traits::{ClassifierModel, FeatureShardSource, UpdateRule},
};

// ─── Buffer ───────────────────────────────────────────────────────────────────
/// Concatenation of the shards not yet committed.
#[derive(Debug, Default)]
pub struct AccumulationBuffer {
    width:  Option<usize>,
    rows:   Vec<f32>,
    labels: Vec<Label>,
}

impl AccumulationBuffer {
    pub fn append(&mut self, shard: &FeatureShard) -> Result<(), TrainingError> {
        match self.width {
            Some(expected) if expected != shard.width() => {
                return Err(TrainingError::FeatureWidthMismatch { expected, actual: shard.width() });
            }
            _ => self.width = Some(shard.width()),
        }
        self.rows.extend_from_slice(shard.vectors());
        self.labels.extend_from_slice(shard.labels());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == POSITIVE).count()
    }

    pub fn width(&self) -> Option<usize> {
        self.width
    }

    /// Empties the rows; the feature width stays fixed.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.labels.clear();
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTrigger {
    /// The buffer grew past max_rows_per_commit
    Threshold,
    /// Leftover rows after the last shard
    Final,
    /// The class-start shard fitted on its own
    Bootstrap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub rows:           usize,
    pub positives:      usize,
    pub trigger:        CommitTrigger,
    pub capacity_after: usize,
}

/// Mutable state of one training run.
#[derive(Debug, Default)]
pub struct TrainingSession {
    pub trained_once:        bool,
    pub positive_class_seen: bool,
    pub buffer:              AccumulationBuffer,
    commits:                 Vec<CommitRecord>,
}

impl TrainingSession {
    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    pub fn committed_rows(&self) -> usize {
        self.commits.iter().map(|c| c.rows).sum()
    }
}

/// A successfully trained model and how it got there.
#[derive(Debug)]
pub struct TrainedClassifier<M> {
    pub model:   M,
    pub commits: Vec<CommitRecord>,
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct IncrementalClassifierTrainer {
    capacity_increment:  usize,
    max_rows_per_commit: usize,
}

impl IncrementalClassifierTrainer {
    pub fn new(capacity_increment: usize, max_rows_per_commit: usize) -> Result<Self, TrainingError> {
        if capacity_increment == 0 {
            return Err(TrainingError::Configuration("capacity_increment must be > 0".into()));
        }
        Ok(Self { capacity_increment, max_rows_per_commit })
    }

    /// Stream every shard in order through `model`.
    ///
    /// A `PartialFit` model's first update must see both classes, so
    /// such models are always routed through [`Self::train_bootstrapped`].
    pub fn train<M, S>(&self, mut model: M, shards: &S) -> Result<TrainedClassifier<M>, TrainingError>
    where
        M: ClassifierModel,
        S: FeatureShardSource + ?Sized,
    {
        if model.update_rule() == UpdateRule::PartialFit {
            tracing::info!("{} needs a dual-class first fit; using the bootstrap schedule", model.name());
            return self.train_bootstrapped(model, shards);
        }

        let mut session = TrainingSession::default();
        for i in 0..shards.shard_count() {
            let shard = shards.load_shard(i)?;
            self.feed(&mut session, &mut model, &shard)?;
        }
        self.finish(session, model, shards.shard_count())
    }

    /// Fit the first dual-class shard alone, then feed the rest in
    /// their original order.
    pub fn train_bootstrapped<M, S>(&self, mut model: M, shards: &S) -> Result<TrainedClassifier<M>, TrainingError>
    where
        M: ClassifierModel,
        S: FeatureShardSource + ?Sized,
    {
        let schedule = ClassStartScanner::bootstrap_schedule(shards)?;
        let mut session = TrainingSession::default();

        let (&first, rest) = schedule.split_first().ok_or(TrainingError::BootstrapNotFound)?;
        let shard = shards.load_shard(first)?;
        tracing::info!("Bootstrapping {} on '{}' ({} rows)", model.name(), shard.source, shard.rows());
        session.buffer.append(&shard)?;
        self.commit(&mut session, &mut model, CommitTrigger::Bootstrap)?;

        for &i in rest {
            let shard = shards.load_shard(i)?;
            self.feed(&mut session, &mut model, &shard)?;
        }
        self.finish(session, model, shards.shard_count())
    }

    fn feed<M: ClassifierModel>(
        &self,
        session: &mut TrainingSession,
        model:   &mut M,
        shard:   &FeatureShard,
    ) -> Result<(), TrainingError> {
        tracing::debug!("Buffering '{}' ({} rows, {} positive)", shard.source, shard.rows(), shard.positives());
        session.buffer.append(shard)?;
        if session.buffer.len() > self.max_rows_per_commit {
            self.commit(session, model, CommitTrigger::Threshold)?;
        }
        Ok(())
    }

    fn finish<M: ClassifierModel>(
        &self,
        mut session: TrainingSession,
        mut model:   M,
        shards:      usize,
    ) -> Result<TrainedClassifier<M>, TrainingError> {
        if !session.buffer.is_empty() {
            self.commit(&mut session, &mut model, CommitTrigger::Final)?;
        }
        if !session.positive_class_seen {
            return Err(TrainingError::NoPositiveExamples { shards });
        }

        tracing::info!(
            "Trained {} on {} rows in {} commits (capacity {})",
            model.name(),
            session.committed_rows(),
            session.commits.len(),
            model.capacity()
        );
        Ok(TrainedClassifier { model, commits: session.commits })
    }

    fn commit<M: ClassifierModel>(
        &self,
        session: &mut TrainingSession,
        model:   &mut M,
        trigger: CommitTrigger,
    ) -> Result<(), TrainingError> {
        let buffer = &session.buffer;
        let width = buffer.width().unwrap_or_default();

        match (trigger, model.update_rule()) {
            (_, UpdateRule::GrowEnsemble) => {
                model.add_capacity(self.capacity_increment);
                model.fit(&buffer.rows, width, &buffer.labels)?;
            }
            (CommitTrigger::Bootstrap, UpdateRule::PartialFit) => {
                model.fit(&buffer.rows, width, &buffer.labels)?;
            }
            (_, UpdateRule::PartialFit) => {
                model.partial_fit(&buffer.rows, width, &buffer.labels)?;
            }
        }

        let record = CommitRecord {
            rows:           buffer.len(),
            positives:      buffer.positives(),
            trigger,
            capacity_after: model.capacity(),
        };
        tracing::info!(
            "{:?} commit: {} rows ({} positive), capacity now {}",
            record.trigger,
            record.rows,
            record.positives,
            record.capacity_after
        );

        session.trained_once = true;
        session.positive_class_seen |= record.positives > 0;
        session.commits.push(record);
        session.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every batch it is given instead of learning anything.
    #[derive(Debug, Default)]
    struct Recorder {
        rule:     Option<UpdateRule>,
        capacity: usize,
        calls:    Vec<(&'static str, usize)>,
    }

    impl Recorder {
        fn with_rule(rule: UpdateRule) -> Self {
            Self { rule: Some(rule), ..Self::default() }
        }
    }

    impl ClassifierModel for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn update_rule(&self) -> UpdateRule {
            self.rule.unwrap_or(UpdateRule::GrowEnsemble)
        }

        fn capacity(&self) -> usize {
            self.capacity
        }

        fn add_capacity(&mut self, additional: usize) {
            self.capacity += additional;
        }

        fn fit(&mut self, _rows: &[f32], _width: usize, labels: &[Label]) -> Result<(), TrainingError> {
            self.calls.push(("fit", labels.len()));
            Ok(())
        }

        fn partial_fit(&mut self, _rows: &[f32], _width: usize, labels: &[Label]) -> Result<(), TrainingError> {
            self.calls.push(("partial_fit", labels.len()));
            Ok(())
        }

        fn predict_proba(&self, _row: &[f32]) -> f64 {
            0.0
        }
    }

    fn shard(rows: usize, positives: usize) -> FeatureShard {
        let labels = (0..rows).map(|i| u8::from(i < positives)).collect();
        FeatureShard::new(format!("s{rows}"), 1, vec![0.0; rows], labels).unwrap()
    }

    #[test]
    fn test_threshold_commit_without_final() {
        let trainer = IncrementalClassifierTrainer::new(10, 100_000).unwrap();
        let shards = vec![shard(40_000, 1), shard(40_000, 0), shard(40_000, 0)];

        let trained = trainer.train(Recorder::default(), &shards).unwrap();

        assert_eq!(
            trained.commits,
            vec![CommitRecord {
                rows:           120_000,
                positives:      1,
                trigger:        CommitTrigger::Threshold,
                capacity_after: 10,
            }]
        );
        assert_eq!(trained.model.calls, vec![("fit", 120_000)]);
    }

    #[test]
    fn test_leftover_rows_are_force_committed() {
        let trainer = IncrementalClassifierTrainer::new(10, 100_000).unwrap();
        let shards = vec![shard(30_000, 0), shard(30_000, 5)];

        let trained = trainer.train(Recorder::default(), &shards).unwrap();

        assert_eq!(trained.commits.len(), 1);
        assert_eq!(trained.commits[0].trigger, CommitTrigger::Final);
        assert_eq!(trained.commits[0].rows, 60_000);
    }

    #[test]
    fn test_buffer_equal_to_limit_does_not_commit() {
        let trainer = IncrementalClassifierTrainer::new(10, 100).unwrap();
        let shards = vec![shard(50, 1), shard(50, 0), shard(1, 0)];

        let trained = trainer.train(Recorder::default(), &shards).unwrap();
        assert_eq!(trained.commits.len(), 1);
        assert_eq!(trained.commits[0].rows, 101);
        assert_eq!(trained.commits[0].trigger, CommitTrigger::Threshold);
    }

    #[test]
    fn test_commits_partition_all_rows_and_capacity_grows() {
        let trainer = IncrementalClassifierTrainer::new(3, 10).unwrap();
        let sizes = [4, 8, 2, 11, 1, 6, 3];
        let shards: Vec<FeatureShard> = sizes.iter().map(|&n| shard(n, 1)).collect();

        let trained = trainer.train(Recorder::default(), &shards).unwrap();

        let committed: usize = trained.commits.iter().map(|c| c.rows).sum();
        assert_eq!(committed, sizes.iter().sum::<usize>());
        assert!(trained.commits.windows(2).all(|w| w[0].capacity_after < w[1].capacity_after));
        // Only the last commit may be a forced one
        let last = trained.commits.len() - 1;
        assert!(trained.commits[..last].iter().all(|c| c.trigger == CommitTrigger::Threshold));
    }

    #[test]
    fn test_all_negative_run_fails() {
        let trainer = IncrementalClassifierTrainer::new(10, 5).unwrap();
        let shards = vec![shard(4, 0), shard(7, 0), shard(2, 0)];

        let err = trainer.train(Recorder::default(), &shards).unwrap_err();
        assert!(matches!(err, TrainingError::NoPositiveExamples { shards: 3 }));
    }

    #[test]
    fn test_partial_fit_rule_never_adds_capacity() {
        let trainer = IncrementalClassifierTrainer::new(10, 3).unwrap();
        let shards = vec![shard(4, 1), shard(4, 0), shard(2, 0)];

        let trained = trainer.train(Recorder::with_rule(UpdateRule::PartialFit), &shards).unwrap();
        assert_eq!(trained.model.capacity, 0);
        assert_eq!(
            trained.model.calls,
            vec![("fit", 4), ("partial_fit", 4), ("partial_fit", 2)]
        );
    }

    #[test]
    fn test_partial_fit_first_update_is_never_single_class() {
        let trainer = IncrementalClassifierTrainer::new(10, 3).unwrap();
        let shards = vec![shard(4, 0), shard(2, 1)];

        let trained = trainer.train(Recorder::with_rule(UpdateRule::PartialFit), &shards).unwrap();

        assert_eq!(trained.commits[0].trigger, CommitTrigger::Bootstrap);
        assert_eq!(trained.commits[0].positives, 1);
        assert_eq!(trained.model.calls, vec![("fit", 2), ("partial_fit", 4)]);
    }

    #[test]
    fn test_partial_fit_without_dual_class_shard_fails() {
        let trainer = IncrementalClassifierTrainer::new(10, 3).unwrap();
        let shards = vec![shard(4, 0), shard(2, 0)];

        let err = trainer.train(Recorder::with_rule(UpdateRule::PartialFit), &shards).unwrap_err();
        assert!(matches!(err, TrainingError::BootstrapNotFound));
    }

    #[test]
    fn test_bootstrap_fits_class_start_shard_first() {
        let trainer = IncrementalClassifierTrainer::new(10, 100).unwrap();
        let shards = vec![shard(10, 0), shard(5, 0), shard(8, 2), shard(3, 0)];

        let trained = trainer
            .train_bootstrapped(Recorder::with_rule(UpdateRule::PartialFit), &shards)
            .unwrap();

        assert_eq!(trained.commits[0].trigger, CommitTrigger::Bootstrap);
        assert_eq!(trained.commits[0].rows, 8);
        // Remaining 10 + 5 + 3 rows stay under the limit → one final update
        assert_eq!(trained.model.calls, vec![("fit", 8), ("partial_fit", 18)]);
    }

    #[test]
    fn test_bootstrap_without_positive_shard_fails_before_fitting() {
        let trainer = IncrementalClassifierTrainer::new(10, 100).unwrap();
        let shards = vec![shard(10, 0), shard(5, 0)];

        let err = trainer
            .train_bootstrapped(Recorder::with_rule(UpdateRule::PartialFit), &shards)
            .unwrap_err();
        assert!(matches!(err, TrainingError::BootstrapNotFound));
    }

    #[test]
    fn test_real_forest_end_to_end() {
        use crate::ml::classifier::forest::RandomForest;

        let trainer = IncrementalClassifierTrainer::new(4, 30).unwrap();
        let make = |offset: usize| {
            let n = 20;
            let vectors: Vec<f32> = (0..n).map(|i| ((i + offset) % 20) as f32).collect();
            let labels = vectors.iter().map(|&v| u8::from(v >= 10.0)).collect();
            FeatureShard::new("f", 1, vectors, labels).unwrap()
        };
        let shards = vec![make(0), make(5), make(3)];

        let trained = trainer.train(RandomForest::new(6, 2), &shards).unwrap();
        assert_eq!(trained.model.capacity(), 8);
        assert_eq!(trained.model.predict(&[18.0]), 1);
        assert_eq!(trained.model.predict(&[1.0]), 0);
    }
}
