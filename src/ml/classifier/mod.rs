// ============================================================
// Layer 5: Incrementally Trainable Classifiers
// ============================================================
// Two model families, one per update rule:
//
//   forest.rs       RandomForest         GrowEnsemble
//   naive_bayes.rs  GaussianNaiveBayes   PartialFit
//   tree.rs         DecisionTree         forest member
//
// `Classifier` wraps either one behind ClassifierModel and is
// what gets persisted as the JSON artifact.

pub mod forest;
pub mod naive_bayes;
pub mod tree;

use serde::{Deserialize, Serialize};

use crate::domain::{
    error::TrainingError,
    feature_shard::Label,
    traits::{ClassifierModel, UpdateRule},
};
use forest::RandomForest;
use naive_bayes::GaussianNaiveBayes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    Forest,
    NaiveBayes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Classifier {
    Forest(RandomForest),
    NaiveBayes(GaussianNaiveBayes),
}

impl Classifier {
    /// An empty model of the given kind. `max_depth` and `seed` only
    /// matter for the forest.
    pub fn new(kind: ClassifierKind, max_depth: usize, seed: u64) -> Self {
        match kind {
            ClassifierKind::Forest => Self::Forest(RandomForest::new(max_depth, seed)),
            ClassifierKind::NaiveBayes => Self::NaiveBayes(GaussianNaiveBayes::default()),
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Self::Forest(_) => ClassifierKind::Forest,
            Self::NaiveBayes(_) => ClassifierKind::NaiveBayes,
        }
    }

    fn inner(&self) -> &dyn ClassifierModel {
        match self {
            Self::Forest(m) => m,
            Self::NaiveBayes(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ClassifierModel {
        match self {
            Self::Forest(m) => m,
            Self::NaiveBayes(m) => m,
        }
    }
}

impl ClassifierModel for Classifier {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn update_rule(&self) -> UpdateRule {
        self.inner().update_rule()
    }

    fn capacity(&self) -> usize {
        self.inner().capacity()
    }

    fn add_capacity(&mut self, additional: usize) {
        self.inner_mut().add_capacity(additional)
    }

    fn fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError> {
        self.inner_mut().fit(rows, width, labels)
    }

    fn partial_fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError> {
        self.inner_mut().partial_fit(rows, width, labels)
    }

    fn predict_proba(&self, row: &[f32]) -> f64 {
        self.inner().predict_proba(row)
    }
}

/// Shared batch validation: non-empty, rows consistent with labels,
/// and `width` equal to the width seen by the first fit.
pub(crate) fn check_batch(
    rows:   &[f32],
    width:  usize,
    labels: &[Label],
    fixed:  &mut Option<usize>,
) -> Result<(), TrainingError> {
    if labels.is_empty() || width == 0 {
        return Err(TrainingError::Configuration("cannot fit a classifier on an empty batch".into()));
    }
    if rows.len() != width * labels.len() {
        return Err(TrainingError::Configuration(format!(
            "batch has {} values for {} labels of width {}",
            rows.len(),
            labels.len(),
            width
        )));
    }
    match *fixed {
        Some(expected) if expected != width => {
            Err(TrainingError::FeatureWidthMismatch { expected, actual: width })
        }
        Some(_) => Ok(()),
        None => {
            *fixed = Some(width);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_json_names_the_kind() {
        let model = Classifier::new(ClassifierKind::NaiveBayes, 8, 0);
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"kind\":\"naive-bayes\""));

        let back: Classifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), ClassifierKind::NaiveBayes);
    }

    #[test]
    fn test_delegation_reaches_the_forest() {
        let mut model = Classifier::new(ClassifierKind::Forest, 4, 1);
        assert_eq!(model.update_rule(), UpdateRule::GrowEnsemble);

        let rows: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let labels: Vec<Label> = (0..20).map(|i| u8::from(i >= 10)).collect();
        model.add_capacity(2);
        model.fit(&rows, 1, &labels).unwrap();
        assert_eq!(model.capacity(), 2);
        assert_eq!(model.predict(&[19.0]), 1);
    }

    #[test]
    fn test_check_batch_rejects_ragged_rows() {
        let mut fixed = None;
        assert!(matches!(
            check_batch(&[1.0, 2.0, 3.0], 2, &[0, 1], &mut fixed),
            Err(TrainingError::Configuration(_))
        ));
        assert_eq!(fixed, None);
    }
}
