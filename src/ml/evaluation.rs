// ============================================================
// Layer 5: Classifier Evaluation
// ============================================================
// Scores a trained classifier against held-out feature shards,
// per shard and over all rows together:
//
//   confusion matrix  TN FP FN TP at threshold 0.5
//   F1                2TP / (2TP + FP + FN)
//   ROC AUC           Mann-Whitney U with average ranks for ties
//   AP                Σ (R_k - R_{k-1}) · P_k over distinct scores
//
// F1, AUC and AP are only defined when both classes occur in the
// scored rows; otherwise they are None.

use crate::domain::{
    error::TrainingError,
    feature_shard::{Label, POSITIVE},
    traits::{ClassifierModel, FeatureShardSource},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tn:  usize,
    pub fp:  usize,
    pub fn_: usize,
    pub tp:  usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(labels: &[Label], predicted: impl IntoIterator<Item = Label>) -> Self {
        let mut m = Self::default();
        for (&truth, guess) in labels.iter().zip(predicted) {
            match (truth == POSITIVE, guess == POSITIVE) {
                (false, false) => m.tn += 1,
                (false, true) => m.fp += 1,
                (true, false) => m.fn_ += 1,
                (true, true) => m.tp += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn f1(&self) -> f64 {
        let denom = 2 * self.tp + self.fp + self.fn_;
        if denom == 0 { 0.0 } else { 2.0 * self.tp as f64 / denom as f64 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeEvaluation {
    /// Shard source name, or "overall"
    pub scope:             String,
    pub matrix:            ConfusionMatrix,
    pub f1:                Option<f64>,
    pub roc_auc:           Option<f64>,
    pub average_precision: Option<f64>,
}

impl ScopeEvaluation {
    fn score(scope: impl Into<String>, labels: &[Label], probas: &[f64]) -> Self {
        let matrix = ConfusionMatrix::from_predictions(
            labels,
            probas.iter().map(|&p| Label::from(p >= 0.5)),
        );
        let both = has_both_classes(labels);
        Self {
            scope: scope.into(),
            matrix,
            f1: both.then(|| matrix.f1()),
            roc_auc: roc_auc(labels, probas),
            average_precision: average_precision(labels, probas),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub shards:  Vec<ScopeEvaluation>,
    pub overall: ScopeEvaluation,
}

fn has_both_classes(labels: &[Label]) -> bool {
    labels.contains(&POSITIVE) && labels.iter().any(|&l| l != POSITIVE)
}

/// Evaluate `model` on every shard of `shards`.
pub fn evaluate<M, S>(model: &M, shards: &S) -> Result<EvaluationReport, TrainingError>
where
    M: ClassifierModel + ?Sized,
    S: FeatureShardSource + ?Sized,
{
    let mut all_labels = Vec::new();
    let mut all_probas = Vec::new();
    let mut per_shard = Vec::with_capacity(shards.shard_count());

    for i in 0..shards.shard_count() {
        let shard = shards.load_shard(i)?;
        let probas: Vec<f64> = (0..shard.rows()).map(|r| model.predict_proba(shard.row(r))).collect();

        let eval = ScopeEvaluation::score(shard.source.clone(), shard.labels(), &probas);
        tracing::debug!("{}: {:?}", eval.scope, eval.matrix);
        per_shard.push(eval);

        all_labels.extend_from_slice(shard.labels());
        all_probas.extend(probas);
    }

    Ok(EvaluationReport {
        shards:  per_shard,
        overall: ScopeEvaluation::score("overall", &all_labels, &all_probas),
    })
}

/// Area under the ROC curve, or None for a single-class sample.
pub fn roc_auc(labels: &[Label], scores: &[f64]) -> Option<f64> {
    if !has_both_classes(labels) {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Average 1-based rank per tie group
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = avg;
        }
        start = end;
    }

    let n_pos = labels.iter().filter(|&&l| l == POSITIVE).count() as f64;
    let n_neg = labels.len() as f64 - n_pos;
    let rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == POSITIVE)
        .map(|(_, &r)| r)
        .sum();

    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Average precision (area under the step precision-recall curve),
/// or None for a single-class sample.
pub fn average_precision(labels: &[Label], scores: &[f64]) -> Option<f64> {
    if !has_both_classes(labels) {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let n_pos = labels.iter().filter(|&&l| l == POSITIVE).count() as f64;
    let (mut tp, mut fp) = (0.0, 0.0);
    let mut prev_recall = 0.0;
    let mut ap = 0.0;

    let mut k = 0;
    while k < order.len() {
        // Consume one whole tie group before taking a point on the curve
        let threshold = scores[order[k]];
        while k < order.len() && scores[order[k]] == threshold {
            if labels[order[k]] == POSITIVE { tp += 1.0 } else { fp += 1.0 }
            k += 1;
        }
        let recall = tp / n_pos;
        let precision = tp / (tp + fp);
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    Some(ap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_shard::FeatureShard;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let m = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], [0, 1, 0, 1, 1]);
        assert_eq!(m, ConfusionMatrix { tn: 1, fp: 1, fn_: 1, tp: 2 });
        assert_eq!(m.total(), 5);
        assert!((m.f1() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_known_values() {
        // Classic example: 0.75
        assert!(close(roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]), 0.75));
        // Perfect ranking
        assert!(close(roc_auc(&[0, 1], &[0.2, 0.9]), 1.0));
        // All tied → chance
        assert!(close(roc_auc(&[0, 1, 0, 1], &[0.5; 4]), 0.5));
    }

    #[test]
    fn test_average_precision_known_value() {
        // Descending: 0.8(+) 0.4(-) 0.35(+) 0.1(-)
        // AP = 0.5·1 + 0.5·(2/3)
        let ap = average_precision(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]);
        assert!(close(ap, 0.5 + 1.0 / 3.0));
    }

    #[test]
    fn test_single_class_metrics_are_undefined() {
        assert_eq!(roc_auc(&[0, 0], &[0.1, 0.2]), None);
        assert_eq!(average_precision(&[1, 1], &[0.1, 0.2]), None);
    }

    /// Predicts the first feature value as the probability.
    struct Identity;

    impl ClassifierModel for Identity {
        fn name(&self) -> &'static str {
            "identity"
        }
        fn update_rule(&self) -> crate::domain::traits::UpdateRule {
            crate::domain::traits::UpdateRule::PartialFit
        }
        fn capacity(&self) -> usize {
            1
        }
        fn fit(&mut self, _: &[f32], _: usize, _: &[Label]) -> Result<(), TrainingError> {
            Ok(())
        }
        fn partial_fit(&mut self, _: &[f32], _: usize, _: &[Label]) -> Result<(), TrainingError> {
            Ok(())
        }
        fn predict_proba(&self, row: &[f32]) -> f64 {
            row[0] as f64
        }
    }

    #[test]
    fn test_evaluate_reports_each_shard_and_overall() {
        let shards = vec![
            FeatureShard::new("a", 1, vec![0.1, 0.9], vec![0, 1]).unwrap(),
            FeatureShard::new("b", 1, vec![0.2, 0.3], vec![0, 0]).unwrap(),
        ];
        let report = evaluate(&Identity, &shards).unwrap();

        assert_eq!(report.shards.len(), 2);
        assert_eq!(report.shards[0].f1, Some(1.0));
        assert_eq!(report.shards[1].roc_auc, None);
        assert_eq!(report.overall.scope, "overall");
        assert_eq!(report.overall.matrix, ConfusionMatrix { tn: 3, fp: 0, fn_: 0, tp: 1 });
        assert!(close(report.overall.roc_auc, 1.0));
    }
}
