// ============================================================
// Layer 5: Gaussian Naive Bayes (statistics update)
// ============================================================
// Per class c and feature j the model keeps count n_c, mean μ_cj
// and population variance σ²_cj. A new batch (n', μ', σ'²) merges
// without revisiting old rows (Chan et al. parallel update):
//
//   n   = n_c + n'
//   μ   = (n_c·μ_c + n'·μ') / n
//   σ²  = (n_c·σ²_c + n'·σ'² + n_c·n'/n · (μ_c - μ')²) / n
//
// Prediction adds ε = var_smoothing · max_j var(batch_j) to every
// variance and normalises the two joint log likelihoods with
// log-sum-exp.
//
// Reference: Chan, Golub & LeVeque (1979) Updating formulae for
//            sample variances

use serde::{Deserialize, Serialize};

use crate::domain::{
    error::TrainingError,
    feature_shard::Label,
    traits::{ClassifierModel, UpdateRule},
};
use crate::ml::classifier::check_batch;

pub const DEFAULT_VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ClassStats {
    count: f64,
    mean:  Vec<f64>,
    var:   Vec<f64>,
}

impl ClassStats {
    fn merge(&mut self, count: f64, mean: &[f64], var: &[f64]) {
        if count == 0.0 {
            return;
        }
        if self.count == 0.0 {
            *self = Self { count, mean: mean.to_vec(), var: var.to_vec() };
            return;
        }

        let total = self.count + count;
        for j in 0..self.mean.len() {
            let delta = self.mean[j] - mean[j];
            let ssd = self.count * self.var[j] + count * var[j] + self.count * count / total * delta * delta;
            self.mean[j] = (self.count * self.mean[j] + count * mean[j]) / total;
            self.var[j]  = ssd / total;
        }
        self.count = total;
    }

    fn log_likelihood(&self, row: &[f32], epsilon: f64) -> f64 {
        self.mean
            .iter()
            .zip(&self.var)
            .zip(row)
            .map(|((&mu, &var), &x)| {
                let var = var + epsilon;
                let d = x as f64 - mu;
                -0.5 * (2.0 * std::f64::consts::PI * var).ln() - 0.5 * d * d / var
            })
            .sum()
    }
}

/// Column means and population variances of the rows selected by `keep`.
fn moments(rows: &[f32], width: usize, keep: impl Fn(usize) -> bool) -> (f64, Vec<f64>, Vec<f64>) {
    let mut n    = 0.0;
    let mut mean = vec![0.0; width];
    let mut m2   = vec![0.0; width];

    let selected = rows.chunks_exact(width).enumerate().filter(|(i, _)| keep(*i)).map(|(_, r)| r);
    for row in selected {
        n += 1.0;
        for (j, &x) in row.iter().enumerate() {
            let x = x as f64;
            let delta = x - mean[j];
            mean[j] += delta / n;
            m2[j] += delta * (x - mean[j]);
        }
    }

    let var = if n > 0.0 { m2.iter().map(|s| s / n).collect() } else { m2 };
    (n, mean, var)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    var_smoothing: f64,
    epsilon:       f64,
    width:         Option<usize>,
    /// [negative, positive]
    classes:       [ClassStats; 2],
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new(DEFAULT_VAR_SMOOTHING)
    }
}

impl GaussianNaiveBayes {
    pub fn new(var_smoothing: f64) -> Self {
        Self {
            var_smoothing,
            epsilon: 0.0,
            width: None,
            classes: [ClassStats::default(), ClassStats::default()],
        }
    }

    /// Rows absorbed per class: (negative, positive).
    pub fn class_counts(&self) -> (usize, usize) {
        (self.classes[0].count as usize, self.classes[1].count as usize)
    }
}

impl ClassifierModel for GaussianNaiveBayes {
    fn name(&self) -> &'static str {
        "gaussian-naive-bayes"
    }

    fn update_rule(&self) -> UpdateRule {
        UpdateRule::PartialFit
    }

    fn capacity(&self) -> usize {
        usize::from(self.classes.iter().any(|c| c.count > 0.0))
    }

    /// Discard all statistics and fit on this batch alone.
    fn fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError> {
        let fixed_width = self.width;
        *self = Self::new(self.var_smoothing);
        self.width = fixed_width;
        self.partial_fit(rows, width, labels)
    }

    fn partial_fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError> {
        check_batch(rows, width, labels, &mut self.width)?;

        let (_, _, all_var) = moments(rows, width, |_| true);
        self.epsilon = self.var_smoothing * all_var.iter().copied().fold(0.0, f64::max);

        for (c, class) in self.classes.iter_mut().enumerate() {
            let (n, mean, var) = moments(rows, width, |i| labels[i] as usize == c);
            class.merge(n, &mean, &var);
        }

        tracing::debug!(
            "Naive Bayes absorbed {} rows, totals {:?}",
            labels.len(),
            self.class_counts()
        );
        Ok(())
    }

    fn predict_proba(&self, row: &[f32]) -> f64 {
        let [neg, pos] = &self.classes;
        match (neg.count > 0.0, pos.count > 0.0) {
            (false, false) => 0.5,
            (true, false) => 0.0,
            (false, true) => 1.0,
            (true, true) => {
                let total = neg.count + pos.count;
                let jll_neg = (neg.count / total).ln() + neg.log_likelihood(row, self.epsilon);
                let jll_pos = (pos.count / total).ln() + pos.log_likelihood(row, self.epsilon);
                let max = jll_neg.max(jll_pos);
                let lse = max + ((jll_neg - max).exp() + (jll_pos - max).exp()).ln();
                (jll_pos - lse).exp()
            }
        }
    }
}
