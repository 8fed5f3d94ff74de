// ============================================================
// Layer 5: Random Forest (ensemble growth)
// ============================================================
// Bagged CART trees. The forest grows in steps:
//
//   add_capacity(10)   target 0 → 10
//   fit(batch A)       trains trees 0..10 on A
//   add_capacity(10)   target 10 → 20
//   fit(batch B)       trains trees 10..20 on B, 0..10 untouched
//
// Every tree draws its own bootstrap sample and its own feature
// subsets from a generator seeded by (forest seed, tree index), so
// a run is reproducible regardless of how rows were batched.
//
// Reference: Breiman (2001) Random Forests

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{
    error::TrainingError,
    feature_shard::Label,
    traits::{ClassifierModel, UpdateRule},
};
use crate::ml::classifier::{
    check_batch,
    tree::{DecisionTree, TreeParams},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    target_trees: usize,
    max_depth:    usize,
    seed:         u64,
    width:        Option<usize>,
    trees:        Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(max_depth: usize, seed: u64) -> Self {
        Self { target_trees: 0, max_depth, seed, width: None, trees: Vec::new() }
    }

    pub fn trained_trees(&self) -> usize {
        self.trees.len()
    }

    fn tree_rng(&self, tree: usize) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed ^ (tree as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl ClassifierModel for RandomForest {
    fn name(&self) -> &'static str {
        "random-forest"
    }

    fn update_rule(&self) -> UpdateRule {
        UpdateRule::GrowEnsemble
    }

    fn capacity(&self) -> usize {
        self.target_trees
    }

    fn add_capacity(&mut self, additional: usize) {
        self.target_trees += additional;
    }

    /// Train the trees added since the last fit on this batch.
    fn fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError> {
        check_batch(rows, width, labels, &mut self.width)?;

        let n = labels.len();
        let params = TreeParams {
            max_depth:    self.max_depth,
            max_features: ((width as f64).sqrt() as usize).max(1),
        };

        for t in self.trees.len()..self.target_trees {
            let mut rng = self.tree_rng(t);
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            self.trees.push(DecisionTree::fit(rows, width, labels, sample, params, &mut rng));
        }

        tracing::debug!("Forest now holds {} trees ({} rows in last fit)", self.trees.len(), n);
        Ok(())
    }

    /// Same as `fit`: a forest only learns through new trees.
    fn partial_fit(&mut self, rows: &[f32], width: usize, labels: &[Label]) -> Result<(), TrainingError> {
        self.fit(rows, width, labels)
    }

    /// Mean leaf share over all trees; 0.5 before any tree exists.
    fn predict_proba(&self, row: &[f32]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        self.trees.iter().map(|t| t.predict_proba(row)).sum::<f64>() / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Positive iff the first feature exceeds 0.5.
    fn batch(n: usize, offset: usize) -> (Vec<f32>, Vec<Label>) {
        let mut rows = Vec::with_capacity(n * 2);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let x = ((i + offset) % 10) as f32 / 10.0 + 0.05;
            rows.extend([x, (i % 3) as f32]);
            labels.push(Label::from(x > 0.5));
        }
        (rows, labels)
    }

    #[test]
    fn test_growth_keeps_existing_trees() {
        let mut forest = RandomForest::new(6, 7);
        let (rows, labels) = batch(40, 0);

        forest.add_capacity(3);
        forest.fit(&rows, 2, &labels).unwrap();
        let first = forest.trees.clone();

        forest.add_capacity(2);
        let (rows, labels) = batch(40, 3);
        forest.fit(&rows, 2, &labels).unwrap();

        assert_eq!(forest.capacity(), 5);
        assert_eq!(forest.trained_trees(), 5);
        assert_eq!(&forest.trees[..3], first.as_slice());
    }

    #[test]
    fn test_learns_threshold() {
        let mut forest = RandomForest::new(6, 11);
        forest.add_capacity(10);
        let (rows, labels) = batch(100, 0);
        forest.fit(&rows, 2, &labels).unwrap();

        assert_eq!(forest.predict(&[0.95, 1.0]), 1);
        assert_eq!(forest.predict(&[0.05, 1.0]), 0);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (rows, labels) = batch(30, 0);
        let mut a = RandomForest::new(4, 3);
        let mut b = RandomForest::new(4, 3);
        a.add_capacity(4);
        b.add_capacity(4);
        a.fit(&rows, 2, &labels).unwrap();
        b.fit(&rows, 2, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_width_is_fixed_by_first_fit() {
        let mut forest = RandomForest::new(4, 3);
        forest.add_capacity(1);
        let (rows, labels) = batch(10, 0);
        forest.fit(&rows, 2, &labels).unwrap();

        forest.add_capacity(1);
        let err = forest.fit(&[0.0, 1.0, 2.0], 3, &[0]).unwrap_err();
        assert!(matches!(err, TrainingError::FeatureWidthMismatch { expected: 2, actual: 3 }));
    }
}
