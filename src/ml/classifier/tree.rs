// ============================================================
// Layer 5: CART Decision Tree
// ============================================================
// One member of the random forest. Binary Gini splits on a random
// subset of features at every node:
//
//   gini(S)  = 1 - p² - (1 - p)²      p = positive share of S
//   cost     = |L|·gini(L) + |R|·gini(R)
//
// A node becomes a leaf when it is pure, when it reaches max_depth,
// when it has fewer than MIN_SAMPLES_SPLIT rows, or when no split
// lowers the cost. Leaves store the positive share of their rows.
//
// Nodes live in a flat Vec and refer to children by index, which
// keeps the tree trivially serialisable.
//
// Reference: Breiman et al. (1984) Classification and Regression Trees

use rand::{seq::index, Rng};
use serde::{Deserialize, Serialize};

use crate::domain::feature_shard::{Label, POSITIVE};

pub const MIN_SAMPLES_SPLIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf { proba: f64 },
    Split { feature: usize, threshold: f32, left: usize, right: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth:    usize,
    /// Features considered per split
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Borrowed training data shared by every recursive call.
struct Training<'a> {
    rows:   &'a [f32],
    width:  usize,
    labels: &'a [Label],
    params: TreeParams,
}

impl Training<'_> {
    fn value(&self, i: usize, feature: usize) -> f32 {
        self.rows[i * self.width + feature]
    }

    fn positives(&self, sample: &[usize]) -> usize {
        sample.iter().filter(|&&i| self.labels[i] == POSITIVE).count()
    }
}

fn gini_cost(n: usize, positives: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    n as f64 * (1.0 - p * p - (1.0 - p) * (1.0 - p))
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `sample` (indices may repeat).
    ///
    /// # Panics
    /// Panics if `sample` is empty.
    pub fn fit<R: Rng + ?Sized>(
        rows:   &[f32],
        width:  usize,
        labels: &[Label],
        sample: Vec<usize>,
        params: TreeParams,
        rng:    &mut R,
    ) -> Self {
        assert!(!sample.is_empty(), "cannot grow a tree on zero rows");
        let data = Training { rows, width, labels, params };
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(&data, sample, 0, rng);
        tree
    }

    fn grow<R: Rng + ?Sized>(
        &mut self,
        data:   &Training<'_>,
        sample: Vec<usize>,
        depth:  usize,
        rng:    &mut R,
    ) -> usize {
        let n = sample.len();
        let positives = data.positives(&sample);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { proba: positives as f64 / n as f64 });

        let pure = positives == 0 || positives == n;
        if pure || depth >= data.params.max_depth || n < MIN_SAMPLES_SPLIT {
            return id;
        }

        let Some((feature, threshold)) = Self::best_split(data, &sample, positives, rng) else {
            return id;
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            sample.into_iter().partition(|&i| data.value(i, feature) <= threshold);

        let left  = self.grow(data, left, depth + 1, rng);
        let right = self.grow(data, right, depth + 1, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    fn best_split<R: Rng + ?Sized>(
        data:      &Training<'_>,
        sample:    &[usize],
        positives: usize,
        rng:       &mut R,
    ) -> Option<(usize, f32)> {
        let n = sample.len();
        let k = data.params.max_features.clamp(1, data.width);
        let mut best_cost = gini_cost(n, positives) - 1e-12;
        let mut best: Option<(usize, f32)> = None;

        let mut order = sample.to_vec();
        for feature in index::sample(rng, data.width, k).into_iter() {
            order.sort_by(|&a, &b| data.value(a, feature).total_cmp(&data.value(b, feature)));

            let mut left_n   = 0usize;
            let mut left_pos = 0usize;
            for w in order.windows(2) {
                left_n += 1;
                if data.labels[w[0]] == POSITIVE {
                    left_pos += 1;
                }

                let (lo, hi) = (data.value(w[0], feature), data.value(w[1], feature));
                if lo == hi {
                    continue;
                }

                let cost = gini_cost(left_n, left_pos) + gini_cost(n - left_n, positives - left_pos);
                if cost < best_cost {
                    best_cost = cost;
                    let mid = lo + (hi - lo) / 2.0;
                    // Midpoint can round up to `hi` for adjacent floats
                    best = Some((feature, if mid < hi { mid } else { lo }));
                }
            }
        }
        best
    }

    pub fn predict_proba(&self, row: &[f32]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { proba } => return *proba,
                Node::Split { feature, threshold, left, right } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
