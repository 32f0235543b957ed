//! Random forest regressor built from bagged CART regression trees.
//!
//! Each tree is grown on a bootstrap resample of the training rows, splitting
//! on the threshold that minimises the summed squared error of the two
//! children across all features. Trees are fitted in parallel with rayon and
//! each draws from its own seeded RNG, so a forest is reproducible for a given
//! seed regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FeatureRow, ThrustPredictor, N_FEATURES};

/// Forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// `None` grows each tree until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// Errors raised while fitting a forest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
    #[error("feature rows ({rows}) and targets ({targets}) differ in length")]
    LengthMismatch { rows: usize, targets: usize },
    #[error("n_estimators must be at least 1")]
    NoEstimators,
    #[error("min_samples_split must be at least 2, got {0}")]
    MinSamplesSplit(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART regression tree stored as a flat node arena (root at 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    x: &'a [FeatureRow],
    y: &'a [f64],
    max_depth: Option<usize>,
    min_samples_split: usize,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `indices` (duplicates allowed).
    fn fit(
        x: &[FeatureRow],
        y: &[f64],
        indices: Vec<usize>,
        max_depth: Option<usize>,
        min_samples_split: usize,
    ) -> Self {
        let mut builder = TreeBuilder {
            x,
            y,
            max_depth,
            min_samples_split,
            nodes: Vec::new(),
        };
        builder.grow(indices, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict(&self, row: &FeatureRow) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Depth of the deepest leaf (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

impl TreeBuilder<'_> {
    /// Append the subtree for `indices` and return its root position.
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let n = indices.len();
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let v = self.y[i];
            (s + v, sq + v * v)
        });
        let mean = sum / n as f64;
        let parent_sse = sum_sq - sum * sum / n as f64;

        let depth_exhausted = self.max_depth.is_some_and(|max| depth >= max);
        if n < self.min_samples_split || depth_exhausted || parent_sse <= f64::EPSILON {
            return self.push(Node::Leaf { value: mean });
        }

        let Some(split) = self.best_split(&indices, sum, sum_sq) else {
            return self.push(Node::Leaf { value: mean });
        };
        if split.sse >= parent_sse {
            return self.push(Node::Leaf { value: mean });
        }

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][split.feature] <= split.threshold);

        // Reserve the slot so children land after their parent.
        let at = self.push(Node::Leaf { value: mean });
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[at] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        at
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn best_split(&self, indices: &[usize], total_sum: f64, total_sq: f64) -> Option<SplitCandidate> {
        let n = indices.len();
        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature in 0..N_FEATURES {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let v = self.y[order[pos]];
                left_sum += v;
                left_sq += v * v;

                let here = self.x[order[pos]][feature];
                let next = self.x[order[pos + 1]][feature];
                if next <= here {
                    continue;
                }

                let n_left = (pos + 1) as f64;
                let n_right = (n - pos - 1) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left)
                    + (right_sq - right_sum * right_sum / n_right);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }
}

/// Bagged ensemble of regression trees; predictions are the tree average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(x: &[FeatureRow], y: &[f64], params: ForestParams) -> Result<Self, ForestError> {
        if x.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ForestError::LengthMismatch {
                rows: x.len(),
                targets: y.len(),
            });
        }
        if params.n_estimators == 0 {
            return Err(ForestError::NoEstimators);
        }
        if params.min_samples_split < 2 {
            return Err(ForestError::MinSamplesSplit(params.min_samples_split));
        }

        let n = x.len();
        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, t));
                let bootstrap = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, bootstrap, params.max_depth, params.min_samples_split)
            })
            .collect();

        Ok(Self { params, trees })
    }

    pub fn predict_one(&self, row: &FeatureRow) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn predict(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_one(r)).collect()
    }

    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
    }
}

impl ThrustPredictor for RandomForest {
    fn predict_thrust(&self, features: &FeatureRow) -> f64 {
        self.predict_one(features)
    }
}

/// Decorrelate per-tree seeds derived from one forest seed.
const fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(tree as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_engine::dataset::generate_data;

    fn step_data() -> (Vec<FeatureRow>, Vec<f64>) {
        let x: Vec<FeatureRow> = (0..20).map(|i| [f64::from(i), 0.0, 0.0, 0.0]).collect();
        let y = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_tree_learns_step_function() {
        let (x, y) = step_data();
        let tree = RegressionTree::fit(&x, &y, (0..x.len()).collect(), None, 2);
        assert_eq!(tree.predict(&[3.0, 0.0, 0.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[15.0, 0.0, 0.0, 0.0]), 5.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_tree_respects_max_depth() {
        let data = generate_data(1, 200);
        let tree = RegressionTree::fit(
            &data.features(),
            &data.targets(),
            (0..data.len()).collect(),
            Some(3),
            2,
        );
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x: Vec<FeatureRow> = (0..10).map(|i| [f64::from(i), 1.0, 2.0, 3.0]).collect();
        let y = vec![7.5; 10];
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), None, 2);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&[100.0, 0.0, 0.0, 0.0]), 7.5);
    }

    #[test]
    fn test_forest_is_reproducible() {
        let data = generate_data(42, 150);
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(&data.features(), &data.targets(), params).unwrap();
        let b = RandomForest::fit(&data.features(), &data.targets(), params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 10);
    }

    #[test]
    fn test_forest_predictions_stay_within_target_range() {
        let data = generate_data(42, 200);
        let targets = data.targets();
        let forest = RandomForest::fit(
            &data.features(),
            &targets,
            ForestParams {
                n_estimators: 20,
                ..ForestParams::default()
            },
        )
        .unwrap();

        let lo = targets.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = targets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let p = forest.predict_one(&[3.5, 5.0, 3000.0, 300.0]);
        assert!(p >= lo && p <= hi);
    }

    #[test]
    fn test_fit_rejects_bad_inputs() {
        let (x, y) = step_data();
        assert_eq!(
            RandomForest::fit(&[], &[], ForestParams::default()),
            Err(ForestError::EmptyTrainingSet)
        );
        assert_eq!(
            RandomForest::fit(&x, &y[..5], ForestParams::default()),
            Err(ForestError::LengthMismatch { rows: 20, targets: 5 })
        );
        let no_trees = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        assert_eq!(RandomForest::fit(&x, &y, no_trees), Err(ForestError::NoEstimators));
        let bad_split = ForestParams {
            min_samples_split: 1,
            ..ForestParams::default()
        };
        assert_eq!(
            RandomForest::fit(&x, &y, bad_split),
            Err(ForestError::MinSamplesSplit(1))
        );
    }
}
