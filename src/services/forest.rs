use rand::{rngs::SmallRng, seq::SliceRandom, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Anything that maps one feature row to a class probability distribution
#[cfg_attr(test, mockall::automock)]
pub trait Classifier: Send + Sync {
    /// Probability per class code; sums to 1
    fn predict_proba(&self, features: &[f64]) -> Vec<f64>;

    /// Width of the rows the classifier was fitted on
    fn n_features(&self) -> usize;

    /// Number of classes it distinguishes
    fn n_classes(&self) -> usize;
}

/// Index and value of the largest entry, first index on ties
pub fn argmax(values: &[f64]) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
}

/// Hyperparameters for [`RandomForest::fit`]
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    /// Candidate features per split; `None` means sqrt of the row width
    pub max_features: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            seed: 42,
            max_features: None,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Bagged ensemble of Gini decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fits `params.n_trees` trees in parallel, each on its own bootstrap sample
    ///
    /// `y` holds class codes in `0..n_classes`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        params: &ForestParams,
    ) -> AppResult<Self> {
        if x.is_empty() {
            return Err(AppError::Training("Cannot fit a forest on zero rows".into()));
        }
        if x.len() != y.len() {
            return Err(AppError::Training(format!(
                "Feature rows ({}) and labels ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if params.n_trees == 0 {
            return Err(AppError::Training("Forest needs at least one tree".into()));
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(AppError::Training("Feature rows differ in width".into()));
        }
        if let Some(bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(AppError::Training(format!(
                "Label {} outside 0..{}",
                bad, n_classes
            )));
        }

        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1));

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let ref mut rng = SmallRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let samples: Vec<usize> = (0..x.len()).map(|_| rng.random_range(0..x.len())).collect();
                DecisionTree::grow(x, y, samples, n_classes, max_features, params, rng)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            trees = trees.len(),
            nodes = trees.iter().map(|t| t.nodes.len()).sum::<usize>(),
            "Forest fitted"
        );

        Ok(Self {
            n_features,
            n_classes,
            trees,
        })
    }

    /// Most probable class code and its probability
    pub fn predict(&self, features: &[f64]) -> (usize, f64) {
        argmax(&self.predict_proba(features))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut total = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (sum, p) in total.iter_mut().zip(tree.leaf(features)) {
                *sum += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        total.iter_mut().for_each(|p| *p /= n);
        total
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionTree {
    /// Arena; the root is node 0
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    fn grow(
        x: &[Vec<f64>],
        y: &[usize],
        samples: Vec<usize>,
        n_classes: usize,
        max_features: usize,
        params: &ForestParams,
        rng: &mut SmallRng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            distribution: Vec::new(),
        }];
        let mut pending = vec![(0usize, samples, 0usize)];

        while let Some((id, samples, depth)) = pending.pop() {
            let counts = class_counts(y, &samples, n_classes);
            let splittable = samples.len() >= params.min_samples_split
                && counts.iter().filter(|&&c| c > 0).count() > 1
                && params.max_depth.map_or(true, |max| depth < max);

            let split = if splittable {
                best_split(x, y, &samples, n_classes, max_features, rng)
            } else {
                None
            };

            let children = split.and_then(|split| {
                let (left, right): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .partition(|&&i| x[i][split.feature] <= split.threshold);
                (!left.is_empty() && !right.is_empty()).then_some((split, left, right))
            });

            match children {
                Some((split, left, right)) => {
                    let left_id = nodes.len();
                    let right_id = left_id + 1;
                    nodes.push(Node::Leaf {
                        distribution: Vec::new(),
                    });
                    nodes.push(Node::Leaf {
                        distribution: Vec::new(),
                    });
                    nodes[id] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left: left_id,
                        right: right_id,
                    };
                    pending.push((left_id, left, depth + 1));
                    pending.push((right_id, right, depth + 1));
                }
                None => {
                    let n = samples.len().max(1) as f64;
                    nodes[id] = Node::Leaf {
                        distribution: counts.iter().map(|&c| c as f64 / n).collect(),
                    };
                }
            }
        }

        Self { nodes }
    }

    fn leaf(&self, features: &[f64]) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    id = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn class_counts(y: &[usize], samples: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &i in samples {
        counts[y[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| (c as f64 / total).powi(2))
        .sum::<f64>()
}

/// Threshold strictly between two adjacent sorted values
///
/// Falls back to `value` when the midpoint rounds up to `next` or is not
/// finite, so `<= threshold` always separates the two.
fn midpoint(value: f64, next: f64) -> f64 {
    let mid = value / 2.0 + next / 2.0;
    if mid.is_finite() && mid >= value && mid < next {
        mid
    } else {
        value
    }
}

/// Lowest weighted Gini split over a random subset of features
///
/// Keeps drawing features past `max_features` while none of the drawn ones
/// could separate the samples.
fn best_split(
    x: &[Vec<f64>],
    y: &[usize],
    samples: &[usize],
    n_classes: usize,
    max_features: usize,
    rng: &mut SmallRng,
) -> Option<SplitCandidate> {
    let mut features: Vec<usize> = (0..x[samples[0]].len()).collect();
    features.shuffle(rng);

    let mut best: Option<SplitCandidate> = None;
    let mut visited = 0;

    for feature in features {
        if visited >= max_features && best.is_some() {
            break;
        }

        let mut column: Vec<(f64, usize)> = samples.iter().map(|&i| (x[i][feature], y[i])).collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));
        if column[0].0.total_cmp(&column[column.len() - 1].0).is_eq() {
            continue;
        }
        visited += 1;

        let total = column.len();
        let mut left = vec![0usize; n_classes];
        let mut right = class_counts(y, samples, n_classes);

        for k in 0..total - 1 {
            let (value, label) = column[k];
            left[label] += 1;
            right[label] -= 1;

            let next = column[k + 1].0;
            if value.total_cmp(&next).is_eq() {
                continue;
            }

            let n_left = k + 1;
            let n_right = total - n_left;
            let impurity = n_left as f64 * gini(&left, n_left) + n_right as f64 * gini(&right, n_right);

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: midpoint(value, next),
                    impurity,
                });
            }
        }
    }

    best
}
