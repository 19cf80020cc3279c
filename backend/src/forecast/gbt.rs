//! Gradient-boosted regression trees (squared error).
//!
//! Each round fits a depth-limited CART tree to the current residuals and adds
//! it to the ensemble scaled by the learning rate. Fitting is deterministic:
//! no row or column subsampling, ties broken by first-found split.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};

/// Ensemble hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            rounds: 100,
            max_depth: 4,
            learning_rate: 0.1,
            min_samples_leaf: 1,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.rounds == 0 {
            return Err(AnalyticsError::invalid_parameter("rounds must be >= 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(AnalyticsError::invalid_parameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(AnalyticsError::invalid_parameter(
                "min_samples_leaf must be >= 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
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

/// Single CART regression tree stored as a flat node arena.
#[derive(Debug, Clone, PartialEq)]
struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl RegressionTree {
    fn fit<R: AsRef<[f64]>>(
        rows: &[R],
        targets: &[f64],
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..targets.len()).collect();
        tree.grow(rows, targets, indices, 0, max_depth, min_samples_leaf);
        tree
    }

    fn grow<R: AsRef<[f64]>>(
        &mut self,
        rows: &[R],
        targets: &[f64],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> usize {
        let slot = self.nodes.len();
        let mean = mean_of(targets, &indices);
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= max_depth || indices.len() < 2 * min_samples_leaf {
            return slot;
        }

        let Some(split) = best_split(rows, targets, &indices, min_samples_leaf) else {
            return slot;
        };

        let left = self.grow(rows, targets, split.left, depth + 1, max_depth, min_samples_leaf);
        let right = self.grow(rows, targets, split.right, depth + 1, max_depth, min_samples_leaf);
        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn mean_of(targets: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

/// Best variance-reducing split over all features, if any improves the node.
fn best_split<R: AsRef<[f64]>>(
    rows: &[R],
    targets: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let parent_score = total_sum * total_sum / n as f64;
    let width = rows[indices[0]].as_ref().len();

    let mut best: Option<(usize, f64, f64)> = None;
    let mut order = indices.to_vec();

    for feature in 0..width {
        order.sort_by(|&a, &b| {
            rows[a].as_ref()[feature]
                .partial_cmp(&rows[b].as_ref()[feature])
                .unwrap_or(Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += targets[order[pos]];
            let left_count = pos + 1;
            let right_count = n - left_count;
            if left_count < min_samples_leaf || right_count < min_samples_leaf {
                continue;
            }

            let here = rows[order[pos]].as_ref()[feature];
            let next = rows[order[pos + 1]].as_ref()[feature];
            if here >= next {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let score = left_sum * left_sum / left_count as f64
                + right_sum * right_sum / right_count as f64;
            let gain = score - parent_score;
            if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                best = Some((feature, (here + next) / 2.0, gain));
            }
        }
    }

    let (feature, threshold, _) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| rows[i].as_ref()[feature] <= threshold);

    Some(SplitCandidate {
        feature,
        threshold,
        left,
        right,
    })
}

/// Additive tree ensemble on top of a constant base score.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedTrees {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Fit the ensemble. Rows must all have the same width and be finite.
    pub fn fit<R: AsRef<[f64]>>(
        rows: &[R],
        targets: &[f64],
        params: &BoostingParams,
    ) -> AnalyticsResult<Self> {
        params.validate()?;
        if rows.len() != targets.len() {
            return Err(AnalyticsError::ShapeMismatch {
                what: "boosting targets",
                expected: rows.len(),
                actual: targets.len(),
            });
        }
        if rows.is_empty() {
            return Err(AnalyticsError::invalid_parameter(
                "cannot fit an ensemble on zero rows",
            ));
        }
        validate_rows(rows)?;
        if let Some(row) = targets.iter().position(|t| !t.is_finite()) {
            return Err(AnalyticsError::NonFiniteInput {
                what: "targets",
                row,
            });
        }

        let base_score = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![base_score; targets.len()];
        let mut residuals = vec![0.0; targets.len()];
        let mut trees = Vec::with_capacity(params.rounds);

        for _ in 0..params.rounds {
            for (i, residual) in residuals.iter_mut().enumerate() {
                *residual = targets[i] - predictions[i];
            }
            let tree = RegressionTree::fit(
                rows,
                &residuals,
                params.max_depth,
                params.min_samples_leaf,
            );
            for (i, prediction) in predictions.iter_mut().enumerate() {
                *prediction += params.learning_rate * tree.predict(rows[i].as_ref());
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|tree| self.learning_rate * tree.predict(row))
                .sum::<f64>()
    }

    pub fn predict<R: AsRef<[f64]>>(&self, rows: &[R]) -> AnalyticsResult<Vec<f64>> {
        validate_rows(rows)?;
        Ok(rows.iter().map(|r| self.predict_row(r.as_ref())).collect())
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Total number of internal split nodes across all trees.
    pub fn num_splits(&self) -> usize {
        self.trees
            .iter()
            .map(|t| {
                t.nodes
                    .iter()
                    .filter(|n| matches!(n, Node::Split { .. }))
                    .count()
            })
            .sum()
    }
}

fn validate_rows<R: AsRef<[f64]>>(rows: &[R]) -> AnalyticsResult<()> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    let width = first.as_ref().len();
    for (i, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != width {
            return Err(AnalyticsError::ShapeMismatch {
                what: "feature row width",
                expected: width,
                actual: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::NonFiniteInput {
                what: "features",
                row: i,
            });
        }
    }
    Ok(())
}
