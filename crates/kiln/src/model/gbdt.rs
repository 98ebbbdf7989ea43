//! Gradient-boosted regression trees.
//!
//! Regression uses squared loss; classification uses a softmax over one
//! additive model per class with Newton leaf steps. Both learners accept
//! per-sample weights so class rebalancing can be applied before fitting.

use serde::{Deserialize, Serialize};

use crate::error::{KilnError, Result};

/// Hyper-parameters shared by both learners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    /// Number of boosting rounds.
    pub n_estimators: usize,
    /// Shrinkage applied to every tree.
    pub learning_rate: f64,
    /// Maximum depth of each tree.
    pub max_depth: usize,
    /// Minimum number of samples in a leaf.
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree stored as a flat node arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Evaluate the tree. Missing features (NaN) follow the right branch.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Inputs for growing one tree: the fitted signal and the Newton denominator.
struct TreeTarget<'a> {
    gradient: &'a [f64],
    hessian: &'a [f64],
    weights: &'a [f64],
    /// Scale applied to every leaf value.
    leaf_scale: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    params: &'a BoostingParams,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn build(x: &'a [Vec<f64>], params: &'a BoostingParams, target: &TreeTarget<'_>) -> Tree {
        let mut builder = Self {
            x,
            params,
            nodes: Vec::new(),
        };
        let indices: Vec<usize> = (0..x.len()).collect();
        builder.grow(&indices, 0, target);
        Tree {
            nodes: builder.nodes,
        }
    }

    fn leaf_value(indices: &[usize], target: &TreeTarget<'_>) -> f64 {
        let (num, den) = indices.iter().fold((0.0, 0.0), |(n, d), &i| {
            (
                n + target.weights[i] * target.gradient[i],
                d + target.weights[i] * target.hessian[i],
            )
        });
        if den.abs() < 1e-12 {
            0.0
        } else {
            target.leaf_scale * num / den
        }
    }

    fn grow(&mut self, indices: &[usize], depth: usize, target: &TreeTarget<'_>) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf(Self::leaf_value(indices, target)));

        if depth >= self.params.max_depth || indices.len() < 2 * self.params.min_samples_leaf.max(1) {
            return node_id;
        }

        let Some((feature, threshold)) = self.best_split(indices, target) else {
            return node_id;
        };
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][feature] <= threshold);

        let left = self.grow(&left_idx, depth + 1, target);
        let right = self.grow(&right_idx, depth + 1, target);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    /// Exact greedy split maximising the weighted squared-gradient gain.
    fn best_split(&self, indices: &[usize], target: &TreeTarget<'_>) -> Option<(usize, f64)> {
        let n_features = self.x.first().map_or(0, Vec::len);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let score = |g: f64, h: f64| if h > 1e-12 { g * g / h } else { 0.0 };

        let (g_total, h_total) = indices.iter().fold((0.0, 0.0), |(g, h), &i| {
            (
                g + target.weights[i] * target.gradient[i],
                h + target.weights[i] * target.hessian[i],
            )
        });
        let parent = score(g_total, h_total);

        let mut best: Option<(usize, f64, f64)> = None;
        for feature in 0..n_features {
            let mut sorted: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| !self.x[i][feature].is_nan())
                .collect();
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            // NaN rows always go right; count them on the right-hand side
            let (mut g_left, mut h_left) = (0.0, 0.0);
            for (pos, &i) in sorted.iter().enumerate() {
                g_left += target.weights[i] * target.gradient[i];
                h_left += target.weights[i] * target.hessian[i];

                let left_count = pos + 1;
                let right_count = indices.len() - left_count;
                if left_count < min_leaf || right_count < min_leaf {
                    continue;
                }
                let Some(&next) = sorted.get(pos + 1) else {
                    continue;
                };
                let (v, v_next) = (self.x[i][feature], self.x[next][feature]);
                if v == v_next {
                    continue;
                }

                let gain = score(g_left, h_left) + score(g_total - g_left, h_total - h_left) - parent;
                if gain > 1e-12 && best.is_none_or(|(_, _, g)| gain > g) {
                    best = Some((feature, (v + v_next) / 2.0, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

fn check_inputs(x: &[Vec<f64>], n_targets: usize, weights: &[f64]) -> Result<()> {
    if x.is_empty() {
        return Err(KilnError::ModelFit("no training rows".to_string()));
    }
    if x.len() != n_targets || x.len() != weights.len() {
        return Err(KilnError::ModelFit(format!(
            "shape mismatch: {} rows, {} targets, {} weights",
            x.len(),
            n_targets,
            weights.len()
        )));
    }
    let width = x[0].len();
    if x.iter().any(|row| row.len() != width) {
        return Err(KilnError::ModelFit("ragged feature matrix".to_string()));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        return Err(KilnError::ModelFit("invalid sample weights".to_string()));
    }
    Ok(())
}

/// Gradient-boosted regressor with squared loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtRegressor {
    init: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl GbdtRegressor {
    /// Fit on a dense feature matrix.
    pub fn fit(x: &[Vec<f64>], y: &[f64], weights: &[f64], params: &BoostingParams) -> Result<Self> {
        check_inputs(x, y.len(), weights)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(KilnError::ModelFit("non-finite regression target".to_string()));
        }

        let total_weight: f64 = weights.iter().sum();
        let init = y.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total_weight;
        let mut predictions = vec![init; y.len()];
        let hessian = vec![1.0; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residual: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();
            let tree = TreeBuilder::build(
                x,
                params,
                &TreeTarget {
                    gradient: &residual,
                    hessian: &hessian,
                    weights,
                    leaf_scale: 1.0,
                },
            );
            for (p, row) in predictions.iter_mut().zip(x) {
                *p += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    /// Predict one row.
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.init
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict(x))
                .sum::<f64>()
    }
}

/// Gradient-boosted multi-class classifier (softmax).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtClassifier {
    n_classes: usize,
    init: Vec<f64>,
    learning_rate: f64,
    /// One tree per class per round.
    rounds: Vec<Vec<Tree>>,
}

impl GbdtClassifier {
    /// Fit on class indices in `0..n_classes`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        weights: &[f64],
        params: &BoostingParams,
    ) -> Result<Self> {
        check_inputs(x, y.len(), weights)?;
        if n_classes < 2 {
            return Err(KilnError::ModelFit(format!(
                "classifier needs at least two classes, got {}",
                n_classes
            )));
        }
        if y.iter().any(|&c| c >= n_classes) {
            return Err(KilnError::ModelFit("class index out of range".to_string()));
        }

        let total_weight: f64 = weights.iter().sum();
        let mut prior = vec![0.0; n_classes];
        for (&c, w) in y.iter().zip(weights) {
            prior[c] += w;
        }
        let init: Vec<f64> = prior
            .iter()
            .map(|p| (p / total_weight).max(1e-12).ln())
            .collect();

        let n = y.len();
        let mut scores: Vec<Vec<f64>> = vec![init.clone(); n];
        let leaf_scale = (n_classes - 1) as f64 / n_classes as f64;
        let mut rounds = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let probs: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();
            let mut round = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                let gradient: Vec<f64> = (0..n)
                    .map(|i| f64::from(u8::from(y[i] == k)) - probs[i][k])
                    .collect();
                let hessian: Vec<f64> = (0..n)
                    .map(|i| (probs[i][k] * (1.0 - probs[i][k])).max(1e-6))
                    .collect();
                let tree = TreeBuilder::build(
                    x,
                    params,
                    &TreeTarget {
                        gradient: &gradient,
                        hessian: &hessian,
                        weights,
                        leaf_scale,
                    },
                );
                round.push(tree);
            }
            for (s, row) in scores.iter_mut().zip(x) {
                for (k, tree) in round.iter().enumerate() {
                    s[k] += params.learning_rate * tree.predict(row);
                }
            }
            rounds.push(round);
        }

        Ok(Self {
            n_classes,
            init,
            learning_rate: params.learning_rate,
            rounds,
        })
    }

    /// Class probabilities for one row, summing to 1.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut scores = self.init.clone();
        for round in &self.rounds {
            for (k, tree) in round.iter().enumerate() {
                scores[k] += self.learning_rate * tree.predict(x);
            }
        }
        softmax(&scores)
    }

    /// Index of the most probable class (lowest index on ties).
    pub fn predict(&self, x: &[f64]) -> usize {
        argmax(&self.predict_proba(x))
    }

    /// Number of classes.
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Position of the largest value; the first one wins ties.
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv { (i, v) } else { (bi, bv) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BoostingParams {
        BoostingParams {
            n_estimators: 30,
            learning_rate: 0.3,
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_regressor_learns_step() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let w = vec![1.0; 20];
        let model = GbdtRegressor::fit(&x, &y, &w, &small()).unwrap();
        assert!((model.predict(&[2.0]) - 1.0).abs() < 0.1);
        assert!((model.predict(&[17.0]) - 5.0).abs() < 0.1);
    }

    #[test]
    fn test_classifier_separates_classes() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![(i % 3) as f64]).collect();
        let y: Vec<usize> = (0..30).map(|i| i % 3).collect();
        let w = vec![1.0; 30];
        let model = GbdtClassifier::fit(&x, &y, 3, &w, &small()).unwrap();
        for c in 0..3 {
            assert_eq!(model.predict(&[c as f64]), c);
        }
        let p = model.predict_proba(&[1.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_feature_goes_right() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 0.0 } else { 10.0 }).collect();
        let model = GbdtRegressor::fit(&x, &y, &vec![1.0; 10], &small()).unwrap();
        assert!(model.predict(&[f64::NAN]) > 5.0);
    }

    #[test]
    fn test_fit_errors() {
        let params = small();
        assert!(GbdtRegressor::fit(&[], &[], &[], &params).is_err());
        let x = vec![vec![0.0], vec![1.0]];
        assert!(GbdtClassifier::fit(&x, &[0, 0], 1, &[1.0, 1.0], &params).is_err());
        assert!(GbdtRegressor::fit(&x, &[0.0, f64::NAN], &[1.0, 1.0], &params).is_err());
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }
}
