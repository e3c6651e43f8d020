//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Trees grow best-first: the leaf with the largest split gain is expanded
//! next, until `max_leaves` is reached. Multiclass training fits one tree per
//! class per round on softmax gradients and hessians.

use super::gradient_boosting::{log_priors, softmax_rows};
use super::models::{
    argmax_rows, check_xy, infer_n_classes, Classifier, ProbabilisticClassifier,
};
use crate::error::{ExoplanetError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            LGBNode::Leaf { value } => *value,
            LGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

// ---- Tree building utilities ----

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda).max(1e-12)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda).max(1e-12)
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], lambda: f64, alpha: f64) -> LGBNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    LGBNode::Leaf { value: compute_leaf_weight(g, h, lambda, alpha) }
}

struct SplitResult {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    reg_lambda: f64,
    min_child_samples: usize,
) -> Option<SplitResult> {
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, x[[i, feature]])).collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let base_score = compute_gain_single(total_g, total_h, reg_lambda);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;
    let mut best_pos = 0;

    for i in 0..sorted.len().saturating_sub(1) {
        left_g += gradients[sorted[i].0];
        left_h += hessians[sorted[i].0];
        let right_g = total_g - left_g;
        let right_h = total_h - left_h;

        if i + 1 < min_child_samples || sorted.len() - i - 1 < min_child_samples {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let gain = compute_gain_single(left_g, left_h, reg_lambda)
            + compute_gain_single(right_g, right_h, reg_lambda)
            - base_score;

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (sorted[i].1 + sorted[i + 1].1) / 2.0;
            best_pos = i + 1;
        }
    }

    if best_gain <= 1e-12 {
        return None;
    }

    Some(SplitResult {
        feature,
        threshold: best_threshold,
        gain: best_gain,
        left_indices: sorted[..best_pos].iter().map(|&(i, _)| i).collect(),
        right_indices: sorted[best_pos..].iter().map(|&(i, _)| i).collect(),
    })
}

fn best_split(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> Option<SplitResult> {
    let candidates: Vec<SplitResult> = feature_indices
        .par_iter()
        .filter_map(|&feat| {
            find_best_split_for_feature(x, gradients, hessians, indices, feat, config.reg_lambda, config.min_child_samples)
        })
        .collect();
    candidates.into_iter().fold(None, |acc: Option<SplitResult>, c| match acc {
        Some(a) if a.gain >= c.gain => Some(a),
        _ => Some(c),
    })
}

struct PendingSplit {
    node_id: usize,
    split: SplitResult,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.split.gain == other.split.gain && self.node_id == other.node_id
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        // Larger gain first; earlier node first on ties
        self.split
            .gain
            .partial_cmp(&other.split.gain)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Build tree using leaf-wise (best-first) strategy
fn build_lgb_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> LGBNode {
    if indices.len() < config.min_child_samples * 2 {
        return make_leaf(gradients, hessians, indices, config.reg_lambda, config.reg_alpha);
    }

    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();
    let max_depth_limit = config.max_depth.unwrap_or(usize::MAX);

    if let Some(split) = best_split(x, gradients, hessians, indices, feature_indices, config) {
        heap.push(PendingSplit { node_id: 0, split });
    }

    let mut n_leaves = 1usize;

    while n_leaves < config.max_leaves {
        let Some(PendingSplit { node_id, split }) = heap.pop() else { break };
        let depth = depths[node_id];
        if depth >= max_depth_limit {
            continue;
        }

        let left_id = nodes.len();
        let right_id = nodes.len() + 1;
        nodes[node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;

        for (child_id, child_indices) in [(left_id, &split.left_indices), (right_id, &split.right_indices)] {
            depths.push(depth + 1);
            if depth + 1 < max_depth_limit && child_indices.len() >= config.min_child_samples * 2 {
                if let Some(child_split) = best_split(x, gradients, hessians, child_indices, feature_indices, config) {
                    heap.push(PendingSplit { node_id: child_id, split: child_split });
                }
            }
        }
        nodes.push(NodeSlot::Leaf(split.left_indices));
        nodes.push(NodeSlot::Leaf(split.right_indices));
    }

    fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], lam: f64, alpha: f64) -> LGBNode {
        match &nodes[idx] {
            NodeSlot::Leaf(indices) => make_leaf(g, h, indices, lam, alpha),
            NodeSlot::Split { feature, threshold, left, right } => LGBNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, g, h, lam, alpha)),
                right: Box::new(to_node(nodes, *right, g, h, lam, alpha)),
            },
        }
    }
    to_node(&nodes, 0, gradients, hessians, config.reg_lambda, config.reg_alpha)
}

fn sample_indices(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    if ratio < 1.0 {
        let k = (((n as f64) * ratio).ceil() as usize).max(1);
        idx.shuffle(rng);
        idx.truncate(k);
        idx.sort_unstable();
    }
    idx
}

// ============ LightGBM Classifier ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    pub config: LightGBMConfig,
    /// `rounds[r][k]` is the tree for class k in round r
    rounds: Vec<Vec<LGBNode>>,
    base_scores: Vec<f64>,
    n_classes: usize,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig) -> Self {
        Self {
            config,
            rounds: Vec::new(),
            base_scores: Vec::new(),
            n_classes: 0,
        }
    }

    /// Fix the class count instead of inferring it from the labels
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    fn predict_raw(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.rounds.is_empty() {
            return Err(ExoplanetError::ModelNotFitted);
        }
        let lr = self.config.learning_rate;
        let mut raw = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for k in 0..self.n_classes {
                raw[[i, k]] = self.base_scores[k]
                    + self.rounds.iter().map(|trees| lr * trees[k].predict(row)).sum::<f64>();
            }
        }
        Ok(raw)
    }
}

impl Classifier for LightGBMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, sample_weight: Option<&Array1<f64>>) -> Result<()> {
        check_xy(x, y.len())?;
        if self.config.n_estimators == 0 || self.config.max_leaves < 2 {
            return Err(ExoplanetError::InvalidParameter {
                name: "n_estimators/max_leaves".to_string(),
                value: format!("{}/{}", self.config.n_estimators, self.config.max_leaves),
                reason: "need at least one round and two leaves".to_string(),
            });
        }
        let n = x.nrows();
        let n_features = x.ncols();
        if self.n_classes == 0 {
            self.n_classes = infer_n_classes(y);
        }
        let n_classes = self.n_classes;

        let weights = sample_weight.cloned().unwrap_or_else(|| Array1::ones(n));
        self.base_scores = log_priors(y, &weights, n_classes);

        let mut raw = Array2::zeros((n, n_classes));
        for (k, &s) in self.base_scores.iter().enumerate() {
            raw.column_mut(k).fill(s);
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        self.rounds.clear();

        for _ in 0..self.config.n_estimators {
            let probs = softmax_rows(&raw);
            let indices = sample_indices(&mut rng, n, self.config.subsample);
            let features = sample_indices(&mut rng, n_features, self.config.colsample_bytree);

            let mut trees = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                let gradients: Vec<f64> = (0..n)
                    .map(|i| weights[i] * (probs[[i, k]] - if y[i] == k { 1.0 } else { 0.0 }))
                    .collect();
                let hessians: Vec<f64> = (0..n)
                    .map(|i| weights[i] * (probs[[i, k]] * (1.0 - probs[[i, k]])).max(1e-16))
                    .collect();

                let tree = build_lgb_tree(x, &gradients, &hessians, &indices, &features, &self.config);
                for (i, row) in x.rows().into_iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(row);
                }
                trees.push(tree);
            }
            self.rounds.push(trees);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn as_probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        Some(self)
    }
}

impl ProbabilisticClassifier for LightGBMClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(&self.predict_raw(x)?))
    }
}
