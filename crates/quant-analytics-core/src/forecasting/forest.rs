use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::AnalyticsError;
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Root has depth 0; a tree of `max_depth` 5 has at most 32 leaves
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Bootstrap seed; `None` uses the engine generator
    pub seed: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            max_depth: 5,
            min_samples_split: 2,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestResult {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Share of total SSE reduction credited to each feature; sums to 1
    pub feature_importance: Vec<f64>,
    pub fitted_values: Vec<f64>,
    /// In-sample R² of the ensemble mean
    pub r_squared: f64,
    pub predictions: Vec<f64>,
    pub observations: usize,
    pub features: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Bagged regression trees. Each tree is grown on a bootstrap sample of the
/// rows with greedy SSE-reduction splits over every feature, stopping at
/// `max_depth`, below `min_samples_split` rows, or when no split reduces the
/// error. Predictions are the mean over trees.
pub fn random_forest(
    core: &NumericalCore,
    features: &[Vec<f64>],
    target: &[f64],
    predict: &[Vec<f64>],
    params: ForestParams,
) -> AnalyticsResult<ComputationOutput<RandomForestResult>> {
    const METHOD: &str = "random_forest";
    let start = Instant::now();
    let width = validate(METHOD, features, target, predict, &params)?;

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => core.rng(),
    };
    let n = target.len();
    let mut importance = vec![0.0; width];
    let mut trees = Vec::with_capacity(params.n_trees);
    for _ in 0..params.n_trees {
        let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let grower = Grower {
            features,
            target,
            params: &params,
            width,
        };
        trees.push(grower.grow(sample, 0, &mut importance));
    }

    let ensemble = |row: &[f64]| {
        trees.iter().map(|t| t.predict(row)).sum::<f64>() / trees.len() as f64
    };
    let fitted: Vec<f64> = features.iter().map(|row| ensemble(row.as_slice())).collect();
    let predictions: Vec<f64> = predict.iter().map(|row| ensemble(row.as_slice())).collect();

    let y_bar = target.iter().sum::<f64>() / n as f64;
    let tss: f64 = target.iter().map(|y| (y - y_bar).powi(2)).sum();
    let ssr: f64 = target.iter().zip(&fitted).map(|(y, f)| (y - f).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - ssr / tss } else { 0.0 };

    let total: f64 = importance.iter().sum();
    let feature_importance: Vec<f64> = if total > 0.0 {
        importance.iter().map(|v| v / total).collect()
    } else {
        vec![1.0 / width as f64; width]
    };

    let result = RandomForestResult {
        n_trees: params.n_trees,
        max_depth: params.max_depth,
        min_samples_split: params.min_samples_split,
        feature_importance: core.round_all(&feature_importance),
        fitted_values: core.round_all(&fitted),
        r_squared: core.round(r_squared),
        predictions: core.round_all(&predictions),
        observations: n,
        features: width,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "n_trees": params.n_trees,
            "max_depth": params.max_depth,
            "min_samples_split": params.min_samples_split,
            "sampling": "bootstrap rows, all features per split",
            "split_criterion": "sum of squared errors",
            "seed": params.seed.or(core.config().seed),
        }),
        Vec::new(),
        elapsed,
        core.config().precision,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

fn validate(
    method: &str,
    features: &[Vec<f64>],
    target: &[f64],
    predict: &[Vec<f64>],
    params: &ForestParams,
) -> AnalyticsResult<usize> {
    if target.len() < 2 {
        return Err(AnalyticsError::insufficient(
            method,
            format!("At least 2 training rows required, got {}", target.len()),
        ));
    }
    if features.len() != target.len() {
        return Err(AnalyticsError::invalid(
            method,
            "features",
            format!(
                "{} feature rows for {} targets",
                features.len(),
                target.len()
            ),
        ));
    }
    let width = features[0].len();
    if width == 0 {
        return Err(AnalyticsError::invalid(
            method,
            "features",
            "Rows must have at least one feature",
        ));
    }
    for (name, rows) in [("features", features), ("predict", predict)] {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(AnalyticsError::invalid(
                    method,
                    &format!("{name}[{i}]"),
                    format!("Expected {width} features, got {}", row.len()),
                ));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(AnalyticsError::invalid(
                    method,
                    &format!("{name}[{i}]"),
                    "Features must be finite",
                ));
            }
        }
    }
    if target.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::invalid(method, "target", "Targets must be finite"));
    }
    if params.n_trees == 0 {
        return Err(AnalyticsError::invalid(method, "n_trees", "At least one tree is required"));
    }
    if params.max_depth == 0 {
        return Err(AnalyticsError::invalid(method, "max_depth", "Depth must be at least 1"));
    }
    if params.min_samples_split < 2 {
        return Err(AnalyticsError::invalid(
            method,
            "min_samples_split",
            "A split needs at least 2 samples",
        ));
    }
    Ok(width)
}

struct Grower<'a> {
    features: &'a [Vec<f64>],
    target: &'a [f64],
    params: &'a ForestParams,
    width: usize,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    split_at: usize,
    order: Vec<usize>,
}

impl Grower<'_> {
    fn grow(&self, rows: Vec<usize>, depth: usize, importance: &mut [f64]) -> Node {
        let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, q), &i| {
            let y = self.target[i];
            (s + y, q + y * y)
        });
        let count = rows.len() as f64;
        let mean = sum / count;
        let sse = sum_sq - sum * sum / count;

        if depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split
            || sse <= 1e-12
        {
            return Node::Leaf(mean);
        }
        let Some(best) = self.best_split(&rows, sse) else {
            return Node::Leaf(mean);
        };

        importance[best.feature] += best.gain;
        let (left, right) = best.order.split_at(best.split_at);
        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.grow(left.to_vec(), depth + 1, importance)),
            right: Box::new(self.grow(right.to_vec(), depth + 1, importance)),
        }
    }

    fn best_split(&self, rows: &[usize], parent_sse: f64) -> Option<Candidate> {
        let total_sum: f64 = rows.iter().map(|&i| self.target[i]).sum();
        let total_sq: f64 = rows.iter().map(|&i| self.target[i].powi(2)).sum();
        let n = rows.len();
        let mut best: Option<Candidate> = None;

        for feature in 0..self.width {
            let mut order = rows.to_vec();
            order.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let y = self.target[order[k - 1]];
                left_sum += y;
                left_sq += y * y;
                let lo = self.features[order[k - 1]][feature];
                let hi = self.features[order[k]][feature];
                if lo == hi {
                    continue;
                }
                let nl = k as f64;
                let nr = (n - k) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let split_sse =
                    (left_sq - left_sum * left_sum / nl) + (right_sq - right_sum * right_sum / nr);
                let gain = parent_sse - split_sse;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate {
                        feature,
                        threshold: 0.5 * (lo + hi),
                        gain,
                        split_at: k,
                        order: order.clone(),
                    });
                }
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
