//! Generic RANSAC engine for robust model estimation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;

#[derive(Debug, Clone)]
pub struct RobustConfig {
    pub threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    /// Sampling seed. Fixed so that repeated runs over the same data pick the
    /// same samples and produce bit-identical models.
    pub seed: u64,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            max_iterations: 500,
            confidence: 0.99,
            seed: 0x70616e6f,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RobustResult<M> {
    pub model: Option<M>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    pub residual: f64,
}

impl<M> RobustResult<M> {
    fn none(n: usize) -> Self {
        Self {
            model: None,
            inliers: vec![false; n],
            num_inliers: 0,
            residual: f64::INFINITY,
        }
    }
}

pub trait RobustModel<D> {
    type Model: Clone;

    /// Minimum number of data points required to estimate the model.
    fn min_sample_size(&self) -> usize;

    /// Estimate a model from a sample (minimal or larger).
    fn estimate(&self, data: &[&D]) -> Option<Self::Model>;

    /// Error of a single data point against the model.
    fn compute_error(&self, model: &Self::Model, data: &D) -> f64;
}

pub struct Ransac<D, M: RobustModel<D>> {
    config: RobustConfig,
    _phantom: PhantomData<(D, M)>,
}

impl<D, M: RobustModel<D>> Ransac<D, M> {
    pub fn new(config: RobustConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    /// Hypothesize-and-score loop. Each round draws a minimal sample, scores
    /// the hypothesis by inlier support, and keeps the strongest candidate;
    /// the inlier mask is materialized once, for the winner only.
    pub fn run(&self, estimator: &M, data: &[D]) -> RobustResult<M::Model> {
        let n = data.len();
        let need = estimator.min_sample_size();
        if n < need {
            return RobustResult::none(n);
        }

        // Support beyond this fraction of the data ends the search.
        let stop_at = (n as f64 * self.config.confidence) as usize + 1;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Option<(usize, f64, M::Model)> = None;

        for _ in 0..self.config.max_iterations {
            let picks = draw_distinct(&mut rng, n, need);
            let sample: Vec<&D> = picks.iter().map(|&i| &data[i]).collect();
            let model = match estimator.estimate(&sample) {
                Some(m) => m,
                None => continue,
            };

            let mut hits = 0usize;
            let mut err_acc = 0.0;
            for d in data {
                let e = estimator.compute_error(&model, d);
                if e < self.config.threshold {
                    hits += 1;
                    err_acc += e;
                }
            }
            if hits == 0 {
                continue;
            }
            let spread = err_acc / hits as f64;

            let improves = best
                .as_ref()
                .map_or(true, |(bh, bs, _)| hits > *bh || (hits == *bh && spread < *bs));
            if improves {
                let saturated = hits >= stop_at;
                best = Some((hits, spread, model));
                if saturated {
                    break;
                }
            }
        }

        match best {
            Some((hits, spread, model)) => {
                let inliers: Vec<bool> = data
                    .iter()
                    .map(|d| estimator.compute_error(&model, d) < self.config.threshold)
                    .collect();
                RobustResult {
                    model: Some(model),
                    inliers,
                    num_inliers: hits,
                    residual: spread,
                }
            }
            None => RobustResult::none(n),
        }
    }
}

/// `k` distinct indices below `n`, drawn by rejection.
fn draw_distinct(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    let mut picks: Vec<usize> = Vec::with_capacity(k);
    while picks.len() < k {
        let candidate = rng.gen_range(0..n);
        if !picks.contains(&candidate) {
            picks.push(candidate);
        }
    }
    picks
}
