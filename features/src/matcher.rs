use pano_core::{FeatureMatch, Matches};

use crate::{Descriptor, Descriptors};

pub const DEFAULT_RATIO: f64 = 0.75;

/// Brute-force descriptor matching with optional Lowe ratio filtering and
/// mutual-best (cross-check) filtering.
pub struct Matcher {
    cross_check: bool,
    ratio_threshold: Option<f64>,
}

/// Nearest pool entry for a probe descriptor, with the runner-up distance
/// kept for the ratio test. Distances are squared L2.
struct Nearest {
    idx: usize,
    dist: f64,
    runner_up: f64,
}

fn scan_nearest(probe: &Descriptor, pool: &Descriptors) -> Nearest {
    let mut hit = Nearest {
        idx: 0,
        dist: f64::INFINITY,
        runner_up: f64::INFINITY,
    };
    for (idx, cand) in pool.iter().enumerate() {
        let d = probe.distance_sq(cand);
        if d < hit.dist {
            hit.runner_up = hit.dist;
            hit.idx = idx;
            hit.dist = d;
        } else if d < hit.runner_up {
            hit.runner_up = d;
        }
    }
    hit
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            cross_check: false,
            ratio_threshold: None,
        }
    }

    pub fn with_cross_check(mut self) -> Self {
        self.cross_check = true;
        self
    }

    pub fn with_ratio_test(mut self, threshold: f64) -> Self {
        self.ratio_threshold = Some(threshold);
        self
    }

    pub fn match_descriptors(&self, query: &Descriptors, train: &Descriptors) -> Matches {
        let mut matches = Matches::new();
        if query.is_empty() || train.is_empty() {
            return matches;
        }

        // For mutual-best filtering the train-side winners are tabulated once
        // up front, instead of re-scanning the query set per accepted match.
        let reverse: Option<Vec<usize>> = if self.cross_check {
            Some(train.iter().map(|t| scan_nearest(t, query).idx).collect())
        } else {
            None
        };

        for (query_idx, probe) in query.iter().enumerate() {
            let hit = scan_nearest(probe, train);

            if let Some(ratio) = self.ratio_threshold {
                // Distances are squared, so the ratio bound is squared too.
                if hit.runner_up.is_finite()
                    && hit.runner_up > 0.0
                    && hit.dist / hit.runner_up > ratio * ratio
                {
                    continue;
                }
            }
            if let Some(reverse) = &reverse {
                if reverse[hit.idx] != query_idx {
                    continue;
                }
            }
            matches.push(FeatureMatch::new(query_idx, hit.idx, hit.dist));
        }

        matches
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Brute-force matching with the default ratio test.
pub fn match_features(query: &Descriptors, train: &Descriptors) -> Matches {
    Matcher::new()
        .with_ratio_test(DEFAULT_RATIO)
        .match_descriptors(query, train)
}
