//! Robust homography estimation between two matched feature sets.

use log::debug;
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use pano_core::{Homography, Matches, Ransac, RobustConfig, RobustModel};

use crate::Descriptors;

/// Result of a successful pairwise fit. `homo` maps train-image (`b`)
/// coordinates into query-image (`a`) coordinates.
#[derive(Debug, Clone)]
pub struct MatchInfo {
    pub homo: Homography,
    pub confidence: f64,
    pub num_inliers: usize,
}

#[derive(Clone, Debug)]
pub struct MatchPair {
    pub src: (f64, f64),
    pub dst: (f64, f64),
}

/// Similarity frame moving a point set to the origin with unit spread, so the
/// direct linear transform below stays well conditioned.
struct NormFrame {
    cx: f64,
    cy: f64,
    scale: f64,
}

impl NormFrame {
    fn fit<I>(points: I, count: usize) -> NormFrame
    where
        I: Iterator<Item = (f64, f64)> + Clone,
    {
        let inv = 1.0 / count as f64;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for (x, y) in points.clone() {
            cx += x * inv;
            cy += y * inv;
        }
        let mut spread = 0.0;
        for (x, y) in points {
            spread += ((x - cx).powi(2) + (y - cy).powi(2)).sqrt() * inv;
        }
        let scale = if spread > 1e-12 {
            std::f64::consts::SQRT_2 / spread
        } else {
            1.0
        };
        NormFrame { cx, cy, scale }
    }

    fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        ((x - self.cx) * self.scale, (y - self.cy) * self.scale)
    }

    fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.scale,
            0.0,
            -self.scale * self.cx,
            0.0,
            self.scale,
            -self.scale * self.cy,
            0.0,
            0.0,
            1.0,
        )
    }

    fn inv_matrix(&self) -> Matrix3<f64> {
        let s = 1.0 / self.scale;
        Matrix3::new(s, 0.0, self.cx, 0.0, s, self.cy, 0.0, 0.0, 1.0)
    }
}

pub struct HomographyEstimator;

impl RobustModel<MatchPair> for HomographyEstimator {
    type Model = Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        4
    }

    /// Direct linear transform on similarity-normalized coordinates. The two
    /// constraint rows per correspondence are accumulated straight into the
    /// 9x9 normal matrix; the homography is its smallest eigenvector, mapped
    /// back through the two frames.
    fn estimate(&self, data: &[&MatchPair]) -> Option<Self::Model> {
        if data.len() < self.min_sample_size() {
            return None;
        }
        let src_frame = NormFrame::fit(data.iter().map(|m| m.src), data.len());
        let dst_frame = NormFrame::fit(data.iter().map(|m| m.dst), data.len());

        let mut normal = SMatrix::<f64, 9, 9>::zeros();
        for m in data {
            let (sx, sy) = src_frame.apply(m.src);
            let (dx, dy) = dst_frame.apply(m.dst);
            let rows = [
                [sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy, -dx],
                [0.0, 0.0, 0.0, sx, sy, 1.0, -dy * sx, -dy * sy, -dy],
            ];
            for row in rows {
                let v = SVector::<f64, 9>::from_row_slice(&row);
                normal += v * v.transpose();
            }
        }

        let eig = normal.symmetric_eigen();
        let mut null_dir = 0;
        for i in 1..9 {
            if eig.eigenvalues[i] < eig.eigenvalues[null_dir] {
                null_dir = i;
            }
        }
        let h = eig.eigenvectors.column(null_dir);
        let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let mut model = dst_frame.inv_matrix() * normalized * src_frame.matrix();
        if model.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let anchor = model[(2, 2)];
        if anchor.abs() > 1e-12 {
            model /= anchor;
        }
        Some(model)
    }

    fn compute_error(&self, model: &Self::Model, data: &MatchPair) -> f64 {
        let mapped = model * Vector3::new(data.src.0, data.src.1, 1.0);
        if mapped.z.abs() <= 1e-10 {
            return f64::MAX;
        }
        let predicted = Point2::new(mapped.x / mapped.z, mapped.y / mapped.z);
        nalgebra::distance(&predicted, &Point2::new(data.dst.0, data.dst.1))
    }
}

const MIN_MATCHES: usize = 8;
const MIN_INLIERS: usize = 8;
const MIN_CONFIDENCE: f64 = 0.4;

/// Fit a homography mapping `feats_b` coordinates into `feats_a` coordinates
/// from brute-force matches (`query` = a, `train` = b). Returns `None` when
/// the pair has no geometrically consistent alignment.
pub fn fit_transform(
    matches: &Matches,
    feats_a: &Descriptors,
    feats_b: &Descriptors,
) -> Option<MatchInfo> {
    if matches.len() < MIN_MATCHES {
        return None;
    }

    let data: Vec<MatchPair> = matches
        .iter()
        .map(|m| MatchPair {
            src: (
                feats_b.descriptors[m.train_idx].keypoint.x,
                feats_b.descriptors[m.train_idx].keypoint.y,
            ),
            dst: (
                feats_a.descriptors[m.query_idx].keypoint.x,
                feats_a.descriptors[m.query_idx].keypoint.y,
            ),
        })
        .collect();

    let ransac = Ransac::new(RobustConfig::default());
    let result = ransac.run(&HomographyEstimator, &data);
    let ransac_model = result.model?;
    if result.num_inliers < MIN_INLIERS {
        return None;
    }

    // Refine over the full inlier set; fall back to the RANSAC model when the
    // refit is degenerate.
    let inlier_refs: Vec<&MatchPair> = data
        .iter()
        .zip(result.inliers.iter())
        .filter(|(_, keep)| **keep)
        .map(|(d, _)| d)
        .collect();
    let model = HomographyEstimator
        .estimate(&inlier_refs)
        .unwrap_or(ransac_model);

    let confidence = result.num_inliers as f64 / (8.0 + 0.3 * matches.len() as f64);
    debug!(
        "pair fit: {} matches, {} inliers, confidence {:.3}",
        matches.len(),
        result.num_inliers,
        confidence
    );
    if confidence < MIN_CONFIDENCE {
        return None;
    }

    Some(MatchInfo {
        homo: Homography::from_matrix(model),
        confidence,
        num_inliers: result.num_inliers,
    })
}
