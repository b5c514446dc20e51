//! One-dimensional search for the cylinder focal factor that straightens the
//! horizon of the right-half chain.

use image::Rgb32FImage;
use log::debug;
use pano_core::{Error, Homography, Matches, Result};
use pano_features::{fit_transform, Descriptors, MatchInfo};
use rayon::prelude::*;

use crate::warp::CylinderWarper;

const EPS_X: f64 = 1e-6;
const FACTOR_ITERS: usize = 3;

pub(crate) struct FactorSearchOutput {
    pub factor: f64,
    /// Every input re-warped at the chosen factor. The caller's originals are
    /// left untouched.
    pub warped_imgs: Vec<Rgb32FImage>,
    pub warped_feats: Vec<Descriptors>,
    /// `right_chain[i]` maps image `mid + 1 + i` into `mid`'s frame.
    pub right_chain: Vec<Homography>,
    /// Uncomposed pair fits for `(mid + i, mid + i + 1)`.
    pub right_pairs: Vec<MatchInfo>,
}

#[derive(Debug)]
pub(crate) struct Evaluation {
    pub slope: f64,
    pub pairs: Vec<MatchInfo>,
    pub chain: Vec<Homography>,
}

/// Warp the right-half features at `factor`, re-fit consecutive pairs from
/// the cached match lists, and chain them onto `mid`. The slope of the last
/// chained origin is the straightness measure.
pub(crate) fn evaluate_factor(
    feats: &[Descriptors],
    matches: &[Matches],
    widths: &[u32],
    mid: usize,
    factor: f64,
) -> Result<Evaluation> {
    let n = feats.len();
    let warper = CylinderWarper::new(factor);
    let now_feats: Vec<Descriptors> = (mid..n)
        .into_par_iter()
        .map(|k| {
            let mut f = feats[k].clone();
            warper.warp_features(&mut f, widths[k]);
            f
        })
        .collect();

    let len = n - mid;
    let mut pairs = Vec::with_capacity(len.saturating_sub(1));
    for k in 1..len {
        let info = fit_transform(&matches[mid + k - 1], &now_feats[k - 1], &now_feats[k]).ok_or(
            Error::MatchFailure {
                a: mid + k - 1,
                b: mid + k,
            },
        )?;
        pairs.push(info);
    }
    if pairs.is_empty() {
        return Err(Error::FactorSearchFailure);
    }

    let mut chain: Vec<Homography> = pairs.iter().map(|p| p.homo).collect();
    for k in 1..chain.len() {
        chain[k] = chain[k - 1] * chain[k];
    }

    let origin = chain[chain.len() - 1].trans2d(0.0, 0.0);
    let slope = origin.y / origin.x;
    debug!("factor {factor:.4}: slope {slope:.6}");
    Ok(Evaluation {
        slope,
        pairs,
        chain,
    })
}

pub(crate) fn search(
    imgs: &[Rgb32FImage],
    feats: &[Descriptors],
    matches: &[Matches],
    mid: usize,
    slope_plain: f64,
) -> Result<FactorSearchOutput> {
    let n = imgs.len();
    let widths: Vec<u32> = imgs.iter().map(|im| im.width()).collect();

    let mut best_factor = 1.0;
    let mut best = None;

    if n - mid > 1 {
        let first = evaluate_factor(feats, matches, &widths, mid, 1.0)?;
        let center_x = first.chain[0].trans2d(0.0, 0.0).x;
        let mut slope = first.slope;
        let mut min_slope = slope.abs();
        best = Some(first);

        if !center_x.is_finite() || center_x.abs() < EPS_X {
            // The sweep direction is undefined (vertical panorama); keep 1.
            debug!("sweep direction undefined, keeping factor 1");
        } else {
            let order = if center_x > 0.0 { 1.0 } else { -1.0 };
            let mut factor = 1.0;
            for k in 0..FACTOR_ITERS {
                if slope.abs() < slope_plain {
                    break;
                }
                let step = if slope < 0.0 { order } else { -order };
                factor += step / (5.0 * f64::powi(2.0, k as i32));
                if factor <= 0.0 {
                    break;
                }
                let eval = evaluate_factor(feats, matches, &widths, mid, factor)?;
                slope = eval.slope;
                if slope.abs() < min_slope || !min_slope.is_finite() {
                    min_slope = slope.abs();
                    best_factor = factor;
                    best = Some(eval);
                }
            }
        }
    }

    if n - mid > 1 && best.is_none() {
        return Err(Error::FactorSearchFailure);
    }
    debug!("best cylinder factor: {best_factor}");

    let warper = CylinderWarper::new(best_factor);
    let (warped_imgs, warped_feats): (Vec<_>, Vec<_>) = (0..n)
        .into_par_iter()
        .map(|k| {
            let img = warper.warp_image(&imgs[k]);
            let mut f = feats[k].clone();
            warper.warp_features(&mut f, widths[k]);
            (img, f)
        })
        .unzip();

    let (right_chain, right_pairs) = match best {
        Some(eval) => (eval.chain, eval.pairs),
        None => (Vec::new(), Vec::new()),
    };

    Ok(FactorSearchOutput {
        factor: best_factor,
        warped_imgs,
        warped_feats,
        right_chain,
        right_pairs,
    })
}
