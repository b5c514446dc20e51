//! Top-level assembly: detect features, align pairs, chain transforms into a
//! bundle, and render the blended canvas.

use image::Rgb32FImage;
use log::{debug, info};
use nalgebra::Matrix3;
use pano_core::{Error, Homography, Matches, Result};
use pano_features::{
    fit_transform, match_features, Descriptors, FeatureDetector, HarrisPatchDetector,
};
use rayon::prelude::*;

use crate::bundle::{Bundle, ImageComponent, ProjectionMethod};
use crate::config::StitchConfig;
use crate::graph::PairGraph;
use crate::hfactor;
use crate::render::render;

/// A fully chained assembly, ready to render. `images` are the rasters the
/// bundle's components index into (re-warped copies in panorama mode).
pub struct Assembly {
    pub bundle: Bundle,
    pub images: Vec<Rgb32FImage>,
    pub graph: PairGraph,
}

pub struct Stitcher {
    imgs: Vec<Rgb32FImage>,
    feats: Option<Vec<Descriptors>>,
    detector: Box<dyn FeatureDetector>,
    config: StitchConfig,
}

impl std::fmt::Debug for Stitcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stitcher")
            .field("imgs", &self.imgs.len())
            .field("feats", &self.feats.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Stitcher {
    pub fn new(imgs: Vec<Rgb32FImage>, config: StitchConfig) -> Self {
        Self {
            imgs,
            feats: None,
            detector: Box::new(HarrisPatchDetector::default()),
            config,
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn FeatureDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Skip detection and use precomputed per-image features, index-aligned
    /// with the images and in raw pixel coordinates.
    pub fn from_features(
        imgs: Vec<Rgb32FImage>,
        feats: Vec<Descriptors>,
        config: StitchConfig,
    ) -> Result<Self> {
        if feats.len() != imgs.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature lists for {} images",
                feats.len(),
                imgs.len()
            )));
        }
        Ok(Self {
            imgs,
            feats: Some(feats),
            detector: Box::new(HarrisPatchDetector::default()),
            config,
        })
    }

    /// Run the full pipeline and return the blended output raster.
    pub fn build(self) -> Result<Rgb32FImage> {
        let assembly = self.build_bundle()?;
        render(&assembly.bundle, &assembly.images)
    }

    /// Run alignment and chaining only.
    pub fn build_bundle(mut self) -> Result<Assembly> {
        if self.imgs.is_empty() {
            return Err(Error::DegenerateInput("no input images".into()));
        }

        let mut feats = match self.feats.take() {
            Some(f) => f,
            None => calc_feature(&self.imgs, self.detector.as_ref()),
        };
        center_features(&mut feats, &self.imgs);
        if feats.iter().all(Descriptors::is_empty) {
            return Err(Error::DegenerateInput("no features in any image".into()));
        }

        let Stitcher { imgs, config, .. } = self;
        let assembly = if config.pano {
            build_bundle_warp(imgs, feats, &config)?
        } else {
            build_bundle_linear_simple(imgs, feats, &config)?
        };
        info!("projection method: {:?}", assembly.bundle.proj_method);
        Ok(assembly)
    }
}

fn calc_feature(imgs: &[Rgb32FImage], detector: &dyn FeatureDetector) -> Vec<Descriptors> {
    let feats: Vec<Descriptors> = imgs.par_iter().map(|im| detector.detect(im)).collect();
    for (k, f) in feats.iter().enumerate() {
        debug!("image {} has {} features", k, f.len());
    }
    feats
}

/// Shift keypoints so homographies act on image-center-origin coordinates.
fn center_features(feats: &mut [Descriptors], imgs: &[Rgb32FImage]) {
    for (f, im) in feats.iter_mut().zip(imgs) {
        let cx = im.width() as f64 / 2.0;
        let cy = im.height() as f64 / 2.0;
        for d in f.iter_mut() {
            d.keypoint.x -= cx;
            d.keypoint.y -= cy;
        }
    }
}

/// Align each image with its successor (cyclically). Every pair is required:
/// the inputs are assumed to be an ordered sweep.
fn assume_pano_pairwise(feats: &[Descriptors], graph: &mut PairGraph) -> Result<()> {
    let n = feats.len();
    for i in 0..n {
        let next = (i + 1) % n;
        if next == i || graph.has_edge(i, next) {
            continue;
        }
        let m = match_features(&feats[i], &feats[next]);
        let info =
            fit_transform(&m, &feats[i], &feats[next]).ok_or(Error::MatchFailure { a: i, b: next })?;
        info!(
            "match between image {} and {}: {} inliers, confidence {:.3}",
            i, next, info.num_inliers, info.confidence
        );
        graph.add_pair(i, next, info)?;
    }
    Ok(())
}

/// All-pairs edge discovery. Unlike the assumed-sweep alignment, a pair that
/// fails to fit is simply left out of the graph.
pub fn match_all_pairs(feats: &[Descriptors]) -> Result<PairGraph> {
    let n = feats.len();
    let mut graph = PairGraph::new(n);
    for i in 0..n {
        for j in i + 1..n {
            let m = match_features(&feats[i], &feats[j]);
            if let Some(info) = fit_transform(&m, &feats[i], &feats[j]) {
                debug!(
                    "connection between image {} and {}: {} inliers, confidence {:.3}",
                    i, j, info.num_inliers, info.confidence
                );
                graph.add_pair(i, j, info)?;
            }
        }
    }
    Ok(graph)
}

fn build_bundle_linear_simple(
    imgs: Vec<Rgb32FImage>,
    feats: Vec<Descriptors>,
    config: &StitchConfig,
) -> Result<Assembly> {
    let n = imgs.len();
    let mut graph = PairGraph::new(n);
    assume_pano_pairwise(&feats, &mut graph)?;

    let mid = n / 2;
    let mut components: Vec<ImageComponent> = imgs
        .iter()
        .enumerate()
        .map(|(k, im)| ImageComponent::new(k, im.width(), im.height(), Homography::identity()))
        .collect();

    for k in mid + 1..n {
        let step = graph
            .get(k - 1, k)
            .ok_or(Error::MatchFailure { a: k - 1, b: k })?
            .homo;
        components[k].homo = components[k - 1].homo * step;
    }
    for k in (0..mid).rev() {
        let step = graph
            .get(k + 1, k)
            .ok_or(Error::MatchFailure { a: k + 1, b: k })?
            .homo;
        components[k].homo = components[k + 1].homo * step;
    }

    let mut bundle = Bundle::new(
        components,
        mid,
        config.projection.unwrap_or(ProjectionMethod::Cylindrical),
    );
    if config.straighten {
        straighten_simple(&mut bundle)?;
    }
    bundle.calc_inverse_homo()?;
    bundle.update_proj_range();
    Ok(Assembly {
        bundle,
        images: imgs,
        graph,
    })
}

fn build_bundle_warp(
    imgs: Vec<Rgb32FImage>,
    feats: Vec<Descriptors>,
    config: &StitchConfig,
) -> Result<Assembly> {
    let n = imgs.len();
    let mid = n / 2;

    // Raw consecutive matches on the unwarped features; feature order
    // survives warping, so these index pairs stay valid for every re-fit.
    let matches: Vec<Matches> = (0..n.saturating_sub(1))
        .into_par_iter()
        .map(|k| match_features(&feats[k], &feats[k + 1]))
        .collect();

    let out = hfactor::search(&imgs, &feats, &matches, mid, config.slope_plain)?;
    info!("cylinder factor: {}", out.factor);
    let warped_feats = out.warped_feats;

    let mut graph = PairGraph::new(n);
    let mut components: Vec<ImageComponent> = out
        .warped_imgs
        .iter()
        .enumerate()
        .map(|(k, im)| ImageComponent::new(k, im.width(), im.height(), Homography::identity()))
        .collect();

    for (i, homo) in out.right_chain.iter().enumerate() {
        components[mid + 1 + i].homo = *homo;
    }
    for (i, info) in out.right_pairs.into_iter().enumerate() {
        graph.add_pair(mid + i, mid + i + 1, info)?;
    }

    // Left half: re-fit on the warped features and chain leftward from mid.
    for i in (0..mid).rev() {
        let rev = matches[i].reversed();
        let info = fit_transform(&rev, &warped_feats[i + 1], &warped_feats[i])
            .ok_or(Error::MatchFailure { a: i + 1, b: i })?;
        components[i].homo = info.homo;
        graph.add_pair(i + 1, i, info)?;
    }
    for i in (0..mid.saturating_sub(1)).rev() {
        components[i].homo = components[i + 1].homo * components[i].homo;
    }

    let mut bundle = Bundle::new(
        components,
        mid,
        config.projection.unwrap_or(ProjectionMethod::Flat),
    );
    bundle.calc_inverse_homo()?;
    bundle.update_proj_range();
    Ok(Assembly {
        bundle,
        images: out.warped_imgs,
        graph,
    })
}

/// Shear every transform so the first and last image centers end up at the
/// same height in the identity frame.
pub fn straighten_simple(bundle: &mut Bundle) -> Result<()> {
    let n = bundle.components.len();
    if n < 2 {
        return Ok(());
    }
    let c1 = bundle.components[0].homo.trans2d(0.0, 0.0);
    let c2 = bundle.components[n - 1].homo.trans2d(0.0, 0.0);
    let dydx = (c2.y - c1.y) / (c2.x - c1.x);
    if !dydx.is_finite() {
        return Err(Error::SingularMatrix);
    }
    let mut shear = Matrix3::identity();
    shear[(1, 0)] = dydx;
    let shear_inv = Homography(shear).inverse()?;
    for comp in &mut bundle.components {
        comp.homo = shear_inv * comp.homo;
    }
    Ok(())
}
