//! Per-image transforms anchored at an identity image, plus the projection
//! used to lay them out on the output plane.

use nalgebra::{Point2, Vector3};
use pano_core::{Homography, Rect2D, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMethod {
    Flat,
    Cylindrical,
}

impl ProjectionMethod {
    pub fn homo2proj(&self, v: Vector3<f64>) -> Point2<f64> {
        match self {
            ProjectionMethod::Flat => Point2::new(v.x / v.z, v.y / v.z),
            ProjectionMethod::Cylindrical => {
                Point2::new(v.x.atan2(v.z), v.y / v.x.hypot(v.z))
            }
        }
    }

    pub fn proj2homo(&self, p: Point2<f64>) -> Vector3<f64> {
        match self {
            ProjectionMethod::Flat => Vector3::new(p.x, p.y, 1.0),
            ProjectionMethod::Cylindrical => Vector3::new(p.x.sin(), p.y, p.x.cos()),
        }
    }
}

/// One image of the assembly. `homo` maps centered coordinates of this image
/// into the identity image's frame; `range` is the bounding box of the four
/// projected corners on the output plane. The image itself is referenced by
/// index into the caller's image list.
#[derive(Debug, Clone)]
pub struct ImageComponent {
    pub img_idx: usize,
    pub width: u32,
    pub height: u32,
    pub homo: Homography,
    pub homo_inv: Homography,
    pub range: Rect2D,
}

impl ImageComponent {
    pub fn new(img_idx: usize, width: u32, height: u32, homo: Homography) -> Self {
        Self {
            img_idx,
            width,
            height,
            homo,
            homo_inv: Homography::identity(),
            range: Rect2D::empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub components: Vec<ImageComponent>,
    pub identity_idx: usize,
    pub proj_method: ProjectionMethod,
    pub proj_range: Rect2D,
}

impl Bundle {
    pub fn new(
        components: Vec<ImageComponent>,
        identity_idx: usize,
        proj_method: ProjectionMethod,
    ) -> Self {
        Self {
            components,
            identity_idx,
            proj_method,
            proj_range: Rect2D::empty(),
        }
    }

    pub fn identity(&self) -> &ImageComponent {
        &self.components[self.identity_idx]
    }

    pub fn calc_inverse_homo(&mut self) -> Result<()> {
        for comp in &mut self.components {
            comp.homo_inv = comp.homo.inverse()?;
        }
        Ok(())
    }

    /// Identity-frame homogeneous coordinates to output-plane coordinates.
    /// The frame is normalized by the reference size and shifted so the
    /// identity image spans `[0, 1]` before projecting.
    pub fn homo_to_proj(&self, h: Vector3<f64>, refw: f64, refh: f64) -> Point2<f64> {
        let shifted = Vector3::new(h.x / refw + 0.5 * h.z, h.y / refh + 0.5 * h.z, h.z);
        let v = self.proj_method.homo2proj(shifted);
        Point2::new(v.x * refw, v.y * refh)
    }

    /// Inverse of [`Bundle::homo_to_proj`].
    pub fn proj_to_homo(&self, c: Point2<f64>, refw: f64, refh: f64) -> Vector3<f64> {
        let v = self
            .proj_method
            .proj2homo(Point2::new(c.x / refw, c.y / refh));
        Vector3::new(
            (v.x - 0.5 * v.z) * refw,
            (v.y - 0.5 * v.z) * refh,
            v.z,
        )
    }

    /// Recompute every component's projected corner box and their union.
    pub fn update_proj_range(&mut self) {
        let refw = self.identity().width as f64;
        let refh = self.identity().height as f64;

        let mut total = Rect2D::empty();
        for idx in 0..self.components.len() {
            let (w, h) = {
                let c = &self.components[idx];
                (c.width as f64, c.height as f64)
            };
            let mut range = Rect2D::empty();
            for &(cx, cy) in &[
                (-w / 2.0, -h / 2.0),
                (w / 2.0, -h / 2.0),
                (-w / 2.0, h / 2.0),
                (w / 2.0, h / 2.0),
            ] {
                let hg = self.components[idx].homo.apply(Vector3::new(cx, cy, 1.0));
                range.extend(self.homo_to_proj(hg, refw, refh));
            }
            total = total.union(&range);
            self.components[idx].range = range;
        }
        self.proj_range = total;
    }
}
