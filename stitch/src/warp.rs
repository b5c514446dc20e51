//! Plane-to-cylinder remapping of images and feature coordinates.

use image::Rgb32FImage;
use pano_core::sample_bilinear;
use pano_features::Descriptors;
use rayon::prelude::*;

/// Warps onto a cylinder of radius `factor * width` pixels, tangent to the
/// image center. All point coordinates are relative to the image center.
pub struct CylinderWarper {
    pub factor: f64,
}

impl CylinderWarper {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    fn focal(&self, width: u32) -> f64 {
        self.factor * width as f64
    }

    pub fn warp_point(&self, x: f64, y: f64, width: u32) -> (f64, f64) {
        let f = self.focal(width);
        (f * (x / f).atan(), f * y / x.hypot(f))
    }

    pub fn unwarp_point(&self, xw: f64, yw: f64, width: u32) -> (f64, f64) {
        let f = self.focal(width);
        let x = f * (xw / f).tan();
        (x, yw * x.hypot(f) / f)
    }

    pub fn warped_width(&self, width: u32) -> u32 {
        let f = self.focal(width);
        let half = width as f64 / 2.0;
        let span = 2.0 * f * (half / f).atan();
        span.round().max(1.0) as u32
    }

    /// Resample the image through the inverse cylinder map. Pixels that fall
    /// outside the source stay black.
    pub fn warp_image(&self, img: &Rgb32FImage) -> Rgb32FImage {
        let (w, h) = img.dimensions();
        let out_w = self.warped_width(w);
        let cx = w as f64 / 2.0;
        let cy = h as f64 / 2.0;
        let ocx = out_w as f64 / 2.0;
        let ocy = h as f64 / 2.0;

        let mut data = vec![0.0f32; (out_w * h * 3) as usize];
        data.par_chunks_mut((out_w * 3) as usize)
            .enumerate()
            .for_each(|(i, row)| {
                for j in 0..out_w as usize {
                    let (x, y) = self.unwarp_point(j as f64 - ocx, i as f64 - ocy, w);
                    let sx = x + cx;
                    let sy = y + cy;
                    if sx >= 0.0 && sx < w as f64 && sy >= 0.0 && sy < h as f64 {
                        let c = sample_bilinear(img, sx, sy);
                        row[j * 3..j * 3 + 3].copy_from_slice(&c.0);
                    }
                }
            });

        Rgb32FImage::from_raw(out_w, h, data).unwrap()
    }

    /// Rewrite centered keypoint coordinates through the forward cylinder map.
    pub fn warp_features(&self, feats: &mut Descriptors, width: u32) {
        for d in feats.iter_mut() {
            let (x, y) = self.warp_point(d.keypoint.x, d.keypoint.y, width);
            d.keypoint.x = x;
            d.keypoint.y = y;
        }
    }
}
