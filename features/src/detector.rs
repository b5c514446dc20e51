use image::Rgb32FImage;
use pano_core::{to_gray, GrayF32, KeyPoint};
use rayon::prelude::*;

use crate::{Descriptor, Descriptors};

/// Produces one feature list per image, in raw pixel coordinates.
///
/// Implementations must be pure with respect to the image so detection can
/// run concurrently across images.
pub trait FeatureDetector: Send + Sync {
    fn detect(&self, img: &Rgb32FImage) -> Descriptors;
}

/// Harris corner response with local-maximum suppression, described by a
/// mean/contrast-normalized intensity patch.
pub struct HarrisPatchDetector {
    pub k: f64,
    pub threshold: f64,
    pub patch_radius: i32,
    pub max_features: usize,
}

impl Default for HarrisPatchDetector {
    fn default() -> Self {
        Self {
            k: 0.04,
            threshold: 1e-3,
            patch_radius: 4,
            max_features: 2000,
        }
    }
}

impl FeatureDetector for HarrisPatchDetector {
    fn detect(&self, img: &Rgb32FImage) -> Descriptors {
        let gray = to_gray(img);
        let width = gray.width as i32;
        let height = gray.height as i32;
        if width < 8 || height < 8 {
            return Descriptors::new();
        }

        let response = harris_response(&gray, self.k);

        let threshold = self.threshold;
        let mut kps: Vec<KeyPoint> = (2..height - 2)
            .into_par_iter()
            .flat_map(|y| {
                let mut row_kps = Vec::new();
                for x in 2..width - 2 {
                    let r = response[(y * width + x) as usize];
                    if r <= threshold {
                        continue;
                    }
                    let mut is_max = true;
                    'window: for dy in -1..=1i32 {
                        for dx in -1..=1i32 {
                            if dx == 0 && dy == 0 {
                                continue;
                            }
                            let other = response[((y + dy) * width + x + dx) as usize];
                            if other > r || (other == r && (dy < 0 || (dy == 0 && dx < 0))) {
                                is_max = false;
                                break 'window;
                            }
                        }
                    }
                    if is_max {
                        row_kps.push(KeyPoint::new(x as f64, y as f64).with_response(r));
                    }
                }
                row_kps
            })
            .collect();

        kps.sort_by(|a, b| {
            b.response
                .partial_cmp(&a.response)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    (a.y, a.x)
                        .partial_cmp(&(b.y, b.x))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        kps.truncate(self.max_features);

        let descriptors = kps
            .par_iter()
            .map(|kp| Descriptor {
                data: patch_descriptor(&gray, kp, self.patch_radius),
                keypoint: *kp,
            })
            .collect();

        Descriptors { descriptors }
    }
}

fn harris_response(gray: &GrayF32, k: f64) -> Vec<f64> {
    let width = gray.width as i32;
    let height = gray.height as i32;
    let mut response = vec![0.0f64; (width * height) as usize];

    response
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i32;
            if y < 2 || y >= height - 2 {
                return;
            }
            for x in 2..width - 2 {
                let mut i_xx = 0.0f64;
                let mut i_yy = 0.0f64;
                let mut i_xy = 0.0f64;
                for by in -1..=1i32 {
                    for bx in -1..=1i32 {
                        let cx = (x + bx) as u32;
                        let cy = (y + by) as u32;
                        let gx = (gray.get(cx + 1, cy) - gray.get(cx - 1, cy)) as f64;
                        let gy = (gray.get(cx, cy + 1) - gray.get(cx, cy - 1)) as f64;
                        i_xx += gx * gx;
                        i_yy += gy * gy;
                        i_xy += gx * gy;
                    }
                }
                let det = i_xx * i_yy - i_xy * i_xy;
                let trace = i_xx + i_yy;
                row[x as usize] = det - k * trace * trace;
            }
        });

    response
}

fn patch_descriptor(gray: &GrayF32, kp: &KeyPoint, radius: i32) -> Vec<f32> {
    let width = gray.width as i32;
    let height = gray.height as i32;
    let cx = kp.x as i32;
    let cy = kp.y as i32;

    let side = (2 * radius + 1) as usize;
    let mut data = Vec::with_capacity(side * side);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let x = (cx + dx).clamp(0, width - 1) as u32;
            let y = (cy + dy).clamp(0, height - 1) as u32;
            data.push(gray.get(x, y));
        }
    }

    let mean = data.iter().sum::<f32>() / data.len() as f32;
    for v in data.iter_mut() {
        *v -= mean;
    }
    let norm = data.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-6);
    for v in data.iter_mut() {
        *v /= norm;
    }
    data
}
