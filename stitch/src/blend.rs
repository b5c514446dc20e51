//! Distance-weighted linear blending of remapped source images.

use image::Rgb32FImage;
use nalgebra::Point2;
use pano_core::{is_nan_point, sample_bilinear};
use rayon::prelude::*;

struct ImageToBlend<'a> {
    top_left: (i64, i64),
    width: usize,
    height: usize,
    /// Row-major `height x width` map from canvas pixels (relative to
    /// `top_left`) to source pixel coordinates; NaN entries are skipped.
    map: Vec<Point2<f64>>,
    img: &'a Rgb32FImage,
}

#[derive(Default)]
pub struct LinearBlender<'a> {
    images: Vec<ImageToBlend<'a>>,
}

impl<'a> LinearBlender<'a> {
    pub fn new() -> Self {
        Self { images: Vec::new() }
    }

    pub fn add_image(
        &mut self,
        top_left: (i64, i64),
        size: (usize, usize),
        map: Vec<Point2<f64>>,
        img: &'a Rgb32FImage,
    ) {
        debug_assert_eq!(map.len(), size.0 * size.1);
        self.images.push(ImageToBlend {
            top_left,
            width: size.0,
            height: size.1,
            map,
            img,
        });
    }

    /// Blend every added image into the canvas. Each contribution is weighted
    /// by the source coordinate's distance from its image center; pixels no
    /// image reaches are left untouched.
    pub fn run(&self, canvas: &mut Rgb32FImage) {
        let w = canvas.width() as usize;
        let raw: &mut [f32] = canvas;
        raw.par_chunks_mut(3 * w).enumerate().for_each(|(y, row)| {
            for x in 0..w {
                let mut sum = [0.0f32; 3];
                let mut wsum = 0.0f32;
                for im in &self.images {
                    let lx = x as i64 - im.top_left.0;
                    let ly = y as i64 - im.top_left.1;
                    if lx < 0 || ly < 0 || lx >= im.width as i64 || ly >= im.height as i64 {
                        continue;
                    }
                    let p = im.map[ly as usize * im.width + lx as usize];
                    if is_nan_point(&p) {
                        continue;
                    }
                    let iw = im.img.width() as f64;
                    let ih = im.img.height() as f64;
                    let wx = 0.5 - (p.x / iw - 0.5).abs();
                    let wy = 0.5 - (p.y / ih - 0.5).abs();
                    let weight = (wx.max(0.0) * wy.max(0.0) + 1e-9) as f32;
                    let c = sample_bilinear(im.img, p.x, p.y);
                    for k in 0..3 {
                        sum[k] += c.0[k] * weight;
                    }
                    wsum += weight;
                }
                if wsum > 0.0 {
                    for k in 0..3 {
                        row[x * 3 + k] = sum[k] / wsum;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use pano_core::{is_no_color, nan_point, new_canvas};

    fn solid(w: u32, h: u32, c: [f32; 3]) -> Rgb32FImage {
        Rgb32FImage::from_pixel(w, h, Rgb(c))
    }

    fn identity_map(w: usize, h: usize) -> Vec<Point2<f64>> {
        let mut map = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                map.push(Point2::new(x as f64, y as f64));
            }
        }
        map
    }

    #[test]
    fn test_single_image_copies_through() {
        let img = solid(4, 4, [0.2, 0.4, 0.6]);
        let mut blender = LinearBlender::new();
        blender.add_image((0, 0), (4, 4), identity_map(4, 4), &img);

        let mut canvas = new_canvas(4, 4);
        blender.run(&mut canvas);
        for p in canvas.pixels() {
            assert_eq!(p, &Rgb([0.2, 0.4, 0.6]));
        }
    }

    #[test]
    fn test_agreement_blends_to_same_color() {
        let a = solid(4, 4, [0.5, 0.25, 0.125]);
        let b = solid(4, 4, [0.5, 0.25, 0.125]);
        let mut blender = LinearBlender::new();
        blender.add_image((0, 0), (4, 4), identity_map(4, 4), &a);
        blender.add_image((0, 0), (4, 4), identity_map(4, 4), &b);

        let mut canvas = new_canvas(4, 4);
        blender.run(&mut canvas);
        for p in canvas.pixels() {
            for k in 0..3 {
                assert!((p.0[k] - [0.5, 0.25, 0.125][k]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_nan_entries_leave_sentinel() {
        let img = solid(2, 2, [1.0, 1.0, 1.0]);
        let mut map = identity_map(2, 2);
        map[3] = nan_point();
        let mut blender = LinearBlender::new();
        blender.add_image((0, 0), (2, 2), map, &img);

        let mut canvas = new_canvas(2, 2);
        blender.run(&mut canvas);
        assert!(!is_no_color(canvas.get_pixel(0, 0)));
        assert!(is_no_color(canvas.get_pixel(1, 1)));
    }

    #[test]
    fn test_center_outweighs_edge() {
        // Left image is white, right image black; at a pixel near the left
        // image's center the white contribution dominates.
        let a = solid(10, 10, [1.0, 1.0, 1.0]);
        let b = solid(10, 10, [0.0, 0.0, 0.0]);

        let mut blender = LinearBlender::new();
        blender.add_image((0, 0), (10, 10), identity_map(10, 10), &a);
        // Shifted so that canvas (5, 5) samples b near its edge.
        let mut map_b = Vec::new();
        for y in 0..10usize {
            for x in 0..10usize {
                map_b.push(Point2::new(x as f64 + 4.0, y as f64));
            }
        }
        blender.add_image((0, 0), (10, 10), map_b, &b);

        let mut canvas = new_canvas(10, 10);
        blender.run(&mut canvas);
        let p = canvas.get_pixel(5, 5);
        assert!(p.0[0] > 0.5);
    }
}
