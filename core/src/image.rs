use image::{Rgb, Rgb32FImage};

/// Sentinel color for canvas pixels no source image contributed to.
pub const NO_COLOR: Rgb<f32> = Rgb([-1.0, -1.0, -1.0]);

pub fn is_no_color(c: &Rgb<f32>) -> bool {
    c.0[0] < 0.0
}

pub fn new_canvas(width: u32, height: u32) -> Rgb32FImage {
    Rgb32FImage::from_pixel(width, height, NO_COLOR)
}

/// Bilinear sample at a floating-point pixel coordinate. The caller is
/// responsible for `(x, y)` being inside `[0, w) x [0, h)`; the +1 neighbors
/// are clamped to the last row/column.
pub fn sample_bilinear(img: &Rgb32FImage, x: f64, y: f64) -> Rgb<f32> {
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let v0 = p00.0[c] * (1.0 - fx) + p10.0[c] * fx;
        let v1 = p01.0[c] * (1.0 - fx) + p11.0[c] * fx;
        out[c] = v0 * (1.0 - fy) + v1 * fy;
    }
    Rgb(out)
}

/// Single-channel float plane, row-major.
#[derive(Debug, Clone)]
pub struct GrayF32 {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl GrayF32 {
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }
}

/// Rec. 601 luminance plane of an RGB raster.
pub fn to_gray(img: &Rgb32FImage) -> GrayF32 {
    let (w, h) = img.dimensions();
    let mut data = Vec::with_capacity((w * h) as usize);
    for p in img.pixels() {
        data.push(0.299 * p.0[0] + 0.587 * p.0[1] + 0.114 * p.0[2]);
    }
    GrayF32 {
        width: w,
        height: h,
        data,
    }
}
