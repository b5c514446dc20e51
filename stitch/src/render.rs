//! Canvas planning and per-component inverse mapping.

use image::Rgb32FImage;
use log::{debug, info};
use nalgebra::{Point2, Vector3};
use pano_core::{is_nan_point, nan_point, new_canvas, Error, Result};
use rayon::prelude::*;

use crate::blend::LinearBlender;
use crate::bundle::Bundle;

/// Projected units covered by one output pixel, derived from the identity
/// image as the scale reference.
fn per_pixel_extents(bundle: &Bundle, refw: f64, refh: f64) -> (f64, f64) {
    let a = bundle.proj_method.homo2proj(Vector3::new(1.0, 1.0, 1.0));
    let b = bundle.proj_method.homo2proj(Vector3::new(0.0, 0.0, 1.0));
    ((a.x - b.x) * refw / refw, (a.y - b.y) * refh / refh)
}

/// Output resolution implied by the bundle's projected range.
pub fn canvas_size(bundle: &Bundle) -> Result<(u32, u32)> {
    if bundle.proj_range.is_empty() {
        return Err(Error::DegenerateInput("empty projection range".into()));
    }
    let refw = bundle.identity().width as f64;
    let refh = bundle.identity().height as f64;
    let (x_per_pixel, y_per_pixel) = per_pixel_extents(bundle, refw, refh);

    let target_width = (bundle.proj_range.width() / x_per_pixel).round();
    let target_height = (bundle.proj_range.height() / y_per_pixel).round();
    if !(target_width >= 1.0) || !(target_height >= 1.0) {
        return Err(Error::DegenerateInput(format!(
            "canvas would be {target_width}x{target_height}"
        )));
    }
    Ok((target_width as u32, target_height as u32))
}

/// Build each component's dense output-pixel-to-source map and blend.
pub fn render(bundle: &Bundle, imgs: &[Rgb32FImage]) -> Result<Rgb32FImage> {
    let (target_w, target_h) = canvas_size(bundle)?;
    info!("output canvas: {}x{}", target_w, target_h);

    let refw = bundle.identity().width as f64;
    let refh = bundle.identity().height as f64;
    let (x_per_pixel, y_per_pixel) = per_pixel_extents(bundle, refw, refh);
    let proj_min = bundle.proj_range.min;

    let mut blender = LinearBlender::new();
    for comp in &bundle.components {
        let x0 = (((comp.range.min.x - proj_min.x) / x_per_pixel).floor() as i64)
            .clamp(0, target_w as i64);
        let y0 = (((comp.range.min.y - proj_min.y) / y_per_pixel).floor() as i64)
            .clamp(0, target_h as i64);
        let x1 = (((comp.range.max.x - proj_min.x) / x_per_pixel).ceil() as i64)
            .clamp(0, target_w as i64);
        let y1 = (((comp.range.max.y - proj_min.y) / y_per_pixel).ceil() as i64)
            .clamp(0, target_h as i64);
        let w = (x1 - x0) as usize;
        let h = (y1 - y0) as usize;
        if w == 0 || h == 0 {
            debug!("component {} projects outside the canvas", comp.img_idx);
            continue;
        }

        let half_w = comp.width as f64 / 2.0;
        let half_h = comp.height as f64 / 2.0;
        let mut map = vec![nan_point(); w * h];
        map.par_chunks_mut(w).enumerate().for_each(|(i, row)| {
            let cy = (y0 + i as i64) as f64 * y_per_pixel + proj_min.y;
            for (j, slot) in row.iter_mut().enumerate() {
                let cx = (x0 + j as i64) as f64 * x_per_pixel + proj_min.x;
                let hg = bundle.proj_to_homo(Point2::new(cx, cy), refw, refh);
                let p = comp.homo_inv.trans_normalize(hg);
                if is_nan_point(&p) {
                    continue;
                }
                let sx = p.x + half_w;
                let sy = p.y + half_h;
                if sx < 0.0 || sx >= comp.width as f64 || sy < 0.0 || sy >= comp.height as f64 {
                    continue;
                }
                *slot = Point2::new(sx, sy);
            }
        });

        blender.add_image((x0, y0), (w, h), map, &imgs[comp.img_idx]);
    }

    let mut canvas = new_canvas(target_w, target_h);
    blender.run(&mut canvas);
    Ok(canvas)
}
