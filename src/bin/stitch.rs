use std::env;
use std::path::Path;
use std::process::exit;

use image::{Rgb, RgbImage, Rgb32FImage};
use log::info;
use pano::stitch::{StitchConfig, Stitcher};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        exit(1);
    }
}

fn usage() -> String {
    "usage: stitch [--pano] <output.png> <input images...>".into()
}

fn run() -> Result<(), String> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let pano = if let Some(pos) = args.iter().position(|a| a == "--pano") {
        args.remove(pos);
        true
    } else {
        false
    };
    if args.len() < 2 {
        return Err(usage());
    }
    let output_path = args.remove(0);

    pano::init_thread_pool(None)?;

    let mut imgs: Vec<Rgb32FImage> = Vec::with_capacity(args.len());
    for path in &args {
        let img = image::open(Path::new(path))
            .map_err(|e| format!("failed to load {path}: {e}"))?
            .to_rgb32f();
        info!("loaded {} ({}x{})", path, img.width(), img.height());
        imgs.push(img);
    }

    let config = StitchConfig {
        pano,
        ..Default::default()
    };
    let canvas = Stitcher::new(imgs, config)
        .build()
        .map_err(|e| e.to_string())?;

    let out = to_rgb8(&canvas);
    out.save(Path::new(&output_path))
        .map_err(|e| format!("failed to save {output_path}: {e}"))?;
    info!("wrote {}", output_path);
    Ok(())
}

/// Unpainted (sentinel) pixels become black.
fn to_rgb8(canvas: &Rgb32FImage) -> RgbImage {
    let mut out = RgbImage::new(canvas.width(), canvas.height());
    for (x, y, p) in canvas.enumerate_pixels() {
        let mut q = [0u8; 3];
        for k in 0..3 {
            q[k] = (p.0[k].clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        out.put_pixel(x, y, Rgb(q));
    }
    out
}
