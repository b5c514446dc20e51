use image::{Rgb, Rgb32FImage};
use nalgebra::Matrix3;
use pano_core::{is_no_color, Error, Homography, KeyPoint};
use pano_features::{Descriptor, Descriptors};
use pano_stitch::stitcher::straighten_simple;
use pano_stitch::{
    match_all_pairs, Bundle, ImageComponent, ProjectionMethod, StitchConfig, Stitcher,
};

const W: u32 = 200;
const H: u32 = 200;
const DX: f64 = 150.0;

fn solid(w: u32, h: u32, c: [f32; 3]) -> Rgb32FImage {
    Rgb32FImage::from_pixel(w, h, Rgb(c))
}

/// Slice of a wide horizontal-gradient mosaic: image `k` shows columns
/// `[k * DX, k * DX + W)`, so canvas column `j` should read back `j / 1000`.
fn gradient_slice(k: usize) -> Rgb32FImage {
    let mut img = Rgb32FImage::new(W, H);
    for y in 0..H {
        for x in 0..W {
            let gx = (x as f32 + k as f32 * DX as f32) / 1000.0;
            img.put_pixel(x, y, Rgb([gx, y as f32 / 500.0, 0.3]));
        }
    }
    img
}

/// Features of an `n`-image horizontal sweep with per-step shift `(dx, dy)`,
/// in raw pixel coordinates. The sweep closes on itself: the last image
/// shares a dozen planted features with the first so the cyclic pair aligns.
fn sweep_features(n: usize, dx: f64, dy: f64) -> Vec<Descriptors> {
    let span = n as f64 * dx + W as f64;
    let cols = (span / 25.0) as i32;
    let mut out = Vec::new();
    for k in 0..n {
        let mut feats = Descriptors::new();
        let ox = k as f64 * dx;
        let oy = k as f64 * dy;
        for m in 0..cols {
            for r in 0..8 {
                let x = (m as f64 * 25.0 + 5.0) - ox;
                let y = (r as f64 * 25.0 + 15.0) - oy;
                if x >= 1.0 && x < W as f64 - 1.0 && y >= 1.0 && y < H as f64 - 1.0 {
                    feats.push(Descriptor {
                        data: vec![m as f32 * 23.0, r as f32 * 29.0, 7.0],
                        keypoint: KeyPoint::new(x, y),
                    });
                }
            }
        }
        out.push(feats);
    }

    if n > 2 {
        for s in 0..12usize {
            let x = 10.0 + (s % 4) as f64 * 13.0 + (s / 4) as f64 * 3.0;
            let y = 20.0 + (s / 4) as f64 * 40.0 + (s % 4) as f64 * 5.0;
            let data = vec![2000.0 + s as f32 * 31.0, s as f32 * 13.0, 9.0];
            out[0].push(Descriptor {
                data: data.clone(),
                keypoint: KeyPoint::new(x, y),
            });
            out[n - 1].push(Descriptor {
                data,
                keypoint: KeyPoint::new(x + 30.0, y + 4.0),
            });
        }
    }
    out
}

fn translation(tx: f64, ty: f64) -> Homography {
    Homography(Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0))
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

// --- single image -----------------------------------------------------------

#[test]
fn test_single_image_bundle() {
    let imgs = vec![solid(100, 100, [1.0, 0.0, 0.0])];
    // A lone image needs no matching, but it must carry features to pass the
    // degenerate-input check.
    let mut feats = Descriptors::new();
    feats.push(Descriptor {
        data: vec![1.0, 2.0],
        keypoint: KeyPoint::new(50.0, 50.0),
    });

    let assembly = Stitcher::from_features(imgs, vec![feats], StitchConfig::default())
        .unwrap()
        .build_bundle()
        .unwrap();

    assert_eq!(assembly.bundle.identity_idx, 0);
    assert_eq!(assembly.bundle.proj_method, ProjectionMethod::Cylindrical);
    assert_eq!(
        assembly.bundle.components[0].homo.max_diff(&Homography::identity()),
        0.0
    );
}

#[test]
fn test_single_image_cylindrical_canvas() {
    let imgs = vec![solid(100, 100, [1.0, 0.0, 0.0])];
    let mut feats = Descriptors::new();
    feats.push(Descriptor {
        data: vec![1.0],
        keypoint: KeyPoint::new(10.0, 10.0),
    });

    let canvas = Stitcher::from_features(imgs, vec![feats], StitchConfig::default())
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(canvas.width(), 100);
    assert_eq!(canvas.height(), 141);

    let mut painted = 0usize;
    let mut sentinel = 0usize;
    for p in canvas.pixels() {
        if is_no_color(p) {
            sentinel += 1;
        } else {
            painted += 1;
            assert!(close(p.0[0], 1.0) && close(p.0[1], 0.0) && close(p.0[2], 0.0));
        }
    }
    assert!(painted > 5000);
    assert!(sentinel > 0);
}

#[test]
fn test_single_image_flat_override_is_exact() {
    let imgs = vec![solid(100, 100, [1.0, 0.0, 0.0])];
    let mut feats = Descriptors::new();
    feats.push(Descriptor {
        data: vec![1.0],
        keypoint: KeyPoint::new(10.0, 10.0),
    });
    let config = StitchConfig {
        projection: Some(ProjectionMethod::Flat),
        ..Default::default()
    };

    let canvas = Stitcher::from_features(imgs, vec![feats], config)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!((canvas.width(), canvas.height()), (100, 100));
    for p in canvas.pixels() {
        assert_eq!(p, &Rgb([1.0, 0.0, 0.0]));
    }
}

// --- two-image planar translation -------------------------------------------

fn two_image_flat() -> Stitcher {
    let imgs = vec![gradient_slice(0), gradient_slice(1)];
    let feats = sweep_features(2, DX, 0.0);
    let config = StitchConfig {
        projection: Some(ProjectionMethod::Flat),
        ..Default::default()
    };
    Stitcher::from_features(imgs, feats, config).unwrap()
}

#[test]
fn test_two_image_translation_canvas() {
    let canvas = two_image_flat().build().unwrap();
    assert_eq!((canvas.width(), canvas.height()), (350, 200));

    // Left-only, identity-only, and overlap pixels all read the mosaic back.
    for &(x, y) in &[(25u32, 100u32), (275, 100), (175, 100)] {
        let p = canvas.get_pixel(x, y);
        assert!(close(p.0[0], x as f32 / 1000.0), "x={x} got {:?}", p);
        assert!(close(p.0[1], y as f32 / 500.0));
        assert!(close(p.0[2], 0.3));
    }
}

#[test]
fn test_two_image_bundle_invariants() {
    let assembly = two_image_flat().build_bundle().unwrap();
    let bundle = &assembly.bundle;

    assert_eq!(bundle.identity_idx, 1);
    assert_eq!(
        bundle.components[1].homo.max_diff(&Homography::identity()),
        0.0
    );
    assert!(bundle.components[0]
        .homo
        .max_diff(&translation(-DX, 0.0))
        < 1e-6);

    for comp in &bundle.components {
        let fwd = comp.homo * comp.homo_inv;
        let bwd = comp.homo_inv * comp.homo;
        assert!(fwd.max_diff(&Homography::identity()) < 1e-9);
        assert!(bwd.max_diff(&Homography::identity()) < 1e-9);
        assert!(bundle.proj_range.contains(comp.range.min));
        assert!(bundle.proj_range.contains(comp.range.max));
    }

    assert!(assembly.graph.is_symmetric());
    let fwd = assembly.graph.get(0, 1).unwrap();
    let rev = assembly.graph.get(1, 0).unwrap();
    assert!((fwd.homo * rev.homo).max_diff(&Homography::identity()) < 1e-6);
}

#[test]
fn test_two_image_determinism() {
    let a = two_image_flat().build().unwrap();
    let b = two_image_flat().build().unwrap();
    assert_eq!(a.as_raw(), b.as_raw());
}

// --- longer planar sweep -----------------------------------------------------

#[test]
fn test_five_image_chain_consistency() {
    let imgs: Vec<Rgb32FImage> = (0..5).map(gradient_slice).collect();
    let feats = sweep_features(5, DX, 0.0);
    let config = StitchConfig {
        projection: Some(ProjectionMethod::Flat),
        ..Default::default()
    };
    let assembly = Stitcher::from_features(imgs, feats, config)
        .unwrap()
        .build_bundle()
        .unwrap();
    let bundle = &assembly.bundle;

    assert_eq!(bundle.identity_idx, 2);
    assert!(assembly.graph.is_symmetric());
    // The cyclic sweep records the wrap edge as well.
    assert!(assembly.graph.has_edge(4, 0));

    for k in 0..4 {
        let step = assembly.graph.get(k + 1, k).unwrap().homo;
        let chained = bundle.components[k + 1].homo * step;
        assert!(
            chained.max_diff(&bundle.components[k].homo) < 1e-6,
            "chain broken at {k}"
        );
    }

    for (k, comp) in bundle.components.iter().enumerate() {
        let expected = translation((k as f64 - 2.0) * DX, 0.0);
        assert!(comp.homo.max_diff(&expected) < 1e-5, "component {k}");
    }
}

#[test]
fn test_straighten_removes_vertical_drift() {
    let imgs: Vec<Rgb32FImage> = (0..5).map(gradient_slice).collect();
    let feats = sweep_features(5, DX, 3.0);
    let config = StitchConfig {
        projection: Some(ProjectionMethod::Flat),
        straighten: false,
        ..Default::default()
    };
    let drifted = Stitcher::from_features(imgs.clone(), feats.clone(), config.clone())
        .unwrap()
        .build_bundle()
        .unwrap();
    let c0 = drifted.bundle.components[0].homo.trans2d(0.0, 0.0);
    let c4 = drifted.bundle.components[4].homo.trans2d(0.0, 0.0);
    assert!((c4.y - c0.y).abs() > 10.0);

    let config = StitchConfig {
        straighten: true,
        ..config
    };
    let straight = Stitcher::from_features(imgs, feats, config)
        .unwrap()
        .build_bundle()
        .unwrap();
    let c0 = straight.bundle.components[0].homo.trans2d(0.0, 0.0);
    let c4 = straight.bundle.components[4].homo.trans2d(0.0, 0.0);
    assert!((c4.y - c0.y).abs() < 1e-6);
}

#[test]
fn test_straighten_degenerate_is_singular() {
    let a = ImageComponent::new(0, 100, 100, Homography::identity());
    let b = ImageComponent::new(1, 100, 100, translation(0.0, 40.0));
    let mut bundle = Bundle::new(vec![a, b], 0, ProjectionMethod::Flat);
    assert!(matches!(
        straighten_simple(&mut bundle),
        Err(Error::SingularMatrix)
    ));
}

// --- panorama mode -----------------------------------------------------------

const PANO_W: u32 = 64;
const TRUE_FACTOR: f64 = 0.8;
const CYL_STEP: f64 = 9.0;

/// Raw-coordinate features of a cylindrical sweep captured with
/// `TRUE_FACTOR`; see the generator in the factor-search unit tests.
fn pano_features(n: usize) -> Vec<Descriptors> {
    let warper = pano_stitch::CylinderWarper::new(TRUE_FACTOR);
    let half = PANO_W as f64 / 2.0;
    let mut out = Vec::new();
    for k in 0..n {
        let mut feats = Descriptors::new();
        for m in -20..40 {
            for (ri, row) in [-15.0f64, -9.0, -3.0, 3.0, 9.0, 15.0].iter().enumerate() {
                let u = m as f64 * 3.0 - k as f64 * CYL_STEP;
                if u.abs() > 14.0 {
                    continue;
                }
                let (x, y) = warper.unwarp_point(u, *row, PANO_W);
                if x.abs() > 30.0 || y.abs() > 30.0 {
                    continue;
                }
                feats.push(Descriptor {
                    data: vec![m as f32 * 17.0, ri as f32 * 11.0, 3.0],
                    keypoint: KeyPoint::new(x + half, y + half),
                });
            }
        }
        out.push(feats);
    }
    out
}

fn pano_images(n: usize) -> Vec<Rgb32FImage> {
    (0..n)
        .map(|k| {
            let mut img = Rgb32FImage::new(PANO_W, PANO_W);
            for y in 0..PANO_W {
                for x in 0..PANO_W {
                    img.put_pixel(
                        x,
                        y,
                        Rgb([
                            (x + k as u32 * 7) as f32 / 100.0,
                            y as f32 / 100.0,
                            0.5,
                        ]),
                    );
                }
            }
            img
        })
        .collect()
}

fn pano_stitcher() -> Stitcher {
    let config = StitchConfig {
        pano: true,
        ..Default::default()
    };
    Stitcher::from_features(pano_images(5), pano_features(5), config).unwrap()
}

#[test]
fn test_pano_bundle_invariants() {
    let assembly = pano_stitcher().build_bundle().unwrap();
    let bundle = &assembly.bundle;

    assert_eq!(bundle.identity_idx, 2);
    assert_eq!(bundle.proj_method, ProjectionMethod::Flat);
    assert_eq!(
        bundle.components[2].homo.max_diff(&Homography::identity()),
        0.0
    );
    // Components reference the re-warped rasters.
    assert_eq!(assembly.images.len(), 5);
    assert!(assembly.images[0].width() < PANO_W);

    assert!(assembly.graph.is_symmetric());
    for k in 0..4 {
        assert!(assembly.graph.has_edge(k, k + 1));
        let step = assembly.graph.get(k + 1, k).unwrap().homo;
        let chained = bundle.components[k + 1].homo * step;
        assert!(
            chained.max_diff(&bundle.components[k].homo) < 1e-6,
            "chain broken at {k}"
        );
    }

    for comp in &bundle.components {
        let fwd = comp.homo * comp.homo_inv;
        assert!(fwd.max_diff(&Homography::identity()) < 1e-9);
        assert!(bundle.proj_range.contains(comp.range.min));
        assert!(bundle.proj_range.contains(comp.range.max));
    }
}

#[test]
fn test_pano_render_is_deterministic() {
    let a = pano_stitcher().build().unwrap();
    let b = pano_stitcher().build().unwrap();
    assert_eq!(a.as_raw(), b.as_raw());

    assert!(a.width() > PANO_W);
    let mut painted = 0usize;
    for p in a.pixels() {
        if !is_no_color(p) {
            painted += 1;
            assert!(p.0.iter().all(|v| v.is_finite() && *v >= 0.0 && *v <= 1.5));
        }
    }
    assert!(painted > 1000);
}

#[test]
fn test_pano_non_overlapping_pair_fails() {
    // A textured image next to a featureless gradient: the pair cannot match.
    let mut textured = Rgb32FImage::new(64, 64);
    for y in (8..56).step_by(12) {
        for x in (8..56).step_by(12) {
            for dy in 0..6 {
                for dx in 0..6 {
                    textured.put_pixel(x + dx, y + dy, Rgb([1.0, 1.0, 1.0]));
                }
            }
        }
    }
    let mut flat = Rgb32FImage::new(64, 64);
    for y in 0..64 {
        for x in 0..64 {
            flat.put_pixel(x, y, Rgb([x as f32 / 64.0; 3]));
        }
    }

    let config = StitchConfig {
        pano: true,
        ..Default::default()
    };
    let err = Stitcher::new(vec![textured, flat], config)
        .build()
        .unwrap_err();
    match err {
        Error::MatchFailure { a, b } => {
            assert!((a, b) == (0, 1) || (a, b) == (1, 0));
        }
        other => panic!("expected MatchFailure, got {other:?}"),
    }
}

// --- degenerate inputs --------------------------------------------------------

#[test]
fn test_empty_input_is_degenerate() {
    let err = Stitcher::new(Vec::new(), StitchConfig::default())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::DegenerateInput(_)));
}

#[test]
fn test_featureless_input_is_degenerate() {
    let imgs = vec![solid(64, 64, [0.2; 3]), solid(64, 64, [0.2; 3])];
    let err = Stitcher::new(imgs, StitchConfig::default())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::DegenerateInput(_)));
}

#[test]
fn test_mismatched_features_are_invalid() {
    let imgs = vec![solid(10, 10, [0.0; 3])];
    let err = Stitcher::from_features(imgs, Vec::new(), StitchConfig::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

// --- general pairwise discovery ----------------------------------------------

#[test]
fn test_match_all_pairs_builds_sparse_graph() {
    let mut feats = sweep_features(2, DX, 0.0);
    // A third image with unrelated content: no edge should appear.
    let mut stranger = Descriptors::new();
    for s in 0..20 {
        stranger.push(Descriptor {
            data: vec![5000.0 + s as f32 * 41.0, s as f32 * 3.0, 2.0],
            keypoint: KeyPoint::new(5.0 + s as f64 * 9.0, 30.0 + (s % 5) as f64 * 20.0),
        });
    }
    feats.push(stranger);

    let graph = match_all_pairs(&feats).unwrap();
    assert!(graph.is_symmetric());
    assert!(graph.has_edge(0, 1));
    assert!(graph.has_edge(1, 0));
    assert!(!graph.has_edge(0, 2));
    assert!(!graph.has_edge(1, 2));

    let info = graph.get(0, 1).unwrap();
    assert!(info.homo.max_diff(&translation(DX, 0.0)) < 1e-6);
}
