//! Panorama assembly: pairwise alignment, transform chaining, cylindrical
//! warping with focal-factor search, canvas planning and rendering.

pub mod blend;
pub mod bundle;
pub mod config;
pub mod graph;
mod hfactor;
pub mod render;
pub mod stitcher;
pub mod warp;

pub use blend::LinearBlender;
pub use bundle::{Bundle, ImageComponent, ProjectionMethod};
pub use config::StitchConfig;
pub use graph::PairGraph;
pub use render::{canvas_size, render};
pub use stitcher::{match_all_pairs, Assembly, Stitcher};
pub use warp::CylinderWarper;
