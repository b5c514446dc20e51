pub mod geometry;
pub mod image;
pub mod keypoint;
pub mod matches;
pub mod robust;

pub use geometry::*;
pub use image::*;
pub use keypoint::*;
pub use matches::*;
pub use robust::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("images {a} and {b} do not match")]
    MatchFailure { a: usize, b: usize },

    #[error("no cylinder factor produced a consistent chain")]
    FactorSearchFailure,

    #[error("matrix is singular")]
    SingularMatrix,

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
