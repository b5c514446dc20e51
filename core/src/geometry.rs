use nalgebra::{Matrix3, Point2, Vector3};
use std::ops::Mul;

use crate::{Error, Result};

const PERSPECTIVE_EPS: f64 = 1e-12;

/// 3x3 projective transform between two image planes, acting on
/// homogeneous 2D points. Composition `a * b` means "apply `b`, then `a`".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Homography(Matrix3::identity())
    }

    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Homography(m)
    }

    pub fn apply(&self, v: Vector3<f64>) -> Vector3<f64> {
        self.0 * v
    }

    /// Apply and perspective-divide. Returns the NaN sentinel when the
    /// homogeneous scale vanishes.
    pub fn trans_normalize(&self, v: Vector3<f64>) -> Point2<f64> {
        let t = self.0 * v;
        if t.z.abs() < PERSPECTIVE_EPS {
            return nan_point();
        }
        Point2::new(t.x / t.z, t.y / t.z)
    }

    pub fn trans2d(&self, x: f64, y: f64) -> Point2<f64> {
        self.trans_normalize(Vector3::new(x, y, 1.0))
    }

    pub fn inverse(&self) -> Result<Homography> {
        self.0
            .try_inverse()
            .map(Homography)
            .ok_or(Error::SingularMatrix)
    }

    /// Largest absolute entry difference against another transform, with both
    /// sides scaled so the bottom-right entry is 1.
    pub fn max_diff(&self, other: &Homography) -> f64 {
        let a = normalized(&self.0);
        let b = normalized(&other.0);
        let mut worst = 0.0f64;
        for i in 0..3 {
            for j in 0..3 {
                worst = worst.max((a[(i, j)] - b[(i, j)]).abs());
            }
        }
        worst
    }
}

fn normalized(m: &Matrix3<f64>) -> Matrix3<f64> {
    if m[(2, 2)].abs() > PERSPECTIVE_EPS {
        m / m[(2, 2)]
    } else {
        *m
    }
}

impl Mul for Homography {
    type Output = Homography;

    fn mul(self, rhs: Homography) -> Homography {
        Homography(self.0 * rhs.0)
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

pub fn nan_point() -> Point2<f64> {
    Point2::new(f64::NAN, f64::NAN)
}

pub fn is_nan_point(p: &Point2<f64>) -> bool {
    p.x.is_nan() || p.y.is_nan()
}

/// Axis-aligned bounding box over 2D points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect2D {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Rect2D {
    pub fn empty() -> Self {
        Rect2D {
            min: Point2::new(f64::INFINITY, f64::INFINITY),
            max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn extend(&mut self, p: Point2<f64>) {
        if is_nan_point(&p) {
            return;
        }
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(&self, other: &Rect2D) -> Rect2D {
        let mut out = *self;
        if !other.is_empty() {
            out.extend(other.min);
            out.extend(other.max);
        }
        out
    }

    pub fn contains(&self, p: Point2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}
