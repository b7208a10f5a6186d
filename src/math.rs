//! 2D rigid transforms and small matrix solves on top of `glam`.

use glam::{Mat3, Vec2, Vec3};

/// Rotation stored as the sine/cosine of its angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Rot {
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    #[inline]
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Rotated x-axis.
    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// Rotated y-axis.
    #[inline]
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotate a vector.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse rotate a vector.
    #[inline]
    pub fn apply_t(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// `self * other`
    #[inline]
    pub fn mul(&self, other: &Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// `inverse(self) * other`
    #[inline]
    pub fn mul_t(&self, other: &Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid transform: translation followed by rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    #[inline]
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            p: position,
            q: Rot::new(angle),
        }
    }

    #[inline]
    pub fn from_translation(position: Vec2) -> Self {
        Self {
            p: position,
            q: Rot::IDENTITY,
        }
    }

    /// Map a local point to world space.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.apply(v) + self.p
    }

    /// Map a world point to local space.
    #[inline]
    pub fn apply_t(&self, v: Vec2) -> Vec2 {
        self.q.apply_t(v - self.p)
    }

    /// `self * other`
    #[inline]
    pub fn mul(&self, other: &Transform) -> Transform {
        Transform {
            p: self.q.apply(other.p) + self.p,
            q: self.q.mul(&other.q),
        }
    }

    /// `inverse(self) * other`
    #[inline]
    pub fn mul_t(&self, other: &Transform) -> Transform {
        Transform {
            p: self.q.apply_t(other.p - self.p),
            q: self.q.mul_t(&other.q),
        }
    }
}

/// Cross product of two vectors (the z component of the 3D cross).
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a vector and a scalar: `v x (s k)`.
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar and a vector: `(s k) x v`.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Solve the upper-left 2x2 block of `k` for `b`. Singular blocks give zero.
pub fn solve22(k: &Mat3, b: Vec2) -> Vec2 {
    let (a11, a12, a21, a22) = (k.x_axis.x, k.y_axis.x, k.x_axis.y, k.y_axis.y);
    let mut det = a11 * a22 - a12 * a21;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
}

/// Solve `k * x = b`. Singular matrices give zero.
pub fn solve33(k: &Mat3, b: Vec3) -> Vec3 {
    let (ex, ey, ez) = (k.x_axis, k.y_axis, k.z_axis);
    let mut det = ex.dot(ey.cross(ez));
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec3::new(
        det * b.dot(ey.cross(ez)),
        det * ex.dot(b.cross(ez)),
        det * ex.dot(ey.cross(b)),
    )
}

/// Inverse of the upper-left 2x2 block, embedded in a 3x3 with zero third
/// row and column. Singular blocks give the zero matrix.
pub fn inverse22(k: &Mat3) -> Mat3 {
    let (a, b, c, d) = (k.x_axis.x, k.y_axis.x, k.x_axis.y, k.y_axis.y);
    let mut det = a * d - b * c;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Mat3::from_cols(
        Vec3::new(det * d, -det * c, 0.0),
        Vec3::new(-det * b, det * a, 0.0),
        Vec3::ZERO,
    )
}

/// Inverse of a symmetric 3x3 matrix. Singular matrices give zero.
pub fn sym_inverse33(k: &Mat3) -> Mat3 {
    let (ex, ey, ez) = (k.x_axis, k.y_axis, k.z_axis);
    let mut det = ex.dot(ey.cross(ez));
    if det != 0.0 {
        det = 1.0 / det;
    }

    let (a11, a12, a13) = (ex.x, ey.x, ez.x);
    let (a22, a23) = (ey.y, ez.y);
    let a33 = ez.z;

    let m11 = det * (a22 * a33 - a23 * a23);
    let m12 = det * (a13 * a23 - a12 * a33);
    let m13 = det * (a12 * a23 - a13 * a22);
    let m22 = det * (a11 * a33 - a13 * a13);
    let m23 = det * (a13 * a12 - a11 * a23);
    let m33 = det * (a11 * a22 - a12 * a12);

    Mat3::from_cols(
        Vec3::new(m11, m12, m13),
        Vec3::new(m12, m22, m23),
        Vec3::new(m13, m23, m33),
    )
}

/// Multiply the upper-left 2x2 block of `m` with `v`.
#[inline]
pub fn mul22(m: &Mat3, v: Vec2) -> Vec2 {
    Vec2::new(
        m.x_axis.x * v.x + m.y_axis.x * v.y,
        m.x_axis.y * v.x + m.y_axis.y * v.y,
    )
}
