//! Vector, Matrix, and Coordinate-Frame Mathematics
//!
//! Minimal 3D math kernel for the rigid-body pipeline.
//!
//! # Types
//!
//! - `Vec3`: 3D vector with the usual dot/cross/normalize operations
//! - `Mat3`: 3x3 matrix for rotations and inertia tensors (column-major)
//! - `CFrame`: affine coordinate frame (position + rotation matrix)
//!
//! # Precision
//!
//! Everything is `f32`. Matrix inversion refuses near-singular input
//! (|det| < 1e-3) instead of returning garbage — a singular inertia tensor
//! means the caller constructed a degenerate body.

use core::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::PhysicsError;

/// Determinant magnitude below which `Mat3::inverse` fails.
pub const DET_EPSILON: f32 = 1e-3;

// ============================================================================
// Vec3
// ============================================================================

/// 3D vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All-ones vector
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Unit X vector
    pub const UNIT_X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit Y vector
    pub const UNIT_Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Unit Z vector
    pub const UNIT_Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Create new vector
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Vector with all components set to `v`
    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Dot product
    #[inline]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product
    #[inline]
    pub fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    /// Squared length (no sqrt)
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length (magnitude)
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Normalize to unit length. Zero-length input yields the zero vector.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            self / len
        }
    }

    /// Component-wise minimum
    #[inline]
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    /// Component-wise maximum
    #[inline]
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    /// Component-wise absolute value
    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    /// Component-wise multiply
    #[inline]
    pub fn mul_elem(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    /// True if every component is finite
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ============================================================================
// Mat3
// ============================================================================

/// 3x3 matrix, column-major. Used for rotations and inertia tensors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Mat3 {
    /// Column 0
    pub col0: Vec3,
    /// Column 1
    pub col1: Vec3,
    /// Column 2
    pub col2: Vec3,
}

impl Mat3 {
    /// Identity matrix
    pub const IDENTITY: Self = Self {
        col0: Vec3::UNIT_X,
        col1: Vec3::UNIT_Y,
        col2: Vec3::UNIT_Z,
    };

    /// Zero matrix
    pub const ZERO: Self = Self {
        col0: Vec3::ZERO,
        col1: Vec3::ZERO,
        col2: Vec3::ZERO,
    };

    /// Create from columns
    #[inline]
    pub const fn from_cols(col0: Vec3, col1: Vec3, col2: Vec3) -> Self {
        Self { col0, col1, col2 }
    }

    /// Create diagonal matrix
    #[inline]
    pub fn diagonal(x: f32, y: f32, z: f32) -> Self {
        Self {
            col0: Vec3::new(x, 0.0, 0.0),
            col1: Vec3::new(0.0, y, 0.0),
            col2: Vec3::new(0.0, 0.0, z),
        }
    }

    /// Outer product `a ⊗ b` (column j is `a * b[j]`)
    #[inline]
    pub fn outer(a: Vec3, b: Vec3) -> Self {
        Self {
            col0: a * b.x,
            col1: a * b.y,
            col2: a * b.z,
        }
    }

    /// Rotation matrix from a unit axis and an angle (Rodrigues' formula).
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let Vec3 { x, y, z } = axis;

        Self::from_cols(
            Vec3::new(t * x * x + c, t * x * y + s * z, t * x * z - s * y),
            Vec3::new(t * x * y - s * z, t * y * y + c, t * y * z + s * x),
            Vec3::new(t * x * z + s * y, t * y * z - s * x, t * z * z + c),
        )
    }

    /// Matrix-vector multiplication
    #[inline]
    pub fn mul_vec(self, v: Vec3) -> Vec3 {
        self.col0 * v.x + self.col1 * v.y + self.col2 * v.z
    }

    /// Transpose
    #[inline]
    pub fn transpose(self) -> Self {
        Self {
            col0: Vec3::new(self.col0.x, self.col1.x, self.col2.x),
            col1: Vec3::new(self.col0.y, self.col1.y, self.col2.y),
            col2: Vec3::new(self.col0.z, self.col1.z, self.col2.z),
        }
    }

    /// Scale all elements
    #[inline]
    pub fn scale(self, s: f32) -> Self {
        Self {
            col0: self.col0 * s,
            col1: self.col1 * s,
            col2: self.col2 * s,
        }
    }

    /// Determinant (scalar triple product of the columns)
    #[inline]
    pub fn determinant(self) -> f32 {
        self.col0.dot(self.col1.cross(self.col2))
    }

    /// Inverse via the cofactor expansion.
    ///
    /// Fails with [`PhysicsError::SingularMatrix`] when |det| < 1e-3; for an
    /// inertia tensor that means the body is degenerate.
    pub fn inverse(self) -> Result<Self, PhysicsError> {
        let det = self.determinant();
        if det.abs() < DET_EPSILON {
            return Err(PhysicsError::SingularMatrix { det });
        }

        let inv_det = 1.0 / det;
        // Rows of the inverse are the column cross products over the determinant.
        let r0 = self.col1.cross(self.col2) * inv_det;
        let r1 = self.col2.cross(self.col0) * inv_det;
        let r2 = self.col0.cross(self.col1) * inv_det;

        Ok(Self {
            col0: Vec3::new(r0.x, r1.x, r2.x),
            col1: Vec3::new(r0.y, r1.y, r2.y),
            col2: Vec3::new(r0.z, r1.z, r2.z),
        })
    }

    /// Re-orthonormalize a near-rotation matrix (Gram-Schmidt on columns).
    ///
    /// Integrating angular velocity drifts the rotation away from O(3);
    /// calling this each step keeps the frame orthonormal.
    pub fn orthonormalized(self) -> Self {
        let c0 = self.col0.normalize();
        let c1 = (self.col1 - c0 * c0.dot(self.col1)).normalize();
        let c2 = c0.cross(c1);
        Self::from_cols(c0, c1, c2)
    }
}

impl Add for Mat3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            col0: self.col0 + rhs.col0,
            col1: self.col1 + rhs.col1,
            col2: self.col2 + rhs.col2,
        }
    }
}

impl Sub for Mat3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            col0: self.col0 - rhs.col0,
            col1: self.col1 - rhs.col1,
            col2: self.col2 - rhs.col2,
        }
    }
}

impl Mul for Mat3 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            col0: self.mul_vec(rhs.col0),
            col1: self.mul_vec(rhs.col1),
            col2: self.mul_vec(rhs.col2),
        }
    }
}

impl Mul<f32> for Mat3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        self.scale(rhs)
    }
}

// ============================================================================
// CFrame
// ============================================================================

/// Affine coordinate frame: a position plus a 3x3 rotation.
///
/// Transforms compose vectors by rotation then translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CFrame {
    /// Frame origin in world space
    pub position: Vec3,
    /// Frame orientation (orthonormal)
    pub rotation: Mat3,
}

impl CFrame {
    /// Identity frame at the origin
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Mat3::IDENTITY,
    };

    /// Create a frame from a position and rotation
    #[inline]
    pub const fn new(position: Vec3, rotation: Mat3) -> Self {
        Self { position, rotation }
    }

    /// Frame at `position` with identity rotation
    #[inline]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Mat3::IDENTITY,
        }
    }

    /// Transform a local point into world space (rotate + translate)
    #[inline]
    pub fn point_to_world(&self, p: Vec3) -> Vec3 {
        self.rotation.mul_vec(p) + self.position
    }

    /// Rotate a local direction into world space (no translation)
    #[inline]
    pub fn vector_to_world(&self, v: Vec3) -> Vec3 {
        self.rotation.mul_vec(v)
    }

    /// Transform a world point into this frame's local space
    #[inline]
    pub fn point_to_local(&self, p: Vec3) -> Vec3 {
        self.rotation.transpose().mul_vec(p - self.position)
    }

    /// Compose two frames: `self * rhs` applies `rhs` first
    pub fn compose(&self, rhs: &CFrame) -> CFrame {
        CFrame {
            position: self.point_to_world(rhs.position),
            rotation: self.rotation * rhs.rotation,
        }
    }
}

impl Default for CFrame {
    fn default() -> Self {
        Self::IDENTITY
    }
}
