//! Physics Error Types
//!
//! Unified error type for the engine. Construction-time failures (bad hull
//! input, degenerate inertia) surface to the caller; per-step failures abort
//! the step. An absent contact manifold is *not* an error — the narrowphase
//! reports it as `None`.

use core::fmt;

/// Unified error type for physics operations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PhysicsError {
    /// Hull input was non-convex, degenerate, or non-manifold.
    InvalidShape {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// Matrix inverse requested for a near-singular matrix (|det| < 1e-3).
    /// For inertia tensors this indicates a degenerate body.
    SingularMatrix {
        /// The offending determinant
        det: f32,
    },
    /// Ring buffer exhausted. The caller is expected to size queues to the
    /// worst-case traversal depth.
    QueueOverflow {
        /// Capacity of the queue that overflowed
        capacity: usize,
    },
    /// BVH bulk build received an empty leaf range.
    EmptyPartition,
    /// Body index out of range.
    InvalidBodyIndex {
        /// The invalid index that was provided
        index: usize,
        /// Current number of bodies in the world
        count: usize,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidShape { reason } => write!(f, "invalid hull shape: {reason}"),
            Self::SingularMatrix { det } => {
                write!(f, "matrix inverse failed: |det| = {det} below threshold")
            }
            Self::QueueOverflow { capacity } => {
                write!(f, "traversal queue overflow (capacity={capacity})")
            }
            Self::EmptyPartition => write!(f, "bvh build received an empty leaf range"),
            Self::InvalidBodyIndex { index, count } => {
                write!(f, "body index {index} out of range (count={count})")
            }
        }
    }
}

impl std::error::Error for PhysicsError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = PhysicsError::InvalidBodyIndex { index: 5, count: 3 };
        let s = format!("{}", e);
        assert!(s.contains("5"), "Should contain index");
        assert!(s.contains("3"), "Should contain count");
    }

    #[test]
    fn test_error_variants_distinct() {
        let e1 = PhysicsError::EmptyPartition;
        let e2 = PhysicsError::QueueOverflow { capacity: 64 };
        let e3 = PhysicsError::InvalidShape {
            reason: "edge borders one face",
        };
        assert_ne!(e1, e2);
        assert_ne!(e2, e3);
    }

    #[test]
    fn test_singular_matrix_display() {
        let e = PhysicsError::SingularMatrix { det: 0.0001 };
        let s = format!("{}", e);
        assert!(s.contains("det"));
    }
}
