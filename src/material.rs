//! Surface Materials
//!
//! Per-body restitution, friction, and Baumgarte stabilization coefficients,
//! plus the pairwise combination used when two bodies touch. All three
//! coefficients combine multiplicatively: the restitution and β products are
//! part of the contact bias definition, and friction follows the same rule.

/// Surface coefficients carried by every body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Coefficient of restitution (bounciness), typically in [0, 1]
    pub restitution: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Baumgarte positional-correction coefficient β, typically in [0, 1]
    pub baumgarte: f32,
}

impl Material {
    /// Create a material from its three coefficients
    #[inline]
    pub const fn new(restitution: f32, friction: f32, baumgarte: f32) -> Self {
        Self {
            restitution,
            friction,
            baumgarte,
        }
    }

    /// Combine two materials for a contact pair (component-wise product).
    #[inline]
    pub fn combine(self, other: Material) -> Material {
        Material {
            restitution: self.restitution * other.restitution,
            friction: self.friction * other.friction,
            baumgarte: self.baumgarte * other.baumgarte,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: 0.45,
            friction: 0.4,
            baumgarte: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_is_product() {
        let a = Material::new(0.5, 0.8, 0.4);
        let b = Material::new(0.5, 0.5, 0.5);
        let c = a.combine(b);
        assert!((c.restitution - 0.25).abs() < 1e-6);
        assert!((c.friction - 0.4).abs() < 1e-6);
        assert!((c.baumgarte - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_combine_commutes() {
        let a = Material::new(0.3, 0.7, 0.6);
        let b = Material::new(0.9, 0.2, 0.5);
        assert_eq!(a.combine(b), b.combine(a));
    }
}
