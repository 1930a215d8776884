//! Quaternion-vector-vector (rotation, translation, scale) transforms.

use glam::{Quat, Vec3};

/// A local- or object-space transform: rotation, translation, per-axis scale.
///
/// Composition ignores shear, the usual approximation for skeletal hierarchies
/// carrying non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QvvTransform {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

impl QvvTransform {
    /// The identity transform (unit scale).
    pub const IDENTITY: QvvTransform = QvvTransform {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    #[inline]
    pub fn new(rotation: Quat, translation: Vec3, scale: Vec3) -> Self {
        Self { rotation, translation, scale }
    }

    /// Applies the transform to a point: `rotation * (scale ⊙ p) + translation`.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (self.scale * point) + self.translation
    }

    /// Composes `self ∘ child` so that
    /// `result.transform_point(p) == self.transform_point(child.transform_point(p))`
    /// up to the shear dropped by the scale product.
    #[inline]
    pub fn mul(&self, child: &QvvTransform) -> QvvTransform {
        QvvTransform {
            rotation: (self.rotation * child.rotation).normalize(),
            translation: self.transform_point(child.translation),
            scale: self.scale * child.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QvvTransform;
    use approx::assert_abs_diff_eq;
    use glam::{Quat, Vec3};

    #[test]
    fn identity_maps_points_to_themselves() {
        let p = Vec3::new(1.0, -2.0, 3.0);
        assert_eq!(QvvTransform::IDENTITY.transform_point(p), p);
    }

    #[test]
    fn transform_point_applies_scale_then_rotation_then_translation() {
        let t = QvvTransform::new(
            Quat::from_rotation_z(core::f32::consts::FRAC_PI_2),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::splat(2.0),
        );
        let p = t.transform_point(Vec3::X);
        // (1,0,0) scaled to (2,0,0), rotated to (0,2,0), translated to (10,2,0).
        assert_abs_diff_eq!(p.x, 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn mul_matches_nested_application_without_scale() {
        let a = QvvTransform::new(
            Quat::from_rotation_y(0.7),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::ONE,
        );
        let b = QvvTransform::new(
            Quat::from_rotation_x(-0.3),
            Vec3::new(-4.0, 0.5, 0.0),
            Vec3::ONE,
        );
        let p = Vec3::new(0.2, -1.0, 2.5);
        let nested = a.transform_point(b.transform_point(p));
        let composed = a.mul(&b).transform_point(p);
        assert_abs_diff_eq!(nested.x, composed.x, epsilon = 1e-5);
        assert_abs_diff_eq!(nested.y, composed.y, epsilon = 1e-5);
        assert_abs_diff_eq!(nested.z, composed.z, epsilon = 1e-5);
    }
}
