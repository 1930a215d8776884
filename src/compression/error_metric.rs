//! Object-space error measurement.
//!
//! The metric rigidly attaches a virtual point at the shell distance along
//! each canonical axis of a bone and reports the worst displacement between
//! the reference and lossy object-space transforms. Scale participates
//! multiplicatively through the transform itself.

use glam::Vec3;

use crate::format::AdditiveFormat;
use crate::math::QvvTransform;

/// Worst displacement of the three shell-distance virtual vertices.
pub(crate) fn object_space_error(
    reference: &QvvTransform,
    lossy: &QvvTransform,
    shell_distance: f32,
) -> f32 {
    let vx = Vec3::new(shell_distance, 0.0, 0.0);
    let vy = Vec3::new(0.0, shell_distance, 0.0);
    let vz = Vec3::new(0.0, 0.0, shell_distance);

    let dx = reference.transform_point(vx).distance(lossy.transform_point(vx));
    let dy = reference.transform_point(vy).distance(lossy.transform_point(vy));
    let dz = reference.transform_point(vz).distance(lossy.transform_point(vz));
    dx.max(dy).max(dz)
}

/// Composes an additive clip's local transform onto its base pose, so the
/// error is measured in the space the runtime will actually blend in.
pub(crate) fn apply_additive(
    base: &QvvTransform,
    local: &QvvTransform,
    format: AdditiveFormat,
) -> QvvTransform {
    match format {
        AdditiveFormat::None => *local,
        AdditiveFormat::Relative => base.mul(local),
        AdditiveFormat::Additive0 => QvvTransform {
            rotation: (local.rotation * base.rotation).normalize(),
            translation: base.translation + local.translation,
            scale: base.scale * local.scale,
        },
        AdditiveFormat::Additive1 => QvvTransform {
            rotation: (local.rotation * base.rotation).normalize(),
            translation: base.translation + local.translation,
            scale: base.scale * (Vec3::ONE + local.scale),
        },
    }
}
