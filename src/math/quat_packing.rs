//! Quaternion packing conventions: drop-W storage and interpolation.
//!
//! The drop-W formats store only `(x, y, z)` under the convention that the
//! discarded `w` is non-negative; the decoder reconstructs
//! `w = sqrt(max(0, 1 − x² − y² − z²))`.

use glam::{Quat, Vec3, Vec4};

/// Returns the quaternion's `(x, y, z)` after flipping the sign so `w >= 0`.
///
/// Both quaternions of a sign pair represent the same rotation; drop-W keeps
/// the one with non-negative `w` so the component can be dropped.
#[inline]
pub fn quat_to_positive_w_vec3(q: Quat) -> Vec3 {
    if q.w >= 0.0 {
        Vec3::new(q.x, q.y, q.z)
    } else {
        Vec3::new(-q.x, -q.y, -q.z)
    }
}

/// Rebuilds a quaternion from a drop-W triple.
///
/// Quantization can push `x² + y² + z²` slightly above one; the radicand is
/// clamped to zero so the reconstruction stays real.
#[inline]
pub fn quat_from_positive_w(v: Vec3) -> Quat {
    let w_squared = 1.0 - v.length_squared();
    let w = if w_squared > 0.0 { w_squared.sqrt() } else { 0.0 };
    Quat::from_xyzw(v.x, v.y, v.z, w)
}

/// Linear interpolation of two unit quaternions, renormalized.
///
/// The second key is biased into the first's hemisphere. Normalized lerp is
/// the decoder's contract: adjacent compressed keys are close enough (the
/// error budget enforces it) that slerp buys nothing.
#[inline]
pub fn quat_lerp_normalized(a: Quat, b: Quat, alpha: f32) -> Quat {
    let a4 = Vec4::new(a.x, a.y, a.z, a.w);
    let mut b4 = Vec4::new(b.x, b.y, b.z, b.w);
    if a4.dot(b4) < 0.0 {
        b4 = -b4;
    }
    let lerped = a4 + (b4 - a4) * alpha;
    Quat::from_vec4(lerped).normalize()
}
