//! Converts rotation streams to the on-disk rotation variant.

use glam::Vec4;

use crate::error::CompressError;
use crate::format::RotationFormat;

use super::clip_context::ClipContext;

/// Unit-length tolerance on `|q|² − 1` for input rotations.
const UNIT_QUAT_TOLERANCE: f32 = 0.001;

/// Rewrites every rotation sample into `format`'s component layout.
///
/// Drop-W variants flip each quaternion into the `w >= 0` hemisphere and
/// zero the discarded component; the full format keeps all four components.
/// Fails when a rotation is not unit length within tolerance.
pub(crate) fn convert_rotation_streams(
    context: &mut ClipContext,
    format: RotationFormat,
) -> Result<(), CompressError> {
    for bone in &mut context.bones {
        for sample in &mut bone.streams[0] {
            if (sample.length_squared() - 1.0).abs() > UNIT_QUAT_TOLERANCE {
                return Err(CompressError::SomeRotationsNotNormalized);
            }
            *sample = convert_sample(*sample, format);
        }
        // The unnormalized copy tracks the converted layout.
        bone.unnormalized[0].clone_from(&bone.streams[0]);
    }
    Ok(())
}

#[inline]
fn convert_sample(sample: Vec4, format: RotationFormat) -> Vec4 {
    match format {
        RotationFormat::QuatFull => sample,
        RotationFormat::QuatDropWFull | RotationFormat::QuatDropWVariable => {
            let signed = if sample.w >= 0.0 { sample } else { -sample };
            Vec4::new(signed.x, signed.y, signed.z, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip_context::initialize_clip_context;
    use crate::compression::track_array::{rotation_sample, TrackArray, TransformTrack};
    use crate::format::AdditiveFormat;
    use glam::Quat;

    #[test]
    fn drop_w_flips_negative_hemisphere_and_zeroes_w() {
        let q = -Quat::from_rotation_x(0.8);
        assert!(q.w < 0.0);
        let array =
            TrackArray::new(vec![TransformTrack::new(vec![rotation_sample(q)], 30.0)]).unwrap();
        let mut context = initialize_clip_context(&array, AdditiveFormat::None).unwrap();
        convert_rotation_streams(&mut context, RotationFormat::QuatDropWVariable).unwrap();
        let converted = context.bones[0].streams[0][0];
        assert!(converted.x <= 0.0, "x sign must flip with w");
        assert_eq!(converted.w, 0.0);
        assert_eq!(context.bones[0].unnormalized[0][0], converted);
    }

    #[test]
    fn non_unit_rotation_is_rejected() {
        let q = Quat::from_xyzw(0.5, 0.5, 0.5, 0.9);
        let array =
            TrackArray::new(vec![TransformTrack::new(vec![rotation_sample(q)], 30.0)]).unwrap();
        let mut context = initialize_clip_context(&array, AdditiveFormat::None).unwrap();
        assert!(matches!(
            convert_rotation_streams(&mut context, RotationFormat::QuatDropWVariable),
            Err(CompressError::SomeRotationsNotNormalized)
        ));
    }
}
