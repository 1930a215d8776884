//! Range extraction: clip-wide ranges over the converted samples, and
//! per-segment ranges over the clip-normalized samples.

use glam::Vec4;

use super::clip_context::{ClipContext, ClipState, SubTrackKind, TrackStreamRange, SUB_TRACK_KINDS};
use super::settings::CompressionSettings;

/// True when `kind` is stored with variable bit rates under `settings`.
#[inline]
pub(crate) fn is_format_variable(settings: &CompressionSettings, kind: SubTrackKind) -> bool {
    match kind {
        SubTrackKind::Rotation => settings.rotation_format.is_variable(),
        SubTrackKind::Translation => settings.translation_format.is_variable(),
        SubTrackKind::Scale => settings.scale_format.is_variable(),
    }
}

/// Computes each bone's component-wise min/extent over the whole clip.
pub(crate) fn extract_clip_bone_ranges(context: &mut ClipContext) {
    context.transition(ClipState::Raw, ClipState::RangesExtracted);
    for bone in &mut context.bones {
        for kind in SUB_TRACK_KINDS {
            bone.ranges[kind as usize] =
                TrackStreamRange::from_samples(bone.streams[kind as usize].iter());
        }
    }
}

/// Recomputes tighter per-segment ranges of the already clip-normalized
/// samples, snapped to their 8-bit stored representation.
///
/// The stored min is floored and the extent ceiled so the decoded 8-bit range
/// still covers the true one; segment normalization and the decoder both use
/// the decoded form, keeping the two sides bit-exact.
pub(crate) fn extract_segment_bone_ranges(
    context: &mut ClipContext,
    settings: &CompressionSettings,
) {
    debug_assert_eq!(context.state, ClipState::Segmented);
    let num_bones = context.num_bones as usize;
    for segment in &mut context.segments {
        for bone_index in 0..num_bones {
            let flags = context.bones[bone_index].flags;
            let segment_bone = &mut segment.bones[bone_index];
            for kind in SUB_TRACK_KINDS {
                if !flags[kind as usize].is_animated() || !is_format_variable(settings, kind) {
                    continue;
                }
                let exact =
                    TrackStreamRange::from_samples(segment_bone.streams[kind as usize].iter());
                segment_bone.range_min_exact[kind as usize] = exact.min;

                let mut min_u8 = [0u8; 3];
                let mut extent_u8 = [0u8; 3];
                let mut decoded_min = Vec4::ZERO;
                let mut decoded_extent = Vec4::ZERO;
                for component in 0..3 {
                    let lo = exact.min[component].clamp(0.0, 1.0);
                    let hi = (exact.min[component] + exact.extent[component]).clamp(0.0, 1.0);
                    let lo_u8 = (lo * 255.0).floor() as u8;
                    let hi_u8 = (hi * 255.0).ceil().min(255.0) as u8;
                    min_u8[component] = lo_u8;
                    extent_u8[component] = hi_u8 - lo_u8;
                    decoded_min[component] = f32::from(lo_u8) / 255.0;
                    decoded_extent[component] = f32::from(hi_u8 - lo_u8) / 255.0;
                }
                segment_bone.range_min_u8[kind as usize] = min_u8;
                segment_bone.range_extent_u8[kind as usize] = extent_u8;
                segment_bone.ranges[kind as usize] =
                    TrackStreamRange { min: decoded_min, extent: decoded_extent };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip_context::initialize_clip_context;
    use crate::compression::track_array::{TrackArray, TransformTrack};
    use crate::format::AdditiveFormat;
    use crate::math::QvvTransform;
    use glam::Vec3;

    #[test]
    fn clip_range_covers_min_and_extent() {
        let samples = vec![
            QvvTransform { translation: Vec3::new(1.0, -2.0, 0.5), ..QvvTransform::IDENTITY },
            QvvTransform { translation: Vec3::new(3.0, 4.0, 0.5), ..QvvTransform::IDENTITY },
        ];
        let array = TrackArray::new(vec![TransformTrack::new(samples, 30.0)]).unwrap();
        let mut context = initialize_clip_context(&array, AdditiveFormat::None).unwrap();
        extract_clip_bone_ranges(&mut context);
        let range = context.bones[0].ranges[SubTrackKind::Translation as usize];
        assert_eq!(range.min.x, 1.0);
        assert_eq!(range.min.y, -2.0);
        assert_eq!(range.extent.x, 2.0);
        assert_eq!(range.extent.y, 6.0);
        assert_eq!(range.extent.z, 0.0);
    }
}
