//! Constant and default sub-track collapsing.
//!
//! A sub-track whose samples never move beyond its constancy threshold keeps
//! a single representative (sample 0, in converted space); when that
//! representative also matches the type's identity nothing is stored at all.
//! Default and constant are mutually exclusive: default wins.

use glam::Vec4;

use crate::format::RotationFormat;
use crate::math::quat_from_positive_w;

use super::clip_context::{
    stream_to_quat, ClipContext, ClipState, SubTrackKind,
};
use super::track_array::TrackArray;

/// Classifies every sub-track as default, constant, or animated.
pub(crate) fn compact_constant_streams(
    context: &mut ClipContext,
    track_list: &TrackArray,
    rotation_format: RotationFormat,
) {
    context.transition(ClipState::RangesExtracted, ClipState::ConstantsCollapsed);

    let default_scale = context.default_scale;
    let has_scale = context.has_scale;

    for (bone, track) in context.bones.iter_mut().zip(track_list.tracks()) {
        let desc = &track.description;

        // Rotation: an angle test against sample 0.
        {
            let stream = &bone.streams[SubTrackKind::Rotation as usize];
            let reference = rotation_from_stream(stream[0], rotation_format);
            let half_angle_cos = (desc.constant_rotation_threshold_angle * 0.5).cos();
            let is_constant = stream
                .iter()
                .map(|s| rotation_from_stream(*s, rotation_format))
                .all(|q| reference.dot(q).abs().min(1.0) >= half_angle_cos);
            let is_default = is_constant && reference.w.abs().min(1.0) >= half_angle_cos;

            let flags = &mut bone.flags[SubTrackKind::Rotation as usize];
            flags.is_default = is_default;
            flags.is_constant = is_constant && !is_default;
            bone.constant_sample[SubTrackKind::Rotation as usize] = stream[0];
        }

        // Translation: component-wise extent against the clip range.
        {
            let range = bone.ranges[SubTrackKind::Translation as usize];
            let value = bone.streams[SubTrackKind::Translation as usize][0];
            let threshold = desc.constant_translation_threshold;
            let is_constant = max_component3(range.extent) <= threshold;
            let is_default = is_constant && max_component3(value.abs()) <= threshold;

            let flags = &mut bone.flags[SubTrackKind::Translation as usize];
            flags.is_default = is_default;
            flags.is_constant = is_constant && !is_default;
            bone.constant_sample[SubTrackKind::Translation as usize] = value;
        }

        // Scale: like translation, against the type-dependent default.
        {
            let flags_value = if has_scale {
                let range = bone.ranges[SubTrackKind::Scale as usize];
                let value = bone.streams[SubTrackKind::Scale as usize][0];
                let threshold = desc.constant_scale_threshold;
                let is_constant = max_component3(range.extent) <= threshold;
                let default_offset = value - Vec4::new(default_scale, default_scale, default_scale, 0.0);
                let is_default = is_constant && max_component3(default_offset.abs()) <= threshold;
                (is_default, is_constant && !is_default, value)
            } else {
                // Scale never deviated from the default; nothing is stored.
                (true, false, Vec4::new(default_scale, default_scale, default_scale, 0.0))
            };

            let flags = &mut bone.flags[SubTrackKind::Scale as usize];
            flags.is_default = flags_value.0;
            flags.is_constant = flags_value.1;
            bone.constant_sample[SubTrackKind::Scale as usize] = flags_value.2;
        }
    }
}

#[inline]
fn max_component3(v: Vec4) -> f32 {
    v.x.max(v.y).max(v.z)
}

/// Rebuilds a unit quaternion from a stream sample in converted layout.
#[inline]
fn rotation_from_stream(sample: Vec4, format: RotationFormat) -> glam::Quat {
    match format {
        RotationFormat::QuatFull => stream_to_quat(sample),
        RotationFormat::QuatDropWFull | RotationFormat::QuatDropWVariable => {
            quat_from_positive_w(glam::Vec3::new(sample.x, sample.y, sample.z))
        }
    }
}
