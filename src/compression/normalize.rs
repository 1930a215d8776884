//! Clip- and segment-level range normalization.
//!
//! Animated variable sub-tracks are mapped component-wise into `[0, 1]`:
//! `normalized = (sample − min) / extent`, with zero-extent components
//! pinned to 0 and outputs clamped to absorb rounding. Segment normalization
//! runs on top of the clip-normalized values using the segment's 8-bit
//! decoded range so the compressor and decoder agree bit for bit.

use glam::Vec4;

use super::clip_context::{ClipContext, ClipState, TrackStreamRange, SUB_TRACK_KINDS};
use super::range::is_format_variable;
use super::settings::CompressionSettings;

/// Extents below this are treated as zero.
const MIN_EXTENT: f32 = 1.0e-9;

#[inline]
fn normalize_sample(sample: Vec4, range: &TrackStreamRange) -> Vec4 {
    let is_zero = range.extent.cmplt(Vec4::splat(MIN_EXTENT));
    let normalized = (sample - range.min) / range.extent;
    let normalized = normalized.clamp(Vec4::ZERO, Vec4::ONE);
    Vec4::select(is_zero, Vec4::ZERO, normalized)
}

/// Maps every animated variable sub-track into its clip-wide range.
pub(crate) fn normalize_clip_streams(context: &mut ClipContext, settings: &CompressionSettings) {
    context.transition(ClipState::ConstantsCollapsed, ClipState::Normalized);
    for bone in &mut context.bones {
        for kind in SUB_TRACK_KINDS {
            if !bone.flags[kind as usize].is_animated() || !is_format_variable(settings, kind) {
                continue;
            }
            let range = bone.ranges[kind as usize];
            for sample in &mut bone.streams[kind as usize] {
                *sample = normalize_sample(*sample, &range);
            }
            bone.flags[kind as usize].is_normalized = true;
        }
    }
}

/// Remaps each segment's samples into the segment's own range.
pub(crate) fn normalize_segment_streams(context: &mut ClipContext, settings: &CompressionSettings) {
    context.transition(ClipState::Segmented, ClipState::SegmentNormalized);
    let num_bones = context.num_bones as usize;
    for segment in &mut context.segments {
        for bone_index in 0..num_bones {
            let flags = context.bones[bone_index].flags;
            let segment_bone = &mut segment.bones[bone_index];
            for kind in SUB_TRACK_KINDS {
                if !flags[kind as usize].is_animated() || !is_format_variable(settings, kind) {
                    continue;
                }
                let range = segment_bone.ranges[kind as usize];
                for sample in &mut segment_bone.streams[kind as usize] {
                    *sample = normalize_sample(*sample, &range);
                }
            }
        }
    }
}
