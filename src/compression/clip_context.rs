//! The mutable clip context every pipeline stage transforms in turn.
//!
//! Per bone the context owns three sample streams (rotation, translation,
//! scale). Stages mutate the streams in place — raw, then rotation-converted,
//! then clip-normalized, then segmented and segment-normalized — while a
//! parallel unnormalized copy is kept for raw-rate packing and for the
//! quantizer's decode simulation. The context exclusively owns its buffers;
//! the blob writer only reads them.

use glam::{Quat, Vec3, Vec4};

use crate::error::CompressError;
use crate::format::AdditiveFormat;
use crate::math::QvvTransform;

use super::track_array::TrackArray;

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline state machine
// ─────────────────────────────────────────────────────────────────────────────

/// One-way pipeline states. The writer only accepts `Quantized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum ClipState {
    Raw,
    RangesExtracted,
    ConstantsCollapsed,
    Normalized,
    Segmented,
    SegmentNormalized,
    Quantized,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sub-track addressing
// ─────────────────────────────────────────────────────────────────────────────

/// The three sub-tracks of a transform track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubTrackKind {
    Rotation = 0,
    Translation = 1,
    Scale = 2,
}

pub(crate) static SUB_TRACK_KINDS: [SubTrackKind; 3] =
    [SubTrackKind::Rotation, SubTrackKind::Translation, SubTrackKind::Scale];

/// Classification flags; default and constant are mutually exclusive.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SubTrackFlags {
    pub is_default: bool,
    pub is_constant: bool,
    pub is_normalized: bool,
}

impl SubTrackFlags {
    #[inline]
    pub fn is_animated(&self) -> bool {
        !self.is_default && !self.is_constant
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ranges
// ─────────────────────────────────────────────────────────────────────────────

/// Component-wise `min` / `extent` of a sample stream over some scope.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackStreamRange {
    pub min: Vec4,
    pub extent: Vec4,
}

impl Default for TrackStreamRange {
    fn default() -> Self {
        TrackStreamRange { min: Vec4::ZERO, extent: Vec4::ZERO }
    }
}

impl TrackStreamRange {
    pub fn from_samples<'a>(samples: impl Iterator<Item = &'a Vec4>) -> TrackStreamRange {
        let mut min = Vec4::splat(f32::MAX);
        let mut max = Vec4::splat(f32::MIN);
        let mut any = false;
        for sample in samples {
            min = min.min(*sample);
            max = max.max(*sample);
            any = true;
        }
        if !any {
            return TrackStreamRange::default();
        }
        TrackStreamRange { min, extent: max - min }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-bone data
// ─────────────────────────────────────────────────────────────────────────────

/// Clip-level streams and classification for one bone.
#[derive(Debug, Clone, Default)]
pub(crate) struct BoneStreams {
    /// Pipeline samples, one `Vec` per sub-track kind. Rotations hold
    /// `(x, y, z, w)` or `(x, y, z, 0)` once converted to a drop-W variant;
    /// vectors hold `(x, y, z, 0)`.
    pub streams: [Vec<Vec4>; 3],
    /// Rotation-converted but never normalized samples, for raw-rate packing
    /// and error simulation.
    pub unnormalized: [Vec<Vec4>; 3],
    pub flags: [SubTrackFlags; 3],
    /// Representative sample for constant sub-tracks (converted space).
    pub constant_sample: [Vec4; 3],
    /// Clip-wide range of the converted samples, per sub-track.
    pub ranges: [TrackStreamRange; 3],
}

/// Streams and quantization state for one bone within one segment.
#[derive(Debug, Clone, Default)]
pub(crate) struct SegmentBoneData {
    /// Pipeline samples for this segment's range (clip-normalized, then
    /// segment-normalized in place).
    pub streams: [Vec<Vec4>; 3],
    /// Converted, unnormalized samples for this segment's range.
    pub unnormalized: [Vec<Vec4>; 3],
    /// Segment range of the clip-normalized samples, in its 8-bit decoded
    /// form (what the blob stores and the decoder applies).
    pub ranges: [TrackStreamRange; 3],
    /// The raw 8-bit range bytes per kind: min then extent per component.
    pub range_min_u8: [[u8; 3]; 3],
    pub range_extent_u8: [[u8; 3]; 3],
    /// Pre-fixup segment minimum of the clip-normalized samples, stored at
    /// 16 bits per component when the constant bit rate is chosen.
    pub range_min_exact: [Vec4; 3],
    /// Chosen ladder index per sub-track.
    pub bit_rates: [u8; 3],
}

/// A contiguous run of samples quantized as one unit.
#[derive(Debug, Clone, Default)]
pub(crate) struct SegmentContext {
    pub start_index: u32,
    pub num_samples: u32,
    pub bones: Vec<SegmentBoneData>,
    /// Animated bits per keyframe; filled once rates are final.
    pub animated_bits_per_frame: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Clip context
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct ClipContext {
    pub state: ClipState,
    pub num_bones: u32,
    pub num_samples: u32,
    pub sample_rate: f32,
    pub has_scale: bool,
    pub additive_format: AdditiveFormat,
    /// 1.0, or 0.0 for `Additive1` clips.
    pub default_scale: f32,
    pub bones: Vec<BoneStreams>,
    pub segments: Vec<SegmentContext>,
    /// Worst error any bone contributes per clip sample; filled by the
    /// quantizer for the optional metadata section.
    pub contributing_error: Vec<f32>,
}

impl ClipContext {
    pub fn transition(&mut self, from: ClipState, to: ClipState) {
        debug_assert_eq!(self.state, from, "out-of-order pipeline stage");
        debug_assert!(to > from, "pipeline states are one-way");
        self.state = to;
    }

    /// The value a defaulted sub-track decodes to.
    pub fn default_sub_track_value(&self, kind: SubTrackKind) -> Vec4 {
        match kind {
            SubTrackKind::Rotation => Vec4::new(0.0, 0.0, 0.0, 1.0),
            SubTrackKind::Translation => Vec4::ZERO,
            SubTrackKind::Scale => {
                Vec4::new(self.default_scale, self.default_scale, self.default_scale, 0.0)
            }
        }
    }
}

/// Copies the raw samples into mutable per-bone streams, chaining quaternion
/// signs into a common hemisphere and classifying scale presence.
///
/// Fails when any sample holds a non-finite component.
pub(crate) fn initialize_clip_context(
    track_list: &TrackArray,
    additive_format: AdditiveFormat,
) -> Result<ClipContext, CompressError> {
    if !track_list.are_samples_finite() {
        return Err(CompressError::SomeSamplesNotFinite);
    }

    let num_bones = track_list.num_tracks();
    let num_samples = track_list.num_samples_per_track();
    let default_scale = if additive_format == AdditiveFormat::Additive1 { 0.0 } else { 1.0 };

    let mut has_scale = false;
    let mut bones = Vec::with_capacity(num_bones as usize);
    for track in track_list.tracks() {
        let scale_threshold = track.description.constant_scale_threshold;

        let mut rotations = Vec::with_capacity(num_samples as usize);
        let mut translations = Vec::with_capacity(num_samples as usize);
        let mut scales = Vec::with_capacity(num_samples as usize);

        let mut previous = Quat::IDENTITY;
        for (sample_index, sample) in track.samples.iter().enumerate() {
            // Keep adjacent quaternions in the same hemisphere so component
            // interpolation takes the short path.
            let mut rotation = sample.rotation;
            if sample_index > 0 && previous.dot(rotation) < 0.0 {
                rotation = -rotation;
            }
            previous = rotation;

            rotations.push(Vec4::new(rotation.x, rotation.y, rotation.z, rotation.w));
            translations.push(vec3_to_stream(sample.translation));
            scales.push(vec3_to_stream(sample.scale));

            let deviation = (sample.scale - Vec3::splat(default_scale)).abs();
            if deviation.max_element() > scale_threshold {
                has_scale = true;
            }
        }

        bones.push(BoneStreams {
            unnormalized: [rotations.clone(), translations.clone(), scales.clone()],
            streams: [rotations, translations, scales],
            ..BoneStreams::default()
        });
    }

    Ok(ClipContext {
        state: ClipState::Raw,
        num_bones,
        num_samples,
        sample_rate: track_list.sample_rate(),
        has_scale,
        additive_format,
        default_scale,
        bones,
        segments: Vec::new(),
        contributing_error: Vec::new(),
    })
}

#[inline]
pub(crate) fn vec3_to_stream(v: Vec3) -> Vec4 {
    Vec4::new(v.x, v.y, v.z, 0.0)
}

#[inline]
pub(crate) fn stream_to_vec3(v: Vec4) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[inline]
pub(crate) fn stream_to_quat(v: Vec4) -> Quat {
    Quat::from_xyzw(v.x, v.y, v.z, v.w)
}

/// Reconstructs the local transform a raw (reference) context sample holds.
pub(crate) fn raw_local_transform(
    context: &ClipContext,
    bone_index: usize,
    sample_index: usize,
) -> QvvTransform {
    let bone = &context.bones[bone_index];
    QvvTransform {
        rotation: stream_to_quat(bone.streams[0][sample_index]),
        translation: stream_to_vec3(bone.streams[1][sample_index]),
        scale: stream_to_vec3(bone.streams[2][sample_index]),
    }
}
