//! Per-segment variable bit-rate selection.
//!
//! For every segment, every animated variable sub-track is assigned a ladder
//! index so that each bone's worst-case object-space error stays inside its
//! precision budget while total bits shrink. Bones are processed parents
//! first; once a bone's rates are final its lossy object-space poses are
//! frozen and descendants quantize against them.
//!
//! The evaluation decodes candidates exactly the way the decoder will:
//! quantize the normalized sample at the candidate width, re-apply the
//! stored (8-bit decoded) segment range, then the clip range.

use glam::{Quat, Vec3};
use log::warn;

use crate::format::{
    get_num_bits_at_bit_rate, is_constant_bit_rate, is_raw_bit_rate, AdditiveFormat,
    CompressionLevel, RotationFormat, CONSTANT_BIT_RATE, INVALID_BIT_RATE,
    LOWEST_VARIABLE_BIT_RATE, RAW_BIT_RATE,
};
use crate::math::{quat_from_positive_w, QvvTransform};

use super::clip_context::{
    raw_local_transform, stream_to_quat, stream_to_vec3, ClipContext, ClipState, SegmentContext,
    SubTrackKind, SUB_TRACK_KINDS,
};
use super::error_metric::{apply_additive, object_space_error};
use super::range::is_format_variable;
use super::settings::CompressionSettings;
use super::track_array::TrackArray;

/// Assigns bit rates to every segment and records the per-sample
/// contributing error.
pub(crate) fn quantize_streams(
    lossy: &mut ClipContext,
    raw: &ClipContext,
    additive_base: Option<&ClipContext>,
    track_list: &TrackArray,
    settings: &CompressionSettings,
) {
    debug_assert!(
        lossy.state == ClipState::Segmented || lossy.state == ClipState::SegmentNormalized,
        "quantization requires segmented streams"
    );

    let topo = track_list.topological_order();
    let has_segment_range = lossy.segments.len() > 1;

    let mut contributing_error = vec![0.0f32; lossy.num_samples as usize];
    let mut segments = core::mem::take(&mut lossy.segments);

    for segment in &mut segments {
        let (rates, segment_errors) = {
            let quantizer = SegmentQuantizer {
                clip: lossy,
                raw,
                additive_base,
                track_list,
                settings,
                segment,
                has_segment_range,
                ref_obj: Vec::new(),
                lossy_obj: Vec::new(),
                rates: Vec::new(),
                budgets: Vec::new(),
            };
            quantizer.run(&topo)
        };

        for (bone_index, bone_rates) in rates.into_iter().enumerate() {
            segment.bones[bone_index].bit_rates = bone_rates;
        }
        segment.animated_bits_per_frame =
            super::writer::animated_pose_bit_size(lossy, settings, segment);
        let start = segment.start_index as usize;
        for (local_index, error) in segment_errors.into_iter().enumerate() {
            contributing_error[start + local_index] = error;
        }
    }

    lossy.segments = segments;
    lossy.contributing_error = contributing_error;
    lossy.state = ClipState::Quantized;
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-segment search state
// ─────────────────────────────────────────────────────────────────────────────

struct SegmentQuantizer<'a> {
    clip: &'a ClipContext,
    raw: &'a ClipContext,
    additive_base: Option<&'a ClipContext>,
    track_list: &'a TrackArray,
    settings: &'a CompressionSettings,
    segment: &'a SegmentContext,
    has_segment_range: bool,
    /// Reference object-space poses, `[bone][segment_sample]`.
    ref_obj: Vec<Vec<QvvTransform>>,
    /// Lossy object-space poses of bones whose rates are final.
    lossy_obj: Vec<Vec<QvvTransform>>,
    /// Current ladder index per bone per sub-track.
    rates: Vec<[u8; 3]>,
    /// Per-bone error ceiling: the precision, widened for bones that cannot
    /// meet it even at the raw rate so decrement passes stay meaningful.
    budgets: Vec<f32>,
}

impl<'a> SegmentQuantizer<'a> {
    fn run(mut self, topo: &[u32]) -> (Vec<[u8; 3]>, Vec<f32>) {
        let num_bones = self.clip.num_bones as usize;
        let num_samples = self.segment.num_samples as usize;

        self.rates = (0..num_bones).map(|bone| self.initial_rates(bone)).collect();
        self.budgets = (0..num_bones)
            .map(|bone| self.track_list.tracks()[bone].description.precision)
            .collect();
        self.build_ref_poses(topo);
        self.lossy_obj = vec![Vec::new(); num_bones];

        for &bone in topo {
            let bone = bone as usize;
            self.search_bone(bone);
            self.lossy_obj[bone] = self.compute_lossy_poses(bone);
        }

        if self.settings.level >= CompressionLevel::High {
            self.decrement_passes(topo);
        }

        // Worst error any bone contributes per segment sample.
        let mut errors = vec![0.0f32; num_samples];
        for bone in 0..num_bones {
            let shell = self.track_list.tracks()[bone].description.shell_distance;
            for (sample_index, error) in errors.iter_mut().enumerate() {
                let sample_error = object_space_error(
                    &self.ref_obj[bone][sample_index],
                    &self.lossy_obj[bone][sample_index],
                    shell,
                );
                *error = error.max(sample_error);
            }
        }

        (self.rates, errors)
    }

    fn initial_rates(&self, bone: usize) -> [u8; 3] {
        let floor = self.floor_rate();
        let mut rates = [INVALID_BIT_RATE; 3];
        for kind in SUB_TRACK_KINDS {
            if self.clip.bones[bone].flags[kind as usize].is_animated()
                && is_format_variable(self.settings, kind)
            {
                rates[kind as usize] = floor;
            }
        }
        rates
    }

    /// The constant rate needs a segment-range record to store the value in;
    /// without one the ladder floor is the lowest variable rate.
    fn floor_rate(&self) -> u8 {
        if self.has_segment_range {
            CONSTANT_BIT_RATE
        } else {
            LOWEST_VARIABLE_BIT_RATE
        }
    }

    fn parent_of(&self, bone: usize) -> Option<usize> {
        let num_bones = self.clip.num_bones as usize;
        self.track_list.tracks()[bone]
            .description
            .parent_index
            .map(|p| p as usize)
            .filter(|&p| p < num_bones && p != bone)
    }

    fn base_local(&self, bone: usize, clip_sample: usize) -> QvvTransform {
        match self.additive_base {
            Some(base) if (bone as u32) < base.num_bones && base.num_samples > 0 => {
                let sample = clip_sample.min(base.num_samples as usize - 1);
                raw_local_transform(base, bone, sample)
            }
            _ => QvvTransform::IDENTITY,
        }
    }

    fn build_ref_poses(&mut self, topo: &[u32]) {
        let num_bones = self.clip.num_bones as usize;
        let num_samples = self.segment.num_samples as usize;
        let additive_format = self.clip.additive_format;

        self.ref_obj = vec![Vec::new(); num_bones];
        for &bone in topo {
            let bone = bone as usize;
            let parent = self.parent_of(bone);
            let mut poses = Vec::with_capacity(num_samples);
            for sample_index in 0..num_samples {
                let clip_sample = self.segment.start_index as usize + sample_index;
                let mut local = raw_local_transform(self.raw, bone, clip_sample);
                if additive_format != AdditiveFormat::None {
                    let base = self.base_local(bone, clip_sample);
                    local = apply_additive(&base, &local, additive_format);
                }
                let pose = match parent {
                    Some(p) => self.ref_obj[p][sample_index].mul(&local),
                    None => local,
                };
                poses.push(pose);
            }
            self.ref_obj[bone] = poses;
        }
    }

    // ── Decode simulation ───────────────────────────────────────────────────

    /// Decodes the lossy local transform of `bone` at segment sample
    /// `sample_index` with the candidate `rates`, exactly as the decoder
    /// will reconstruct it.
    fn decode_lossy_local(&self, bone: usize, sample_index: usize, rates: [u8; 3]) -> QvvTransform {
        let rotation_format = self.settings.rotation_format;
        let rotation = {
            let value = self.decode_sub_track(
                bone,
                SubTrackKind::Rotation,
                sample_index,
                rates[SubTrackKind::Rotation as usize],
            );
            match value {
                DecodedSubTrack::Quat(q) => q,
                DecodedSubTrack::Component3(v) => match rotation_format {
                    RotationFormat::QuatFull => unreachable!("full quats decode whole"),
                    _ => quat_from_positive_w(v),
                },
            }
        };

        let translation = match self.decode_sub_track(
            bone,
            SubTrackKind::Translation,
            sample_index,
            rates[SubTrackKind::Translation as usize],
        ) {
            DecodedSubTrack::Component3(v) => v,
            DecodedSubTrack::Quat(_) => unreachable!(),
        };
        let scale = match self.decode_sub_track(
            bone,
            SubTrackKind::Scale,
            sample_index,
            rates[SubTrackKind::Scale as usize],
        ) {
            DecodedSubTrack::Component3(v) => v,
            DecodedSubTrack::Quat(_) => unreachable!(),
        };

        QvvTransform { rotation, translation, scale }
    }

    fn decode_sub_track(
        &self,
        bone: usize,
        kind: SubTrackKind,
        sample_index: usize,
        rate: u8,
    ) -> DecodedSubTrack {
        let clip_bone = &self.clip.bones[bone];
        let flags = clip_bone.flags[kind as usize];
        let rotation_format = self.settings.rotation_format;
        let is_rotation = kind == SubTrackKind::Rotation;

        if flags.is_default {
            let default = self.clip.default_sub_track_value(kind);
            return if is_rotation {
                DecodedSubTrack::Quat(Quat::IDENTITY)
            } else {
                DecodedSubTrack::Component3(stream_to_vec3(default))
            };
        }

        if flags.is_constant {
            let constant = clip_bone.constant_sample[kind as usize];
            return if is_rotation {
                DecodedSubTrack::Quat(match rotation_format {
                    RotationFormat::QuatFull => stream_to_quat(constant),
                    _ => quat_from_positive_w(stream_to_vec3(constant)),
                })
            } else {
                DecodedSubTrack::Component3(stream_to_vec3(constant))
            };
        }

        let segment_bone = &self.segment.bones[bone];

        // Full-precision animated sub-tracks are stored verbatim.
        if !is_format_variable(self.settings, kind) {
            let exact = segment_bone.unnormalized[kind as usize][sample_index];
            return if is_rotation && rotation_format == RotationFormat::QuatFull {
                DecodedSubTrack::Quat(stream_to_quat(exact))
            } else {
                DecodedSubTrack::Component3(stream_to_vec3(exact))
            };
        }

        debug_assert_ne!(rate, INVALID_BIT_RATE);

        if is_raw_bit_rate(rate) {
            let exact = segment_bone.unnormalized[kind as usize][sample_index];
            return DecodedSubTrack::Component3(stream_to_vec3(exact));
        }

        let clip_range = &clip_bone.ranges[kind as usize];
        if is_constant_bit_rate(rate) {
            debug_assert!(self.has_segment_range);
            // The clip-normalized segment minimum at 16 bits per component.
            let min = segment_bone.range_min_exact[kind as usize];
            let stored = Vec3::new(
                quantize_unorm(min.x, 65535.0),
                quantize_unorm(min.y, 65535.0),
                quantize_unorm(min.z, 65535.0),
            );
            return DecodedSubTrack::Component3(apply_range3(stored, clip_range.min, clip_range.extent));
        }

        let num_bits = get_num_bits_at_bit_rate(rate);
        let max = ((1u64 << num_bits) - 1) as f32;
        let sample = segment_bone.streams[kind as usize][sample_index];
        let mut value = Vec3::new(
            quantize_unorm(sample.x, max),
            quantize_unorm(sample.y, max),
            quantize_unorm(sample.z, max),
        );
        if self.has_segment_range {
            let segment_range = &segment_bone.ranges[kind as usize];
            value = apply_range3(value, segment_range.min, segment_range.extent);
        }
        DecodedSubTrack::Component3(apply_range3(value, clip_range.min, clip_range.extent))
    }

    fn lossy_object(&self, bone: usize, sample_index: usize, rates: [u8; 3]) -> QvvTransform {
        let mut local = self.decode_lossy_local(bone, sample_index, rates);
        let additive_format = self.clip.additive_format;
        if additive_format != AdditiveFormat::None {
            let clip_sample = self.segment.start_index as usize + sample_index;
            let base = self.base_local(bone, clip_sample);
            local = apply_additive(&base, &local, additive_format);
        }
        match self.parent_of(bone) {
            Some(p) => self.lossy_obj[p][sample_index].mul(&local),
            None => local,
        }
    }

    fn eval_bone_error(&self, bone: usize, rates: [u8; 3]) -> f32 {
        let shell = self.track_list.tracks()[bone].description.shell_distance;
        let mut worst = 0.0f32;
        for sample_index in 0..self.segment.num_samples as usize {
            let pose = self.lossy_object(bone, sample_index, rates);
            let error = object_space_error(&self.ref_obj[bone][sample_index], &pose, shell);
            worst = worst.max(error);
        }
        worst
    }

    fn compute_lossy_poses(&self, bone: usize) -> Vec<QvvTransform> {
        let rates = self.rates[bone];
        (0..self.segment.num_samples as usize)
            .map(|sample_index| self.lossy_object(bone, sample_index, rates))
            .collect()
    }

    // ── Search strategies ───────────────────────────────────────────────────

    fn search_bone(&mut self, bone: usize) {
        let precision = self.track_list.tracks()[bone].description.precision;

        loop {
            let current = self.rates[bone];
            let error = self.eval_bone_error(bone, current);
            if error <= precision {
                break;
            }

            let incrementable: Vec<usize> = (0..3)
                .filter(|&k| current[k] != INVALID_BIT_RATE && current[k] < RAW_BIT_RATE)
                .collect();
            if incrementable.is_empty() {
                warn!(
                    "track {bone} cannot meet its precision budget: error {error} > {precision}"
                );
                // Decrement passes must not chase an unreachable budget.
                self.budgets[bone] = error;
                break;
            }

            match self.settings.level {
                CompressionLevel::Lowest => {
                    // Raise the whole bone in lockstep.
                    for &k in &incrementable {
                        self.rates[bone][k] += 1;
                    }
                }
                CompressionLevel::Low => {
                    // Fixed priority: rotation, then translation, then scale.
                    self.rates[bone][incrementable[0]] += 1;
                }
                CompressionLevel::Medium | CompressionLevel::High | CompressionLevel::Highest => {
                    // Pick the increment with the best error reduction per
                    // added bit; kind order breaks ties.
                    let mut best_kind = incrementable[0];
                    let mut best_gain = f32::MIN;
                    for &k in &incrementable {
                        let mut candidate = current;
                        candidate[k] += 1;
                        let candidate_error = self.eval_bone_error(bone, candidate);
                        let bits_added = (get_num_bits_at_bit_rate(candidate[k])
                            - get_num_bits_at_bit_rate(current[k]))
                            * 3;
                        let gain = (error - candidate_error) / bits_added as f32;
                        if gain > best_gain {
                            best_gain = gain;
                            best_kind = k;
                        }
                    }
                    self.rates[bone][best_kind] += 1;
                }
            }
        }
    }

    /// `High`: one sweep attempting single-step decrements; `Highest`:
    /// sweeps repeat until a full pass makes no change.
    fn decrement_passes(&mut self, topo: &[u32]) {
        let floor = self.floor_rate();
        let repeat = self.settings.level >= CompressionLevel::Highest;
        loop {
            let mut changed = false;
            for bone in 0..self.clip.num_bones as usize {
                for kind in 0..3 {
                    let rate = self.rates[bone][kind];
                    if rate == INVALID_BIT_RATE || rate <= floor {
                        continue;
                    }
                    self.rates[bone][kind] = rate - 1;
                    if self.revalidate(topo) {
                        changed = true;
                    } else {
                        self.rates[bone][kind] = rate;
                        self.rebuild_lossy(topo);
                    }
                }
            }
            if !repeat || !changed {
                break;
            }
        }
    }

    /// Rebuilds every bone's lossy poses at the current rates and checks all
    /// error budgets. Leaves `lossy_obj` consistent with the current rates.
    fn revalidate(&mut self, topo: &[u32]) -> bool {
        self.rebuild_lossy(topo);
        for &bone in topo {
            let bone = bone as usize;
            let shell = self.track_list.tracks()[bone].description.shell_distance;
            for sample_index in 0..self.segment.num_samples as usize {
                let error = object_space_error(
                    &self.ref_obj[bone][sample_index],
                    &self.lossy_obj[bone][sample_index],
                    shell,
                );
                if error > self.budgets[bone] {
                    return false;
                }
            }
        }
        true
    }

    fn rebuild_lossy(&mut self, topo: &[u32]) {
        for &bone in topo {
            let bone = bone as usize;
            self.lossy_obj[bone] = self.compute_lossy_poses(bone);
        }
    }
}

enum DecodedSubTrack {
    Quat(Quat),
    Component3(Vec3),
}

/// Quantizes a `[0, 1]` value onto `max` steps and back, the round trip the
/// decoder performs.
#[inline]
fn quantize_unorm(value: f32, max: f32) -> f32 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * max).round() / max
}

#[inline]
fn apply_range3(value: Vec3, min: glam::Vec4, extent: glam::Vec4) -> Vec3 {
    Vec3::new(
        value.x * extent.x + min.x,
        value.y * extent.y + min.y,
        value.z * extent.z + min.z,
    )
}
