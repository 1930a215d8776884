//! Blob assembly: computes every section size, allocates one contiguous
//! 16-byte-aligned buffer, and fills it in wire order.
//!
//! Section order and alignments follow the format description in
//! `format::headers`. Everything ordered "per sub-track" is grouped
//! rotations, then translations, then scales, ascending track index within
//! each group; the animated bitstream is keyframe-major with the same
//! grouping inside each keyframe.

use crate::bitio::write_bits;
use crate::format::headers::{
    align_to, write_le16, write_le32, write_le_f32, OptionalMetadataHeader, SegmentHeader,
    TracksHeader, TransformTracksHeader, CLIP_RANGE_ENTRY_SIZE, INVALID_PTR_OFFSET,
    METADATA_HEADER_SIZE, RAW_BUFFER_HEADER_SIZE, SEGMENT_HEADER_SIZE, SEGMENT_RANGE_ENTRY_SIZE,
    TRAILING_PAD_SIZE, TRANSFORM_HEADER_OFFSET, TRANSFORM_HEADER_SIZE,
};
use crate::format::types::SUB_TRACKS_PER_PACKED_WORD;
use crate::format::{
    get_num_bits_at_bit_rate, is_constant_bit_rate, is_raw_bit_rate, AlgorithmType,
    CompressedTracksBuf, RotationFormat, SubTrackType, TrackType,
};
use crate::hashing::fnv1a32;

use super::clip_context::{ClipContext, ClipState, SegmentContext, SubTrackKind, SUB_TRACK_KINDS};
use super::range::is_format_variable;
use super::settings::CompressionSettings;
use super::track_array::TrackArray;

// ─────────────────────────────────────────────────────────────────────────────
// Classification and sizing helpers
// ─────────────────────────────────────────────────────────────────────────────

/// The 2-bit wire class of one sub-track.
pub(crate) fn sub_track_class(
    context: &ClipContext,
    settings: &CompressionSettings,
    bone: usize,
    kind: SubTrackKind,
) -> SubTrackType {
    let flags = context.bones[bone].flags[kind as usize];
    if flags.is_default {
        SubTrackType::Default
    } else if flags.is_constant {
        SubTrackType::Constant
    } else if is_format_variable(settings, kind) {
        SubTrackType::AnimatedVariable
    } else {
        SubTrackType::AnimatedFull
    }
}

/// Bytes one constant-pool entry occupies for `kind`.
fn constant_entry_size(kind: SubTrackKind, rotation_format: RotationFormat) -> usize {
    match kind {
        SubTrackKind::Rotation if rotation_format == RotationFormat::QuatFull => 16,
        _ => 12,
    }
}

/// Stored components of one animated sample for `kind`.
fn animated_num_components(kind: SubTrackKind, rotation_format: RotationFormat) -> u32 {
    match kind {
        SubTrackKind::Rotation => rotation_format.num_components(),
        _ => 3,
    }
}

/// The sub-track kinds present on disk (scale only when the clip carries it).
fn disk_kinds(context: &ClipContext) -> &'static [SubTrackKind] {
    if context.has_scale {
        &SUB_TRACK_KINDS
    } else {
        &SUB_TRACK_KINDS[..2]
    }
}

/// Animated bits in one keyframe of `segment`, summed in wire order.
pub(crate) fn animated_pose_bit_size(
    context: &ClipContext,
    settings: &CompressionSettings,
    segment: &SegmentContext,
) -> u32 {
    let rotation_format = settings.rotation_format;
    let mut bits = 0u32;
    for &kind in disk_kinds(context) {
        for bone in 0..context.num_bones as usize {
            match sub_track_class(context, settings, bone, kind) {
                SubTrackType::Default | SubTrackType::Constant => {}
                SubTrackType::AnimatedVariable => {
                    let rate = segment.bones[bone].bit_rates[kind as usize];
                    if is_constant_bit_rate(rate) {
                        // Stored in the segment range record instead.
                    } else if is_raw_bit_rate(rate) {
                        bits += 32 * 3;
                    } else {
                        bits += get_num_bits_at_bit_rate(rate) * 3;
                    }
                }
                SubTrackType::AnimatedFull => {
                    bits += 32 * animated_num_components(kind, rotation_format);
                }
            }
        }
    }
    bits
}

struct LayoutCounts {
    /// Animated variable-format sub-tracks per kind (wire order).
    num_animated: [u32; 3],
    /// Constant sub-tracks per kind.
    num_constant: [u32; 3],
    words_per_type: u32,
    num_type_groups: u32,
}

fn count_layout(context: &ClipContext, settings: &CompressionSettings) -> LayoutCounts {
    let mut num_animated = [0u32; 3];
    let mut num_constant = [0u32; 3];
    for &kind in disk_kinds(context) {
        for bone in 0..context.num_bones as usize {
            match sub_track_class(context, settings, bone, kind) {
                SubTrackType::Constant => num_constant[kind as usize] += 1,
                SubTrackType::AnimatedVariable => num_animated[kind as usize] += 1,
                SubTrackType::Default | SubTrackType::AnimatedFull => {}
            }
        }
    }
    LayoutCounts {
        num_animated,
        num_constant,
        words_per_type: context.num_bones.div_ceil(SUB_TRACKS_PER_PACKED_WORD),
        num_type_groups: disk_kinds(context).len() as u32,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Lays the quantized clip context out into its final contiguous buffer.
pub(crate) fn write_compressed_tracks(
    context: &ClipContext,
    track_list: &TrackArray,
    settings: &CompressionSettings,
) -> CompressedTracksBuf {
    debug_assert_eq!(context.state, ClipState::Quantized, "writer requires quantized streams");

    let counts = count_layout(context, settings);
    let rotation_format = settings.rotation_format;
    let num_segments = context.segments.len() as u32;
    let has_segment_range = num_segments > 1;
    let num_animated_total: u32 = counts.num_animated.iter().sum();

    // ── Section sizes ───────────────────────────────────────────────────────

    let segment_start_indices_size =
        if num_segments > 1 { 4 * (num_segments + 1) } else { 0 };
    let segment_headers_size = SEGMENT_HEADER_SIZE as u32 * num_segments;
    let packed_types_size = counts.words_per_type * counts.num_type_groups * 4;

    let mut constant_data_size = 0u32;
    for &kind in disk_kinds(context) {
        constant_data_size +=
            counts.num_constant[kind as usize] * constant_entry_size(kind, rotation_format) as u32;
    }
    let clip_range_data_size = num_animated_total * CLIP_RANGE_ENTRY_SIZE as u32;

    // ── Offsets (absolute while computing, stored relative) ─────────────────

    let mut offset = (TRANSFORM_HEADER_OFFSET + TRANSFORM_HEADER_SIZE) as u32;

    offset = align_to(offset, 4);
    let segment_start_indices_offset = offset;
    offset += segment_start_indices_size;

    offset = align_to(offset, 4);
    let segment_headers_offset = offset;
    offset += segment_headers_size;

    offset = align_to(offset, 4);
    let sub_track_types_offset = offset;
    offset += packed_types_size;

    offset = align_to(offset, 4);
    let constant_data_offset = offset;
    offset += constant_data_size;

    offset = align_to(offset, 4);
    let clip_range_data_offset = offset;
    offset += clip_range_data_size;

    let mut segment_records = Vec::with_capacity(context.segments.len());
    for segment in &context.segments {
        let data_offset = offset;
        offset += num_animated_total; // one format byte per animated variable sub-track

        offset = align_to(offset, 2);
        let range_data_offset = offset;
        if has_segment_range {
            offset += num_animated_total * SEGMENT_RANGE_ENTRY_SIZE as u32;
        }

        offset = align_to(offset, 4);
        let animated_data_offset = offset;
        let bits_per_frame = segment.animated_bits_per_frame;
        let stream_bytes = (u64::from(bits_per_frame) * u64::from(segment.num_samples)).div_ceil(8);
        offset += stream_bytes as u32;

        segment_records.push((
            SegmentHeader {
                data_offset: data_offset - TRANSFORM_HEADER_OFFSET as u32,
                num_animated_bits_per_frame: bits_per_frame,
                num_samples: segment.num_samples,
                range_data_offset: range_data_offset - TRANSFORM_HEADER_OFFSET as u32,
            },
            animated_data_offset,
        ));
    }

    // ── Optional metadata or trailing pad ───────────────────────────────────

    let has_metadata = settings.metadata.any();
    let metadata = MetadataLayout::compute(has_metadata, settings, track_list, context, offset);
    let buffer_size = if has_metadata {
        metadata.end_offset
    } else {
        offset + TRAILING_PAD_SIZE as u32
    };

    // ── Emit ────────────────────────────────────────────────────────────────

    let mut buf = CompressedTracksBuf::zeroed(buffer_size as usize);
    let blob = buf.as_mut_bytes();

    TracksHeader {
        tag: 0, // written from the canonical constant
        version: 0,
        algorithm: AlgorithmType::UniformlySampled,
        track_type: TrackType::Qvv,
        num_tracks: context.num_bones,
        num_samples: context.num_samples,
        sample_rate: context.sample_rate,
        rotation_format,
        translation_format: settings.translation_format,
        scale_format: settings.scale_format,
        has_scale: context.has_scale,
        default_scale_is_one: context.default_scale == 1.0,
        has_database: false,
        has_metadata,
    }
    .write(blob);

    TransformTracksHeader {
        num_segments,
        num_animated_rotation_sub_tracks: counts.num_animated[0],
        num_animated_translation_sub_tracks: counts.num_animated[1],
        num_animated_scale_sub_tracks: counts.num_animated[2],
        num_constant_rotation_samples: counts.num_constant[0],
        num_constant_translation_samples: counts.num_constant[1],
        num_constant_scale_samples: counts.num_constant[2],
        segment_start_indices_offset: segment_start_indices_offset - TRANSFORM_HEADER_OFFSET as u32,
        segment_headers_offset: segment_headers_offset - TRANSFORM_HEADER_OFFSET as u32,
        sub_track_types_offset: sub_track_types_offset - TRANSFORM_HEADER_OFFSET as u32,
        constant_track_data_offset: constant_data_offset - TRANSFORM_HEADER_OFFSET as u32,
        clip_range_data_offset: clip_range_data_offset - TRANSFORM_HEADER_OFFSET as u32,
    }
    .write(blob);

    if num_segments > 1 {
        let mut cursor = segment_start_indices_offset as usize;
        for segment in &context.segments {
            write_le32(blob, cursor, segment.start_index);
            cursor += 4;
        }
        write_le32(blob, cursor, INVALID_PTR_OFFSET);
    }

    for (index, (record, _)) in segment_records.iter().enumerate() {
        record.write_at(blob, segment_headers_offset as usize + index * SEGMENT_HEADER_SIZE);
    }

    write_packed_sub_track_types(blob, sub_track_types_offset as usize, context, settings, &counts);
    write_constant_pool(blob, constant_data_offset as usize, context, settings, rotation_format);
    write_clip_ranges(blob, clip_range_data_offset as usize, context, settings);

    for (segment, (record, animated_data_offset)) in
        context.segments.iter().zip(&segment_records)
    {
        write_segment_data(
            blob,
            context,
            settings,
            segment,
            (record.data_offset + TRANSFORM_HEADER_OFFSET as u32) as usize,
            (record.range_data_offset + TRANSFORM_HEADER_OFFSET as u32) as usize,
            *animated_data_offset as usize,
            has_segment_range,
        );
    }

    if has_metadata {
        metadata.write(blob, settings, track_list, context);
    }

    // Raw buffer header last: size, then the hash over everything after it.
    write_le32(blob, 0, buffer_size);
    let hash = fnv1a32(&blob[RAW_BUFFER_HEADER_SIZE..buffer_size as usize]);
    write_le32(blob, 4, hash);

    buf
}

// ─────────────────────────────────────────────────────────────────────────────
// Section emitters
// ─────────────────────────────────────────────────────────────────────────────

fn write_packed_sub_track_types(
    blob: &mut [u8],
    base: usize,
    context: &ClipContext,
    settings: &CompressionSettings,
    counts: &LayoutCounts,
) {
    for (group, &kind) in disk_kinds(context).iter().enumerate() {
        let group_base = base + (group * counts.words_per_type as usize) * 4;
        for bone in 0..context.num_bones as usize {
            let class = sub_track_class(context, settings, bone, kind) as u32;
            let word_offset = group_base + (bone / SUB_TRACKS_PER_PACKED_WORD as usize) * 4;
            let shift = 2 * (bone % SUB_TRACKS_PER_PACKED_WORD as usize);
            let mut word = crate::format::headers::read_le32(blob, word_offset);
            word |= class << shift;
            write_le32(blob, word_offset, word);
        }
    }
}

fn write_constant_pool(
    blob: &mut [u8],
    base: usize,
    context: &ClipContext,
    settings: &CompressionSettings,
    rotation_format: RotationFormat,
) {
    let mut cursor = base;
    for &kind in disk_kinds(context) {
        for bone in 0..context.num_bones as usize {
            if sub_track_class(context, settings, bone, kind) != SubTrackType::Constant {
                continue;
            }
            let value = context.bones[bone].constant_sample[kind as usize];
            let num_components =
                constant_entry_size(kind, rotation_format) / core::mem::size_of::<f32>();
            for component in 0..num_components {
                write_le_f32(blob, cursor, value[component]);
                cursor += 4;
            }
        }
    }
}

fn write_clip_ranges(
    blob: &mut [u8],
    base: usize,
    context: &ClipContext,
    settings: &CompressionSettings,
) {
    let mut cursor = base;
    for &kind in disk_kinds(context) {
        for bone in 0..context.num_bones as usize {
            if sub_track_class(context, settings, bone, kind) != SubTrackType::AnimatedVariable {
                continue;
            }
            let range = &context.bones[bone].ranges[kind as usize];
            for component in 0..3 {
                write_le_f32(blob, cursor, range.min[component]);
                cursor += 4;
            }
            for component in 0..3 {
                write_le_f32(blob, cursor, range.extent[component]);
                cursor += 4;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_segment_data(
    blob: &mut [u8],
    context: &ClipContext,
    settings: &CompressionSettings,
    segment: &SegmentContext,
    format_base: usize,
    range_base: usize,
    animated_base: usize,
    has_segment_range: bool,
) {
    let rotation_format = settings.rotation_format;

    // Format per track: the chosen ladder index per animated variable
    // sub-track.
    let mut cursor = format_base;
    for &kind in disk_kinds(context) {
        for bone in 0..context.num_bones as usize {
            if sub_track_class(context, settings, bone, kind) != SubTrackType::AnimatedVariable {
                continue;
            }
            blob[cursor] = segment.bones[bone].bit_rates[kind as usize];
            cursor += 1;
        }
    }

    // Segment range records.
    if has_segment_range {
        let mut cursor = range_base;
        for &kind in disk_kinds(context) {
            for bone in 0..context.num_bones as usize {
                if sub_track_class(context, settings, bone, kind) != SubTrackType::AnimatedVariable
                {
                    continue;
                }
                let segment_bone = &segment.bones[bone];
                let rate = segment_bone.bit_rates[kind as usize];
                if is_constant_bit_rate(rate) {
                    // The record holds the clip-normalized segment minimum at
                    // 16 bits per component instead of an 8-bit range.
                    let min = segment_bone.range_min_exact[kind as usize];
                    for component in 0..3 {
                        let stored =
                            (min[component].clamp(0.0, 1.0) * 65535.0).round() as u16;
                        write_le16(blob, cursor + component * 2, stored);
                    }
                } else if !is_raw_bit_rate(rate) {
                    let min = segment_bone.range_min_u8[kind as usize];
                    let extent = segment_bone.range_extent_u8[kind as usize];
                    blob[cursor..cursor + 3].copy_from_slice(&min);
                    blob[cursor + 3..cursor + 6].copy_from_slice(&extent);
                }
                // Raw rate: the record stays zeroed and is ignored.
                cursor += SEGMENT_RANGE_ENTRY_SIZE;
            }
        }
    }

    // Animated bitstream, keyframe-major.
    let base_bit = animated_base * 8;
    let bits_per_frame = segment.animated_bits_per_frame as usize;
    for sample_index in 0..segment.num_samples as usize {
        let mut bit_cursor = base_bit + sample_index * bits_per_frame;
        for &kind in disk_kinds(context) {
            for bone in 0..context.num_bones as usize {
                let class = sub_track_class(context, settings, bone, kind);
                let segment_bone = &segment.bones[bone];
                match class {
                    SubTrackType::Default | SubTrackType::Constant => {}
                    SubTrackType::AnimatedVariable => {
                        let rate = segment_bone.bit_rates[kind as usize];
                        if is_constant_bit_rate(rate) {
                            continue;
                        }
                        if is_raw_bit_rate(rate) {
                            let exact = segment_bone.unnormalized[kind as usize][sample_index];
                            for component in 0..3 {
                                write_bits(blob, bit_cursor, exact[component].to_bits(), 32);
                                bit_cursor += 32;
                            }
                        } else {
                            let num_bits = get_num_bits_at_bit_rate(rate);
                            let max = ((1u64 << num_bits) - 1) as f32;
                            let sample = segment_bone.streams[kind as usize][sample_index];
                            for component in 0..3 {
                                let quantized =
                                    (sample[component].clamp(0.0, 1.0) * max).round() as u32;
                                write_bits(blob, bit_cursor, quantized, num_bits);
                                bit_cursor += num_bits as usize;
                            }
                        }
                    }
                    SubTrackType::AnimatedFull => {
                        let exact = segment_bone.unnormalized[kind as usize][sample_index];
                        let num_components =
                            animated_num_components(kind, rotation_format) as usize;
                        for component in 0..num_components {
                            write_bits(blob, bit_cursor, exact[component].to_bits(), 32);
                            bit_cursor += 32;
                        }
                    }
                }
            }
        }
        debug_assert_eq!(
            bit_cursor,
            base_bit + (sample_index + 1) * bits_per_frame,
            "animated keyframe bit count drifted"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Optional metadata trailer
// ─────────────────────────────────────────────────────────────────────────────

struct MetadataLayout {
    track_list_name_offset: u32,
    track_names_offset: u32,
    parent_indices_offset: u32,
    descriptions_offset: u32,
    contributing_error_offset: u32,
    header_offset: u32,
    end_offset: u32,
}

impl MetadataLayout {
    fn compute(
        has_metadata: bool,
        settings: &CompressionSettings,
        track_list: &TrackArray,
        context: &ClipContext,
        data_end: u32,
    ) -> MetadataLayout {
        let mut layout = MetadataLayout {
            track_list_name_offset: INVALID_PTR_OFFSET,
            track_names_offset: INVALID_PTR_OFFSET,
            parent_indices_offset: INVALID_PTR_OFFSET,
            descriptions_offset: INVALID_PTR_OFFSET,
            contributing_error_offset: INVALID_PTR_OFFSET,
            header_offset: 0,
            end_offset: data_end,
        };
        if !has_metadata {
            return layout;
        }

        let metadata = &settings.metadata;
        let num_tracks = context.num_bones;
        let mut offset = align_to(data_end, 4);

        if metadata.include_track_list_name {
            layout.track_list_name_offset = offset;
            offset += 4 + track_list.name().len() as u32;
            offset = align_to(offset, 4);
        }
        if metadata.include_track_names {
            layout.track_names_offset = offset;
            offset += 4;
            for track in track_list.tracks() {
                offset += 4 + track.name.len() as u32;
            }
            offset = align_to(offset, 4);
        }
        if metadata.include_parent_track_indices {
            layout.parent_indices_offset = offset;
            offset += 4 * num_tracks;
            offset = align_to(offset, 4);
        }
        if metadata.include_track_descriptions {
            layout.descriptions_offset = offset;
            offset += 20 * num_tracks;
            offset = align_to(offset, 4);
        }
        if metadata.include_contributing_error {
            layout.contributing_error_offset = offset;
            offset += 4 * context.num_samples;
            offset = align_to(offset, 4);
        }

        layout.header_offset = offset;
        layout.end_offset = offset + METADATA_HEADER_SIZE as u32;
        layout
    }

    fn write(
        &self,
        blob: &mut [u8],
        settings: &CompressionSettings,
        track_list: &TrackArray,
        context: &ClipContext,
    ) {
        let metadata = &settings.metadata;

        if metadata.include_track_list_name {
            write_string(blob, self.track_list_name_offset as usize, track_list.name());
        }
        if metadata.include_track_names {
            let mut cursor = self.track_names_offset as usize;
            write_le32(blob, cursor, track_list.num_tracks());
            cursor += 4;
            for track in track_list.tracks() {
                write_string(blob, cursor, &track.name);
                cursor += 4 + track.name.len();
            }
        }
        if metadata.include_parent_track_indices {
            let base = self.parent_indices_offset as usize;
            for (index, track) in track_list.tracks().iter().enumerate() {
                let parent = track.description.parent_index.unwrap_or(INVALID_PTR_OFFSET);
                write_le32(blob, base + 4 * index, parent);
            }
        }
        if metadata.include_track_descriptions {
            let base = self.descriptions_offset as usize;
            for (index, track) in track_list.tracks().iter().enumerate() {
                let desc = &track.description;
                let record = base + 20 * index;
                write_le_f32(blob, record, desc.precision);
                write_le_f32(blob, record + 4, desc.shell_distance);
                write_le_f32(blob, record + 8, desc.constant_rotation_threshold_angle);
                write_le_f32(blob, record + 12, desc.constant_translation_threshold);
                write_le_f32(blob, record + 16, desc.constant_scale_threshold);
            }
        }
        if metadata.include_contributing_error {
            let base = self.contributing_error_offset as usize;
            for (index, &error) in context.contributing_error.iter().enumerate() {
                write_le_f32(blob, base + 4 * index, error);
            }
        }

        OptionalMetadataHeader {
            track_list_name: self.track_list_name_offset,
            track_name_offsets: self.track_names_offset,
            parent_track_indices: self.parent_indices_offset,
            track_descriptions: self.descriptions_offset,
            contributing_error: self.contributing_error_offset,
        }
        .write_at(blob, self.header_offset as usize);
    }
}

fn write_string(blob: &mut [u8], offset: usize, value: &str) {
    write_le32(blob, offset, value.len() as u32);
    blob[offset + 4..offset + 4 + value.len()].copy_from_slice(value.as_bytes());
}
