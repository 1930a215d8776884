//! Sample-time decoding of a compressed-tracks buffer.
//!
//! A [`DecompressionContext`] borrows an immutable blob, caches the section
//! offsets once, and then serves any number of `seek` + `decompress_*`
//! calls without allocating. A seek touches at most two segment headers; a
//! pose decode walks one contiguous span of the animated stream per
//! bracketing keyframe.

pub mod output_writer;

use glam::{Quat, Vec3, Vec4};

use crate::bitio::read_bits;
use crate::format::headers::{
    read_le16, read_le32, read_le_f32, SegmentHeader, TracksHeader, TransformTracksHeader,
    CLIP_RANGE_ENTRY_SIZE, SEGMENT_HEADER_SIZE, SEGMENT_RANGE_ENTRY_SIZE,
    TRANSFORM_HEADER_OFFSET,
};
use crate::format::types::SUB_TRACKS_PER_PACKED_WORD;
use crate::format::{
    get_num_bits_at_bit_rate, is_constant_bit_rate, is_raw_bit_rate, CompressedTracks,
    RotationFormat, SampleRoundingPolicy, SubTrackType,
};
use crate::math::{quat_from_positive_w, quat_lerp_normalized};

pub use output_writer::{PoseWriter, TrackWriter};

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Per-keyframe cursor state cached by a seek.
#[derive(Debug, Clone, Copy, Default)]
struct KeyCursor {
    /// Absolute byte offset of the keyframe segment's format-per-track bytes.
    format_data_offset: usize,
    /// Absolute byte offset of the segment's range records.
    range_data_offset: usize,
    /// Absolute bit offset of this keyframe's animated data.
    animated_base_bit: usize,
}

/// Decoding state over one borrowed compressed-tracks buffer.
///
/// `seek` must happen before any `decompress_*` call; repeated seeks on the
/// same context are the expected usage. Concurrent use of one context is not
/// supported, but any number of contexts may share one blob.
pub struct DecompressionContext<'a> {
    tracks: &'a CompressedTracks,
    header: TracksHeader,
    transform_header: TransformTracksHeader,
    // Cached absolute section offsets.
    segment_start_indices_offset: usize,
    segment_headers_offset: usize,
    sub_track_types_offset: usize,
    constant_data_offset: usize,
    clip_range_data_offset: usize,
    words_per_type: usize,
    num_animated_variable_total: u32,
    has_segment_range: bool,
    // Seek state.
    seeked: bool,
    alpha: f32,
    keys: [KeyCursor; 2],
}

impl<'a> DecompressionContext<'a> {
    /// Binds a context to a compressed buffer.
    pub fn new(tracks: &'a CompressedTracks) -> DecompressionContext<'a> {
        let header = tracks.header();
        let transform_header = tracks.transform_header();
        let base = TRANSFORM_HEADER_OFFSET;
        let num_animated_variable_total = transform_header.num_animated_rotation_sub_tracks
            + transform_header.num_animated_translation_sub_tracks
            + transform_header.num_animated_scale_sub_tracks;
        DecompressionContext {
            tracks,
            header,
            transform_header,
            segment_start_indices_offset: base + transform_header.segment_start_indices_offset as usize,
            segment_headers_offset: base + transform_header.segment_headers_offset as usize,
            sub_track_types_offset: base + transform_header.sub_track_types_offset as usize,
            constant_data_offset: base + transform_header.constant_track_data_offset as usize,
            clip_range_data_offset: base + transform_header.clip_range_data_offset as usize,
            words_per_type: header.num_tracks.div_ceil(SUB_TRACKS_PER_PACKED_WORD) as usize,
            num_animated_variable_total,
            has_segment_range: transform_header.num_segments > 1,
            seeked: false,
            alpha: 0.0,
            keys: [KeyCursor::default(); 2],
        }
    }

    /// The buffer this context decodes from.
    pub fn compressed_tracks(&self) -> &CompressedTracks {
        self.tracks
    }

    // ── Seek ────────────────────────────────────────────────────────────────

    /// Positions the context at `time` seconds, caching the two bracketing
    /// keyframes and the interpolation alpha.
    ///
    /// Out-of-range and non-finite times clamp into `[0, duration]`.
    pub fn seek(&mut self, time: f32, rounding: SampleRoundingPolicy) {
        let num_samples = self.header.num_samples;
        if num_samples == 0 {
            self.seeked = true;
            self.alpha = 0.0;
            return;
        }

        let time = if time.is_finite() { time.clamp(0.0, self.tracks.duration()) } else { 0.0 };
        let sample_position =
            (time * self.header.sample_rate).clamp(0.0, (num_samples - 1) as f32);
        let key0 = sample_position.floor() as u32;
        let key1 = (key0 + 1).min(num_samples - 1);
        let fraction = sample_position - key0 as f32;

        self.alpha = match rounding {
            SampleRoundingPolicy::None => fraction,
            SampleRoundingPolicy::Floor => 0.0,
            SampleRoundingPolicy::Ceil => 1.0,
            SampleRoundingPolicy::Nearest => {
                if fraction >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        };

        self.keys[0] = self.key_cursor(key0);
        self.keys[1] = self.key_cursor(key1);
        self.seeked = true;
    }

    /// Locates the segment holding `key` (binary search over the start index
    /// table when more than one segment exists) and derives its cursors.
    fn key_cursor(&self, key: u32) -> KeyCursor {
        let blob = self.tracks.as_bytes();
        let num_segments = self.transform_header.num_segments;

        let (segment_index, segment_start) = if num_segments <= 1 {
            (0u32, 0u32)
        } else {
            let mut lo = 0u32;
            let mut hi = num_segments - 1;
            while lo < hi {
                let mid = (lo + hi + 1) / 2;
                let start =
                    read_le32(blob, self.segment_start_indices_offset + mid as usize * 4);
                if start <= key {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            (lo, read_le32(blob, self.segment_start_indices_offset + lo as usize * 4))
        };

        let record_offset =
            self.segment_headers_offset + segment_index as usize * SEGMENT_HEADER_SIZE;
        let segment_header = SegmentHeader::read_at(blob, record_offset);

        let format_data_offset =
            TRANSFORM_HEADER_OFFSET + segment_header.data_offset as usize;
        let range_data_offset =
            TRANSFORM_HEADER_OFFSET + segment_header.range_data_offset as usize;
        let range_data_size = if self.has_segment_range {
            self.num_animated_variable_total as usize * SEGMENT_RANGE_ENTRY_SIZE
        } else {
            0
        };
        let animated_data_offset = (range_data_offset + range_data_size).next_multiple_of(4);

        let local_key = (key - segment_start) as usize;
        KeyCursor {
            format_data_offset,
            range_data_offset,
            animated_base_bit: animated_data_offset * 8
                + local_key * segment_header.num_animated_bits_per_frame as usize,
        }
    }

    // ── Decode ──────────────────────────────────────────────────────────────

    /// Decodes every track at the seeked time into `writer`.
    pub fn decompress_tracks<W: TrackWriter>(&self, writer: &mut W) {
        self.walk_pose(writer, None);
    }

    /// Decodes a single track at the seeked time into `writer`.
    pub fn decompress_track<W: TrackWriter>(&self, track_index: u32, writer: &mut W) {
        debug_assert!(track_index < self.header.num_tracks);
        self.walk_pose(writer, Some(track_index));
    }

    fn walk_pose<W: TrackWriter>(&self, writer: &mut W, only_track: Option<u32>) {
        debug_assert!(self.seeked, "seek must precede decompression");
        if !self.seeked {
            return;
        }

        let num_tracks = self.header.num_tracks;
        if self.header.num_samples == 0 {
            self.emit_defaults(writer, only_track);
            return;
        }

        let mut cursors = WalkCursors {
            constant: self.constant_data_offset,
            clip_range: self.clip_range_data_offset,
            format_index: 0,
            range_index: 0,
            key_bits: [self.keys[0].animated_base_bit, self.keys[1].animated_base_bit],
        };

        self.walk_group(writer, only_track, SubTrackGroup::Rotation, &mut cursors);
        self.walk_group(writer, only_track, SubTrackGroup::Translation, &mut cursors);
        if self.header.has_scale {
            self.walk_group(writer, only_track, SubTrackGroup::Scale, &mut cursors);
        } else if !writer.skip_all_scales() {
            let default_scale = self.default_scale();
            match only_track {
                Some(track) => writer.write_scale(track, default_scale),
                None => {
                    for track in 0..num_tracks {
                        writer.write_scale(track, default_scale);
                    }
                }
            }
        }
    }

    fn emit_defaults<W: TrackWriter>(&self, writer: &mut W, only_track: Option<u32>) {
        let emit = |writer: &mut W, track: u32| {
            if !writer.skip_all_rotations() {
                writer.write_rotation(track, Quat::IDENTITY);
            }
            if !writer.skip_all_translations() {
                writer.write_translation(track, Vec3::ZERO);
            }
            if !writer.skip_all_scales() {
                writer.write_scale(track, self.default_scale());
            }
        };
        match only_track {
            Some(track) => emit(writer, track),
            None => {
                for track in 0..self.header.num_tracks {
                    emit(writer, track);
                }
            }
        }
    }

    fn default_scale(&self) -> Vec3 {
        if self.header.default_scale_is_one {
            Vec3::ONE
        } else {
            Vec3::ZERO
        }
    }

    fn walk_group<W: TrackWriter>(
        &self,
        writer: &mut W,
        only_track: Option<u32>,
        group: SubTrackGroup,
        cursors: &mut WalkCursors,
    ) {
        let group_skipped = match group {
            SubTrackGroup::Rotation => writer.skip_all_rotations(),
            SubTrackGroup::Translation => writer.skip_all_translations(),
            SubTrackGroup::Scale => writer.skip_all_scales(),
        };

        // Even when a single track is requested the whole group is walked:
        // later groups share the cursors, so every sub-track must advance
        // them. Unwanted sub-tracks are skipped, not unpacked.
        for bone in 0..self.header.num_tracks {
            let wanted = !group_skipped && only_track.map_or(true, |t| t == bone);
            let class = self.sub_track_type_at(group, bone);
            match group {
                SubTrackGroup::Rotation => self.process_rotation(writer, bone, class, wanted, cursors),
                SubTrackGroup::Translation | SubTrackGroup::Scale => {
                    self.process_vector(writer, group, bone, class, wanted, cursors)
                }
            }
        }
    }

    fn sub_track_type_at(&self, group: SubTrackGroup, bone: u32) -> SubTrackType {
        let blob = self.tracks.as_bytes();
        let word_index = group as usize * self.words_per_type
            + (bone / SUB_TRACKS_PER_PACKED_WORD) as usize;
        let word = read_le32(blob, self.sub_track_types_offset + word_index * 4);
        let shift = 2 * (bone % SUB_TRACKS_PER_PACKED_WORD);
        SubTrackType::from_bits(word >> shift)
    }

    // ── Rotation sub-tracks ─────────────────────────────────────────────────

    fn process_rotation<W: TrackWriter>(
        &self,
        writer: &mut W,
        bone: u32,
        class: SubTrackType,
        wanted: bool,
        cursors: &mut WalkCursors,
    ) {
        let blob = self.tracks.as_bytes();
        let format = self.header.rotation_format;

        match class {
            SubTrackType::Default => {
                if wanted {
                    writer.write_rotation(bone, Quat::IDENTITY);
                }
            }
            SubTrackType::Constant => {
                if wanted {
                    let rotation = match format {
                        RotationFormat::QuatFull => Quat::from_xyzw(
                            read_le_f32(blob, cursors.constant),
                            read_le_f32(blob, cursors.constant + 4),
                            read_le_f32(blob, cursors.constant + 8),
                            read_le_f32(blob, cursors.constant + 12),
                        ),
                        _ => quat_from_positive_w(Vec3::new(
                            read_le_f32(blob, cursors.constant),
                            read_le_f32(blob, cursors.constant + 4),
                            read_le_f32(blob, cursors.constant + 8),
                        )),
                    };
                    writer.write_rotation(bone, rotation);
                }
                cursors.constant += if format == RotationFormat::QuatFull { 16 } else { 12 };
            }
            SubTrackType::AnimatedVariable => {
                let mut values = [Vec3::ZERO; 2];
                for key in 0..2 {
                    values[key] = self.decode_variable_key(key, cursors, wanted);
                }
                cursors.format_index += 1;
                cursors.range_index += 1;
                cursors.clip_range += CLIP_RANGE_ENTRY_SIZE;
                if wanted {
                    // Lerp the stored components, then rebuild w.
                    let lerped = values[0].lerp(values[1], self.alpha);
                    writer.write_rotation(bone, quat_from_positive_w(lerped));
                }
            }
            SubTrackType::AnimatedFull => {
                let num_components = format.num_components() as usize;
                let mut values = [Vec4::ZERO; 2];
                for key in 0..2 {
                    values[key] = self.read_full_components(key, num_components, cursors, wanted);
                }
                if wanted {
                    let rotation = match format {
                        RotationFormat::QuatFull => quat_lerp_normalized(
                            Quat::from_vec4(values[0]),
                            Quat::from_vec4(values[1]),
                            self.alpha,
                        ),
                        _ => {
                            let lerped = values[0].truncate().lerp(values[1].truncate(), self.alpha);
                            quat_from_positive_w(lerped)
                        }
                    };
                    writer.write_rotation(bone, rotation);
                }
            }
        }
    }

    // ── Translation / scale sub-tracks ──────────────────────────────────────

    fn process_vector<W: TrackWriter>(
        &self,
        writer: &mut W,
        group: SubTrackGroup,
        bone: u32,
        class: SubTrackType,
        wanted: bool,
        cursors: &mut WalkCursors,
    ) {
        let blob = self.tracks.as_bytes();
        let emit = |writer: &mut W, value: Vec3| match group {
            SubTrackGroup::Translation => writer.write_translation(bone, value),
            SubTrackGroup::Scale => writer.write_scale(bone, value),
            SubTrackGroup::Rotation => unreachable!(),
        };

        match class {
            SubTrackType::Default => {
                if wanted {
                    let value = match group {
                        SubTrackGroup::Translation => Vec3::ZERO,
                        _ => self.default_scale(),
                    };
                    emit(writer, value);
                }
            }
            SubTrackType::Constant => {
                if wanted {
                    let value = Vec3::new(
                        read_le_f32(blob, cursors.constant),
                        read_le_f32(blob, cursors.constant + 4),
                        read_le_f32(blob, cursors.constant + 8),
                    );
                    emit(writer, value);
                }
                cursors.constant += 12;
            }
            SubTrackType::AnimatedVariable => {
                let mut values = [Vec3::ZERO; 2];
                for key in 0..2 {
                    values[key] = self.decode_variable_key(key, cursors, wanted);
                }
                cursors.format_index += 1;
                cursors.range_index += 1;
                cursors.clip_range += CLIP_RANGE_ENTRY_SIZE;
                if wanted {
                    emit(writer, values[0].lerp(values[1], self.alpha));
                }
            }
            SubTrackType::AnimatedFull => {
                let mut values = [Vec4::ZERO; 2];
                for key in 0..2 {
                    values[key] = self.read_full_components(key, 3, cursors, wanted);
                }
                if wanted {
                    emit(writer, values[0].truncate().lerp(values[1].truncate(), self.alpha));
                }
            }
        }
    }

    // ── Stream primitives ───────────────────────────────────────────────────

    /// Decodes one keyframe of an animated-variable sub-track, advancing the
    /// key's bit cursor. When `wanted` is false the value is not
    /// reconstructed but every cursor still moves.
    fn decode_variable_key(&self, key: usize, cursors: &mut WalkCursors, wanted: bool) -> Vec3 {
        let blob = self.tracks.as_bytes();
        let rate = blob[self.keys[key].format_data_offset + cursors.format_index];

        if is_constant_bit_rate(rate) {
            if !wanted {
                return Vec3::ZERO;
            }
            // The segment range record holds the clip-normalized value at 16
            // bits per component; only the clip range applies.
            let entry = self.keys[key].range_data_offset
                + cursors.range_index * SEGMENT_RANGE_ENTRY_SIZE;
            let value = Vec3::new(
                f32::from(read_le16(blob, entry)) / 65535.0,
                f32::from(read_le16(blob, entry + 2)) / 65535.0,
                f32::from(read_le16(blob, entry + 4)) / 65535.0,
            );
            return self.apply_clip_range(value, cursors.clip_range);
        }

        if is_raw_bit_rate(rate) {
            let bit = cursors.key_bits[key];
            cursors.key_bits[key] += 96;
            if !wanted {
                return Vec3::ZERO;
            }
            return Vec3::new(
                f32::from_bits(read_bits(blob, bit, 32)),
                f32::from_bits(read_bits(blob, bit + 32, 32)),
                f32::from_bits(read_bits(blob, bit + 64, 32)),
            );
        }

        let num_bits = get_num_bits_at_bit_rate(rate);
        let bit = cursors.key_bits[key];
        cursors.key_bits[key] += num_bits as usize * 3;
        if !wanted {
            return Vec3::ZERO;
        }

        let max = ((1u64 << num_bits) - 1) as f32;
        let mut value = Vec3::new(
            read_bits(blob, bit, num_bits) as f32 / max,
            read_bits(blob, bit + num_bits as usize, num_bits) as f32 / max,
            read_bits(blob, bit + 2 * num_bits as usize, num_bits) as f32 / max,
        );

        if self.has_segment_range {
            let entry = self.keys[key].range_data_offset
                + cursors.range_index * SEGMENT_RANGE_ENTRY_SIZE;
            let min = Vec3::new(
                f32::from(blob[entry]) / 255.0,
                f32::from(blob[entry + 1]) / 255.0,
                f32::from(blob[entry + 2]) / 255.0,
            );
            let extent = Vec3::new(
                f32::from(blob[entry + 3]) / 255.0,
                f32::from(blob[entry + 4]) / 255.0,
                f32::from(blob[entry + 5]) / 255.0,
            );
            value = value * extent + min;
        }

        self.apply_clip_range(value, cursors.clip_range)
    }

    fn apply_clip_range(&self, value: Vec3, clip_range_offset: usize) -> Vec3 {
        let blob = self.tracks.as_bytes();
        let min = Vec3::new(
            read_le_f32(blob, clip_range_offset),
            read_le_f32(blob, clip_range_offset + 4),
            read_le_f32(blob, clip_range_offset + 8),
        );
        let extent = Vec3::new(
            read_le_f32(blob, clip_range_offset + 12),
            read_le_f32(blob, clip_range_offset + 16),
            read_le_f32(blob, clip_range_offset + 20),
        );
        value * extent + min
    }

    /// Reads `num_components` full-width floats for one keyframe of an
    /// animated-full sub-track.
    fn read_full_components(
        &self,
        key: usize,
        num_components: usize,
        cursors: &mut WalkCursors,
        wanted: bool,
    ) -> Vec4 {
        let blob = self.tracks.as_bytes();
        let bit = cursors.key_bits[key];
        cursors.key_bits[key] += 32 * num_components;
        if !wanted {
            return Vec4::ZERO;
        }
        let mut value = Vec4::ZERO;
        for component in 0..num_components {
            value[component] = f32::from_bits(read_bits(blob, bit + 32 * component, 32));
        }
        value
    }
}

#[derive(Debug, Clone, Copy)]
enum SubTrackGroup {
    Rotation = 0,
    Translation = 1,
    Scale = 2,
}

/// Shared cursors advanced in wire order during a pose walk.
struct WalkCursors {
    /// Absolute byte offset into the constant pool.
    constant: usize,
    /// Absolute byte offset into the clip range pool.
    clip_range: usize,
    /// Index into the per-segment format bytes (identical for both keys).
    format_index: usize,
    /// Index into the per-segment range records.
    range_index: usize,
    /// Absolute bit offsets into each key's animated data.
    key_bits: [usize; 2],
}
