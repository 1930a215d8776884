//! Byte layouts of the blob headers and the little-endian field helpers used
//! to read and write them.
//!
//! The blob is little-endian throughout and every header field is read with
//! portable byte loads, so neither host endianness nor alignment matters.
//!
//! Layout of a compressed-tracks buffer:
//!
//! | Offset | Section |
//! |---|---|
//! | 0  | `raw_buffer_header` — size, hash |
//! | 8  | `tracks_header` — tag, version, counts, formats |
//! | 32 | `transform_tracks_header` — counts and section offsets |
//! | …  | segment start indices (only when more than one segment) |
//! | …  | segment headers |
//! | …  | packed sub-track types |
//! | …  | constant pool |
//! | …  | clip range pool |
//! | …  | per segment: format bytes, range records, animated bitstream |
//! | …  | 15 pad bytes, or metadata + `optional_metadata_header` |

use super::types::{
    AlgorithmType, RotationFormat, TrackType, VectorFormat, COMPRESSED_TRACKS_TAG,
    COMPRESSED_TRACKS_VERSION,
};

// ─────────────────────────────────────────────────────────────────────────────
// Little-endian field helpers
// ─────────────────────────────────────────────────────────────────────────────

#[inline]
pub fn read_le16(src: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([src[offset], src[offset + 1]])
}

#[inline]
pub fn read_le32(src: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([src[offset], src[offset + 1], src[offset + 2], src[offset + 3]])
}

#[inline]
pub fn read_le_f32(src: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_le32(src, offset))
}

#[inline]
pub fn write_le16(dst: &mut [u8], offset: usize, value: u16) {
    dst[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn write_le32(dst: &mut [u8], offset: usize, value: u32) {
    dst[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn write_le_f32(dst: &mut [u8], offset: usize, value: f32) {
    write_le32(dst, offset, value.to_bits());
}

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Section sizes and sentinels
// ─────────────────────────────────────────────────────────────────────────────

/// `raw_buffer_header`: `size` u32 @0, `hash` u32 @4.
pub const RAW_BUFFER_HEADER_SIZE: usize = 8;

/// Absolute offset of the tracks header.
pub const TRACKS_HEADER_OFFSET: usize = RAW_BUFFER_HEADER_SIZE;
pub const TRACKS_HEADER_SIZE: usize = 24;

/// Absolute offset of the transform tracks header. Section offsets inside
/// the blob are relative to this position.
pub const TRANSFORM_HEADER_OFFSET: usize = TRACKS_HEADER_OFFSET + TRACKS_HEADER_SIZE;
pub const TRANSFORM_HEADER_SIZE: usize = 48;

/// Size of one segment header record.
pub const SEGMENT_HEADER_SIZE: usize = 16;

/// Size of one per-segment range record (per animated-variable sub-track).
pub const SEGMENT_RANGE_ENTRY_SIZE: usize = 6;

/// Size of one clip range pool entry (3 × f32 min + 3 × f32 extent).
pub const CLIP_RANGE_ENTRY_SIZE: usize = 24;

/// Trailing sentinel of the segment start index table, and the "absent"
/// marker for optional offsets.
pub const INVALID_PTR_OFFSET: u32 = 0xFFFF_FFFF;

/// Pad appended when no metadata trailer is present, so unaligned 16-byte
/// loads at the end of the animated stream stay in bounds.
pub const TRAILING_PAD_SIZE: usize = 15;

/// `optional_metadata_header`: five absolute u32 offsets at the very end of
/// the buffer.
pub const METADATA_HEADER_SIZE: usize = 20;

// ─────────────────────────────────────────────────────────────────────────────
// tracks_header
// ─────────────────────────────────────────────────────────────────────────────

// Field offsets within the tracks header.
const TH_TAG: usize = 0;
const TH_VERSION: usize = 4;
const TH_ALGORITHM: usize = 6;
const TH_TRACK_TYPE: usize = 7;
const TH_NUM_TRACKS: usize = 8;
const TH_NUM_SAMPLES: usize = 12;
const TH_SAMPLE_RATE: usize = 16;
const TH_MISC_PACKED: usize = 20;

// misc_packed bit assignments.
const MISC_HAS_SCALE: u32 = 1 << 24;
const MISC_DEFAULT_SCALE_IS_ONE: u32 = 1 << 25;
const MISC_HAS_DATABASE: u32 = 1 << 26;
const MISC_HAS_METADATA: u32 = 1 << 27;

/// Decoded form of the fixed-size tracks header.
#[derive(Debug, Clone, Copy)]
pub struct TracksHeader {
    pub tag: u32,
    pub version: u16,
    pub algorithm: AlgorithmType,
    pub track_type: TrackType,
    pub num_tracks: u32,
    pub num_samples: u32,
    pub sample_rate: f32,
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
    pub has_scale: bool,
    pub default_scale_is_one: bool,
    pub has_database: bool,
    pub has_metadata: bool,
}

impl TracksHeader {
    /// Reads the header from a whole blob. The caller has already validated
    /// tag and version, so the format bytes are trusted here.
    pub fn read(blob: &[u8]) -> TracksHeader {
        let base = TRACKS_HEADER_OFFSET;
        let misc = read_le32(blob, base + TH_MISC_PACKED);
        TracksHeader {
            tag: read_le32(blob, base + TH_TAG),
            version: read_le16(blob, base + TH_VERSION),
            algorithm: AlgorithmType::UniformlySampled,
            track_type: TrackType::from_u8(blob[base + TH_TRACK_TYPE]).unwrap_or(TrackType::Qvv),
            num_tracks: read_le32(blob, base + TH_NUM_TRACKS),
            num_samples: read_le32(blob, base + TH_NUM_SAMPLES),
            sample_rate: read_le_f32(blob, base + TH_SAMPLE_RATE),
            rotation_format: RotationFormat::from_u8((misc & 0xFF) as u8)
                .unwrap_or(RotationFormat::QuatDropWVariable),
            translation_format: VectorFormat::from_u8(((misc >> 8) & 0xFF) as u8)
                .unwrap_or(VectorFormat::Variable),
            scale_format: VectorFormat::from_u8(((misc >> 16) & 0xFF) as u8)
                .unwrap_or(VectorFormat::Variable),
            has_scale: misc & MISC_HAS_SCALE != 0,
            default_scale_is_one: misc & MISC_DEFAULT_SCALE_IS_ONE != 0,
            has_database: misc & MISC_HAS_DATABASE != 0,
            has_metadata: misc & MISC_HAS_METADATA != 0,
        }
    }

    /// Writes the header into a whole blob.
    pub fn write(&self, blob: &mut [u8]) {
        let base = TRACKS_HEADER_OFFSET;
        write_le32(blob, base + TH_TAG, COMPRESSED_TRACKS_TAG);
        write_le16(blob, base + TH_VERSION, COMPRESSED_TRACKS_VERSION);
        blob[base + TH_ALGORITHM] = self.algorithm as u8;
        blob[base + TH_TRACK_TYPE] = self.track_type as u8;
        write_le32(blob, base + TH_NUM_TRACKS, self.num_tracks);
        write_le32(blob, base + TH_NUM_SAMPLES, self.num_samples);
        write_le_f32(blob, base + TH_SAMPLE_RATE, self.sample_rate);

        let mut misc = self.rotation_format as u32;
        misc |= (self.translation_format as u32) << 8;
        misc |= (self.scale_format as u32) << 16;
        if self.has_scale {
            misc |= MISC_HAS_SCALE;
        }
        if self.default_scale_is_one {
            misc |= MISC_DEFAULT_SCALE_IS_ONE;
        }
        if self.has_database {
            misc |= MISC_HAS_DATABASE;
        }
        if self.has_metadata {
            misc |= MISC_HAS_METADATA;
        }
        write_le32(blob, base + TH_MISC_PACKED, misc);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// transform_tracks_header
// ─────────────────────────────────────────────────────────────────────────────

const TT_NUM_SEGMENTS: usize = 0;
const TT_NUM_ANIMATED_ROTATIONS: usize = 4;
const TT_NUM_ANIMATED_TRANSLATIONS: usize = 8;
const TT_NUM_ANIMATED_SCALES: usize = 12;
const TT_NUM_CONSTANT_ROTATIONS: usize = 16;
const TT_NUM_CONSTANT_TRANSLATIONS: usize = 20;
const TT_NUM_CONSTANT_SCALES: usize = 24;
const TT_SEGMENT_START_INDICES_OFFSET: usize = 28;
const TT_SEGMENT_HEADERS_OFFSET: usize = 32;
const TT_SUB_TRACK_TYPES_OFFSET: usize = 36;
const TT_CONSTANT_DATA_OFFSET: usize = 40;
const TT_CLIP_RANGE_DATA_OFFSET: usize = 44;

/// Decoded form of the transform tracks header.
///
/// The `num_animated_*` counts cover variable-format sub-tracks only; they
/// size the per-segment format bytes and range records. Offsets are relative
/// to the header's own start ([`TRANSFORM_HEADER_OFFSET`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformTracksHeader {
    pub num_segments: u32,
    pub num_animated_rotation_sub_tracks: u32,
    pub num_animated_translation_sub_tracks: u32,
    pub num_animated_scale_sub_tracks: u32,
    pub num_constant_rotation_samples: u32,
    pub num_constant_translation_samples: u32,
    pub num_constant_scale_samples: u32,
    pub segment_start_indices_offset: u32,
    pub segment_headers_offset: u32,
    pub sub_track_types_offset: u32,
    pub constant_track_data_offset: u32,
    pub clip_range_data_offset: u32,
}

impl TransformTracksHeader {
    pub fn read(blob: &[u8]) -> TransformTracksHeader {
        let base = TRANSFORM_HEADER_OFFSET;
        TransformTracksHeader {
            num_segments: read_le32(blob, base + TT_NUM_SEGMENTS),
            num_animated_rotation_sub_tracks: read_le32(blob, base + TT_NUM_ANIMATED_ROTATIONS),
            num_animated_translation_sub_tracks: read_le32(blob, base + TT_NUM_ANIMATED_TRANSLATIONS),
            num_animated_scale_sub_tracks: read_le32(blob, base + TT_NUM_ANIMATED_SCALES),
            num_constant_rotation_samples: read_le32(blob, base + TT_NUM_CONSTANT_ROTATIONS),
            num_constant_translation_samples: read_le32(blob, base + TT_NUM_CONSTANT_TRANSLATIONS),
            num_constant_scale_samples: read_le32(blob, base + TT_NUM_CONSTANT_SCALES),
            segment_start_indices_offset: read_le32(blob, base + TT_SEGMENT_START_INDICES_OFFSET),
            segment_headers_offset: read_le32(blob, base + TT_SEGMENT_HEADERS_OFFSET),
            sub_track_types_offset: read_le32(blob, base + TT_SUB_TRACK_TYPES_OFFSET),
            constant_track_data_offset: read_le32(blob, base + TT_CONSTANT_DATA_OFFSET),
            clip_range_data_offset: read_le32(blob, base + TT_CLIP_RANGE_DATA_OFFSET),
        }
    }

    pub fn write(&self, blob: &mut [u8]) {
        let base = TRANSFORM_HEADER_OFFSET;
        write_le32(blob, base + TT_NUM_SEGMENTS, self.num_segments);
        write_le32(blob, base + TT_NUM_ANIMATED_ROTATIONS, self.num_animated_rotation_sub_tracks);
        write_le32(
            blob,
            base + TT_NUM_ANIMATED_TRANSLATIONS,
            self.num_animated_translation_sub_tracks,
        );
        write_le32(blob, base + TT_NUM_ANIMATED_SCALES, self.num_animated_scale_sub_tracks);
        write_le32(blob, base + TT_NUM_CONSTANT_ROTATIONS, self.num_constant_rotation_samples);
        write_le32(
            blob,
            base + TT_NUM_CONSTANT_TRANSLATIONS,
            self.num_constant_translation_samples,
        );
        write_le32(blob, base + TT_NUM_CONSTANT_SCALES, self.num_constant_scale_samples);
        write_le32(blob, base + TT_SEGMENT_START_INDICES_OFFSET, self.segment_start_indices_offset);
        write_le32(blob, base + TT_SEGMENT_HEADERS_OFFSET, self.segment_headers_offset);
        write_le32(blob, base + TT_SUB_TRACK_TYPES_OFFSET, self.sub_track_types_offset);
        write_le32(blob, base + TT_CONSTANT_DATA_OFFSET, self.constant_track_data_offset);
        write_le32(blob, base + TT_CLIP_RANGE_DATA_OFFSET, self.clip_range_data_offset);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// segment_header
// ─────────────────────────────────────────────────────────────────────────────

/// One fixed-size record per segment.
///
/// `data_offset` points at the segment's format-per-track bytes and
/// `range_data_offset` at its range records, both relative to the transform
/// tracks header. The animated bitstream begins at the next 4-byte boundary
/// after the range records.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentHeader {
    pub data_offset: u32,
    pub num_animated_bits_per_frame: u32,
    pub num_samples: u32,
    pub range_data_offset: u32,
}

impl SegmentHeader {
    pub fn read_at(blob: &[u8], record_offset: usize) -> SegmentHeader {
        SegmentHeader {
            data_offset: read_le32(blob, record_offset),
            num_animated_bits_per_frame: read_le32(blob, record_offset + 4),
            num_samples: read_le32(blob, record_offset + 8),
            range_data_offset: read_le32(blob, record_offset + 12),
        }
    }

    pub fn write_at(&self, blob: &mut [u8], record_offset: usize) {
        write_le32(blob, record_offset, self.data_offset);
        write_le32(blob, record_offset + 4, self.num_animated_bits_per_frame);
        write_le32(blob, record_offset + 8, self.num_samples);
        write_le32(blob, record_offset + 12, self.range_data_offset);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// optional_metadata_header (last bytes of the buffer when metadata exists)
// ─────────────────────────────────────────────────────────────────────────────

/// Absolute offsets of each optional metadata section; [`INVALID_PTR_OFFSET`]
/// when a section is absent.
#[derive(Debug, Clone, Copy)]
pub struct OptionalMetadataHeader {
    pub track_list_name: u32,
    pub track_name_offsets: u32,
    pub parent_track_indices: u32,
    pub track_descriptions: u32,
    pub contributing_error: u32,
}

impl OptionalMetadataHeader {
    pub fn read_at(blob: &[u8], header_offset: usize) -> OptionalMetadataHeader {
        OptionalMetadataHeader {
            track_list_name: read_le32(blob, header_offset),
            track_name_offsets: read_le32(blob, header_offset + 4),
            parent_track_indices: read_le32(blob, header_offset + 8),
            track_descriptions: read_le32(blob, header_offset + 12),
            contributing_error: read_le32(blob, header_offset + 16),
        }
    }

    pub fn write_at(&self, blob: &mut [u8], header_offset: usize) {
        write_le32(blob, header_offset, self.track_list_name);
        write_le32(blob, header_offset + 4, self.track_name_offsets);
        write_le32(blob, header_offset + 8, self.parent_track_indices);
        write_le32(blob, header_offset + 12, self.track_descriptions);
        write_le32(blob, header_offset + 16, self.contributing_error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up_to_power_of_two() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(13, 2), 14);
        assert_eq!(align_to(17, 16), 32);
    }

    #[test]
    fn tracks_header_roundtrip() {
        let mut blob = vec![0u8; 64];
        let header = TracksHeader {
            tag: COMPRESSED_TRACKS_TAG,
            version: COMPRESSED_TRACKS_VERSION,
            algorithm: AlgorithmType::UniformlySampled,
            track_type: TrackType::Qvv,
            num_tracks: 7,
            num_samples: 41,
            sample_rate: 30.0,
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Variable,
            scale_format: VectorFormat::Full,
            has_scale: true,
            default_scale_is_one: true,
            has_database: false,
            has_metadata: true,
        };
        header.write(&mut blob);
        let read_back = TracksHeader::read(&blob);
        assert_eq!(read_back.tag, COMPRESSED_TRACKS_TAG);
        assert_eq!(read_back.version, COMPRESSED_TRACKS_VERSION);
        assert_eq!(read_back.num_tracks, 7);
        assert_eq!(read_back.num_samples, 41);
        assert_eq!(read_back.sample_rate, 30.0);
        assert_eq!(read_back.rotation_format, RotationFormat::QuatDropWVariable);
        assert_eq!(read_back.scale_format, VectorFormat::Full);
        assert!(read_back.has_scale);
        assert!(read_back.default_scale_is_one);
        assert!(!read_back.has_database);
        assert!(read_back.has_metadata);
    }

    #[test]
    fn segment_header_roundtrip() {
        let mut blob = vec![0u8; 32];
        let header = SegmentHeader {
            data_offset: 0x100,
            num_animated_bits_per_frame: 123,
            num_samples: 16,
            range_data_offset: 0x140,
        };
        header.write_at(&mut blob, 8);
        let read_back = SegmentHeader::read_at(&blob, 8);
        assert_eq!(read_back.data_offset, 0x100);
        assert_eq!(read_back.num_animated_bits_per_frame, 123);
        assert_eq!(read_back.num_samples, 16);
        assert_eq!(read_back.range_data_offset, 0x140);
    }
}
