//! Wire format invariants: headers, hash coverage, segment tables, the
//! packed type map, per-frame bit counts, and the optional metadata trailer.

mod common;

use animcodec::format::headers::{
    read_le32, SegmentHeader, SEGMENT_HEADER_SIZE, TRANSFORM_HEADER_OFFSET,
};
use animcodec::format::types::{COMPRESSED_TRACKS_TAG, COMPRESSED_TRACKS_VERSION};
use animcodec::{
    compress_transform_clip, make_compressed_tracks, AdditiveFormat, CompressedTracksBuf,
    CompressionSettings, FormatError, MetadataSettings, TransformTrackDescription,
};
use common::*;

// ─────────────────────────────────────────────────────────────────────────────
// Headers and probing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn header_fields_describe_the_clip() {
    let array = smooth_rotation_clip(40, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();

    let header = compressed.header();
    assert_eq!(header.tag, COMPRESSED_TRACKS_TAG);
    assert_eq!(header.version, COMPRESSED_TRACKS_VERSION);
    assert_eq!(header.num_tracks, 1);
    assert_eq!(header.num_samples, 40);
    assert_eq!(header.sample_rate, 30.0);
    assert!(!header.has_database);
    assert!(!header.has_metadata);

    assert_eq!(compressed.size() as usize, compressed.as_bytes().len());
    assert!((compressed.duration() - 39.0 / 30.0).abs() < 1e-6);
}

#[test]
fn make_compressed_tracks_accepts_fresh_output() {
    let array = smooth_rotation_clip(10, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    assert!(make_compressed_tracks(compressed.as_bytes()).is_some());
}

#[test]
fn is_valid_with_hash_accepts_every_output() {
    for num_samples in [1u32, 2, 16, 40, 100] {
        let array = smooth_rotation_clip(num_samples, 30.0);
        let compressed = compress_transform_clip(
            &array,
            CompressionSettings::default(),
            None,
            AdditiveFormat::None,
        )
        .unwrap();
        compressed.is_valid(true).unwrap_or_else(|e| panic!("{num_samples} samples: {e}"));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hash coverage
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn tampering_a_header_byte_fails_the_hash() {
    // Flip the byte at offset sizeof(raw_buffer_header) + 7.
    let array = smooth_rotation_clip(12, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();

    let mut bytes = compressed.as_bytes().to_vec();
    bytes[8 + 7] ^= 0x01;
    let tampered = CompressedTracksBuf::from_bytes(&bytes).unwrap();
    assert_eq!(tampered.is_valid(true), Err(FormatError::InvalidHash));
    // The structural probe without the hash still passes.
    assert!(tampered.is_valid(false).is_ok());
}

#[test]
fn every_single_byte_flip_after_the_raw_header_fails_the_hash() {
    let array = single_bone_array(
        vec![animcodec::QvvTransform::IDENTITY; 3],
        30.0,
    );
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    let original = compressed.as_bytes().to_vec();

    for offset in 8..original.len() {
        let mut bytes = original.clone();
        bytes[offset] ^= 0x40;
        // Some flips break the structural checks before the hash is even
        // considered; all of them must fail one way or the other.
        match CompressedTracksBuf::from_bytes(&bytes) {
            Ok(buf) => assert!(
                buf.is_valid(true).is_err(),
                "flip at {offset} went undetected"
            ),
            Err(_) => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Segment tables
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn single_segment_clip_writes_no_start_index_table() {
    let array = smooth_rotation_clip(31, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    let transform_header = compressed.transform_header();
    assert_eq!(transform_header.num_segments, 1);
    // Nothing sits between the would-be table and the segment headers.
    assert_eq!(
        transform_header.segment_start_indices_offset,
        transform_header.segment_headers_offset
    );
}

#[test]
fn two_segment_clip_writes_start_indices_with_sentinel() {
    let array = smooth_rotation_clip(40, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    let transform_header = compressed.transform_header();
    assert_eq!(transform_header.num_segments, 2);

    let bytes = compressed.as_bytes();
    let table = TRANSFORM_HEADER_OFFSET + transform_header.segment_start_indices_offset as usize;
    assert_eq!(read_le32(bytes, table), 0);
    assert_eq!(read_le32(bytes, table + 4), 20);
    assert_eq!(read_le32(bytes, table + 8), 0xFFFF_FFFF);
}

#[test]
fn segment_headers_cover_every_sample() {
    let array = smooth_rotation_clip(100, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    let transform_header = compressed.transform_header();
    let bytes = compressed.as_bytes();

    let mut total = 0;
    for segment_index in 0..transform_header.num_segments {
        let record = TRANSFORM_HEADER_OFFSET
            + transform_header.segment_headers_offset as usize
            + segment_index as usize * SEGMENT_HEADER_SIZE;
        let header = SegmentHeader::read_at(bytes, record);
        assert!(header.num_samples >= 1 && header.num_samples <= 31);
        total += header.num_samples;
    }
    assert_eq!(total, 100);
}

// ─────────────────────────────────────────────────────────────────────────────
// Bits per frame
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn bits_per_frame_equals_the_sum_of_per_track_rates() {
    let array = hierarchy_clip(40, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    let transform_header = compressed.transform_header();
    let bytes = compressed.as_bytes();

    let num_animated = (transform_header.num_animated_rotation_sub_tracks
        + transform_header.num_animated_translation_sub_tracks
        + transform_header.num_animated_scale_sub_tracks) as usize;
    assert!(num_animated > 0);

    for segment_index in 0..transform_header.num_segments {
        let record = TRANSFORM_HEADER_OFFSET
            + transform_header.segment_headers_offset as usize
            + segment_index as usize * SEGMENT_HEADER_SIZE;
        let header = SegmentHeader::read_at(bytes, record);

        let format_base = TRANSFORM_HEADER_OFFSET + header.data_offset as usize;
        let mut expected_bits = 0u32;
        for entry in 0..num_animated {
            let rate = bytes[format_base + entry];
            expected_bits += match rate {
                0 => 0,                                               // segment constant
                13 => 32 * 3,                                         // raw
                _ => animcodec::format::get_num_bits_at_bit_rate(rate) * 3,
            };
        }
        assert_eq!(
            header.num_animated_bits_per_frame, expected_bits,
            "segment {segment_index}"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Optional metadata
// ─────────────────────────────────────────────────────────────────────────────

fn metadata_settings() -> CompressionSettings {
    CompressionSettings {
        metadata: MetadataSettings {
            include_contributing_error: true,
            include_track_list_name: true,
            include_track_names: true,
            include_parent_track_indices: true,
            include_track_descriptions: true,
        },
        ..Default::default()
    }
}

#[test]
fn metadata_sections_roundtrip() {
    let mut array = hierarchy_clip(20, 30.0);
    array.tracks_mut()[0].name = "pelvis".to_string();
    array.tracks_mut()[1].name = "spine".to_string();
    array.tracks_mut()[2].name = "head".to_string();
    let array = array.with_name("walk_cycle");

    let compressed =
        compress_transform_clip(&array, metadata_settings(), None, AdditiveFormat::None).unwrap();
    compressed.is_valid(true).unwrap();
    assert!(compressed.header().has_metadata);

    assert_eq!(compressed.track_list_name(), Some("walk_cycle"));
    assert_eq!(compressed.track_names().unwrap(), vec!["pelvis", "spine", "head"]);
    assert_eq!(
        compressed.parent_track_indices().unwrap(),
        vec![0xFFFF_FFFF, 0, 1]
    );

    let descriptions = compressed.track_descriptions().unwrap();
    let defaults = TransformTrackDescription::default();
    assert_eq!(descriptions.len(), 3);
    assert_eq!(descriptions[0].precision, defaults.precision);
    assert_eq!(descriptions[0].shell_distance, defaults.shell_distance);

    let contributing = compressed.contributing_error().unwrap();
    assert_eq!(contributing.len(), 20);
    // Error contributions are bounded by the (default) precision budget.
    assert!(contributing.iter().all(|&e| e >= 0.0 && e <= defaults.precision * 1.01));
}

#[test]
fn clips_without_metadata_have_no_accessors() {
    let array = smooth_rotation_clip(10, 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    assert!(compressed.track_list_name().is_none());
    assert!(compressed.track_names().is_none());
    assert!(compressed.parent_track_indices().is_none());
    assert!(compressed.track_descriptions().is_none());
    assert!(compressed.contributing_error().is_none());
}

#[test]
fn database_support_forces_contributing_error() {
    let array = smooth_rotation_clip(10, 30.0);
    let settings = CompressionSettings { enable_database_support: true, ..Default::default() };
    let compressed =
        compress_transform_clip(&array, settings, None, AdditiveFormat::None).unwrap();
    assert!(compressed.header().has_metadata);
    assert!(!compressed.header().has_database);
    assert!(compressed.contributing_error().is_some());
}
