//! Failure semantics: input invariant violations, limit breaches, settings
//! mis-specification, and buffer probing errors.

mod common;

use animcodec::{
    compress_transform_clip, AdditiveFormat, CompressError, CompressedTracksBuf, CompressionSettings,
    FormatError, MetadataSettings, QvvTransform, RotationFormat, TrackArray, TransformTrack,
    VectorFormat,
};
use common::*;
use glam::{Quat, Vec3};

// ─────────────────────────────────────────────────────────────────────────────
// Input invariant violations
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn nan_translation_is_rejected() {
    let mut samples = vec![QvvTransform::IDENTITY; 4];
    samples[2].translation = Vec3::new(0.0, f32::NAN, 0.0);
    let array = single_bone_array(samples, 30.0);
    assert_eq!(
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .err(),
        Some(CompressError::SomeSamplesNotFinite)
    );
}

#[test]
fn infinite_rotation_is_rejected() {
    let mut samples = vec![QvvTransform::IDENTITY; 2];
    samples[0].rotation = Quat::from_xyzw(f32::INFINITY, 0.0, 0.0, 1.0);
    let array = single_bone_array(samples, 30.0);
    assert_eq!(
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .err(),
        Some(CompressError::SomeSamplesNotFinite)
    );
}

#[test]
fn non_unit_rotation_is_rejected() {
    let mut samples = vec![QvvTransform::IDENTITY; 2];
    samples[1].rotation = Quat::from_xyzw(0.8, 0.0, 0.0, 0.8);
    let array = single_bone_array(samples, 30.0);
    assert_eq!(
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .err(),
        Some(CompressError::SomeRotationsNotNormalized)
    );
}

#[test]
fn empty_track_array_is_rejected() {
    let array = TrackArray::new(Vec::new()).unwrap();
    assert_eq!(
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .err(),
        Some(CompressError::NoTracks)
    );
}

#[test]
fn zero_sample_tracks_are_rejected() {
    let array = TrackArray::new(vec![TransformTrack::new(Vec::new(), 30.0)]).unwrap();
    assert_eq!(
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .err(),
        Some(CompressError::NoTracks)
    );
}

#[test]
fn mismatched_sample_counts_are_rejected_at_construction() {
    let tracks = vec![
        TransformTrack::new(vec![QvvTransform::IDENTITY; 3], 30.0),
        TransformTrack::new(vec![QvvTransform::IDENTITY; 4], 30.0),
    ];
    assert!(matches!(
        TrackArray::new(tracks),
        Err(CompressError::MismatchedSampleCounts)
    ));
}

#[test]
fn mismatched_sample_rates_are_rejected_at_construction() {
    let tracks = vec![
        TransformTrack::new(vec![QvvTransform::IDENTITY; 4], 30.0),
        TransformTrack::new(vec![QvvTransform::IDENTITY; 4], 60.0),
    ];
    assert!(matches!(
        TrackArray::new(tracks),
        Err(CompressError::MismatchedSampleRates)
    ));
}

#[test]
fn additive_base_with_nan_is_rejected() {
    let array = single_bone_array(vec![QvvTransform::IDENTITY; 4], 30.0);
    let mut base_samples = vec![QvvTransform::IDENTITY; 4];
    base_samples[0].scale = Vec3::new(f32::NAN, 1.0, 1.0);
    let base = single_bone_array(base_samples, 30.0);
    assert_eq!(
        compress_transform_clip(
            &array,
            CompressionSettings::default(),
            Some(&base),
            AdditiveFormat::Additive0
        )
        .err(),
        Some(CompressError::SomeSamplesNotFinite)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Limit breaches
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn more_than_65535_samples_are_rejected() {
    let array = single_bone_array(vec![QvvTransform::IDENTITY; 65536], 30.0);
    assert_eq!(
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .err(),
        Some(CompressError::TooManySamples(65536))
    );
}

#[test]
fn exactly_65535_samples_compress() {
    // Identity clip keeps this cheap: every sub-track collapses to default.
    let array = single_bone_array(vec![QvvTransform::IDENTITY; 65535], 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    assert_eq!(compressed.num_samples_per_track(), 65535);
    compressed.is_valid(true).unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings mis-specification
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn contributing_error_with_all_raw_formats_is_rejected() {
    let array = single_bone_array(vec![QvvTransform::IDENTITY; 4], 30.0);
    let settings = CompressionSettings {
        rotation_format: RotationFormat::QuatFull,
        translation_format: VectorFormat::Full,
        scale_format: VectorFormat::Full,
        metadata: MetadataSettings { include_contributing_error: true, ..Default::default() },
        ..Default::default()
    };
    assert!(matches!(
        compress_transform_clip(&array, settings, None, AdditiveFormat::None),
        Err(CompressError::InvalidSettings(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Buffer probing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn garbage_bytes_do_not_probe_as_compressed_tracks() {
    let garbage = vec![0xA5u8; 256];
    assert!(matches!(
        CompressedTracksBuf::from_bytes(&garbage),
        Err(FormatError::InvalidTag)
    ));
}

#[test]
fn truncated_buffer_is_rejected() {
    let array = single_bone_array(vec![QvvTransform::IDENTITY; 4], 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    let bytes = compressed.as_bytes();
    assert!(matches!(
        CompressedTracksBuf::from_bytes(&bytes[..20]),
        Err(FormatError::BufferTooSmall)
    ));
    // Cutting mid-buffer leaves the claimed size larger than the data.
    assert!(CompressedTracksBuf::from_bytes(&bytes[..bytes.len() - 4]).is_err());
}

#[test]
fn future_version_is_rejected() {
    let array = single_bone_array(vec![QvvTransform::IDENTITY; 4], 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();
    let mut bytes = compressed.as_bytes().to_vec();
    // Version lives at offset 12 within the tracks header.
    bytes[12] = 0xFF;
    bytes[13] = 0x7F;
    assert!(matches!(
        CompressedTracksBuf::from_bytes(&bytes),
        Err(FormatError::UnsupportedVersion(_))
    ));
}

#[test]
fn unaligned_view_is_rejected() {
    let array = single_bone_array(vec![QvvTransform::IDENTITY; 4], 30.0);
    let compressed =
        compress_transform_clip(&array, CompressionSettings::default(), None, AdditiveFormat::None)
            .unwrap();

    // Shift the bytes by one inside an over-aligned copy.
    let mut shifted = vec![0u8; compressed.as_bytes().len() + 16];
    let misaligned_start = {
        let base = shifted.as_ptr() as usize;
        let aligned = (base + 15) & !15;
        aligned - base + 1
    };
    shifted[misaligned_start..misaligned_start + compressed.as_bytes().len()]
        .copy_from_slice(compressed.as_bytes());
    let view = &shifted[misaligned_start..misaligned_start + compressed.as_bytes().len()];
    assert!(matches!(
        animcodec::CompressedTracks::from_bytes(view),
        Err(FormatError::MisalignedBuffer)
    ));
}
