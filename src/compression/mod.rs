//! The transform-clip compression pipeline.
//!
//! Stages run in a fixed order, each consuming the mutable clip context the
//! previous one produced: build → rotation convert → clip ranges → constant
//! collapse → clip normalize → segment → segment ranges → segment normalize
//! → bit-rate quantize → blob write. Compression is synchronous and
//! single-threaded per clip; different clips may compress concurrently.

pub mod settings;
pub mod track_array;

pub(crate) mod clip_context;
pub(crate) mod compact;
pub(crate) mod convert_rotation;
pub(crate) mod error_metric;
pub(crate) mod normalize;
pub(crate) mod quantize;
pub(crate) mod range;
pub(crate) mod segmenting;
pub(crate) mod writer;

use log::debug;

use crate::error::CompressError;
use crate::format::{AdditiveFormat, CompressedTracksBuf};
use crate::fp_env::FpExceptionGuard;

use clip_context::initialize_clip_context;
use compact::compact_constant_streams;
use convert_rotation::convert_rotation_streams;
use normalize::{normalize_clip_streams, normalize_segment_streams};
use quantize::quantize_streams;
use range::{extract_clip_bone_ranges, extract_segment_bone_ranges};
use segmenting::{segment_streams, SegmentingSettings};
use writer::write_compressed_tracks;

pub use settings::{CompressionSettings, MetadataSettings};
pub use track_array::{
    identity_sample, rotation_sample, TrackArray, TransformTrack, TransformTrackDescription,
};

/// Maximum samples per track the format can address.
pub const MAX_NUM_SAMPLES: u32 = 65535;

/// Compresses a transform track array into a self-describing binary buffer.
///
/// `additive_base` supplies the pose an additive clip composes onto; with no
/// base (or an empty one) `additive_format` is coerced to
/// [`AdditiveFormat::None`].
///
/// The returned buffer owns its allocation and dereferences to
/// [`CompressedTracks`](crate::format::CompressedTracks) for decoding.
pub fn compress_transform_clip(
    track_list: &TrackArray,
    settings: CompressionSettings,
    additive_base: Option<&TrackArray>,
    additive_format: AdditiveFormat,
) -> Result<CompressedTracksBuf, CompressError> {
    settings.is_valid()?;

    // Range normalization divides by zero in unused lanes on purpose.
    let _fp_guard = FpExceptionGuard::new();

    let mut settings = settings;
    if settings.enable_database_support {
        settings.metadata.include_contributing_error = true;
    }
    if settings.metadata.include_track_descriptions {
        settings.metadata.include_parent_track_indices = true;
    }

    if track_list.is_empty() || track_list.num_samples_per_track() == 0 {
        return Err(CompressError::NoTracks);
    }
    let num_samples = track_list.num_samples_per_track();
    if num_samples > MAX_NUM_SAMPLES {
        return Err(CompressError::TooManySamples(num_samples));
    }

    // Segmenting only benefits variable-rate storage.
    let segmenting = if settings.any_variable() {
        SegmentingSettings::default()
    } else {
        SegmentingSettings { ideal_num_samples: u32::MAX, max_num_samples: u32::MAX }
    };

    let additive_format = match additive_base {
        Some(base) if !base.is_empty() => additive_format,
        _ => AdditiveFormat::None,
    };

    let raw_context = initialize_clip_context(track_list, additive_format)?;
    let mut lossy_context = initialize_clip_context(track_list, additive_format)?;
    let base_context = match additive_base {
        Some(base) if additive_format != AdditiveFormat::None => {
            Some(initialize_clip_context(base, additive_format)?)
        }
        _ => None,
    };

    convert_rotation_streams(&mut lossy_context, settings.rotation_format)?;
    extract_clip_bone_ranges(&mut lossy_context);
    compact_constant_streams(&mut lossy_context, track_list, settings.rotation_format);
    normalize_clip_streams(&mut lossy_context, &settings);
    segment_streams(&mut lossy_context, segmenting)?;
    if lossy_context.segments.len() > 1 {
        extract_segment_bone_ranges(&mut lossy_context, &settings);
        normalize_segment_streams(&mut lossy_context, &settings);
    }
    quantize_streams(
        &mut lossy_context,
        &raw_context,
        base_context.as_ref(),
        track_list,
        &settings,
    );

    let buffer = write_compressed_tracks(&lossy_context, track_list, &settings);
    debug!(
        "compressed {} tracks x {} samples into {} bytes ({} segments)",
        lossy_context.num_bones,
        lossy_context.num_samples,
        buffer.size(),
        lossy_context.segments.len()
    );
    Ok(buffer)
}
