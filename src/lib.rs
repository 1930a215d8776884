//! Lossy compression for skeletal animation clips.
//!
//! Given uniformly sampled transform tracks (rotation, translation, optional
//! scale) attached to a bone hierarchy, [`compress_transform_clip`] produces
//! a compact, self-describing binary buffer that a [`DecompressionContext`]
//! can sample at any time within the clip, reconstructing every pose inside
//! a per-track object-space error budget.

pub mod bitio;
pub mod compression;
pub mod decompression;
pub mod error;
pub mod format;
pub mod hashing;
pub mod math;

pub(crate) mod fp_env;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Error-bounded transform clip compression.
pub use compression::compress_transform_clip;
/// Input track array and per-track descriptions.
pub use compression::{TrackArray, TransformTrack, TransformTrackDescription};
/// Compression knobs: storage formats, search level, metadata flags.
pub use compression::{CompressionSettings, MetadataSettings};

/// Sample-time decoding over a borrowed compressed buffer.
pub use decompression::DecompressionContext;
/// The decoder's caller-provided output sink, plus a simple pose collector.
pub use decompression::{PoseWriter, TrackWriter};

/// Probe a byte buffer as compressed tracks.
pub use format::{make_compressed_tracks, CompressedTracks, CompressedTracksBuf};
/// Format enumerations shared by both pipeline ends.
pub use format::{
    AdditiveFormat, CompressionLevel, RotationFormat, SampleRoundingPolicy, VectorFormat,
};

/// Structured failure reasons.
pub use error::{CompressError, FormatError};

/// Local transform value type used on both API ends.
pub use math::QvvTransform;
