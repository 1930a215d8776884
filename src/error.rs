//! Structured error types for compression and for compressed-buffer probing.
//!
//! Compression failures are ordinary recoverable results: bad input data,
//! limit breaches, or mis-specified settings. Anything the library itself
//! got wrong (buffer overruns while writing, mis-aligned assembled headers)
//! is a programmer error and handled with `debug_assert!` instead.

use core::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Compression errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors returned by [`compress_transform_clip`](crate::compression::compress_transform_clip).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressError {
    /// At least one input sample contains a NaN or infinite component.
    SomeSamplesNotFinite,
    /// At least one rotation sample is not a unit quaternion.
    SomeRotationsNotNormalized,
    /// The compression settings are inconsistent; the message names the rule.
    InvalidSettings(&'static str),
    /// The track array is empty.
    NoTracks,
    /// Tracks within the array disagree on their sample count.
    MismatchedSampleCounts,
    /// Tracks within the array disagree on their sample rate.
    MismatchedSampleRates,
    /// The clip holds more samples per track than the format can address.
    TooManySamples(u32),
    /// Segmenting produced more segments than the format can address.
    TooManySegments(u32),
}

impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CompressError::SomeSamplesNotFinite => write!(f, "some samples are not finite"),
            CompressError::SomeRotationsNotNormalized => {
                write!(f, "some rotation samples are not unit length")
            }
            CompressError::InvalidSettings(msg) => write!(f, "invalid settings: {msg}"),
            CompressError::NoTracks => write!(f, "track array is empty"),
            CompressError::MismatchedSampleCounts => {
                write!(f, "tracks have mismatched sample counts")
            }
            CompressError::MismatchedSampleRates => {
                write!(f, "tracks have mismatched sample rates")
            }
            CompressError::TooManySamples(n) => {
                write!(f, "too many samples per track: {n} (max 65535)")
            }
            CompressError::TooManySegments(n) => {
                write!(f, "too many segments: {n} (max 65535)")
            }
        }
    }
}

impl std::error::Error for CompressError {}

// ─────────────────────────────────────────────────────────────────────────────
// Compressed-buffer validation errors
// ─────────────────────────────────────────────────────────────────────────────

/// Violations reported when probing a byte buffer as compressed tracks.
///
/// Returned by [`CompressedTracks::from_bytes`](crate::format::CompressedTracks::from_bytes)
/// and [`CompressedTracks::is_valid`](crate::format::CompressedTracks::is_valid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The buffer does not start with the compressed-tracks tag.
    InvalidTag,
    /// The buffer's format version is newer than this library understands.
    UnsupportedVersion(u16),
    /// The buffer base address is not aligned to 16 bytes.
    MisalignedBuffer,
    /// The buffer is shorter than its headers claim.
    BufferTooSmall,
    /// The stored content hash does not match the buffer contents.
    InvalidHash,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FormatError::InvalidTag => write!(f, "invalid buffer tag"),
            FormatError::UnsupportedVersion(v) => write!(f, "unsupported format version {v}"),
            FormatError::MisalignedBuffer => write!(f, "buffer is not 16-byte aligned"),
            FormatError::BufferTooSmall => write!(f, "buffer is too small"),
            FormatError::InvalidHash => write!(f, "content hash mismatch"),
        }
    }
}

impl std::error::Error for FormatError {}
