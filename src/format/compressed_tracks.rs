//! The compressed-tracks buffer: a validated, immutable, self-describing
//! byte blob, plus the owned 16-byte-aligned allocation compression returns.

use core::fmt;
use core::ops::Deref;
use core::ptr::NonNull;
use std::alloc::{alloc_zeroed, dealloc, Layout};

use crate::error::FormatError;
use crate::hashing::fnv1a32;

use super::headers::{
    read_le32, read_le_f32, OptionalMetadataHeader, TracksHeader, TransformTracksHeader,
    INVALID_PTR_OFFSET, METADATA_HEADER_SIZE, RAW_BUFFER_HEADER_SIZE, TRACKS_HEADER_OFFSET,
    TRACKS_HEADER_SIZE,
};
use super::types::{COMPRESSED_TRACKS_TAG, COMPRESSED_TRACKS_VERSION};

// ─────────────────────────────────────────────────────────────────────────────
// Borrowed view
// ─────────────────────────────────────────────────────────────────────────────

/// A borrowed view over a compressed-tracks byte buffer.
///
/// Obtained through [`CompressedTracks::from_bytes`] (which performs the
/// cheap structural checks) or by dereferencing a [`CompressedTracksBuf`].
/// All reads are position-based, so the view never requires internal
/// alignment from the underlying storage; the buffer base itself must sit on
/// a 16-byte boundary.
#[repr(transparent)]
pub struct CompressedTracks {
    data: [u8],
}

/// Probes `bytes` as compressed tracks, returning a typed view on success.
///
/// Equivalent to `CompressedTracks::from_bytes(bytes).ok()` for callers that
/// don't care which violation was found.
#[inline]
pub fn make_compressed_tracks(bytes: &[u8]) -> Option<&CompressedTracks> {
    CompressedTracks::from_bytes(bytes).ok()
}

impl CompressedTracks {
    /// Validates tag, version, alignment and size, and reinterprets the
    /// bytes as a compressed-tracks view.
    ///
    /// The content hash is *not* checked here; call
    /// [`is_valid`](Self::is_valid) with `check_hash = true` for that.
    pub fn from_bytes(bytes: &[u8]) -> Result<&CompressedTracks, FormatError> {
        validate_structure(bytes)?;
        // SAFETY: CompressedTracks is a transparent wrapper over [u8].
        Ok(unsafe { &*(bytes as *const [u8] as *const CompressedTracks) })
    }

    /// Re-runs the structural checks and, when `check_hash` is set, verifies
    /// the FNV-1a digest over every byte after the raw buffer header.
    pub fn is_valid(&self, check_hash: bool) -> Result<(), FormatError> {
        validate_structure(&self.data)?;
        if check_hash {
            let size = self.size() as usize;
            let computed = fnv1a32(&self.data[RAW_BUFFER_HEADER_SIZE..size]);
            if computed != self.hash() {
                return Err(FormatError::InvalidHash);
            }
        }
        Ok(())
    }

    /// Total buffer size in bytes, as recorded in the raw buffer header.
    #[inline]
    pub fn size(&self) -> u32 {
        read_le32(&self.data, 0)
    }

    /// Stored content hash.
    #[inline]
    pub fn hash(&self) -> u32 {
        read_le32(&self.data, 4)
    }

    /// Decoded tracks header.
    #[inline]
    pub fn header(&self) -> TracksHeader {
        TracksHeader::read(&self.data)
    }

    /// Decoded transform tracks header.
    #[inline]
    pub fn transform_header(&self) -> TransformTracksHeader {
        TransformTracksHeader::read(&self.data)
    }

    #[inline]
    pub fn num_tracks(&self) -> u32 {
        self.header().num_tracks
    }

    #[inline]
    pub fn num_samples_per_track(&self) -> u32 {
        self.header().num_samples
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.header().sample_rate
    }

    /// Clip duration in seconds. A clip with zero or one sample has a
    /// duration of zero.
    pub fn duration(&self) -> f32 {
        let header = self.header();
        if header.num_samples > 1 && header.sample_rate > 0.0 {
            (header.num_samples - 1) as f32 / header.sample_rate
        } else {
            0.0
        }
    }

    /// The raw bytes backing this view.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    // ── Optional metadata ───────────────────────────────────────────────────

    fn metadata_header(&self) -> Option<OptionalMetadataHeader> {
        if !self.header().has_metadata {
            return None;
        }
        let header_offset = self.size() as usize - METADATA_HEADER_SIZE;
        Some(OptionalMetadataHeader::read_at(&self.data, header_offset))
    }

    /// The clip name, when `include_track_list_name` was set.
    pub fn track_list_name(&self) -> Option<&str> {
        let offset = self.metadata_header()?.track_list_name;
        if offset == INVALID_PTR_OFFSET {
            return None;
        }
        Some(self.read_string_at(offset as usize))
    }

    /// Per-track names, when `include_track_names` was set.
    pub fn track_names(&self) -> Option<Vec<&str>> {
        let offset = self.metadata_header()?.track_name_offsets;
        if offset == INVALID_PTR_OFFSET {
            return None;
        }
        let mut cursor = offset as usize;
        let count = read_le32(&self.data, cursor);
        cursor += 4;
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = self.read_string_at(cursor);
            cursor += 4 + name.len();
            names.push(name);
        }
        Some(names)
    }

    /// Parent track indices ([`INVALID_PTR_OFFSET`] marks roots), when
    /// `include_parent_track_indices` was set.
    pub fn parent_track_indices(&self) -> Option<Vec<u32>> {
        let offset = self.metadata_header()?.parent_track_indices;
        if offset == INVALID_PTR_OFFSET {
            return None;
        }
        let base = offset as usize;
        let count = self.num_tracks() as usize;
        Some((0..count).map(|i| read_le32(&self.data, base + 4 * i)).collect())
    }

    /// Per-track description records, when `include_track_descriptions` was
    /// set.
    pub fn track_descriptions(&self) -> Option<Vec<TrackDescriptionMetadata>> {
        let offset = self.metadata_header()?.track_descriptions;
        if offset == INVALID_PTR_OFFSET {
            return None;
        }
        let base = offset as usize;
        let count = self.num_tracks() as usize;
        Some(
            (0..count)
                .map(|i| {
                    let record = base + 20 * i;
                    TrackDescriptionMetadata {
                        precision: read_le_f32(&self.data, record),
                        shell_distance: read_le_f32(&self.data, record + 4),
                        constant_rotation_threshold_angle: read_le_f32(&self.data, record + 8),
                        constant_translation_threshold: read_le_f32(&self.data, record + 12),
                        constant_scale_threshold: read_le_f32(&self.data, record + 16),
                    }
                })
                .collect(),
        )
    }

    /// Worst contributing error per clip sample, when
    /// `include_contributing_error` was set.
    pub fn contributing_error(&self) -> Option<Vec<f32>> {
        let offset = self.metadata_header()?.contributing_error;
        if offset == INVALID_PTR_OFFSET {
            return None;
        }
        let base = offset as usize;
        let count = self.num_samples_per_track() as usize;
        Some((0..count).map(|i| read_le_f32(&self.data, base + 4 * i)).collect())
    }

    fn read_string_at(&self, offset: usize) -> &str {
        let len = read_le32(&self.data, offset) as usize;
        core::str::from_utf8(&self.data[offset + 4..offset + 4 + len]).unwrap_or("")
    }
}

impl fmt::Debug for CompressedTracks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        f.debug_struct("CompressedTracks")
            .field("size", &self.size())
            .field("num_tracks", &header.num_tracks)
            .field("num_samples", &header.num_samples)
            .field("sample_rate", &header.sample_rate)
            .finish()
    }
}

fn validate_structure(bytes: &[u8]) -> Result<(), FormatError> {
    if bytes.len() < RAW_BUFFER_HEADER_SIZE + TRACKS_HEADER_SIZE {
        return Err(FormatError::BufferTooSmall);
    }
    if bytes.as_ptr() as usize % 16 != 0 {
        return Err(FormatError::MisalignedBuffer);
    }
    if read_le32(bytes, TRACKS_HEADER_OFFSET) != COMPRESSED_TRACKS_TAG {
        return Err(FormatError::InvalidTag);
    }
    let version = super::headers::read_le16(bytes, TRACKS_HEADER_OFFSET + 4);
    if version == 0 || version > COMPRESSED_TRACKS_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let claimed = read_le32(bytes, 0) as usize;
    if claimed < RAW_BUFFER_HEADER_SIZE + TRACKS_HEADER_SIZE || claimed > bytes.len() {
        return Err(FormatError::BufferTooSmall);
    }
    Ok(())
}

/// One record of the optional per-track description metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackDescriptionMetadata {
    pub precision: f32,
    pub shell_distance: f32,
    pub constant_rotation_threshold_angle: f32,
    pub constant_translation_threshold: f32,
    pub constant_scale_threshold: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Owned buffer
// ─────────────────────────────────────────────────────────────────────────────

/// The owned, 16-byte-aligned allocation holding a compressed-tracks buffer.
///
/// Compression returns one of these; it dereferences to [`CompressedTracks`]
/// for decoding. Dropping it frees the allocation.
pub struct CompressedTracksBuf {
    ptr: NonNull<u8>,
    size: usize,
}

// The buffer is plain immutable bytes once built.
unsafe impl Send for CompressedTracksBuf {}
unsafe impl Sync for CompressedTracksBuf {}

impl CompressedTracksBuf {
    const ALIGN: usize = 16;

    /// Allocates a zero-filled buffer of `size` bytes; the blob writer fills
    /// it in place.
    pub(crate) fn zeroed(size: usize) -> CompressedTracksBuf {
        debug_assert!(size >= RAW_BUFFER_HEADER_SIZE + TRACKS_HEADER_SIZE);
        let layout = Layout::from_size_align(size, Self::ALIGN).expect("invalid layout");
        // SAFETY: size is non-zero, layout is valid.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        CompressedTracksBuf { ptr, size }
    }

    /// Copies an existing serialized buffer (for example read from disk) into
    /// aligned storage and validates it.
    pub fn from_bytes(bytes: &[u8]) -> Result<CompressedTracksBuf, FormatError> {
        if bytes.len() < RAW_BUFFER_HEADER_SIZE + TRACKS_HEADER_SIZE {
            return Err(FormatError::BufferTooSmall);
        }
        let mut buf = CompressedTracksBuf::zeroed(bytes.len());
        buf.as_mut_bytes().copy_from_slice(bytes);
        CompressedTracks::from_bytes(buf.as_bytes())?;
        Ok(buf)
    }

    #[inline]
    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        // SAFETY: we exclusively own `size` initialized bytes at `ptr`.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: we own `size` initialized bytes at `ptr`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }
}

impl Deref for CompressedTracksBuf {
    type Target = CompressedTracks;

    fn deref(&self) -> &CompressedTracks {
        let bytes = self.as_bytes();
        // SAFETY: transparent wrapper; the writer produced a valid buffer.
        unsafe { &*(bytes as *const [u8] as *const CompressedTracks) }
    }
}

impl Drop for CompressedTracksBuf {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.size, Self::ALIGN).expect("invalid layout");
        // SAFETY: allocated with the same layout in `zeroed`.
        unsafe { dealloc(self.ptr.as_ptr(), layout) };
    }
}

impl fmt::Debug for CompressedTracksBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_is_rejected() {
        let bytes = [0u8; 8];
        let result = CompressedTracks::from_bytes(&bytes);
        assert!(matches!(result, Err(FormatError::BufferTooSmall)));
    }

    #[test]
    fn garbage_tag_is_rejected() {
        let mut buf = CompressedTracksBuf::zeroed(64);
        buf.as_mut_bytes()[0..4].copy_from_slice(&64u32.to_le_bytes());
        let result = CompressedTracks::from_bytes(buf.as_bytes());
        assert!(matches!(result, Err(FormatError::InvalidTag)));
    }

    #[test]
    fn owned_buffer_is_aligned() {
        let buf = CompressedTracksBuf::zeroed(128);
        assert_eq!(buf.as_bytes().as_ptr() as usize % 16, 0);
        assert_eq!(buf.as_bytes().len(), 128);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }
}
