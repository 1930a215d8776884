//! The decoder's output sink.
//!
//! The decoder pushes each decoded sub-track through a caller-provided sink
//! instead of returning arrays, so callers choose their own pose layout
//! without any allocation on the decode path. Sub-track groups can be
//! skipped wholesale; skipped groups still advance the decoder's cursors but
//! never unpack samples.

use glam::{Quat, Vec3};

use crate::math::QvvTransform;

/// Receives decoded sub-track values during pose or single-track decoding.
pub trait TrackWriter {
    fn write_rotation(&mut self, track_index: u32, rotation: Quat);
    fn write_translation(&mut self, track_index: u32, translation: Vec3);
    fn write_scale(&mut self, track_index: u32, scale: Vec3);

    /// Return true to skip decoding every rotation sub-track.
    fn skip_all_rotations(&self) -> bool {
        false
    }
    /// Return true to skip decoding every translation sub-track.
    fn skip_all_translations(&self) -> bool {
        false
    }
    /// Return true to skip decoding every scale sub-track.
    fn skip_all_scales(&self) -> bool {
        false
    }
}

/// A straightforward sink collecting a whole pose as local transforms.
#[derive(Debug, Clone)]
pub struct PoseWriter {
    pub transforms: Vec<QvvTransform>,
}

impl PoseWriter {
    pub fn new(num_tracks: u32) -> PoseWriter {
        PoseWriter { transforms: vec![QvvTransform::IDENTITY; num_tracks as usize] }
    }
}

impl TrackWriter for PoseWriter {
    #[inline]
    fn write_rotation(&mut self, track_index: u32, rotation: Quat) {
        self.transforms[track_index as usize].rotation = rotation;
    }

    #[inline]
    fn write_translation(&mut self, track_index: u32, translation: Vec3) {
        self.transforms[track_index as usize].translation = translation;
    }

    #[inline]
    fn write_scale(&mut self, track_index: u32, scale: Vec3) {
        self.transforms[track_index as usize].scale = scale;
    }
}
