//! Input data model: transform tracks, their descriptions, and the validated
//! track array handed to the compressor.
//!
//! Bones form a forest expressed through parent indices; tracks are stored in
//! an indexed array and hierarchy walks use a precomputed topological order.

use glam::Quat;

use crate::error::CompressError;
use crate::math::QvvTransform;

/// Default maximum object-space error, in clip units.
pub const DEFAULT_PRECISION: f32 = 0.0001;

/// Default virtual-vertex lever arm for the error metric.
pub const DEFAULT_SHELL_DISTANCE: f32 = 3.0;

/// Default rotation constancy threshold, in radians.
pub const DEFAULT_CONSTANT_ROTATION_THRESHOLD_ANGLE: f32 = 0.00284714461;

/// Default translation constancy threshold.
pub const DEFAULT_CONSTANT_TRANSLATION_THRESHOLD: f32 = 0.001;

/// Default scale constancy threshold.
pub const DEFAULT_CONSTANT_SCALE_THRESHOLD: f32 = 0.00001;

/// Per-track compression parameters and hierarchy placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformTrackDescription {
    /// Index of the parent track; `None` for roots.
    pub parent_index: Option<u32>,
    /// Maximum allowed object-space error for this track.
    pub precision: f32,
    /// Distance of the virtual vertices measured by the error metric.
    pub shell_distance: f32,
    /// Rotation samples within this angle (radians) of each other collapse
    /// to a constant.
    pub constant_rotation_threshold_angle: f32,
    pub constant_translation_threshold: f32,
    pub constant_scale_threshold: f32,
}

impl Default for TransformTrackDescription {
    fn default() -> Self {
        TransformTrackDescription {
            parent_index: None,
            precision: DEFAULT_PRECISION,
            shell_distance: DEFAULT_SHELL_DISTANCE,
            constant_rotation_threshold_angle: DEFAULT_CONSTANT_ROTATION_THRESHOLD_ANGLE,
            constant_translation_threshold: DEFAULT_CONSTANT_TRANSLATION_THRESHOLD,
            constant_scale_threshold: DEFAULT_CONSTANT_SCALE_THRESHOLD,
        }
    }
}

/// One transform track: a name, a description, and its uniform samples at a
/// fixed rate.
#[derive(Debug, Clone)]
pub struct TransformTrack {
    pub name: String,
    pub description: TransformTrackDescription,
    pub sample_rate: f32,
    pub samples: Vec<QvvTransform>,
}

impl TransformTrack {
    pub fn new(samples: Vec<QvvTransform>, sample_rate: f32) -> Self {
        TransformTrack {
            name: String::new(),
            description: TransformTrackDescription::default(),
            sample_rate,
            samples,
        }
    }

    #[inline]
    pub fn num_samples(&self) -> u32 {
        self.samples.len() as u32
    }
}

/// A set of same-length, same-rate transform tracks.
#[derive(Debug, Clone)]
pub struct TrackArray {
    name: String,
    tracks: Vec<TransformTrack>,
    sample_rate: f32,
}

impl TrackArray {
    /// Builds a track array, validating that every track agrees on sample
    /// count and sample rate.
    pub fn new(tracks: Vec<TransformTrack>) -> Result<TrackArray, CompressError> {
        let mut sample_rate = 0.0;
        if let Some(first) = tracks.first() {
            let num_samples = first.num_samples();
            if tracks.iter().any(|t| t.num_samples() != num_samples) {
                return Err(CompressError::MismatchedSampleCounts);
            }
            sample_rate = first.sample_rate;
            if tracks.iter().any(|t| t.sample_rate != sample_rate) {
                return Err(CompressError::MismatchedSampleRates);
            }
        }
        Ok(TrackArray { name: String::new(), tracks, sample_rate })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> TrackArray {
        self.name = name.into();
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn tracks(&self) -> &[TransformTrack] {
        &self.tracks
    }

    /// Mutable access to the tracks, e.g. to adjust descriptions in place.
    /// Sample layout invariants are the caller's to keep.
    #[inline]
    pub fn tracks_mut(&mut self) -> &mut [TransformTrack] {
        &mut self.tracks
    }

    #[inline]
    pub fn num_tracks(&self) -> u32 {
        self.tracks.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn num_samples_per_track(&self) -> u32 {
        self.tracks.first().map_or(0, TransformTrack::num_samples)
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Clip duration in seconds.
    pub fn duration(&self) -> f32 {
        let num_samples = self.num_samples_per_track();
        if num_samples > 1 && self.sample_rate > 0.0 {
            (num_samples - 1) as f32 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Returns every sample of every track as quaternion-checkable values,
    /// true when all components are finite.
    pub fn are_samples_finite(&self) -> bool {
        self.tracks.iter().all(|track| {
            track.samples.iter().all(|sample| {
                sample.rotation.is_finite()
                    && sample.translation.is_finite()
                    && sample.scale.is_finite()
            })
        })
    }

    /// True when every rotation sample is a unit quaternion within
    /// `tolerance` of unit length.
    pub fn are_rotations_normalized(&self, tolerance: f32) -> bool {
        self.tracks.iter().all(|track| {
            track
                .samples
                .iter()
                .all(|sample| (sample.rotation.length_squared() - 1.0).abs() <= tolerance)
        })
    }

    /// Track indices ordered parents-first; ties broken by ascending index.
    ///
    /// Tracks whose parent index is out of range or cyclic are treated as
    /// roots so the walk always terminates.
    pub fn topological_order(&self) -> Vec<u32> {
        let num_tracks = self.tracks.len();
        let mut order = Vec::with_capacity(num_tracks);
        let mut emitted = vec![false; num_tracks];

        // Repeatedly emit tracks whose parent has been emitted. The forest is
        // shallow in practice, so the quadratic sweep is irrelevant.
        while order.len() < num_tracks {
            let before = order.len();
            for index in 0..num_tracks {
                if emitted[index] {
                    continue;
                }
                let ready = match self.tracks[index].description.parent_index {
                    None => true,
                    Some(parent) => {
                        parent as usize >= num_tracks || emitted[parent as usize]
                    }
                };
                if ready {
                    emitted[index] = true;
                    order.push(index as u32);
                }
            }
            if order.len() == before {
                // Cycle: emit the remaining tracks as roots.
                for index in 0..num_tracks {
                    if !emitted[index] {
                        emitted[index] = true;
                        order.push(index as u32);
                    }
                }
            }
        }
        order
    }
}

/// Convenience constructor for a single-bone identity sample.
pub fn identity_sample() -> QvvTransform {
    QvvTransform::IDENTITY
}

/// Convenience: a rotation-only sample with zero translation and unit scale.
pub fn rotation_sample(rotation: Quat) -> QvvTransform {
    QvvTransform { rotation, ..QvvTransform::IDENTITY }
}
