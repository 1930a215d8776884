//! Shared helpers for the integration suites: clip builders, decode
//! shortcuts, and an independent object-space error check.

#![allow(dead_code)]

use animcodec::{
    CompressedTracks, DecompressionContext, PoseWriter, QvvTransform, SampleRoundingPolicy,
    TrackArray, TransformTrack,
};
use glam::{Quat, Vec3};

/// Wraps samples for one root bone into a track array.
pub fn single_bone_array(samples: Vec<QvvTransform>, sample_rate: f32) -> TrackArray {
    TrackArray::new(vec![TransformTrack::new(samples, sample_rate)]).unwrap()
}

/// A root bone rotating smoothly about a wobbling axis; deterministic.
pub fn smooth_rotation_clip(num_samples: u32, sample_rate: f32) -> TrackArray {
    let samples = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            let axis = Vec3::new((0.9 * t).sin() * 0.2, 1.0, (1.3 * t).cos() * 0.1).normalize();
            let angle = 0.8 * (0.7 * t).sin() + 0.3 * (2.1 * t).cos();
            QvvTransform {
                rotation: Quat::from_axis_angle(axis, angle),
                ..QvvTransform::IDENTITY
            }
        })
        .collect();
    single_bone_array(samples, sample_rate)
}

/// Three-bone chain (0 → 1 → 2) with smooth rotation and translation.
pub fn hierarchy_clip(num_samples: u32, sample_rate: f32) -> TrackArray {
    let mut tracks = Vec::new();
    for bone in 0..3u32 {
        let samples = (0..num_samples)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let phase = bone as f32 * 0.7;
                QvvTransform {
                    rotation: Quat::from_rotation_y(0.6 * (t * 1.1 + phase).sin()),
                    translation: Vec3::new(
                        0.0,
                        (bone as f32) * 0.5,
                        0.25 * (t * 0.9 + phase).cos(),
                    ),
                    scale: Vec3::ONE,
                }
            })
            .collect();
        let mut track = TransformTrack::new(samples, sample_rate);
        if bone > 0 {
            track.description.parent_index = Some(bone - 1);
        }
        tracks.push(track);
    }
    TrackArray::new(tracks).unwrap()
}

/// Seeks and decodes a full pose of local transforms.
pub fn decode_pose(
    tracks: &CompressedTracks,
    time: f32,
    rounding: SampleRoundingPolicy,
) -> Vec<QvvTransform> {
    let mut context = DecompressionContext::new(tracks);
    context.seek(time, rounding);
    let mut pose = PoseWriter::new(tracks.num_tracks());
    context.decompress_tracks(&mut pose);
    pose.transforms
}

/// Composes local transforms into object space; parents must precede
/// children in index order (true for all clips built here).
pub fn object_pose(locals: &[QvvTransform], parents: &[Option<u32>]) -> Vec<QvvTransform> {
    let mut object = Vec::with_capacity(locals.len());
    for (index, local) in locals.iter().enumerate() {
        let pose = match parents[index] {
            Some(parent) => {
                let parent_pose: QvvTransform = object[parent as usize];
                parent_pose.mul(local)
            }
            None => *local,
        };
        object.push(pose);
    }
    object
}

/// Worst displacement of shell-distance virtual vertices across all bones.
pub fn max_shell_error(
    reference_locals: &[QvvTransform],
    lossy_locals: &[QvvTransform],
    parents: &[Option<u32>],
    shell_distance: f32,
) -> f32 {
    let reference = object_pose(reference_locals, parents);
    let lossy = object_pose(lossy_locals, parents);
    let mut worst = 0.0f32;
    for (r, l) in reference.iter().zip(&lossy) {
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            let point = axis * shell_distance;
            worst = worst.max(r.transform_point(point).distance(l.transform_point(point)));
        }
    }
    worst
}

/// Parent indices of a track array, in track order.
pub fn parent_indices(array: &TrackArray) -> Vec<Option<u32>> {
    array.tracks().iter().map(|t| t.description.parent_index).collect()
}
