//! Criterion benchmarks for the decode path.
//!
//! Run with:
//!   cargo bench --bench decompress
//!
//! Compresses a synthetic multi-bone clip once, then measures seek +
//! whole-pose decompression at varying pose sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::{Quat, Vec3};

use animcodec::{
    compress_transform_clip, AdditiveFormat, CompressionSettings, DecompressionContext,
    PoseWriter, QvvTransform, SampleRoundingPolicy, TrackArray, TransformTrack,
};

/// A deterministic bone-chain clip with rotation and translation motion.
fn synthetic_clip(num_bones: u32, num_samples: u32, sample_rate: f32) -> TrackArray {
    let mut tracks = Vec::with_capacity(num_bones as usize);
    for bone in 0..num_bones {
        let phase = bone as f32 * 0.31;
        let samples = (0..num_samples)
            .map(|i| {
                let t = i as f32 / sample_rate;
                QvvTransform {
                    rotation: Quat::from_euler(
                        glam::EulerRot::YXZ,
                        0.7 * (t * 1.3 + phase).sin(),
                        0.2 * (t * 0.9 + phase).cos(),
                        0.1 * (t * 2.0).sin(),
                    ),
                    translation: Vec3::new(0.0, 0.4, 0.1 * (t + phase).sin()),
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

fn bench_decompress_pose(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress_pose");

    for &num_bones in &[4u32, 16, 64] {
        let array = synthetic_clip(num_bones, 120, 30.0);
        let compressed = compress_transform_clip(
            &array,
            CompressionSettings::default(),
            None,
            AdditiveFormat::None,
        )
        .unwrap();
        let duration = compressed.duration();

        group.throughput(Throughput::Elements(u64::from(num_bones)));
        group.bench_with_input(
            BenchmarkId::new("seek_and_decode", num_bones),
            &compressed,
            |b, compressed| {
                let mut context = DecompressionContext::new(compressed);
                let mut pose = PoseWriter::new(num_bones);
                let mut time = 0.0f32;
                b.iter(|| {
                    time = (time + 0.011) % duration;
                    context.seek(time, SampleRoundingPolicy::None);
                    context.decompress_tracks(&mut pose);
                });
            },
        );
    }

    group.finish();
}

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress");
    group.sample_size(10);

    let array = synthetic_clip(16, 120, 30.0);
    group.bench_function("16_bones_120_samples", |b| {
        b.iter(|| {
            compress_transform_clip(
                &array,
                CompressionSettings::default(),
                None,
                AdditiveFormat::None,
            )
            .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decompress_pose, bench_compress);
criterion_main!(benches);
