//! Timeline partitioning into fixed-count contiguous segments.

use crate::error::CompressError;

use super::clip_context::{ClipContext, ClipState, SegmentBoneData, SegmentContext, SUB_TRACK_KINDS};

/// Maximum number of segments the format can address.
pub(crate) const MAX_NUM_SEGMENTS: u32 = 65535;

/// Segment sizing knobs. An implementation detail of the compressor; raw
/// format combinations disable segmenting by maxing both values out.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentingSettings {
    pub ideal_num_samples: u32,
    pub max_num_samples: u32,
}

impl Default for SegmentingSettings {
    fn default() -> Self {
        SegmentingSettings { ideal_num_samples: 16, max_num_samples: 31 }
    }
}

/// Splits the clip into segments and copies each bone's animated samples into
/// per-segment streams.
///
/// Clips of at most `max_num_samples` samples produce a single segment.
/// Otherwise the clip is cut into `ceil(S / ideal)` ideal-sized pieces; when
/// the leftover tail can be absorbed within the per-segment maximum it is
/// redistributed across the other segments and the tail segment dropped.
pub(crate) fn segment_streams(
    context: &mut ClipContext,
    settings: SegmentingSettings,
) -> Result<(), CompressError> {
    context.transition(ClipState::Normalized, ClipState::Segmented);
    debug_assert!(settings.ideal_num_samples <= settings.max_num_samples);

    let num_samples = context.num_samples;
    let counts = split_sample_counts(num_samples, settings);

    let num_segments = counts.len() as u32;
    if num_segments > MAX_NUM_SEGMENTS {
        return Err(CompressError::TooManySegments(num_segments));
    }

    let mut segments = Vec::with_capacity(counts.len());
    let mut start_index = 0u32;
    for &count in &counts {
        let mut bones = Vec::with_capacity(context.num_bones as usize);
        for bone in &context.bones {
            let mut data = SegmentBoneData {
                bit_rates: [crate::format::INVALID_BIT_RATE; 3],
                ..SegmentBoneData::default()
            };
            let begin = start_index as usize;
            let end = begin + count as usize;
            for kind in SUB_TRACK_KINDS {
                if !bone.flags[kind as usize].is_animated() {
                    continue;
                }
                data.streams[kind as usize] = bone.streams[kind as usize][begin..end].to_vec();
                data.unnormalized[kind as usize] =
                    bone.unnormalized[kind as usize][begin..end].to_vec();
            }
            bones.push(data);
        }
        segments.push(SegmentContext {
            start_index,
            num_samples: count,
            bones,
            animated_bits_per_frame: 0,
        });
        start_index += count;
    }
    debug_assert_eq!(start_index, num_samples, "segments must tile the clip");

    context.segments = segments;
    Ok(())
}

/// Pure segment sizing: how many samples each segment receives.
pub(crate) fn split_sample_counts(num_samples: u32, settings: SegmentingSettings) -> Vec<u32> {
    if num_samples <= settings.max_num_samples {
        return vec![num_samples];
    }

    let ideal = settings.ideal_num_samples;
    let mut num_segments = num_samples.div_ceil(ideal);
    let rounded_up = num_segments * ideal;
    let mut counts = vec![ideal; num_segments as usize];

    let leftover = ideal - (rounded_up - num_samples);
    counts[num_segments as usize - 1] = leftover;

    let slack = settings.max_num_samples - ideal;
    if (num_segments - 1) * slack >= leftover {
        // Enough head room in the other segments to absorb the tail.
        let mut remaining = leftover;
        while remaining != 0 {
            for segment_index in 0..(num_segments as usize - 1) {
                if remaining == 0 {
                    break;
                }
                counts[segment_index] += 1;
                remaining -= 1;
            }
        }
        counts.pop();
        num_segments -= 1;
    }
    debug_assert!(num_segments >= 1);
    debug_assert!(counts.iter().all(|&c| c >= 1 && c <= settings.max_num_samples));

    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> SegmentingSettings {
        SegmentingSettings::default()
    }

    #[test]
    fn short_clips_produce_one_segment() {
        assert_eq!(split_sample_counts(1, defaults()), vec![1]);
        assert_eq!(split_sample_counts(2, defaults()), vec![2]);
        assert_eq!(split_sample_counts(31, defaults()), vec![31]);
    }

    #[test]
    fn thirty_two_samples_become_two_segments() {
        let counts = split_sample_counts(32, defaults());
        assert_eq!(counts.iter().sum::<u32>(), 32);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn forty_samples_redistribute_the_tail() {
        // ceil(40/16) = 3 segments of 16/16/8; the 8-sample tail fits in the
        // first two segments' slack, leaving 20/20.
        let counts = split_sample_counts(40, defaults());
        assert_eq!(counts, vec![20, 20]);
    }

    #[test]
    fn tails_too_large_to_absorb_are_kept() {
        // 100 samples: 7 segments of 16 with a tail of 4; slack absorbs it
        // into 6 segments.
        let counts = split_sample_counts(100, defaults());
        assert_eq!(counts.iter().sum::<u32>(), 100);
        assert!(counts.iter().all(|&c| c <= 31));
    }

    #[test]
    fn every_segment_tiles_the_timeline() {
        for num_samples in [32u32, 33, 47, 63, 64, 100, 257, 1000] {
            let counts = split_sample_counts(num_samples, defaults());
            assert_eq!(counts.iter().sum::<u32>(), num_samples, "{num_samples} samples");
            assert!(counts.iter().all(|&c| c >= 1 && c <= 31));
        }
    }
}
