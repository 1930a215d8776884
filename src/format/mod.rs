//! The compressed-tracks wire format: enumerations, header layouts, and the
//! validated buffer wrapper the decoder reads from.

pub mod compressed_tracks;
pub mod headers;
pub mod types;

pub use compressed_tracks::{make_compressed_tracks, CompressedTracks, CompressedTracksBuf};
pub use types::{
    get_num_bits_at_bit_rate, is_constant_bit_rate, is_raw_bit_rate, AdditiveFormat,
    AlgorithmType, CompressionLevel, RotationFormat, SampleRoundingPolicy, SubTrackType,
    TrackType, VectorFormat, CONSTANT_BIT_RATE, HIGHEST_BIT_RATE, INVALID_BIT_RATE,
    LOWEST_VARIABLE_BIT_RATE, NUM_BIT_RATES, RAW_BIT_RATE,
};
