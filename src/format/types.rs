//! Wire-format enumerations and the variable bit-rate ladder.

// ─────────────────────────────────────────────────────────────────────────────
// Buffer identification
// ─────────────────────────────────────────────────────────────────────────────

/// Tag identifying a compressed-tracks buffer.
pub const COMPRESSED_TRACKS_TAG: u32 = 0xAC11_AC11;

/// Current (monotonically increasing) format version.
pub const COMPRESSED_TRACKS_VERSION: u16 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Track and algorithm types
// ─────────────────────────────────────────────────────────────────────────────

/// The sample type of every track in a track array.
///
/// The scalar variants exist for header compatibility with scalar-capable
/// tooling; this crate compresses [`TrackType::Qvv`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackType {
    Float1 = 0,
    Float2 = 1,
    Float3 = 2,
    Float4 = 3,
    Vector4 = 4,
    /// Rotation quaternion + translation + scale transform tracks.
    Qvv = 24,
}

impl TrackType {
    pub fn from_u8(value: u8) -> Option<TrackType> {
        match value {
            0 => Some(TrackType::Float1),
            1 => Some(TrackType::Float2),
            2 => Some(TrackType::Float3),
            3 => Some(TrackType::Float4),
            4 => Some(TrackType::Vector4),
            24 => Some(TrackType::Qvv),
            _ => None,
        }
    }
}

/// Compression algorithm family recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AlgorithmType {
    #[default]
    UniformlySampled = 0,
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage formats
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk rotation representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RotationFormat {
    /// All four quaternion components at full precision.
    QuatFull = 0,
    /// `(x, y, z)` at full precision, `w >= 0` reconstructed on decode.
    QuatDropWFull = 1,
    /// `(x, y, z)` at a per-segment variable bit rate.
    #[default]
    QuatDropWVariable = 2,
}

impl RotationFormat {
    #[inline]
    pub fn is_variable(self) -> bool {
        self == RotationFormat::QuatDropWVariable
    }

    /// Number of stored components per rotation sample.
    #[inline]
    pub fn num_components(self) -> u32 {
        match self {
            RotationFormat::QuatFull => 4,
            RotationFormat::QuatDropWFull | RotationFormat::QuatDropWVariable => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<RotationFormat> {
        match value {
            0 => Some(RotationFormat::QuatFull),
            1 => Some(RotationFormat::QuatDropWFull),
            2 => Some(RotationFormat::QuatDropWVariable),
            _ => None,
        }
    }
}

/// On-disk translation/scale representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum VectorFormat {
    /// Three components at full precision.
    Full = 0,
    /// Three components at a per-segment variable bit rate.
    #[default]
    Variable = 1,
}

impl VectorFormat {
    #[inline]
    pub fn is_variable(self) -> bool {
        self == VectorFormat::Variable
    }

    pub fn from_u8(value: u8) -> Option<VectorFormat> {
        match value {
            0 => Some(VectorFormat::Full),
            1 => Some(VectorFormat::Variable),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compression level, additive format, rounding policy
// ─────────────────────────────────────────────────────────────────────────────

/// Aggressiveness of the bit-rate search. Higher levels spend more
/// compression time for smaller output; every level honors the error budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum CompressionLevel {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

/// How an additive clip combines with its base pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdditiveFormat {
    /// Not additive.
    #[default]
    None,
    /// Local transforms compose onto the base with a full transform multiply.
    Relative,
    /// Rotation multiplies, translation adds, scale multiplies.
    Additive0,
    /// Like `Additive0` but scale is stored as a delta around zero.
    Additive1,
}

/// How the interpolation alpha is treated when a sample time falls between
/// two keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleRoundingPolicy {
    /// Interpolate with the fractional alpha.
    #[default]
    None,
    /// Snap to the earlier keyframe.
    Floor,
    /// Snap to the later keyframe.
    Ceil,
    /// Snap to whichever keyframe is nearest.
    Nearest,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sub-track classification (2-bit codes in the packed type map)
// ─────────────────────────────────────────────────────────────────────────────

/// Per-sub-track storage class. Exactly one applies to every sub-track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubTrackType {
    /// The sub-track equals its type's identity; nothing is stored.
    Default = 0,
    /// One representative sample lives in the constant pool.
    Constant = 1,
    /// Samples live in the animated stream at a per-segment bit rate.
    AnimatedVariable = 2,
    /// Samples live in the animated stream at full width.
    AnimatedFull = 3,
}

impl SubTrackType {
    #[inline]
    pub fn from_bits(bits: u32) -> SubTrackType {
        match bits & 0x3 {
            0 => SubTrackType::Default,
            1 => SubTrackType::Constant,
            2 => SubTrackType::AnimatedVariable,
            _ => SubTrackType::AnimatedFull,
        }
    }
}

/// Sub-tracks packed per 32-bit word in the type map.
pub const SUB_TRACKS_PER_PACKED_WORD: u32 = 16;

// ─────────────────────────────────────────────────────────────────────────────
// Bit-rate ladder
// ─────────────────────────────────────────────────────────────────────────────

/// Bits per component for each ladder index.
const BIT_RATE_NUM_BITS: [u32; 14] = [0, 3, 4, 5, 7, 8, 9, 11, 12, 13, 15, 16, 19, 32];

/// Number of ladder entries.
pub const NUM_BIT_RATES: u8 = BIT_RATE_NUM_BITS.len() as u8;

/// Sentinel rate: the sub-track is constant within the segment; its value is
/// read from the segment-range record and no animated bits are stored.
pub const CONSTANT_BIT_RATE: u8 = 0;

/// The smallest rate that stores animated bits.
pub const LOWEST_VARIABLE_BIT_RATE: u8 = 1;

/// The widest non-raw rate.
pub const HIGHEST_BIT_RATE: u8 = NUM_BIT_RATES - 2;

/// Sentinel rate: components are stored as verbatim 32-bit floats and both
/// range reduction steps are bypassed.
pub const RAW_BIT_RATE: u8 = NUM_BIT_RATES - 1;

/// Marker for "no rate chosen".
pub const INVALID_BIT_RATE: u8 = 0xFF;

/// Bits per component at a ladder index.
#[inline]
pub fn get_num_bits_at_bit_rate(bit_rate: u8) -> u32 {
    BIT_RATE_NUM_BITS[bit_rate as usize]
}

#[inline]
pub fn is_constant_bit_rate(bit_rate: u8) -> bool {
    bit_rate == CONSTANT_BIT_RATE
}

#[inline]
pub fn is_raw_bit_rate(bit_rate: u8) -> bool {
    bit_rate == RAW_BIT_RATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_strictly_increasing() {
        for rate in 1..NUM_BIT_RATES {
            assert!(get_num_bits_at_bit_rate(rate) > get_num_bits_at_bit_rate(rate - 1));
        }
    }

    #[test]
    fn sentinels() {
        assert_eq!(get_num_bits_at_bit_rate(CONSTANT_BIT_RATE), 0);
        assert_eq!(get_num_bits_at_bit_rate(RAW_BIT_RATE), 32);
        assert_eq!(get_num_bits_at_bit_rate(LOWEST_VARIABLE_BIT_RATE), 3);
        assert_eq!(get_num_bits_at_bit_rate(HIGHEST_BIT_RATE), 19);
        assert!(is_constant_bit_rate(CONSTANT_BIT_RATE));
        assert!(is_raw_bit_rate(RAW_BIT_RATE));
        assert!(!is_raw_bit_rate(HIGHEST_BIT_RATE));
    }

    #[test]
    fn format_component_counts() {
        assert_eq!(RotationFormat::QuatFull.num_components(), 4);
        assert_eq!(RotationFormat::QuatDropWFull.num_components(), 3);
        assert_eq!(RotationFormat::QuatDropWVariable.num_components(), 3);
        assert!(RotationFormat::QuatDropWVariable.is_variable());
        assert!(!RotationFormat::QuatDropWFull.is_variable());
        assert!(VectorFormat::Variable.is_variable());
    }

    #[test]
    fn enum_byte_roundtrips() {
        for value in 0..=u8::MAX {
            if let Some(format) = RotationFormat::from_u8(value) {
                assert_eq!(format as u8, value);
            }
            if let Some(format) = VectorFormat::from_u8(value) {
                assert_eq!(format as u8, value);
            }
            if let Some(track_type) = TrackType::from_u8(value) {
                assert_eq!(track_type as u8, value);
            }
        }
    }
}
