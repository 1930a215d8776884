//! Transform math shared by the compressor's error metric and the decoder.

pub mod quat_packing;
pub mod qvv;

pub use quat_packing::{quat_from_positive_w, quat_lerp_normalized, quat_to_positive_w_vec3};
pub use qvv::QvvTransform;
