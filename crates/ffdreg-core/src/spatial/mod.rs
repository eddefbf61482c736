//! Spatial types: affine matrices and the quaternion voxel-to-world form.
//!
//! All types are backed by nalgebra.

pub mod affine;
pub mod quaternion;

pub use affine::{AffineMatrix, AffineRows};
pub use quaternion::QuaternionForm;
