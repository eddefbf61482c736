//! Image records, geometry and typed sample buffers consumed by the
//! free-form deformation engine.

pub mod error;
pub mod image;
pub mod spatial;

pub use error::{FfdError, Result};
pub use image::{
    DataType, Element, FormPreference, ImageData, ImageGeometry, Lattice, Mask, Real,
    TransformKind, VectorField, VectorFieldMut, VolumetricImage,
};
pub use spatial::{AffineMatrix, AffineRows, QuaternionForm};
