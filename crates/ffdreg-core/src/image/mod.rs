//! Image types and operations.
//!
//! This module provides the volumetric image record, its voxel-to-world
//! geometry, the runtime-typed sample buffer and the indexed views the
//! deformation engine uses to walk multi-component buffers.

pub mod datatype;
pub mod geometry;
pub mod image;
pub mod mask;
pub mod view;

pub use datatype::{DataType, Element, ImageData, Real};
pub use geometry::{FormPreference, ImageGeometry, TransformKind};
pub use image::VolumetricImage;
pub use mask::Mask;
pub use view::{Lattice, VectorField, VectorFieldMut};
