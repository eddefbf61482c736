//! Volumetric image record: geometry plus an exclusively owned sample buffer.

use super::datatype::{DataType, Element, ImageData};
use super::geometry::ImageGeometry;
use super::view::{Lattice, VectorField, VectorFieldMut};
use crate::error::{FfdError, Result};

/// A dense lattice of scalar samples with its voxel-to-world geometry.
///
/// Vector images (deformation fields, control-point grids) keep their
/// components along the fifth axis, so the buffer is `nu` consecutive
/// blocks of `nx · ny · nz` samples.
///
/// The buffer is never shared between images; cloning copies it.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumetricImage {
    geometry: ImageGeometry,
    data: ImageData,
}

impl VolumetricImage {
    /// Zero-filled image.
    pub fn zeros(geometry: ImageGeometry, datatype: DataType) -> Self {
        let data = ImageData::zeros(datatype, geometry.len());
        Self { geometry, data }
    }

    /// Wrap an existing typed buffer whose length must match the geometry.
    pub fn from_vec<T: Element>(geometry: ImageGeometry, values: Vec<T>) -> Result<Self> {
        if values.len() != geometry.len() {
            return Err(FfdError::shape_mismatch(
                geometry.dims().to_vec(),
                vec![values.len()],
            ));
        }
        Ok(Self {
            geometry,
            data: T::wrap(values),
        })
    }

    /// Copy of `other`'s geometry with a zero-filled buffer.
    pub fn like(other: &VolumetricImage, datatype: DataType) -> Self {
        Self::zeros(other.geometry.clone(), datatype)
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    /// Mutable geometry. Lattice dimensions cannot be changed through it,
    /// so the buffer length stays consistent.
    pub fn geometry_mut(&mut self) -> &mut ImageGeometry {
        &mut self.geometry
    }

    pub fn data(&self) -> &ImageData {
        &self.data
    }

    pub fn datatype(&self) -> DataType {
        self.data.datatype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Spatial lattice `(nx, ny, nz)`.
    pub fn lattice(&self) -> Lattice {
        Lattice::new(self.geometry.nx(), self.geometry.ny(), self.geometry.nz())
    }

    /// Typed view of all samples.
    pub fn samples<T: Element>(&self) -> Result<&[T]> {
        let actual = self.data.datatype();
        T::slice(&self.data).ok_or_else(|| FfdError::type_mismatch(T::DATATYPE, actual))
    }

    pub fn samples_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        let actual = self.data.datatype();
        T::slice_mut(&mut self.data).ok_or_else(|| FfdError::type_mismatch(T::DATATYPE, actual))
    }

    /// Read-only component view of a 2- or 3-component image.
    pub fn vector_field<T: Element>(&self) -> Result<VectorField<'_, T>> {
        let lattice = self.lattice();
        let components = self.geometry.nu();
        VectorField::new(lattice, components, self.samples::<T>()?)
    }

    pub fn vector_field_mut<T: Element>(&mut self) -> Result<VectorFieldMut<'_, T>> {
        let lattice = self.lattice();
        let components = self.geometry.nu();
        VectorFieldMut::new(lattice, components, self.samples_mut::<T>()?)
    }

    /// Geometry and mutable component view borrowed together.
    pub fn parts_mut<T: Element>(&mut self) -> Result<(&ImageGeometry, VectorFieldMut<'_, T>)> {
        let lattice = self.lattice();
        let components = self.geometry.nu();
        let actual = self.data.datatype();
        let samples = T::slice_mut(&mut self.data)
            .ok_or_else(|| FfdError::type_mismatch(T::DATATYPE, actual))?;
        Ok((&self.geometry, VectorFieldMut::new(lattice, components, samples)?))
    }

    /// Overwrite the sample buffer with `other`'s. Element type and length
    /// must match.
    pub fn copy_data_from(&mut self, other: &VolumetricImage) -> Result<()> {
        if self.datatype() != other.datatype() {
            return Err(FfdError::type_mismatch(self.datatype(), other.datatype()));
        }
        if self.len() != other.len() {
            return Err(FfdError::shape_mismatch(vec![self.len()], vec![other.len()]));
        }
        self.data.clone_from(&other.data);
        Ok(())
    }

    pub fn into_parts(self) -> (ImageGeometry, ImageData) {
        (self.geometry, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_geometry() -> ImageGeometry {
        ImageGeometry::volume([3, 2, 2], [1.0; 3]).unwrap().with_components(3)
    }

    #[test]
    fn test_zeros() {
        let image = VolumetricImage::zeros(field_geometry(), DataType::Float32);
        assert_eq!(image.len(), 36);
        assert!(image.samples::<f32>().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_vec_length_checked() {
        let err = VolumetricImage::from_vec(field_geometry(), vec![0.0f64; 10]).unwrap_err();
        assert!(matches!(err, FfdError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_typed_access_mismatch() {
        let image = VolumetricImage::zeros(field_geometry(), DataType::Float64);
        assert_eq!(
            image.samples::<f32>().unwrap_err(),
            FfdError::type_mismatch(DataType::Float32, DataType::Float64)
        );
    }

    #[test]
    fn test_vector_field_blocks() {
        let values: Vec<f32> = (0..36).map(|v| v as f32).collect();
        let image = VolumetricImage::from_vec(field_geometry(), values).unwrap();
        let field = image.vector_field::<f32>().unwrap();
        assert_eq!(field.components(), 3);
        assert_eq!(field.get(0, 0), 0.0);
        assert_eq!(field.get(1, 0), 12.0);
        assert_eq!(field.get(2, 11), 35.0);
    }

    #[test]
    fn test_scalar_image_is_not_a_vector_field() {
        let image = VolumetricImage::zeros(
            ImageGeometry::volume([3, 2, 2], [1.0; 3]).unwrap(),
            DataType::Float32,
        );
        assert!(matches!(
            image.vector_field::<f32>(),
            Err(FfdError::UnsupportedDimensionality(1))
        ));
    }

    #[test]
    fn test_copy_data_from() {
        let source = VolumetricImage::from_vec(field_geometry(), vec![1.5f64; 36]).unwrap();
        let mut target = VolumetricImage::like(&source, DataType::Float64);
        target.copy_data_from(&source).unwrap();
        assert_eq!(target, source);

        let mut other = VolumetricImage::like(&source, DataType::Float32);
        assert!(other.copy_data_from(&source).is_err());
    }
}
