//! Construction of dense deformation fields.
//!
//! Affine fills are one matrix product per voxel and always run on the
//! rayon pool.

use ffdreg_core::{
    AffineMatrix, DataType, FfdError, Real, Result, TransformKind, VolumetricImage,
};

use crate::checks;
use crate::options::Execution;
use crate::parallel::{for_each_slab, slab_len};

/// Zero-filled deformation field on `reference`'s lattice and geometry:
/// two components for planar references, three otherwise.
pub fn create_deformation_field(
    reference: &VolumetricImage,
    datatype: DataType,
) -> Result<VolumetricImage> {
    if !datatype.is_floating_point() {
        return Err(FfdError::UnsupportedDataType(datatype));
    }
    let nu = if reference.geometry().is_2d() { 2 } else { 3 };
    let mut geometry = reference.geometry().with_components(nu);
    geometry.set_transform_kind(Some(TransformKind::DeformationField));
    geometry.set_velocity_exponent(0);
    Ok(VolumetricImage::zeros(geometry, datatype))
}

/// Deformation field whose value at each voxel is that voxel's own world
/// position.
pub fn identity_deformation_field(
    reference: &VolumetricImage,
    datatype: DataType,
) -> Result<VolumetricImage> {
    deformation_field_from_affine(reference, &AffineMatrix::identity(), datatype)
}

/// Deformation field of a global affine: each voxel holds
/// `affine · voxel_to_real · index`.
pub fn deformation_field_from_affine(
    reference: &VolumetricImage,
    affine: &AffineMatrix,
    datatype: DataType,
) -> Result<VolumetricImage> {
    let mut field = create_deformation_field(reference, datatype)?;
    fill_with_affine(&mut field, affine)?;
    Ok(field)
}

/// Overwrite every voxel of a vector image with `affine · voxel_to_real · index`.
pub(crate) fn fill_with_affine(image: &mut VolumetricImage, affine: &AffineMatrix) -> Result<()> {
    let datatype = checks::require_float(image)?;
    checks::require_vector(image)?;
    match datatype {
        DataType::Float32 => fill_typed::<f32>(image, affine),
        DataType::Float64 => fill_typed::<f64>(image, affine),
        other => Err(FfdError::UnsupportedDataType(other)),
    }
}

fn fill_typed<T: Real>(image: &mut VolumetricImage, affine: &AffineMatrix) -> Result<()> {
    let rows = affine
        .compose(image.geometry().voxel_to_real())
        .rows::<T>();
    let lattice = image.lattice();
    let slab = slab_len(lattice);
    let planar = lattice.is_2d();
    let target = image.vector_field_mut::<T>()?;

    for_each_slab(target, slab, Execution::Parallel, |s, parts| {
        for i in 0..slab {
            let (x, y, z) = lattice.coordinates(s * slab + i);
            let (x, y, z) = (T::cast(x as f64), T::cast(y as f64), T::cast(z as f64));
            if planar {
                let p = rows.apply2(x, y);
                parts[0][i] = p[0];
                parts[1][i] = p[1];
            } else {
                let p = rows.apply3(x, y, z);
                parts[0][i] = p[0];
                parts[1][i] = p[1];
                parts[2][i] = p[2];
            }
        }
    });
    Ok(())
}
