//! Conversion between absolute positions and offsets from the identity.
//!
//! Each conversion is one affine evaluation per voxel and always runs on
//! the rayon pool.

use rayon::prelude::*;

use ffdreg_core::{DataType, FfdError, Real, Result, TransformKind, VolumetricImage};

use crate::checks;
use crate::options::Execution;
use crate::parallel::{for_each_slab, slab_len};

/// Subtract each voxel's own world position (sform preferred) from its
/// value. Dense deformation tags become displacement tags; grid tags are
/// kept.
pub fn displacement_from_deformation(image: &mut VolumetricImage) -> Result<()> {
    shift_by_identity(image, Shift::Subtract)?;
    let kind = match image.geometry().transform_kind() {
        Some(TransformKind::DeformationField) => Some(TransformKind::DisplacementField),
        Some(TransformKind::DeformationVelocityField) => {
            Some(TransformKind::DisplacementVelocityField)
        }
        other => other,
    };
    image.geometry_mut().set_transform_kind(kind);
    Ok(())
}

/// Add each voxel's own world position to its value. Inverse of
/// [`displacement_from_deformation`].
pub fn deformation_from_displacement(image: &mut VolumetricImage) -> Result<()> {
    shift_by_identity(image, Shift::Add)?;
    let kind = match image.geometry().transform_kind() {
        Some(TransformKind::DisplacementField) => Some(TransformKind::DeformationField),
        Some(TransformKind::DisplacementVelocityField) => {
            Some(TransformKind::DeformationVelocityField)
        }
        other => other,
    };
    image.geometry_mut().set_transform_kind(kind);
    Ok(())
}

/// Multiply every sample by `factor`.
pub fn scale_displacement(image: &mut VolumetricImage, factor: f64) -> Result<()> {
    match checks::require_float(image)? {
        DataType::Float32 => scale_typed::<f32>(image, factor),
        DataType::Float64 => scale_typed::<f64>(image, factor),
        other => Err(FfdError::UnsupportedDataType(other)),
    }
}

fn scale_typed<T: Real>(image: &mut VolumetricImage, factor: f64) -> Result<()> {
    let factor = T::cast(factor);
    image
        .samples_mut::<T>()?
        .par_iter_mut()
        .for_each(|v| *v = *v * factor);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Add,
    Subtract,
}

fn shift_by_identity(image: &mut VolumetricImage, shift: Shift) -> Result<()> {
    let datatype = checks::require_float(image)?;
    checks::require_vector(image)?;
    match datatype {
        DataType::Float32 => shift_typed::<f32>(image, shift),
        DataType::Float64 => shift_typed::<f64>(image, shift),
        other => Err(FfdError::UnsupportedDataType(other)),
    }
}

fn shift_typed<T: Real>(image: &mut VolumetricImage, shift: Shift) -> Result<()> {
    let rows = image.geometry().voxel_to_real().rows::<T>();
    let lattice = image.lattice();
    let slab = slab_len(lattice);
    let planar = lattice.is_2d();
    let target = image.vector_field_mut::<T>()?;

    for_each_slab(target, slab, Execution::Parallel, |s, parts| {
        for i in 0..slab {
            let (x, y, z) = lattice.coordinates(s * slab + i);
            let (x, y, z) = (T::cast(x as f64), T::cast(y as f64), T::cast(z as f64));
            let position = if planar {
                let p = rows.apply2(x, y);
                [p[0], p[1], T::zero()]
            } else {
                rows.apply3(x, y, z)
            };
            for (c, part) in parts.iter_mut().enumerate() {
                part[i] = match shift {
                    Shift::Add => part[i] + position[c],
                    Shift::Subtract => part[i] - position[c],
                };
            }
        }
    });
    Ok(())
}
