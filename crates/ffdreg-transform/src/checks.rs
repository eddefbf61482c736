//! Argument validation shared by the engine entry points.
//!
//! Every check runs before any output buffer is touched.

use ffdreg_core::{DataType, FfdError, Mask, Result, VolumetricImage};

/// Element type of a field or grid; only `f32`/`f64` are accepted.
pub(crate) fn require_float(image: &VolumetricImage) -> Result<DataType> {
    let datatype = image.datatype();
    if !datatype.is_floating_point() {
        return Err(FfdError::UnsupportedDataType(datatype));
    }
    Ok(datatype)
}

/// Both images are floating point and share one element type.
pub(crate) fn require_same_float(
    reference: &VolumetricImage,
    other: &VolumetricImage,
) -> Result<DataType> {
    let datatype = require_float(reference)?;
    if other.datatype() != datatype {
        return Err(FfdError::type_mismatch(datatype, other.datatype()));
    }
    Ok(datatype)
}

/// Component count of a vector image: 2 on planar lattices, 3 otherwise.
pub(crate) fn require_vector(image: &VolumetricImage) -> Result<usize> {
    let geometry = image.geometry();
    let nu = geometry.nu();
    let expected = if geometry.is_2d() { 2 } else { 3 };
    if nu != expected || geometry.nt() != 1 {
        return Err(FfdError::UnsupportedDimensionality(nu));
    }
    Ok(nu)
}

/// Two vector images of the same dimensionality.
pub(crate) fn require_matching_vectors(
    first: &VolumetricImage,
    second: &VolumetricImage,
) -> Result<usize> {
    let nu = require_vector(first)?;
    let other = require_vector(second)?;
    if nu != other {
        return Err(FfdError::shape_mismatch(vec![nu], vec![other]));
    }
    Ok(nu)
}

pub(crate) fn check_mask(mask: Option<&Mask>, voxels: usize) -> Result<()> {
    match mask {
        Some(mask) => mask.check_len(voxels),
        None => Ok(()),
    }
}

#[inline(always)]
pub(crate) fn is_active(mask: Option<&Mask>, index: usize) -> bool {
    mask.map_or(true, |mask| mask.is_active(index))
}
