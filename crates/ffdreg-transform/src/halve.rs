//! Halving a transform, i.e. taking its square root.

use ffdreg_core::{FfdError, Result, TransformKind, VolumetricImage};

use crate::convert::{deformation_from_displacement, displacement_from_deformation, scale_displacement};

/// Halve the transform held by `image`, in place.
///
/// Grids and deformation fields are moved to displacement form, scaled by
/// one half and moved back; displacement fields are scaled directly.
/// Velocity representations are halved by performing one fewer squaring
/// step, so their exponent is decremented (saturating at zero) on top of
/// the same scaling.
///
/// # Errors
/// [`FfdError::InvalidGeometry`] if the image carries no transform kind.
pub fn halve_transform(image: &mut VolumetricImage) -> Result<()> {
    let kind = image.geometry().transform_kind().ok_or_else(|| {
        FfdError::invalid_geometry("image does not hold a tagged transformation")
    })?;

    match kind {
        TransformKind::SplineGrid
        | TransformKind::DeformationField
        | TransformKind::SplineVelocityGrid
        | TransformKind::DeformationVelocityField => {
            displacement_from_deformation(image)?;
            scale_displacement(image, 0.5)?;
            deformation_from_displacement(image)?;
        }
        TransformKind::DisplacementField | TransformKind::DisplacementVelocityField => {
            scale_displacement(image, 0.5)?;
        }
    }

    if kind.is_velocity() {
        let exponent = image.geometry().velocity_exponent().saturating_sub(1);
        image.geometry_mut().set_velocity_exponent(exponent);
    }
    tracing::debug!(
        "Halved {:?}, velocity exponent now {}",
        kind,
        image.geometry().velocity_exponent()
    );
    Ok(())
}
