//! Scaling-and-squaring integration of stationary velocity grids.
//!
//! A velocity grid with exponent `N` is scaled by `2^-N` in displacement
//! form, turned into a deformation and then composed with itself `N`
//! times. The exact path squares the dense field; the approximate path
//! squares the sparse grid and only evaluates the dense field at the end.

use ffdreg_core::{AffineMatrix, FfdError, Result, TransformKind, VolumetricImage};

use crate::basis::BasisFamily;
use crate::checks;
use crate::compose::{compose_fields_with, compose_grids_with};
use crate::convert::{deformation_from_displacement, displacement_from_deformation, scale_displacement};
use crate::evaluate::evaluate_deformation_field;
use crate::field::fill_with_affine;
use crate::options::VelocityIntegration;

/// Integrate `velocity` into the deformation `field`.
///
/// When `intermediates` is given it is cleared and receives exactly `N`
/// fields, entry `i` being the field fed into squaring step `i` (the
/// deformation at scale `2^(i - N)`). The final deformation is always
/// written to `field`, which is tagged [`TransformKind::DeformationField`].
///
/// # Errors
/// * [`FfdError::InvalidCombination`] if approximate integration is
///   combined with intermediates; nothing is written.
/// * The validation errors of
///   [`evaluate_deformation_field`](crate::evaluate::evaluate_deformation_field).
pub fn integrate_velocity_grid(
    velocity: &VolumetricImage,
    field: &mut VolumetricImage,
    mut intermediates: Option<&mut Vec<VolumetricImage>>,
    options: &VelocityIntegration,
) -> Result<()> {
    if options.approx && intermediates.is_some() {
        return Err(FfdError::invalid_combination(
            "intermediate fields are not available with approximate integration",
        ));
    }
    checks::require_same_float(velocity, field)?;
    checks::require_matching_vectors(velocity, field)?;

    let exponent = velocity.geometry().velocity_exponent();
    tracing::info!(
        "Integrating velocity grid {:?} with {} squaring steps ({})",
        velocity.lattice(),
        exponent,
        if options.approx { "approximate" } else { "exact" }
    );

    let scaled = scaled_velocity(velocity, exponent)?;
    if options.approx {
        square_grid(&scaled, field, exponent, options)?;
    } else {
        evaluate_deformation_field(
            &scaled,
            field,
            None,
            false,
            &options.evaluation(BasisFamily::CubicBSpline),
        )?;
        if let Some(steps) = intermediates.as_deref_mut() {
            steps.clear();
        }
        for step in 0..exponent {
            if let Some(steps) = intermediates.as_deref_mut() {
                steps.push(field.clone());
            }
            let previous = field.clone();
            compose_fields_with(&previous, field, None, options.execution)?;
            tracing::trace!("Squaring step {}/{} done", step + 1, exponent);
        }
    }

    let geometry = field.geometry_mut();
    geometry.set_transform_kind(Some(TransformKind::DeformationField));
    geometry.set_velocity_exponent(0);
    Ok(())
}

/// Integrate the negated velocity, giving the inverse deformation of
/// [`integrate_velocity_grid`].
pub fn invert_velocity_grid(
    velocity: &VolumetricImage,
    field: &mut VolumetricImage,
    intermediates: Option<&mut Vec<VolumetricImage>>,
    options: &VelocityIntegration,
) -> Result<()> {
    if options.approx && intermediates.is_some() {
        return Err(FfdError::invalid_combination(
            "intermediate fields are not available with approximate integration",
        ));
    }
    let mut reversed = velocity.clone();
    displacement_from_deformation(&mut reversed)?;
    scale_displacement(&mut reversed, -1.0)?;
    deformation_from_displacement(&mut reversed)?;
    tracing::debug!("Inverting velocity grid {:?}", velocity.lattice());
    integrate_velocity_grid(&reversed, field, intermediates, options)
}

/// Copy of `velocity` whose displacement is divided by `2^exponent`.
fn scaled_velocity(velocity: &VolumetricImage, exponent: u32) -> Result<VolumetricImage> {
    let mut scaled = velocity.clone();
    if exponent > 0 {
        let factor = 0.5f64.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        displacement_from_deformation(&mut scaled)?;
        scale_displacement(&mut scaled, factor)?;
        deformation_from_displacement(&mut scaled)?;
    }
    Ok(scaled)
}

/// Square the grid itself `exponent` times, then evaluate it densely.
///
/// The scaled spline is first sampled at its own nodes, after which the
/// grid holds interpolated values and is composed and evaluated with the
/// interpolating basis.
fn square_grid(
    scaled: &VolumetricImage,
    field: &mut VolumetricImage,
    exponent: u32,
    options: &VelocityIntegration,
) -> Result<()> {
    let mut nodes = scaled.clone();
    fill_with_affine(&mut nodes, &AffineMatrix::identity())?;
    compose_grids_with(scaled, &mut nodes, BasisFamily::CubicBSpline, options.execution)?;

    for step in 0..exponent {
        let mut squared = nodes.clone();
        compose_grids_with(&nodes, &mut squared, BasisFamily::CatmullRom, options.execution)?;
        nodes = squared;
        tracing::trace!("Grid squaring step {}/{} done", step + 1, exponent);
    }

    evaluate_deformation_field(
        &nodes,
        field,
        None,
        false,
        &options.evaluation(BasisFamily::CatmullRom),
    )
}
