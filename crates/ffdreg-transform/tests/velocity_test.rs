use anyhow::Result;
use tracing_subscriber::EnvFilter;

use ffdreg_transform::ffdreg_core::{DataType, FfdError, ImageGeometry, VolumetricImage};
use ffdreg_transform::{
    compose_fields, create_deformation_field, create_velocity_grid, evaluate_deformation_field,
    halve_transform, identity_deformation_field, integrate_velocity_grid, invert_velocity_grid,
    EvaluationOptions, VelocityIntegration,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn reference(planar: bool) -> Result<VolumetricImage> {
    let geometry = if planar {
        ImageGeometry::planar([20, 20], [1.0; 2])?
    } else {
        ImageGeometry::volume([16, 16, 16], [1.0; 3])?
    };
    Ok(VolumetricImage::zeros(geometry, DataType::Float32))
}

/// Identity velocity grid plus a smooth displacement below half a voxel.
fn small_velocity(reference: &VolumetricImage, exponent: u32) -> Result<VolumetricImage> {
    let mut grid = create_velocity_grid(reference, [4.0; 3], exponent, DataType::Float64)?;
    let lattice = grid.lattice();
    let mut view = grid.vector_field_mut::<f64>()?;
    for i in 0..lattice.len() {
        let (x, y, z) = lattice.coordinates(i);
        let (x, y, z) = (x as f64, y as f64, z as f64);
        view.set(0, i, view.get(0, i) + 0.4 * (0.6 * y).sin());
        view.set(1, i, view.get(1, i) - 0.3 * (0.5 * x + 0.2 * z).cos());
        if view.components() == 3 {
            view.set(2, i, view.get(2, i) + 0.2 * (0.4 * x).sin());
        }
    }
    Ok(grid)
}

/// Largest deviation from the identity over voxels at least `margin` away
/// from every border.
fn interior_deviation(field: &VolumetricImage, identity: &VolumetricImage, margin: usize) -> Result<f64> {
    let lattice = field.lattice();
    let got = field.vector_field::<f64>()?;
    let want = identity.vector_field::<f64>()?;
    let mut worst = 0.0f64;
    for i in 0..lattice.len() {
        let (x, y, z) = lattice.coordinates(i);
        let inside = |v: usize, n: usize| v >= margin && v + margin < n;
        let z_inside = lattice.is_2d() || inside(z, lattice.nz);
        if !(inside(x, lattice.nx) && inside(y, lattice.ny) && z_inside) {
            continue;
        }
        for c in 0..got.components() {
            worst = worst.max((got.get(c, i) - want.get(c, i)).abs());
        }
    }
    Ok(worst)
}

#[test]
fn test_forward_then_inverse_is_identity() -> Result<()> {
    init_tracing();
    for planar in [false, true] {
        let reference = reference(planar)?;
        let velocity = small_velocity(&reference, 6)?;

        let mut forward = create_deformation_field(&reference, DataType::Float64)?;
        let mut backward = forward.clone();
        integrate_velocity_grid(&velocity, &mut forward, None, &VelocityIntegration::new())?;
        invert_velocity_grid(&velocity, &mut backward, None, &VelocityIntegration::new())?;

        let mut round_trip = backward.clone();
        compose_fields(&forward, &mut round_trip, None)?;

        let identity = identity_deformation_field(&reference, DataType::Float64)?;
        assert!(interior_deviation(&forward, &identity, 3)? > 0.05);
        assert!(interior_deviation(&round_trip, &identity, 3)? < 0.05);
    }
    Ok(())
}

#[test]
fn test_zero_exponent_is_plain_evaluation() -> Result<()> {
    let reference = reference(true)?;
    let velocity = small_velocity(&reference, 0)?;

    let mut integrated = create_deformation_field(&reference, DataType::Float64)?;
    let mut steps = Vec::new();
    integrate_velocity_grid(&velocity, &mut integrated, Some(&mut steps), &VelocityIntegration::new())?;
    assert!(steps.is_empty());

    let mut direct = create_deformation_field(&reference, DataType::Float64)?;
    evaluate_deformation_field(&velocity, &mut direct, None, false, &EvaluationOptions::new())?;
    assert_eq!(integrated.samples::<f64>()?, direct.samples::<f64>()?);
    Ok(())
}

#[test]
fn test_last_intermediate_squares_to_result() -> Result<()> {
    let reference = reference(false)?;
    let velocity = small_velocity(&reference, 4)?;

    let mut field = create_deformation_field(&reference, DataType::Float64)?;
    let mut steps = Vec::new();
    integrate_velocity_grid(
        &velocity,
        &mut field,
        Some(&mut steps),
        &VelocityIntegration::new().sequential(),
    )?;
    assert_eq!(steps.len(), 4);

    let mut squared = steps[3].clone();
    compose_fields(&steps[3], &mut squared, None)?;
    assert_eq!(squared.samples::<f64>()?, field.samples::<f64>()?);
    Ok(())
}

#[test]
fn test_halved_velocity_squares_back() -> Result<()> {
    init_tracing();
    let reference = reference(false)?;
    let velocity = small_velocity(&reference, 5)?;
    let mut half = velocity.clone();
    halve_transform(&mut half)?;
    assert_eq!(half.geometry().velocity_exponent(), 4);

    let mut full = create_deformation_field(&reference, DataType::Float64)?;
    integrate_velocity_grid(&velocity, &mut full, None, &VelocityIntegration::new())?;
    let mut root = create_deformation_field(&reference, DataType::Float64)?;
    integrate_velocity_grid(&half, &mut root, None, &VelocityIntegration::new())?;

    let mut squared = root.clone();
    compose_fields(&root, &mut squared, None)?;
    assert!(interior_deviation(&squared, &full, 3)? < 1e-9);
    Ok(())
}

#[test]
fn test_approximate_integration_rejects_intermediates() -> Result<()> {
    let reference = reference(false)?;
    let velocity = small_velocity(&reference, 3)?;
    let mut field = create_deformation_field(&reference, DataType::Float64)?;
    let untouched = field.clone();
    let mut steps = Vec::new();

    let err = integrate_velocity_grid(
        &velocity,
        &mut field,
        Some(&mut steps),
        &VelocityIntegration::approximate(),
    )
    .unwrap_err();
    assert!(matches!(err, FfdError::InvalidCombination(_)));
    assert_eq!(field, untouched);

    integrate_velocity_grid(&velocity, &mut field, None, &VelocityIntegration::approximate())?;
    assert_ne!(field, untouched);
    Ok(())
}
