use anyhow::Result;
use approx::assert_relative_eq;
use tracing_subscriber::EnvFilter;

use ffdreg_transform::ffdreg_core::{
    AffineMatrix, DataType, ImageGeometry, Mask, TransformKind, VolumetricImage,
};
use ffdreg_transform::{
    compose_fields, create_control_point_grid, create_deformation_field,
    deformation_field_from_affine, evaluate_deformation_field, identity_deformation_field,
    initialise_grid_with_affine, refine_control_point_grid, EvaluationOptions,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn max_abs_difference(a: &VolumetricImage, b: &VolumetricImage) -> Result<f64> {
    Ok(a.samples::<f64>()?
        .iter()
        .zip(b.samples::<f64>()?)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max))
}

#[test]
fn test_translated_grid_moves_voxels() -> Result<()> {
    init_tracing();

    // 6×6×6 grid of 2 mm, node k at world 2k - 2, shifted by 1 mm along x.
    let sform = AffineMatrix::from_rows([
        [2.0, 0.0, 0.0, -2.0],
        [0.0, 2.0, 0.0, -2.0],
        [0.0, 0.0, 2.0, -2.0],
    ]);
    let geometry = ImageGeometry::volume([6, 6, 6], [2.0; 3])?
        .with_components(3)
        .with_sform(1, sform)?;
    let mut grid = VolumetricImage::zeros(geometry, DataType::Float32);
    initialise_grid_with_affine(&AffineMatrix::translation([1.0, 0.0, 0.0]), &mut grid)?;

    let target = VolumetricImage::zeros(ImageGeometry::volume([32, 32, 32], [1.0; 3])?, DataType::Float32);
    let mut field = create_deformation_field(&target, DataType::Float32)?;
    evaluate_deformation_field(&grid, &mut field, None, false, &EvaluationOptions::new())?;

    let lattice = field.lattice();
    let view = field.vector_field::<f32>()?;
    for z in 0..=5 {
        for y in 0..=5 {
            for x in 0..=5 {
                let index = lattice.index(x, y, z);
                assert_relative_eq!(view.get(0, index), x as f32 + 1.0, epsilon = 1e-4);
                assert_relative_eq!(view.get(1, index), y as f32, epsilon = 1e-4);
                assert_relative_eq!(view.get(2, index), z as f32, epsilon = 1e-4);
            }
        }
    }
    Ok(())
}

#[test]
fn test_constant_displacement_shifts_every_voxel() -> Result<()> {
    init_tracing();
    let target = VolumetricImage::zeros(ImageGeometry::volume([32, 32, 32], [1.0; 3])?, DataType::Float32);
    let mut grid = create_control_point_grid(&target, [2.0; 3], DataType::Float32)?;
    initialise_grid_with_affine(&AffineMatrix::translation([1.0, 0.0, 0.0]), &mut grid)?;

    let mut field = create_deformation_field(&target, DataType::Float32)?;
    evaluate_deformation_field(&grid, &mut field, None, false, &EvaluationOptions::new())?;

    let lattice = field.lattice();
    let view = field.vector_field::<f32>()?;
    for index in 0..lattice.len() {
        let (x, y, z) = lattice.coordinates(index);
        assert_relative_eq!(view.get(0, index), x as f32 + 1.0, epsilon = 1e-4);
        assert_relative_eq!(view.get(1, index), y as f32, epsilon = 1e-4);
        assert_relative_eq!(view.get(2, index), z as f32, epsilon = 1e-4);
    }
    Ok(())
}

#[test]
fn test_planar_constant_displacement_shifts_every_voxel() -> Result<()> {
    let target = VolumetricImage::zeros(ImageGeometry::planar([27, 19], [1.0, 0.5])?, DataType::Float64);
    let mut grid = create_control_point_grid(&target, [3.0; 3], DataType::Float64)?;
    initialise_grid_with_affine(&AffineMatrix::translation([-0.5, 2.0, 0.0]), &mut grid)?;

    let mut field = create_deformation_field(&target, DataType::Float64)?;
    evaluate_deformation_field(&grid, &mut field, None, false, &EvaluationOptions::new())?;

    let lattice = field.lattice();
    let view = field.vector_field::<f64>()?;
    for index in 0..lattice.len() {
        let (x, y, _) = lattice.coordinates(index);
        assert_relative_eq!(view.get(0, index), x as f64 - 0.5, epsilon = 1e-9);
        assert_relative_eq!(view.get(1, index), 0.5 * y as f64 + 2.0, epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn test_identity_round_trip_volume_and_planar() -> Result<()> {
    init_tracing();
    let references = [
        VolumetricImage::zeros(
            ImageGeometry::volume([17, 13, 9], [1.2, 0.8, 2.0])?
                .with_sform(1, AffineMatrix::translation([-10.0, 4.0, 2.5]))?,
            DataType::Int16,
        ),
        VolumetricImage::zeros(ImageGeometry::planar([23, 11], [0.5, 1.5])?, DataType::UInt8),
    ];

    for reference in &references {
        let grid = create_control_point_grid(reference, [3.0; 3], DataType::Float64)?;
        let mut field = create_deformation_field(reference, DataType::Float64)?;
        evaluate_deformation_field(&grid, &mut field, None, false, &EvaluationOptions::new())?;

        let identity = identity_deformation_field(reference, DataType::Float64)?;
        assert!(max_abs_difference(&field, &identity)? < 1e-9);
    }
    Ok(())
}

#[test]
fn test_composition_with_identity_grid_is_noop() -> Result<()> {
    init_tracing();
    let reference = VolumetricImage::zeros(ImageGeometry::volume([12, 12, 12], [1.0; 3])?, DataType::Float32);
    let grid = create_control_point_grid(&reference, [4.0; 3], DataType::Float64)?;

    let affine = AffineMatrix::from_rows([
        [0.98, 0.02, 0.0, 0.4],
        [-0.02, 1.01, 0.0, -0.2],
        [0.0, 0.0, 1.0, 0.3],
    ]);
    let mut field = deformation_field_from_affine(&reference, &affine, DataType::Float64)?;
    let before = field.clone();
    evaluate_deformation_field(&grid, &mut field, None, true, &EvaluationOptions::new())?;
    assert!(max_abs_difference(&field, &before)? < 1e-9);

    let identity = identity_deformation_field(&reference, DataType::Float64)?;
    let mut composed = before.clone();
    compose_fields(&identity, &mut composed, None)?;
    assert!(max_abs_difference(&composed, &before)? < 1e-9);
    Ok(())
}

#[test]
fn test_planar_composition_with_identity_grid_is_noop() -> Result<()> {
    let reference = VolumetricImage::zeros(ImageGeometry::planar([14, 11], [1.0, 1.5])?, DataType::Float32);
    let grid = create_control_point_grid(&reference, [4.0; 3], DataType::Float64)?;

    let affine = AffineMatrix::from_rows([
        [0.97, 0.04, 0.0, 0.6],
        [-0.03, 1.02, 0.0, -0.4],
        [0.0, 0.0, 1.0, 0.0],
    ]);
    let mut field = deformation_field_from_affine(&reference, &affine, DataType::Float64)?;
    let before = field.clone();
    evaluate_deformation_field(&grid, &mut field, None, true, &EvaluationOptions::new())?;
    assert!(max_abs_difference(&field, &before)? < 1e-9);

    let identity = identity_deformation_field(&reference, DataType::Float64)?;
    let mut composed = before.clone();
    compose_fields(&identity, &mut composed, None)?;
    assert!(max_abs_difference(&composed, &before)? < 1e-9);
    Ok(())
}

#[test]
fn test_planar_masked_composition_keeps_inactive_voxels() -> Result<()> {
    let reference = VolumetricImage::zeros(ImageGeometry::planar([12, 12], [1.0; 2])?, DataType::Float32);
    let mut grid = create_control_point_grid(&reference, [3.0; 3], DataType::Float32)?;
    initialise_grid_with_affine(&AffineMatrix::translation([1.0, -0.5, 0.0]), &mut grid)?;

    let mask = Mask::from_fn(144, |i| i % 3 != 0);
    let mut field = identity_deformation_field(&reference, DataType::Float32)?;
    let before = field.clone();
    evaluate_deformation_field(&grid, &mut field, Some(&mask), true, &EvaluationOptions::new())?;

    let lattice = field.lattice();
    let got = field.vector_field::<f32>()?;
    let old = before.vector_field::<f32>()?;
    for index in 0..lattice.len() {
        let (x, y, _) = lattice.coordinates(index);
        if index % 3 == 0 {
            assert_eq!(got.get(0, index), old.get(0, index));
            assert_eq!(got.get(1, index), old.get(1, index));
        } else {
            // Border voxels read extrapolated taps; the shift is exact everywhere.
            assert_relative_eq!(got.get(0, index), x as f32 + 1.0, epsilon = 1e-4);
            assert_relative_eq!(got.get(1, index), y as f32 - 0.5, epsilon = 1e-4);
        }
    }
    Ok(())
}

#[test]
fn test_masked_voxels_are_zero_after_fresh_evaluation() -> Result<()> {
    let reference = VolumetricImage::zeros(ImageGeometry::planar([10, 10], [1.0; 2])?, DataType::Float32);
    let grid = create_control_point_grid(&reference, [2.0; 3], DataType::Float32)?;
    let mask = Mask::from_fn(100, |i| i >= 50);
    let mut field = identity_deformation_field(&reference, DataType::Float32)?;
    evaluate_deformation_field(&grid, &mut field, Some(&mask), false, &EvaluationOptions::new())?;

    let view = field.vector_field::<f32>()?;
    assert_eq!(view.get(0, 49), 0.0);
    assert_eq!(view.get(1, 49), 0.0);
    assert_relative_eq!(view.get(0, 57), 7.0, epsilon = 1e-4);
    assert_relative_eq!(view.get(1, 57), 5.0, epsilon = 1e-4);
    Ok(())
}

#[test]
fn test_refinement_preserves_affine_field() -> Result<()> {
    init_tracing();
    let reference = VolumetricImage::zeros(
        ImageGeometry::volume([24, 20, 16], [1.0, 1.25, 1.5])?,
        DataType::Float32,
    );
    let mut grid = create_control_point_grid(&reference, [5.0; 3], DataType::Float64)?;
    let affine = AffineMatrix::from_rows([
        [1.05, 0.03, 0.0, 1.5],
        [0.0, 0.97, -0.04, -0.5],
        [0.02, 0.0, 1.0, 0.25],
    ]);
    initialise_grid_with_affine(&affine, &mut grid)?;

    let mut coarse = create_deformation_field(&reference, DataType::Float64)?;
    evaluate_deformation_field(&grid, &mut coarse, None, false, &EvaluationOptions::new())?;

    let (nx, ny, nz) = (grid.geometry().nx(), grid.geometry().ny(), grid.geometry().nz());
    refine_control_point_grid(&reference, &mut grid)?;
    assert_eq!(grid.geometry().spatial_spacing(), [2.5; 3]);
    assert!(grid.geometry().nx() >= 2 * nx - 5);
    assert!(grid.geometry().ny() >= 2 * ny - 5);
    assert!(grid.geometry().nz() >= 2 * nz - 5);
    assert_eq!(grid.geometry().transform_kind(), Some(TransformKind::SplineGrid));

    let mut fine = create_deformation_field(&reference, DataType::Float64)?;
    evaluate_deformation_field(&grid, &mut fine, None, false, &EvaluationOptions::new())?;
    assert!(max_abs_difference(&coarse, &fine)? < 0.01);
    Ok(())
}

#[test]
fn test_refined_grid_tracks_reference_orientation() -> Result<()> {
    let reference = VolumetricImage::zeros(
        ImageGeometry::volume([16, 16, 16], [1.0; 3])?
            .with_sform(2, AffineMatrix::translation([3.0, -7.0, 11.0]))?,
        DataType::Float32,
    );
    let mut grid = create_control_point_grid(&reference, [4.0; 3], DataType::Float32)?;
    refine_control_point_grid(&reference, &mut grid)?;

    let origin = grid.geometry().voxel_to_real().transform_point([1.0, 1.0, 1.0]);
    assert_relative_eq!(origin[0], 3.0, epsilon = 1e-9);
    assert_relative_eq!(origin[1], -7.0, epsilon = 1e-9);
    assert_relative_eq!(origin[2], 11.0, epsilon = 1e-9);
    assert_eq!(grid.geometry().sform_code(), 2);
    Ok(())
}
