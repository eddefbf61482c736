//! Control-point grid construction.
//!
//! A grid covering a reference image with control-point spacing `s` has
//! `floor(n · d / s) + 5` points per axis, and its index 0 sits one spacing
//! before the reference origin (index `(-1, -1, -1)` of the grid lattice,
//! `(-1, -1, 0)` for planar references). The extra points let a cubic
//! spline be evaluated on every reference voxel without leaving the grid.

use ffdreg_core::{
    AffineMatrix, DataType, FfdError, ImageGeometry, QuaternionForm, Result, TransformKind,
    VolumetricImage,
};

use crate::checks;
use crate::field::fill_with_affine;

/// Border control points added to each axis.
pub const GRID_PADDING: usize = 5;

/// Lattice and voxel-to-world geometry of a grid with spacing `spacing`
/// over `reference`.
///
/// The qform reuses the reference rotation with the grid spacing and a
/// one-spacing origin shift; a zero reference qform code becomes 1. The
/// sform is rebuilt the same way when the reference has one.
pub fn control_point_geometry(
    reference: &ImageGeometry,
    spacing: [f64; 3],
) -> Result<ImageGeometry> {
    let planar = reference.is_2d();
    let spacing = if planar {
        [spacing[0], spacing[1], 1.0]
    } else {
        spacing
    };
    if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
        return Err(FfdError::invalid_geometry(format!(
            "control point spacing must be positive, got {:?}",
            spacing
        )));
    }

    let extent = |axis: usize| {
        let size = reference.dims()[axis] as f64 * reference.spacing()[axis] / spacing[axis];
        size.floor() as usize + GRID_PADDING
    };
    let (nx, ny) = (extent(0), extent(1));
    let (nz, nu) = if planar { (1, 2) } else { (extent(2), 3) };
    let origin_index = [-1.0, -1.0, if planar { 0.0 } else { -1.0 }];

    let mut geometry = ImageGeometry::new(&[nx, ny, nz, 1, nu], &spacing)?;

    let (quaternion, _) = QuaternionForm::from_affine(reference.qto_xyz())?;
    let unshifted = quaternion.to_affine(spacing);
    let origin = unshifted.transform_point(origin_index);
    let qform_code = if reference.qform_code() > 0 {
        reference.qform_code()
    } else {
        1
    };
    geometry.set_qform(qform_code, quaternion.with_offset(origin))?;

    if reference.sform_code() > 0 {
        let reference_spacing = reference.spatial_spacing();
        let scaling = AffineMatrix::scaling([
            spacing[0] / reference_spacing[0],
            spacing[1] / reference_spacing[1],
            spacing[2] / reference_spacing[2],
        ]);
        let scaled = reference.sto_xyz().compose(&scaling);
        let origin = scaled.transform_point(origin_index);
        geometry.set_sform(reference.sform_code(), scaled.with_offset(origin))?;
    }
    Ok(geometry)
}

/// Identity-initialised cubic B-spline grid over `reference`.
pub fn create_control_point_grid(
    reference: &VolumetricImage,
    spacing: [f64; 3],
    datatype: DataType,
) -> Result<VolumetricImage> {
    create_grid(reference, spacing, datatype, TransformKind::SplineGrid, 0)
}

/// Identity-initialised stationary velocity grid integrated with
/// `2^exponent` squaring steps.
pub fn create_velocity_grid(
    reference: &VolumetricImage,
    spacing: [f64; 3],
    exponent: u32,
    datatype: DataType,
) -> Result<VolumetricImage> {
    create_grid(
        reference,
        spacing,
        datatype,
        TransformKind::SplineVelocityGrid,
        exponent,
    )
}

fn create_grid(
    reference: &VolumetricImage,
    spacing: [f64; 3],
    datatype: DataType,
    kind: TransformKind,
    exponent: u32,
) -> Result<VolumetricImage> {
    if !datatype.is_floating_point() {
        return Err(FfdError::UnsupportedDataType(datatype));
    }
    let mut geometry = control_point_geometry(reference.geometry(), spacing)?;
    geometry.set_transform_kind(Some(kind));
    geometry.set_velocity_exponent(exponent);

    let mut grid = VolumetricImage::zeros(geometry, datatype);
    fill_with_affine(&mut grid, &AffineMatrix::identity())?;
    tracing::debug!(
        "Created {:?} grid {:?} with spacing {:?}",
        kind,
        grid.lattice(),
        grid.geometry().spatial_spacing()
    );
    Ok(grid)
}

/// Set each control point to `affine · voxel_to_real · index`, so the grid
/// reproduces the global affine.
pub fn initialise_grid_with_affine(affine: &AffineMatrix, grid: &mut VolumetricImage) -> Result<()> {
    checks::require_float(grid)?;
    fill_with_affine(grid, affine)
}
