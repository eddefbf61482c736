//! Dense deformation field evaluation from a control-point grid.
//!
//! Two modes share the same spline machinery:
//!
//! * **fresh**: each target voxel is mapped to grid coordinates through the
//!   grid/field spacing ratio. The grid carries border control points, so
//!   the neighborhood starts at the truncated coordinate itself and
//!   out-of-grid taps are zero.
//! * **composition**: each active voxel's current value is read as a world
//!   position, mapped into the grid with its world-to-voxel affine, and
//!   replaced by the spline value there. Out-of-grid taps extend the grid's
//!   affine.
//!
//! A voxel whose grid coordinate is NaN, infinite, or too far from the grid
//! to index receives NaN in every component.

use ffdreg_core::{DataType, FfdError, Mask, Result, VolumetricImage};

use crate::basis::{split_coordinate, tensor_2d, tensor_3d, BasisFamily};
use crate::checks;
use crate::neighborhood::{Boundary, ControlPoints, Cursor2d, Cursor3d};
use crate::options::EvaluationOptions;
use crate::parallel::{for_each_slab, slab_len};
use crate::reduction::Reduce4;

/// Fill `field` from the spline defined by `grid`.
///
/// With `compose == false` every voxel is overwritten; voxels masked out
/// are set to zero. With `compose == true` active voxels are replaced by
/// `grid(field(voxel))` and masked-out voxels keep their value.
///
/// # Errors
/// * [`FfdError::UnsupportedDataType`] if the grid is not `f32`/`f64`.
/// * [`FfdError::TypeMismatch`] if grid and field element types differ.
/// * [`FfdError::UnsupportedDimensionality`] / [`FfdError::ShapeMismatch`]
///   if the grid or field is not a 2-component planar or 3-component
///   volumetric vector image, or their dimensionalities differ.
/// * [`FfdError::ShapeMismatch`] if the mask does not cover the field.
pub fn evaluate_deformation_field(
    grid: &VolumetricImage,
    field: &mut VolumetricImage,
    mask: Option<&Mask>,
    compose: bool,
    options: &EvaluationOptions,
) -> Result<()> {
    let datatype = checks::require_same_float(grid, field)?;
    let nu = checks::require_matching_vectors(grid, field)?;
    checks::check_mask(mask, field.geometry().voxels_per_volume())?;

    tracing::debug!(
        "Evaluating {}D field ({}) from grid {:?} into {:?} with {:?}",
        nu,
        if compose { "composition" } else { "fresh" },
        grid.lattice(),
        field.lattice(),
        options.basis
    );

    match datatype {
        DataType::Float32 => evaluate_typed::<f32>(grid, field, mask, compose, options),
        DataType::Float64 => evaluate_typed::<f64>(grid, field, mask, compose, options),
        other => Err(FfdError::UnsupportedDataType(other)),
    }
}

fn evaluate_typed<T: Reduce4>(
    grid: &VolumetricImage,
    field: &mut VolumetricImage,
    mask: Option<&Mask>,
    compose: bool,
    options: &EvaluationOptions,
) -> Result<()> {
    let points = ControlPoints::<T>::new(grid)?;
    let planar = grid.geometry().is_2d();
    match (planar, compose) {
        (true, false) => fresh_2d(&points, grid, field, mask, options),
        (false, false) => fresh_3d(&points, grid, field, mask, options),
        (true, true) => compose_2d(&points, grid, field, mask, options),
        (false, true) => compose_3d(&points, grid, field, mask, options),
    }
}

/// Grid spacing over field spacing, per axis.
fn grid_voxel_ratio<T: Reduce4>(grid: &VolumetricImage, field: &VolumetricImage) -> [T; 3] {
    let g = grid.geometry().spatial_spacing();
    let f = field.geometry().spatial_spacing();
    [
        T::cast(g[0] / f[0]),
        T::cast(g[1] / f[1]),
        T::cast(g[2] / f[2]),
    ]
}

/// Cell origin and weights along one axis for a fresh evaluation.
#[inline(always)]
fn fresh_axis<T: Reduce4>(index: usize, ratio: T, basis: BasisFamily) -> Option<(isize, [T; 4])> {
    let (cell, t) = split_coordinate(T::cast(index as f64) / ratio)?;
    Some((cell, basis.values(t)))
}

/// Start cell of the 4-wide support of a composed position along one axis.
#[inline(always)]
fn support_axis<T: Reduce4>(position: T, basis: BasisFamily) -> Option<(isize, [T; 4])> {
    let (cell, t) = split_coordinate(position)?;
    Some((cell.checked_sub(1)?, basis.values(t)))
}

#[inline(always)]
fn write_nan<T: Reduce4>(parts: &mut [&mut [T]], i: usize) {
    for part in parts.iter_mut() {
        part[i] = T::nan();
    }
}

fn fresh_2d<T: Reduce4>(
    points: &ControlPoints<'_, T>,
    grid: &VolumetricImage,
    field: &mut VolumetricImage,
    mask: Option<&Mask>,
    options: &EvaluationOptions,
) -> Result<()> {
    let ratio = grid_voxel_ratio::<T>(grid, field);
    let lattice = field.lattice();
    let basis = options.basis;
    let row = slab_len(lattice);
    let target = field.vector_field_mut::<T>()?;

    for_each_slab(target, row, options.execution, |y, parts| {
        let mut cursor = Cursor2d::<T>::new();
        let mut weights = [T::zero(); 16];
        let y_axis = fresh_axis(y, ratio[1], basis);
        for x in 0..lattice.nx {
            if !checks::is_active(mask, y * row + x) {
                parts[0][x] = T::zero();
                parts[1][x] = T::zero();
                continue;
            }
            let (Some((x_cell, wx)), Some((y_cell, wy))) = (fresh_axis(x, ratio[0], basis), y_axis)
            else {
                write_nan(parts, x);
                continue;
            };
            tensor_2d(&wx, &wy, &mut weights);
            let taps = cursor.fetch(points, [x_cell, y_cell], Boundary::Zero);
            parts[0][x] = T::weighted_sum(&taps[0], &weights);
            parts[1][x] = T::weighted_sum(&taps[1], &weights);
        }
    });
    Ok(())
}

fn fresh_3d<T: Reduce4>(
    points: &ControlPoints<'_, T>,
    grid: &VolumetricImage,
    field: &mut VolumetricImage,
    mask: Option<&Mask>,
    options: &EvaluationOptions,
) -> Result<()> {
    let ratio = grid_voxel_ratio::<T>(grid, field);
    let lattice = field.lattice();
    let basis = options.basis;
    let slice = slab_len(lattice);
    let target = field.vector_field_mut::<T>()?;

    for_each_slab(target, slice, options.execution, |z, parts| {
        let mut cursor = Cursor3d::<T>::new();
        let mut weights = [T::zero(); 64];
        let z_axis = fresh_axis(z, ratio[2], basis);
        let mut i = 0;
        for y in 0..lattice.ny {
            let y_axis = fresh_axis(y, ratio[1], basis);
            for x in 0..lattice.nx {
                if checks::is_active(mask, z * slice + i) {
                    match (fresh_axis(x, ratio[0], basis), y_axis, z_axis) {
                        (Some((x_cell, wx)), Some((y_cell, wy)), Some((z_cell, wz))) => {
                            tensor_3d(&wx, &wy, &wz, &mut weights);
                            let taps =
                                cursor.fetch(points, [x_cell, y_cell, z_cell], Boundary::Zero);
                            for (c, part) in parts.iter_mut().enumerate() {
                                part[i] = T::weighted_sum(&taps[c], &weights);
                            }
                        }
                        _ => write_nan(parts, i),
                    }
                } else {
                    for part in parts.iter_mut() {
                        part[i] = T::zero();
                    }
                }
                i += 1;
            }
        }
    });
    Ok(())
}

fn compose_2d<T: Reduce4>(
    points: &ControlPoints<'_, T>,
    grid: &VolumetricImage,
    field: &mut VolumetricImage,
    mask: Option<&Mask>,
    options: &EvaluationOptions,
) -> Result<()> {
    let real_to_voxel = grid.geometry().real_to_voxel().rows::<T>();
    let lattice = field.lattice();
    let basis = options.basis;
    let row = slab_len(lattice);
    let target = field.vector_field_mut::<T>()?;

    for_each_slab(target, row, options.execution, |y, parts| {
        let mut cursor = Cursor2d::<T>::new();
        let mut weights = [T::zero(); 16];
        for x in 0..lattice.nx {
            if !checks::is_active(mask, y * row + x) {
                continue;
            }
            let v = real_to_voxel.apply2(parts[0][x], parts[1][x]);
            let (Some((x_start, wx)), Some((y_start, wy))) =
                (support_axis(v[0], basis), support_axis(v[1], basis))
            else {
                write_nan(parts, x);
                continue;
            };
            tensor_2d(&wx, &wy, &mut weights);
            let taps = cursor.fetch(points, [x_start, y_start], Boundary::AffineExtrapolate);
            parts[0][x] = T::weighted_sum(&taps[0], &weights);
            parts[1][x] = T::weighted_sum(&taps[1], &weights);
        }
    });
    Ok(())
}

fn compose_3d<T: Reduce4>(
    points: &ControlPoints<'_, T>,
    grid: &VolumetricImage,
    field: &mut VolumetricImage,
    mask: Option<&Mask>,
    options: &EvaluationOptions,
) -> Result<()> {
    let real_to_voxel = grid.geometry().real_to_voxel().rows::<T>();
    let lattice = field.lattice();
    let basis = options.basis;
    let slice = slab_len(lattice);
    let target = field.vector_field_mut::<T>()?;

    for_each_slab(target, slice, options.execution, |z, parts| {
        let mut cursor = Cursor3d::<T>::new();
        let mut weights = [T::zero(); 64];
        for i in 0..slice {
            if !checks::is_active(mask, z * slice + i) {
                continue;
            }
            let v = real_to_voxel.apply3(parts[0][i], parts[1][i], parts[2][i]);
            let (Some((x_start, wx)), Some((y_start, wy)), Some((z_start, wz))) = (
                support_axis(v[0], basis),
                support_axis(v[1], basis),
                support_axis(v[2], basis),
            ) else {
                write_nan(parts, i);
                continue;
            };
            tensor_3d(&wx, &wy, &wz, &mut weights);
            let taps = cursor.fetch(
                points,
                [x_start, y_start, z_start],
                Boundary::AffineExtrapolate,
            );
            for (c, part) in parts.iter_mut().enumerate() {
                part[i] = T::weighted_sum(&taps[c], &weights);
            }
        }
    });
    Ok(())
}
