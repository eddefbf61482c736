//! Control-point grid refinement.
//!
//! Halving the spacing of a cubic B-spline grid is exact. Along one axis,
//! a new node that coincides with old node `x` takes `(1, 6, 1) / 8` of
//! old nodes `x - 1, x, x + 1`, and a new node halfway between old nodes
//! `x` and `x + 1` takes `(1, 1) / 2` of them. The planar and volumetric
//! stencils are tensor products of these two rules, so the refinement is
//! applied separably. Old nodes outside the grid read as zero.
//!
//! The refined grid keeps its own form codes: its qform and sform are
//! rebuilt from the reference, but an sform is only written when the grid
//! had one before refinement.

use ffdreg_core::{DataType, FfdError, ImageGeometry, Real, Result, VolumetricImage};

use crate::checks;
use crate::grid::control_point_geometry;
use crate::options::Execution;
use crate::parallel::{for_each_slab, slab_len};

const COINCIDENT: [(isize, f64); 3] = [(-1, 0.125), (0, 0.75), (1, 0.125)];
const MIDPOINT: [(isize, f64); 2] = [(0, 0.5), (1, 0.5)];

/// Replace `grid` by a grid with half its spacing over `reference`.
///
/// The new lattice has `floor(n · d / (s / 2)) + 5` nodes per axis (z stays
/// 1 for planar grids) and its qform/sform are rebuilt from the reference
/// as in [`create_control_point_grid`](crate::grid::create_control_point_grid).
/// The transform kind, velocity exponent and form codes are carried over.
/// The spline the grid defines is unchanged.
pub fn refine_control_point_grid(
    reference: &VolumetricImage,
    grid: &mut VolumetricImage,
) -> Result<()> {
    refine_control_point_grid_with(reference, grid, Execution::default())
}

/// [`refine_control_point_grid`] with explicit scheduling.
pub fn refine_control_point_grid_with(
    reference: &VolumetricImage,
    grid: &mut VolumetricImage,
    execution: Execution,
) -> Result<()> {
    let datatype = checks::require_float(grid)?;
    checks::require_vector(grid)?;
    let planar = grid.geometry().is_2d();
    if reference.geometry().is_2d() != planar {
        return Err(FfdError::invalid_geometry(format!(
            "grid is {}D but the reference image is {}D",
            if planar { 2 } else { 3 },
            if planar { 3 } else { 2 }
        )));
    }

    let old = grid.geometry().spatial_spacing();
    let spacing = [
        old[0] / 2.0,
        old[1] / 2.0,
        if planar { 1.0 } else { old[2] / 2.0 },
    ];
    let mut geometry = control_point_geometry(reference.geometry(), spacing)?;
    keep_form_codes(grid.geometry(), &mut geometry)?;
    geometry.set_transform_kind(grid.geometry().transform_kind());
    geometry.set_velocity_exponent(grid.geometry().velocity_exponent());

    let mut refined = VolumetricImage::zeros(geometry, datatype);
    match datatype {
        DataType::Float32 => refine_typed::<f32>(grid, &mut refined, execution)?,
        DataType::Float64 => refine_typed::<f64>(grid, &mut refined, execution)?,
        other => return Err(FfdError::UnsupportedDataType(other)),
    }

    tracing::info!(
        "Refined control point grid {:?} -> {:?}, spacing {:?} -> {:?}",
        grid.lattice(),
        refined.lattice(),
        old,
        refined.geometry().spatial_spacing()
    );
    *grid = refined;
    Ok(())
}

/// Give `refined` the qform code of `old` (at least 1) and an sform only
/// when `old` has one. Without a reference sform the rebuilt qform matrix
/// serves as the sform.
fn keep_form_codes(old: &ImageGeometry, refined: &mut ImageGeometry) -> Result<()> {
    let quaternion = *refined.quaternion();
    refined.set_qform(old.qform_code().max(1), quaternion)?;

    let sform = if refined.sform_code() > 0 {
        *refined.sto_xyz()
    } else {
        *refined.qto_xyz()
    };
    if old.sform_code() > 0 {
        refined.set_sform(old.sform_code(), sform)?;
    } else if refined.sform_code() > 0 {
        refined.set_sform(0, sform)?;
    }
    Ok(())
}

/// For every new node along one axis, the old nodes it reads and their
/// weights.
fn axis_taps<T: Real>(new_len: usize, old_len: usize) -> Vec<Vec<(usize, T)>> {
    if new_len == 1 && old_len == 1 {
        return vec![vec![(0, T::one())]];
    }
    (0..new_len)
        .map(|node| {
            let (anchor, stencil): (usize, &[(isize, f64)]) = if node % 2 == 1 {
                ((node + 1) / 2, &COINCIDENT)
            } else {
                (node / 2, &MIDPOINT)
            };
            if anchor >= old_len {
                return Vec::new();
            }
            stencil
                .iter()
                .filter_map(|&(offset, weight)| {
                    let old = anchor as isize + offset;
                    (old >= 0 && (old as usize) < old_len).then(|| (old as usize, T::cast(weight)))
                })
                .collect()
        })
        .collect()
}

fn refine_typed<T: Real>(
    grid: &VolumetricImage,
    refined: &mut VolumetricImage,
    execution: Execution,
) -> Result<()> {
    let source = grid.vector_field::<T>()?;
    let old = source.lattice();
    let lattice = refined.lattice();
    let tx = axis_taps::<T>(lattice.nx, old.nx);
    let ty = axis_taps::<T>(lattice.ny, old.ny);
    let tz = axis_taps::<T>(lattice.nz, old.nz);

    let slab = slab_len(lattice);
    let target = refined.vector_field_mut::<T>()?;
    for_each_slab(target, slab, execution, |s, parts| {
        for i in 0..slab {
            let (x, y, z) = lattice.coordinates(s * slab + i);
            for (c, part) in parts.iter_mut().enumerate() {
                let mut sum = T::zero();
                for &(k, wz) in &tz[z] {
                    for &(j, wy) in &ty[y] {
                        let wyz = wy * wz;
                        for &(h, wx) in &tx[x] {
                            sum = sum + wx * wyz * source.get(c, old.index(h, j, k));
                        }
                    }
                }
                part[i] = sum;
            }
        }
    });
    Ok(())
}
