//! Composition of dense fields and of control-point grids.

use ffdreg_core::{AffineRows, DataType, FfdError, Mask, Real, Result, VectorField, VolumetricImage};

use crate::basis::{split_coordinate, BasisFamily};
use crate::checks;
use crate::evaluate::evaluate_deformation_field;
use crate::options::{EvaluationOptions, Execution};
use crate::parallel::{for_each_slab, slab_len};

/// `field_to_update ← field_a ∘ field_to_update`.
///
/// Every active voxel's current value is treated as a world position and
/// replaced by `field_a` linearly interpolated there. Corners of the
/// interpolation cell that fall outside `field_a` use `field_a`'s own
/// voxel-to-world affine at that corner index. Masked-out voxels keep their
/// value. A voxel whose value cannot be placed in `field_a` (NaN, infinite,
/// or too far away to index) becomes NaN.
pub fn compose_fields(
    field_a: &VolumetricImage,
    field_to_update: &mut VolumetricImage,
    mask: Option<&Mask>,
) -> Result<()> {
    compose_fields_with(field_a, field_to_update, mask, Execution::default())
}

/// [`compose_fields`] with explicit scheduling.
pub fn compose_fields_with(
    field_a: &VolumetricImage,
    field_to_update: &mut VolumetricImage,
    mask: Option<&Mask>,
    execution: Execution,
) -> Result<()> {
    let datatype = checks::require_same_float(field_a, field_to_update)?;
    checks::require_matching_vectors(field_a, field_to_update)?;
    checks::check_mask(mask, field_to_update.geometry().voxels_per_volume())?;

    match datatype {
        DataType::Float32 => compose_typed::<f32>(field_a, field_to_update, mask, execution),
        DataType::Float64 => compose_typed::<f64>(field_a, field_to_update, mask, execution),
        other => Err(FfdError::UnsupportedDataType(other)),
    }
}

/// `grid2 ← grid1 ∘ grid2`: every control point of `grid2` is replaced by
/// the spline of `grid1` evaluated at that control point's position.
///
/// `grid1`'s out-of-range control points are affine-extrapolated. Pass
/// [`BasisFamily::CubicBSpline`] when `grid1` holds spline coefficients and
/// [`BasisFamily::CatmullRom`] when it already holds interpolated values.
pub fn compose_grids(
    grid1: &VolumetricImage,
    grid2: &mut VolumetricImage,
    basis: BasisFamily,
) -> Result<()> {
    compose_grids_with(grid1, grid2, basis, Execution::default())
}

/// [`compose_grids`] with explicit scheduling.
///
/// This is composition-mode evaluation of `grid1` into `grid2`, so the
/// element type, vector-shape and dimensionality errors of
/// [`evaluate_deformation_field`] apply, and `grid2` is untouched when
/// they are returned.
pub fn compose_grids_with(
    grid1: &VolumetricImage,
    grid2: &mut VolumetricImage,
    basis: BasisFamily,
    execution: Execution,
) -> Result<()> {
    let options = EvaluationOptions { basis, execution };
    evaluate_deformation_field(grid1, grid2, None, true, &options)
}

fn compose_typed<T: Real>(
    field_a: &VolumetricImage,
    field_to_update: &mut VolumetricImage,
    mask: Option<&Mask>,
    execution: Execution,
) -> Result<()> {
    let source = Resampler {
        field: field_a.vector_field::<T>()?,
        voxel_to_real: field_a.geometry().voxel_to_real().rows::<T>(),
        real_to_voxel: field_a.geometry().real_to_voxel().rows::<T>(),
    };
    let lattice = field_to_update.lattice();
    let slab = slab_len(lattice);
    let planar = lattice.is_2d();
    let target = field_to_update.vector_field_mut::<T>()?;

    for_each_slab(target, slab, execution, |s, parts| {
        for i in 0..slab {
            if !checks::is_active(mask, s * slab + i) {
                continue;
            }
            if planar {
                let value = source.sample_2d([parts[0][i], parts[1][i]]);
                parts[0][i] = value[0];
                parts[1][i] = value[1];
            } else {
                let value = source.sample_3d([parts[0][i], parts[1][i], parts[2][i]]);
                parts[0][i] = value[0];
                parts[1][i] = value[1];
                parts[2][i] = value[2];
            }
        }
    });
    Ok(())
}

/// Linear interpolation of a dense field at world positions.
struct Resampler<'a, T> {
    field: VectorField<'a, T>,
    voxel_to_real: AffineRows<T>,
    real_to_voxel: AffineRows<T>,
}

impl<T: Real> Resampler<'_, T> {
    #[inline]
    fn sample_2d(&self, position: [T; 2]) -> [T; 2] {
        let lattice = self.field.lattice();
        let v = self.real_to_voxel.apply2(position[0], position[1]);
        let (Some((x0, wx)), Some((y0, wy))) = (linear_weights(v[0]), linear_weights(v[1])) else {
            return [T::nan(); 2];
        };

        let mut out = [T::zero(); 2];
        for (b, &weight_y) in wy.iter().enumerate() {
            let y = y0 + b as isize;
            for (a, &weight_x) in wx.iter().enumerate() {
                let x = x0 + a as isize;
                let weight = weight_x * weight_y;
                let corner = match lattice.checked_index(x, y, 0) {
                    Some(index) => [self.field.get(0, index), self.field.get(1, index)],
                    None => self
                        .voxel_to_real
                        .apply2(T::cast(x as f64), T::cast(y as f64)),
                };
                out[0] = out[0] + corner[0] * weight;
                out[1] = out[1] + corner[1] * weight;
            }
        }
        out
    }

    #[inline]
    fn sample_3d(&self, position: [T; 3]) -> [T; 3] {
        let lattice = self.field.lattice();
        let v = self
            .real_to_voxel
            .apply3(position[0], position[1], position[2]);
        let (Some((x0, wx)), Some((y0, wy)), Some((z0, wz))) =
            (linear_weights(v[0]), linear_weights(v[1]), linear_weights(v[2]))
        else {
            return [T::nan(); 3];
        };

        let mut out = [T::zero(); 3];
        for (c, &weight_z) in wz.iter().enumerate() {
            let z = z0 + c as isize;
            for (b, &weight_y) in wy.iter().enumerate() {
                let y = y0 + b as isize;
                for (a, &weight_x) in wx.iter().enumerate() {
                    let x = x0 + a as isize;
                    let weight = weight_x * weight_y * weight_z;
                    let corner = match lattice.checked_index(x, y, z) {
                        Some(index) => [
                            self.field.get(0, index),
                            self.field.get(1, index),
                            self.field.get(2, index),
                        ],
                        None => self.voxel_to_real.apply3(
                            T::cast(x as f64),
                            T::cast(y as f64),
                            T::cast(z as f64),
                        ),
                    };
                    for (o, value) in out.iter_mut().zip(corner) {
                        *o = *o + value * weight;
                    }
                }
            }
        }
        out
    }
}

/// Lower corner and the two linear weights along one axis.
#[inline(always)]
fn linear_weights<T: Real>(position: T) -> Option<(isize, [T; 2])> {
    let (corner, relative) = split_coordinate(position)?;
    Some((corner, [T::one() - relative, relative]))
}
