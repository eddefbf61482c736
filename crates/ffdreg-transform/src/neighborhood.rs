//! Control-point neighborhood gathering.
//!
//! A cubic spline evaluated inside one cell reads a 4×4 (planar) or 4×4×4
//! block of control points per component. [`NeighborhoodCursor`] holds the
//! last block it gathered and only re-reads the grid when the cell origin or
//! boundary policy changes; along the fast x axis many consecutive voxels
//! share a cell. A cursor belongs to a single slab worker.

use ffdreg_core::{AffineRows, Real, VectorField, VolumetricImage, Result};

/// What an out-of-grid neighbor contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// The grid's own voxel-to-world affine evaluated at the out-of-range
    /// index, extending the global affine past the border.
    AffineExtrapolate,
    /// Zero.
    Zero,
}

/// A control-point grid prepared for gathering: its component samples plus
/// the voxel-to-world rows used for extrapolation.
#[derive(Debug, Clone, Copy)]
pub struct ControlPoints<'a, T> {
    pub field: VectorField<'a, T>,
    pub voxel_to_real: AffineRows<T>,
}

impl<'a, T: Real> ControlPoints<'a, T> {
    pub fn new(grid: &'a VolumetricImage) -> Result<Self> {
        Ok(Self {
            field: grid.vector_field::<T>()?,
            voxel_to_real: grid.geometry().voxel_to_real().rows::<T>(),
        })
    }
}

/// Cached `C`-component neighborhood of `N` taps per component.
#[derive(Debug, Clone)]
pub struct NeighborhoodCursor<T, const C: usize, const N: usize> {
    values: [[T; N]; C],
    key: Option<([isize; 3], Boundary)>,
    gathers: usize,
}

/// Planar cursor: two components, 4×4 taps.
pub type Cursor2d<T> = NeighborhoodCursor<T, 2, 16>;

/// Volumetric cursor: three components, 4×4×4 taps.
pub type Cursor3d<T> = NeighborhoodCursor<T, 3, 64>;

impl<T: Real, const C: usize, const N: usize> NeighborhoodCursor<T, C, N> {
    pub fn new() -> Self {
        Self {
            values: [[T::zero(); N]; C],
            key: None,
            gathers: 0,
        }
    }

    /// Number of times the grid was actually read.
    pub fn gathers(&self) -> usize {
        self.gathers
    }

    /// Forget the cached block.
    pub fn invalidate(&mut self) {
        self.key = None;
    }

    #[inline(always)]
    fn is_cached(&self, origin: [isize; 3], boundary: Boundary) -> bool {
        self.key == Some((origin, boundary))
    }
}

impl<T: Real, const C: usize, const N: usize> Default for NeighborhoodCursor<T, C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> Cursor2d<T> {
    /// The 16 taps per component starting at `origin`, x fastest.
    #[inline]
    pub fn fetch(
        &mut self,
        grid: &ControlPoints<'_, T>,
        origin: [isize; 2],
        boundary: Boundary,
    ) -> &[[T; 16]; 2] {
        let key = [origin[0], origin[1], 0];
        if !self.is_cached(key, boundary) {
            gather_2d(grid, origin, boundary, &mut self.values);
            self.key = Some((key, boundary));
            self.gathers += 1;
        }
        &self.values
    }
}

impl<T: Real> Cursor3d<T> {
    /// The 64 taps per component starting at `origin`, x fastest then y.
    #[inline]
    pub fn fetch(
        &mut self,
        grid: &ControlPoints<'_, T>,
        origin: [isize; 3],
        boundary: Boundary,
    ) -> &[[T; 64]; 3] {
        if !self.is_cached(origin, boundary) {
            gather_3d(grid, origin, boundary, &mut self.values);
            self.key = Some((origin, boundary));
            self.gathers += 1;
        }
        &self.values
    }
}

/// Uncached planar gather.
pub fn gather_2d<T: Real>(
    grid: &ControlPoints<'_, T>,
    origin: [isize; 2],
    boundary: Boundary,
    out: &mut [[T; 16]; 2],
) {
    let lattice = grid.field.lattice();
    let mut i = 0;
    for b in 0..4 {
        let y = origin[1] + b;
        for a in 0..4 {
            let x = origin[0] + a;
            match lattice.checked_index(x, y, 0) {
                Some(index) => {
                    out[0][i] = grid.field.get(0, index);
                    out[1][i] = grid.field.get(1, index);
                }
                None => match boundary {
                    Boundary::AffineExtrapolate => {
                        let p = grid
                            .voxel_to_real
                            .apply2(T::cast(x as f64), T::cast(y as f64));
                        out[0][i] = p[0];
                        out[1][i] = p[1];
                    }
                    Boundary::Zero => {
                        out[0][i] = T::zero();
                        out[1][i] = T::zero();
                    }
                },
            }
            i += 1;
        }
    }
}

/// Uncached volumetric gather.
pub fn gather_3d<T: Real>(
    grid: &ControlPoints<'_, T>,
    origin: [isize; 3],
    boundary: Boundary,
    out: &mut [[T; 64]; 3],
) {
    let lattice = grid.field.lattice();
    let mut i = 0;
    for c in 0..4 {
        let z = origin[2] + c;
        for b in 0..4 {
            let y = origin[1] + b;
            for a in 0..4 {
                let x = origin[0] + a;
                match lattice.checked_index(x, y, z) {
                    Some(index) => {
                        for (k, taps) in out.iter_mut().enumerate() {
                            taps[i] = grid.field.get(k, index);
                        }
                    }
                    None => match boundary {
                        Boundary::AffineExtrapolate => {
                            let p = grid.voxel_to_real.apply3(
                                T::cast(x as f64),
                                T::cast(y as f64),
                                T::cast(z as f64),
                            );
                            for (k, taps) in out.iter_mut().enumerate() {
                                taps[i] = p[k];
                            }
                        }
                        Boundary::Zero => {
                            for taps in out.iter_mut() {
                                taps[i] = T::zero();
                            }
                        }
                    },
                }
                i += 1;
            }
        }
    }
}
