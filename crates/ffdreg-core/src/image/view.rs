//! Indexed views over component-block buffers.
//!
//! Fields and control-point grids store one contiguous block per vector
//! component (`x` block, then `y`, then `z`), each block in raster order
//! with `x` fastest. These views replace raw offset arithmetic with a
//! lattice that knows its strides and a set of per-component slices.

use crate::error::{FfdError, Result};

/// Spatial lattice shape `(nx, ny, nz)` with raster-order strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lattice {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Lattice {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_2d(&self) -> bool {
        self.nz == 1
    }

    /// Samples in one z slice.
    #[inline]
    pub fn slice_len(&self) -> usize {
        self.nx * self.ny
    }

    #[inline(always)]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.ny + y) * self.nx + x
    }

    #[inline(always)]
    pub fn contains(&self, x: isize, y: isize, z: isize) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.nx
            && (y as usize) < self.ny
            && (z as usize) < self.nz
    }

    /// Linear index of a possibly out-of-range signed position.
    #[inline(always)]
    pub fn checked_index(&self, x: isize, y: isize, z: isize) -> Option<usize> {
        if self.contains(x, y, z) {
            Some(self.index(x as usize, y as usize, z as usize))
        } else {
            None
        }
    }

    /// Inverse of [`Lattice::index`].
    pub fn coordinates(&self, index: usize) -> (usize, usize, usize) {
        let x = index % self.nx;
        let rest = index / self.nx;
        (x, rest % self.ny, rest / self.ny)
    }
}

fn check_components<T>(lattice: Lattice, components: usize, buffer: &[T]) -> Result<()> {
    if components != 2 && components != 3 {
        return Err(FfdError::UnsupportedDimensionality(components));
    }
    let expected = lattice.len() * components;
    if buffer.len() != expected {
        return Err(FfdError::shape_mismatch(vec![expected], vec![buffer.len()]));
    }
    Ok(())
}

/// Read-only view of a 2- or 3-component vector image.
#[derive(Debug, Clone, Copy)]
pub struct VectorField<'a, T> {
    lattice: Lattice,
    components: usize,
    parts: [&'a [T]; 3],
}

impl<'a, T: Copy> VectorField<'a, T> {
    /// Split `buffer` into `components` blocks of `lattice.len()` samples.
    pub fn new(lattice: Lattice, components: usize, buffer: &'a [T]) -> Result<Self> {
        check_components(lattice, components, buffer)?;
        let block = lattice.len();
        let mut parts: [&'a [T]; 3] = [&[], &[], &[]];
        for (c, chunk) in buffer.chunks_exact(block.max(1)).take(components).enumerate() {
            parts[c] = chunk;
        }
        Ok(Self {
            lattice,
            components,
            parts,
        })
    }

    pub fn lattice(&self) -> Lattice {
        self.lattice
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Samples of one component, raster order.
    #[inline]
    pub fn component(&self, c: usize) -> &'a [T] {
        self.parts[c]
    }

    #[inline(always)]
    pub fn get(&self, c: usize, index: usize) -> T {
        self.parts[c][index]
    }
}

/// Mutable view of a 2- or 3-component vector image.
#[derive(Debug)]
pub struct VectorFieldMut<'a, T> {
    lattice: Lattice,
    components: usize,
    parts: [&'a mut [T]; 3],
}

impl<'a, T: Copy> VectorFieldMut<'a, T> {
    pub fn new(lattice: Lattice, components: usize, buffer: &'a mut [T]) -> Result<Self> {
        check_components(lattice, components, buffer)?;
        let block = lattice.len();
        let mut parts: [&'a mut [T]; 3] = [Default::default(), Default::default(), Default::default()];
        for (c, chunk) in buffer
            .chunks_exact_mut(block.max(1))
            .take(components)
            .enumerate()
        {
            parts[c] = chunk;
        }
        Ok(Self {
            lattice,
            components,
            parts,
        })
    }

    pub fn lattice(&self) -> Lattice {
        self.lattice
    }

    pub fn components(&self) -> usize {
        self.components
    }

    #[inline]
    pub fn component(&self, c: usize) -> &[T] {
        &*self.parts[c]
    }

    #[inline]
    pub fn component_mut(&mut self, c: usize) -> &mut [T] {
        &mut *self.parts[c]
    }

    #[inline(always)]
    pub fn get(&self, c: usize, index: usize) -> T {
        self.parts[c][index]
    }

    #[inline(always)]
    pub fn set(&mut self, c: usize, index: usize, value: T) {
        self.parts[c][index] = value;
    }

    /// Reborrow as a read-only view.
    pub fn as_view(&self) -> VectorField<'_, T> {
        VectorField {
            lattice: self.lattice,
            components: self.components,
            parts: [&*self.parts[0], &*self.parts[1], &*self.parts[2]],
        }
    }

    /// Give up the view, keeping the per-component slices. Unused trailing
    /// entries are empty.
    pub fn into_parts(self) -> [&'a mut [T]; 3] {
        self.parts
    }
}
