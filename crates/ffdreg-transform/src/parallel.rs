//! Slab partitioning of component-block buffers.
//!
//! A vector image is split into slabs (a z slice for volumes, a row for
//! planar images). Each slab receives one disjoint mutable slice per
//! component, so workers never share output samples.

use rayon::prelude::*;

use ffdreg_core::VectorFieldMut;

use crate::options::Execution;

/// Run `work(slab, parts)` over every slab of `field`.
///
/// `parts[c]` is component `c` restricted to the slab; the slab's first
/// voxel has linear index `slab * slab_len`.
pub(crate) fn for_each_slab<T, F>(
    field: VectorFieldMut<'_, T>,
    slab_len: usize,
    execution: Execution,
    work: F,
) where
    T: Copy + Send,
    F: Fn(usize, &mut [&mut [T]]) + Send + Sync,
{
    let components = field.components();
    let mut slabs: Vec<Vec<&mut [T]>> = Vec::new();
    for part in field.into_parts().into_iter().take(components) {
        for (s, chunk) in part.chunks_mut(slab_len.max(1)).enumerate() {
            if slabs.len() <= s {
                slabs.push(Vec::with_capacity(components));
            }
            slabs[s].push(chunk);
        }
    }

    if execution.is_parallel() {
        slabs
            .into_par_iter()
            .enumerate()
            .for_each(|(s, mut parts)| work(s, &mut parts));
    } else {
        for (s, mut parts) in slabs.into_iter().enumerate() {
            work(s, &mut parts);
        }
    }
}

/// Slab length of a lattice: one z slice, or one row when planar.
#[inline]
pub(crate) fn slab_len(lattice: ffdreg_core::Lattice) -> usize {
    if lattice.is_2d() {
        lattice.nx
    } else {
        lattice.slice_len()
    }
}
