//! Projection of per-voxel vectors onto control-point nodes.
//!
//! Node `(x, y, z)` reads the voxel nearest to its position, i.e. voxel
//! `round((x - 1) · ratio)` along each axis, where `ratio` is node spacing
//! over voxel spacing and the `- 1` accounts for the grid's border node.

use serde::{Deserialize, Serialize};

use ffdreg_core::{DataType, FfdError, Real, Result, VolumetricImage};

use crate::checks;
use crate::options::Execution;
use crate::parallel::{for_each_slab, slab_len};

/// How a sampled voxel value is written into its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeUpdate {
    /// `node = weight · voxel`; nodes that fall outside the voxel image
    /// are zeroed.
    #[default]
    Overwrite,
    /// `node += weight · voxel`; nodes that fall outside the voxel image
    /// are left untouched.
    Accumulate,
}

/// Sample `voxels` at every node of `nodes`, scaled by `weight`.
///
/// Both images must be vector images of the same element type and
/// dimensionality.
pub fn voxel_centric_to_node_centric(
    nodes: &mut VolumetricImage,
    voxels: &VolumetricImage,
    weight: f64,
    update: NodeUpdate,
) -> Result<()> {
    voxel_centric_to_node_centric_with(nodes, voxels, weight, update, Execution::default())
}

/// [`voxel_centric_to_node_centric`] with explicit scheduling.
pub fn voxel_centric_to_node_centric_with(
    nodes: &mut VolumetricImage,
    voxels: &VolumetricImage,
    weight: f64,
    update: NodeUpdate,
    execution: Execution,
) -> Result<()> {
    let datatype = checks::require_same_float(nodes, voxels)?;
    checks::require_matching_vectors(nodes, voxels)?;
    match datatype {
        DataType::Float32 => resample_typed::<f32>(nodes, voxels, weight, update, execution),
        DataType::Float64 => resample_typed::<f64>(nodes, voxels, weight, update, execution),
        other => Err(FfdError::UnsupportedDataType(other)),
    }
}

/// Voxel index sampled by node `node` along one axis.
#[inline]
fn nearest_voxel(node: usize, ratio: f64) -> isize {
    ((node as f64 - 1.0) * ratio).round() as isize
}

fn resample_typed<T: Real>(
    nodes: &mut VolumetricImage,
    voxels: &VolumetricImage,
    weight: f64,
    update: NodeUpdate,
    execution: Execution,
) -> Result<()> {
    let node_spacing = nodes.geometry().spatial_spacing();
    let voxel_spacing = voxels.geometry().spatial_spacing();
    let ratio = [
        node_spacing[0] / voxel_spacing[0],
        node_spacing[1] / voxel_spacing[1],
        node_spacing[2] / voxel_spacing[2],
    ];

    let source = voxels.vector_field::<T>()?;
    let voxel_lattice = source.lattice();
    let lattice = nodes.lattice();
    let planar = lattice.is_2d();
    let weight = T::cast(weight);
    let slab = slab_len(lattice);
    let target = nodes.vector_field_mut::<T>()?;

    for_each_slab(target, slab, execution, |s, parts| {
        for i in 0..slab {
            let (x, y, z) = lattice.coordinates(s * slab + i);
            let voxel = voxel_lattice.checked_index(
                nearest_voxel(x, ratio[0]),
                nearest_voxel(y, ratio[1]),
                if planar { 0 } else { nearest_voxel(z, ratio[2]) },
            );
            for (c, part) in parts.iter_mut().enumerate() {
                match (voxel, update) {
                    (Some(v), NodeUpdate::Overwrite) => part[i] = source.get(c, v) * weight,
                    (Some(v), NodeUpdate::Accumulate) => {
                        part[i] = part[i] + source.get(c, v) * weight
                    }
                    (None, NodeUpdate::Overwrite) => part[i] = T::zero(),
                    (None, NodeUpdate::Accumulate) => {}
                }
            }
        }
    });
    Ok(())
}
