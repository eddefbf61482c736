//! Free-form deformation engine.
//!
//! Dense deformation fields are evaluated from sparse cubic B-spline
//! control-point grids, composed, integrated from stationary velocity
//! grids and inverted; grids are refined between pyramid levels.

pub mod basis;
mod checks;
pub mod compose;
pub mod convert;
pub mod evaluate;
pub mod field;
pub mod grid;
pub mod halve;
pub mod neighborhood;
pub mod options;
mod parallel;
pub mod reduction;
pub mod refine;
pub mod resample;
pub mod velocity;

pub use basis::BasisFamily;
pub use compose::{compose_fields, compose_fields_with, compose_grids, compose_grids_with};
pub use convert::{deformation_from_displacement, displacement_from_deformation, scale_displacement};
pub use evaluate::evaluate_deformation_field;
pub use field::{create_deformation_field, deformation_field_from_affine, identity_deformation_field};
pub use grid::{
    control_point_geometry, create_control_point_grid, create_velocity_grid,
    initialise_grid_with_affine, GRID_PADDING,
};
pub use halve::halve_transform;
pub use options::{EvaluationOptions, Execution, VelocityIntegration};
pub use refine::{refine_control_point_grid, refine_control_point_grid_with};
pub use resample::{voxel_centric_to_node_centric, voxel_centric_to_node_centric_with, NodeUpdate};
pub use velocity::{integrate_velocity_grid, invert_velocity_grid};

pub use ffdreg_core;
