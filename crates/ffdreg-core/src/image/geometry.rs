//! Lattice shape, spacing and voxel-to-world geometry of an image.

use serde::{Deserialize, Serialize};

use crate::error::{FfdError, Result};
use crate::spatial::{AffineMatrix, QuaternionForm};

/// Number of lattice axes an image header can describe (x, y, z, t, u, v, w).
pub const MAX_AXES: usize = 7;

/// Axis carrying the vector components of fields and grids.
pub const COMPONENT_AXIS: usize = 4;

/// What a vector-valued image represents. Stored in the header's intent slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    /// Dense absolute positions.
    DeformationField,
    /// Dense offsets from the identity.
    DisplacementField,
    /// Cubic B-spline control-point grid.
    SplineGrid,
    /// Dense stationary velocity field stored as positions.
    DeformationVelocityField,
    /// Dense stationary velocity field stored as offsets.
    DisplacementVelocityField,
    /// Control-point grid parameterising a stationary velocity field.
    SplineVelocityGrid,
}

impl TransformKind {
    pub fn code(self) -> i32 {
        match self {
            TransformKind::DeformationField => 1,
            TransformKind::DisplacementField => 2,
            TransformKind::SplineGrid => 3,
            TransformKind::DeformationVelocityField => 4,
            TransformKind::DisplacementVelocityField => 5,
            TransformKind::SplineVelocityGrid => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(TransformKind::DeformationField),
            2 => Some(TransformKind::DisplacementField),
            3 => Some(TransformKind::SplineGrid),
            4 => Some(TransformKind::DeformationVelocityField),
            5 => Some(TransformKind::DisplacementVelocityField),
            6 => Some(TransformKind::SplineVelocityGrid),
            _ => None,
        }
    }

    pub fn is_velocity(self) -> bool {
        matches!(
            self,
            TransformKind::DeformationVelocityField
                | TransformKind::DisplacementVelocityField
                | TransformKind::SplineVelocityGrid
        )
    }
}

/// Which voxel-to-world form to consult when both are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormPreference {
    /// Use the sform when its code is positive, otherwise the qform.
    #[default]
    Sform,
    /// Use the qform when its code is positive, otherwise the sform.
    Qform,
}

/// Shape and physical geometry of a volumetric image.
///
/// The qform matrices are always populated: with a zero qform code they hold
/// the spacing-only mapping `diag(dx, dy, dz)` used when no form is set. The
/// sform matrices are only consulted while the sform code is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    dims: [usize; MAX_AXES],
    spacing: [f64; MAX_AXES],
    qform_code: i32,
    quaternion: QuaternionForm,
    qto_xyz: AffineMatrix,
    qto_ijk: AffineMatrix,
    sform_code: i32,
    sto_xyz: AffineMatrix,
    sto_ijk: AffineMatrix,
    transform_kind: Option<TransformKind>,
    velocity_exponent: u32,
}

impl ImageGeometry {
    /// Create a geometry with no qform or sform.
    ///
    /// Missing trailing axes get size 1 and spacing 1. Every axis must have
    /// size at least 1 and the three spatial spacings must be positive.
    pub fn new(dims: &[usize], spacing: &[f64]) -> Result<Self> {
        if dims.is_empty() || dims.len() > MAX_AXES || spacing.len() > MAX_AXES {
            return Err(FfdError::invalid_geometry(format!(
                "expected between 1 and {} axes, got {} dims and {} spacings",
                MAX_AXES,
                dims.len(),
                spacing.len()
            )));
        }
        let mut full_dims = [1usize; MAX_AXES];
        full_dims[..dims.len()].copy_from_slice(dims);
        if full_dims.iter().any(|&n| n == 0) {
            return Err(FfdError::invalid_geometry(format!(
                "axis sizes must be at least 1, got {:?}",
                dims
            )));
        }
        let mut full_spacing = [1.0f64; MAX_AXES];
        full_spacing[..spacing.len()].copy_from_slice(spacing);
        if full_spacing[..3].iter().any(|&d| !(d.is_finite() && d > 0.0)) {
            return Err(FfdError::invalid_geometry(format!(
                "spatial spacing must be positive, got {:?}",
                &full_spacing[..3]
            )));
        }

        let base = AffineMatrix::scaling([full_spacing[0], full_spacing[1], full_spacing[2]]);
        let base_inverse = AffineMatrix::scaling([
            1.0 / full_spacing[0],
            1.0 / full_spacing[1],
            1.0 / full_spacing[2],
        ]);
        Ok(Self {
            dims: full_dims,
            spacing: full_spacing,
            qform_code: 0,
            quaternion: QuaternionForm::identity(),
            qto_xyz: base,
            qto_ijk: base_inverse,
            sform_code: 0,
            sto_xyz: base,
            sto_ijk: base_inverse,
            transform_kind: None,
            velocity_exponent: 0,
        })
    }

    /// Scalar 3D volume.
    pub fn volume(dims: [usize; 3], spacing: [f64; 3]) -> Result<Self> {
        Self::new(&dims, &spacing)
    }

    /// Scalar 2D image (`nz == 1`, `dz == 1`).
    pub fn planar(dims: [usize; 2], spacing: [f64; 2]) -> Result<Self> {
        Self::new(&[dims[0], dims[1], 1], &[spacing[0], spacing[1], 1.0])
    }

    /// Same spatial lattice and forms with `nu` vector components and a
    /// single time point.
    pub fn with_components(&self, nu: usize) -> Self {
        let mut out = self.clone();
        out.dims[3] = 1;
        out.dims[COMPONENT_AXIS] = nu.max(1);
        out.dims[5] = 1;
        out.dims[6] = 1;
        out
    }

    pub fn dims(&self) -> &[usize; MAX_AXES] {
        &self.dims
    }

    pub fn spacing(&self) -> &[f64; MAX_AXES] {
        &self.spacing
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.dims[1]
    }

    #[inline]
    pub fn nz(&self) -> usize {
        self.dims[2]
    }

    #[inline]
    pub fn nt(&self) -> usize {
        self.dims[3]
    }

    /// Vector component count.
    #[inline]
    pub fn nu(&self) -> usize {
        self.dims[COMPONENT_AXIS]
    }

    #[inline]
    pub fn components(&self) -> usize {
        self.nu()
    }

    #[inline]
    pub fn dx(&self) -> f64 {
        self.spacing[0]
    }

    #[inline]
    pub fn dy(&self) -> f64 {
        self.spacing[1]
    }

    #[inline]
    pub fn dz(&self) -> f64 {
        self.spacing[2]
    }

    pub fn spatial_spacing(&self) -> [f64; 3] {
        [self.spacing[0], self.spacing[1], self.spacing[2]]
    }

    /// Planar lattices have a single z slice.
    #[inline]
    pub fn is_2d(&self) -> bool {
        self.dims[2] == 1
    }

    /// `nx · ny · nz`.
    #[inline]
    pub fn voxels_per_volume(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Total number of samples across all seven axes.
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn qform_code(&self) -> i32 {
        self.qform_code
    }

    pub fn sform_code(&self) -> i32 {
        self.sform_code
    }

    pub fn quaternion(&self) -> &QuaternionForm {
        &self.quaternion
    }

    pub fn qto_xyz(&self) -> &AffineMatrix {
        &self.qto_xyz
    }

    pub fn qto_ijk(&self) -> &AffineMatrix {
        &self.qto_ijk
    }

    pub fn sto_xyz(&self) -> &AffineMatrix {
        &self.sto_xyz
    }

    pub fn sto_ijk(&self) -> &AffineMatrix {
        &self.sto_ijk
    }

    /// Set the qform from quaternion parameters and the current spacing.
    ///
    /// A zero code resets the qform to the spacing-only mapping.
    pub fn set_qform(&mut self, code: i32, quaternion: QuaternionForm) -> Result<()> {
        let (quaternion, xyz) = if code > 0 {
            (quaternion, quaternion.to_affine(self.spatial_spacing()))
        } else {
            (
                QuaternionForm::identity(),
                AffineMatrix::scaling(self.spatial_spacing()),
            )
        };
        let ijk = xyz.inverse()?;
        self.qform_code = code.max(0);
        self.quaternion = quaternion;
        self.qto_xyz = xyz;
        self.qto_ijk = ijk;
        tracing::trace!("qform set with code {}: {:?}", self.qform_code, self.qto_xyz);
        Ok(())
    }

    /// Set the sform matrix; its inverse is recomputed.
    pub fn set_sform(&mut self, code: i32, sto_xyz: AffineMatrix) -> Result<()> {
        let ijk = sto_xyz.inverse()?;
        self.sform_code = code.max(0);
        self.sto_xyz = sto_xyz;
        self.sto_ijk = ijk;
        tracing::trace!("sform set with code {}: {:?}", self.sform_code, self.sto_xyz);
        Ok(())
    }

    pub fn with_qform(mut self, code: i32, quaternion: QuaternionForm) -> Result<Self> {
        self.set_qform(code, quaternion)?;
        Ok(self)
    }

    pub fn with_sform(mut self, code: i32, sto_xyz: AffineMatrix) -> Result<Self> {
        self.set_sform(code, sto_xyz)?;
        Ok(self)
    }

    /// Voxel-to-world map, sform preferred.
    pub fn voxel_to_real(&self) -> &AffineMatrix {
        self.voxel_to_real_with(FormPreference::Sform)
    }

    /// World-to-voxel map, sform preferred.
    pub fn real_to_voxel(&self) -> &AffineMatrix {
        self.real_to_voxel_with(FormPreference::Sform)
    }

    pub fn voxel_to_real_with(&self, preference: FormPreference) -> &AffineMatrix {
        if self.use_sform(preference) {
            &self.sto_xyz
        } else {
            &self.qto_xyz
        }
    }

    pub fn real_to_voxel_with(&self, preference: FormPreference) -> &AffineMatrix {
        if self.use_sform(preference) {
            &self.sto_ijk
        } else {
            &self.qto_ijk
        }
    }

    fn use_sform(&self, preference: FormPreference) -> bool {
        match preference {
            FormPreference::Sform => self.sform_code > 0,
            FormPreference::Qform => self.qform_code <= 0 && self.sform_code > 0,
        }
    }

    pub fn transform_kind(&self) -> Option<TransformKind> {
        self.transform_kind
    }

    pub fn set_transform_kind(&mut self, kind: Option<TransformKind>) {
        self.transform_kind = kind;
    }

    /// Number of squaring steps still to apply to a velocity representation.
    pub fn velocity_exponent(&self) -> u32 {
        self.velocity_exponent
    }

    pub fn set_velocity_exponent(&mut self, exponent: u32) {
        self.velocity_exponent = exponent;
    }
}
