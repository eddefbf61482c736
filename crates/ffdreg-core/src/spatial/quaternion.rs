//! Quaternion ("qform") parameterisation of a rigid + scale voxel-to-world map.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use super::AffineMatrix;
use crate::error::{FfdError, Result};

/// Rotation quaternion `(a, b, c, d)` stored without `a`, an offset and the
/// handedness factor `qfac` (±1) applied to the third axis.
///
/// `a` is recovered as `sqrt(max(0, 1 - b² - c² - d²))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionForm {
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub offset: [f64; 3],
    pub qfac: f64,
}

impl QuaternionForm {
    pub fn identity() -> Self {
        Self {
            b: 0.0,
            c: 0.0,
            d: 0.0,
            offset: [0.0; 3],
            qfac: 1.0,
        }
    }

    pub fn with_offset(mut self, offset: [f64; 3]) -> Self {
        self.offset = offset;
        self
    }

    /// Expand to a voxel-to-world matrix for the given voxel spacing.
    ///
    /// Non-positive spacings are treated as 1.
    pub fn to_affine(&self, spacing: [f64; 3]) -> AffineMatrix {
        let (b, c, d) = (self.b, self.c, self.d);
        let a_squared = 1.0 - (b * b + c * c + d * d);
        let (a, b, c, d) = if a_squared < 1e-7 {
            // Nearly a 180° rotation: renormalise (b, c, d).
            let norm = 1.0 / (b * b + c * c + d * d).sqrt();
            (0.0, b * norm, c * norm, d * norm)
        } else {
            (a_squared.sqrt(), b, c, d)
        };

        let sx = if spacing[0] > 0.0 { spacing[0] } else { 1.0 };
        let sy = if spacing[1] > 0.0 { spacing[1] } else { 1.0 };
        let mut sz = if spacing[2] > 0.0 { spacing[2] } else { 1.0 };
        if self.qfac < 0.0 {
            sz = -sz;
        }

        AffineMatrix::from_rows([
            [
                (a * a + b * b - c * c - d * d) * sx,
                2.0 * (b * c - a * d) * sy,
                2.0 * (b * d + a * c) * sz,
                self.offset[0],
            ],
            [
                2.0 * (b * c + a * d) * sx,
                (a * a + c * c - b * b - d * d) * sy,
                2.0 * (c * d - a * b) * sz,
                self.offset[1],
            ],
            [
                2.0 * (b * d - a * c) * sx,
                2.0 * (c * d + a * b) * sy,
                (a * a + d * d - c * c - b * b) * sz,
                self.offset[2],
            ],
        ])
    }

    /// Decompose a voxel-to-world matrix into a quaternion form and the
    /// column norms (voxel spacing).
    ///
    /// Shear is discarded: the closest rotation to the normalised columns
    /// is used.
    pub fn from_affine(affine: &AffineMatrix) -> Result<(Self, [f64; 3])> {
        let m = affine.matrix();
        let mut columns = Matrix3::new(
            m[(0, 0)], m[(0, 1)], m[(0, 2)],
            m[(1, 0)], m[(1, 1)], m[(1, 2)],
            m[(2, 0)], m[(2, 1)], m[(2, 2)],
        );

        let mut spacing = [0.0; 3];
        for (axis, s) in spacing.iter_mut().enumerate() {
            let norm = columns.column(axis).norm();
            *s = if norm > 0.0 { norm } else { 1.0 };
            if norm > 0.0 {
                columns.column_mut(axis).scale_mut(1.0 / norm);
            } else {
                columns.column_mut(axis).fill(0.0);
                columns[(axis, axis)] = 1.0;
            }
        }

        let det = columns.determinant();
        if det.abs() < 1e-12 {
            return Err(FfdError::singular_matrix(
                "voxel-to-world matrix has linearly dependent axes",
            ));
        }
        let qfac = if det < 0.0 {
            columns.column_mut(2).neg_mut();
            -1.0
        } else {
            1.0
        };

        // Already orthonormal columns are used as they are; otherwise the
        // orthogonal polar factor U·Vᵀ is the closest rotation.
        let orthonormal = (columns.transpose() * columns - Matrix3::identity()).amax() < 1e-10;
        let rotation = if orthonormal {
            Rotation3::from_matrix_unchecked(columns)
        } else {
            let svd = columns.svd(true, true);
            match (svd.u, svd.v_t) {
                (Some(u), Some(v_t)) => Rotation3::from_matrix_unchecked(u * v_t),
                _ => {
                    return Err(FfdError::singular_matrix(
                        "voxel-to-world rotation could not be orthogonalised",
                    ))
                }
            }
        };
        let q = UnitQuaternion::from_rotation_matrix(&rotation);
        let (mut b, mut c, mut d) = (q.i, q.j, q.k);
        if q.w < 0.0 {
            b = -b;
            c = -c;
            d = -d;
        }

        Ok((
            Self {
                b,
                c,
                d,
                offset: affine.offset(),
                qfac,
            },
            spacing,
        ))
    }
}

impl Default for QuaternionForm {
    fn default() -> Self {
        Self::identity()
    }
}
