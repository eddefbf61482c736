//! Homogeneous 4×4 affine matrices.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{FfdError, Result};
use crate::image::Real;

/// A 4×4 affine map whose last row is `[0, 0, 0, 1]`.
///
/// Used for voxel-to-world (`xyz`) and world-to-voxel (`ijk`) image
/// transforms as well as for global affine registrations between two
/// physical spaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineMatrix {
    matrix: Matrix4<f64>,
}

impl AffineMatrix {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Build from the three upper rows; the last row is fixed.
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        let mut matrix = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                matrix[(r, c)] = *value;
            }
        }
        Self { matrix }
    }

    /// Wrap a full matrix, rejecting one whose last row is not `[0, 0, 0, 1]`.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Result<Self> {
        let last = [matrix[(3, 0)], matrix[(3, 1)], matrix[(3, 2)], matrix[(3, 3)]];
        if last != [0.0, 0.0, 0.0, 1.0] {
            return Err(FfdError::invalid_geometry(format!(
                "affine last row must be [0, 0, 0, 1], got {:?}",
                last
            )));
        }
        Ok(Self { matrix })
    }

    /// Axis-aligned scaling.
    pub fn scaling(scale: [f64; 3]) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::from(scale)),
        }
    }

    pub fn translation(offset: [f64; 3]) -> Self {
        Self {
            matrix: Matrix4::new_translation(&nalgebra::Vector3::from(offset)),
        }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[(row, col)]
    }

    /// Translation column.
    pub fn offset(&self) -> [f64; 3] {
        [self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)]]
    }

    /// Same linear part with a new translation column.
    pub fn with_offset(mut self, offset: [f64; 3]) -> Self {
        for (r, value) in offset.iter().enumerate() {
            self.matrix[(r, 3)] = *value;
        }
        self
    }

    /// `self · other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &AffineMatrix) -> AffineMatrix {
        AffineMatrix {
            matrix: self.matrix * other.matrix,
        }
    }

    pub fn inverse(&self) -> Result<AffineMatrix> {
        let inverse = self
            .matrix
            .try_inverse()
            .ok_or_else(|| FfdError::singular_matrix(format!("{:?}", self.matrix)))?;
        Ok(AffineMatrix { matrix: inverse })
    }

    /// Map a point through the affine.
    pub fn transform_point(&self, point: [f64; 3]) -> [f64; 3] {
        let out = self.matrix * Vector4::new(point[0], point[1], point[2], 1.0);
        [out[0], out[1], out[2]]
    }

    /// Upper three rows narrowed to `T` for use in per-voxel loops.
    pub fn rows<T: Real>(&self) -> AffineRows<T> {
        let mut m = [[T::zero(); 4]; 3];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = T::cast(self.matrix[(r, c)]);
            }
        }
        AffineRows { m }
    }
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// The upper 3×4 block of an [`AffineMatrix`] in the working precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineRows<T> {
    pub m: [[T; 4]; 3],
}

impl<T: Real> AffineRows<T> {
    #[inline(always)]
    pub fn apply3(&self, x: T, y: T, z: T) -> [T; 3] {
        let m = &self.m;
        [
            m[0][0] * x + m[0][1] * y + m[0][2] * z + m[0][3],
            m[1][0] * x + m[1][1] * y + m[1][2] * z + m[1][3],
            m[2][0] * x + m[2][1] * y + m[2][2] * z + m[2][3],
        ]
    }

    /// Planar version: `z` is taken as zero and only x/y are returned.
    #[inline(always)]
    pub fn apply2(&self, x: T, y: T) -> [T; 2] {
        let m = &self.m;
        [
            m[0][0] * x + m[0][1] * y + m[0][3],
            m[1][0] * x + m[1][1] * y + m[1][3],
        ]
    }
}
