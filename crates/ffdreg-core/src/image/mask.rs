//! Voxel activity mask.

use crate::error::{FfdError, Result};

/// Per-voxel activity flags for a target-shaped lattice.
///
/// A value of `-1` or below excludes the voxel; anything greater is active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mask {
    values: Vec<i32>,
}

impl Mask {
    pub fn new(values: Vec<i32>) -> Self {
        Self { values }
    }

    /// Every voxel active.
    pub fn all_active(len: usize) -> Self {
        Self {
            values: vec![0; len],
        }
    }

    /// Active wherever `keep` is true.
    pub fn from_fn(len: usize, mut keep: impl FnMut(usize) -> bool) -> Self {
        Self {
            values: (0..len).map(|i| if keep(i) { 0 } else { -1 }).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    #[inline(always)]
    pub fn is_active(&self, index: usize) -> bool {
        self.values[index] > -1
    }

    pub fn active_count(&self) -> usize {
        self.values.iter().filter(|&&v| v > -1).count()
    }

    /// Fail unless the mask covers exactly `voxels` entries.
    pub fn check_len(&self, voxels: usize) -> Result<()> {
        if self.values.len() != voxels {
            return Err(FfdError::shape_mismatch(vec![voxels], vec![self.values.len()]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_threshold() {
        let mask = Mask::new(vec![-2, -1, 0, 1]);
        assert!(!mask.is_active(0));
        assert!(!mask.is_active(1));
        assert!(mask.is_active(2));
        assert!(mask.is_active(3));
        assert_eq!(mask.active_count(), 2);
    }

    #[test]
    fn test_check_len() {
        let mask = Mask::all_active(8);
        assert!(mask.check_len(8).is_ok());
        assert!(mask.check_len(9).is_err());
    }

    #[test]
    fn test_from_fn() {
        let mask = Mask::from_fn(4, |i| i % 2 == 0);
        assert_eq!(mask.values(), &[0, -1, 0, -1]);
    }
}
