//! Options for field evaluation and velocity integration.

use serde::{Deserialize, Serialize};

use crate::basis::BasisFamily;

/// Whether voxel loops fan out over the rayon pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Execution {
    /// One z-slab (3D) or y-row (2D) per rayon task.
    #[default]
    Parallel,
    /// Everything on the calling thread.
    Sequential,
}

impl Execution {
    pub fn is_parallel(self) -> bool {
        matches!(self, Execution::Parallel)
    }
}

/// Configuration for dense-field evaluation from a control-point grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationOptions {
    pub basis: BasisFamily,
    pub execution: Execution,
}

impl EvaluationOptions {
    /// Cubic B-spline, parallel.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_basis(mut self, basis: BasisFamily) -> Self {
        self.basis = basis;
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn sequential(self) -> Self {
        self.with_execution(Execution::Sequential)
    }
}

/// Configuration for scaling-and-squaring integration of a velocity grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VelocityIntegration {
    /// Square the sparse grid instead of the dense field.
    pub approx: bool,
    pub execution: Execution,
}

impl VelocityIntegration {
    /// Exact (dense) squaring, parallel.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approximate() -> Self {
        Self {
            approx: true,
            ..Self::default()
        }
    }

    pub fn with_approx(mut self, approx: bool) -> Self {
        self.approx = approx;
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn sequential(self) -> Self {
        self.with_execution(Execution::Sequential)
    }

    pub(crate) fn evaluation(&self, basis: BasisFamily) -> EvaluationOptions {
        EvaluationOptions {
            basis,
            execution: self.execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EvaluationOptions::new();
        assert_eq!(options.basis, BasisFamily::CubicBSpline);
        assert!(options.execution.is_parallel());
        assert!(!VelocityIntegration::new().approx);
        assert!(VelocityIntegration::approximate().approx);
    }

    #[test]
    fn test_serde_round_trip() {
        let options = EvaluationOptions::new()
            .with_basis(BasisFamily::CatmullRom)
            .sequential();
        let json = serde_json::to_string(&options).unwrap();
        let back: EvaluationOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
