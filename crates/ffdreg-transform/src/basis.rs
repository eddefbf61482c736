//! Cubic basis functions over one control-point cell.
//!
//! Two 4-tap families are provided: the approximating cubic B-spline used to
//! turn control-point coefficients into a smooth field, and an interpolating
//! Catmull-Rom cubic used when the control points already hold field values
//! (grid-on-grid composition). Derivatives are closed form.

use ffdreg_core::Real;
use serde::{Deserialize, Serialize};

/// Which cubic family to evaluate. A single evaluation never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BasisFamily {
    /// C² approximating cubic B-spline, non-negative weights.
    #[default]
    CubicBSpline,
    /// Interpolating cubic spline, weight 1 on the cell origin at `t = 0`.
    CatmullRom,
}

#[inline(always)]
fn k<T: Real>(value: f64) -> T {
    T::cast(value)
}

impl BasisFamily {
    /// The four weights at fractional offset `t ∈ [0, 1)`.
    #[inline]
    pub fn values<T: Real>(self, t: T) -> [T; 4] {
        match self {
            BasisFamily::CubicBSpline => bspline_values(t),
            BasisFamily::CatmullRom => catmull_rom_values(t),
        }
    }

    /// Weights and their first derivatives.
    #[inline]
    pub fn with_first<T: Real>(self, t: T) -> ([T; 4], [T; 4]) {
        match self {
            BasisFamily::CubicBSpline => (bspline_values(t), bspline_first(t)),
            BasisFamily::CatmullRom => (catmull_rom_values(t), catmull_rom_first(t)),
        }
    }

    /// Weights with first and second derivatives.
    #[inline]
    pub fn with_second<T: Real>(self, t: T) -> ([T; 4], [T; 4], [T; 4]) {
        match self {
            BasisFamily::CubicBSpline => (bspline_values(t), bspline_first(t), bspline_second(t)),
            BasisFamily::CatmullRom => (
                catmull_rom_values(t),
                catmull_rom_first(t),
                catmull_rom_second(t),
            ),
        }
    }
}

#[inline(always)]
fn bspline_values<T: Real>(t: T) -> [T; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = T::one() - t;
    let six = k::<T>(6.0);
    let three = k::<T>(3.0);
    [
        mt * mt * mt / six,
        (three * t3 - six * t2 + k::<T>(4.0)) / six,
        (-three * t3 + three * t2 + three * t + T::one()) / six,
        t3 / six,
    ]
}

#[inline(always)]
fn bspline_first<T: Real>(t: T) -> [T; 4] {
    let w3 = t * t / k::<T>(2.0);
    let w0 = t - k::<T>(0.5) - w3;
    let w2 = T::one() + w0 - k::<T>(2.0) * w3;
    let w1 = -w0 - w2 - w3;
    [w0, w1, w2, w3]
}

#[inline(always)]
fn bspline_second<T: Real>(t: T) -> [T; 4] {
    let w3 = t;
    let w0 = T::one() - t;
    let w2 = w0 - k::<T>(2.0) * w3;
    let w1 = -w0 - w2 - w3;
    [w0, w1, w2, w3]
}

#[inline(always)]
fn catmull_rom_values<T: Real>(t: T) -> [T; 4] {
    let half = k::<T>(0.5);
    let t2 = t * t;
    [
        half * t * ((k::<T>(2.0) - t) * t - T::one()),
        half * (t2 * (k::<T>(3.0) * t - k::<T>(5.0)) + k::<T>(2.0)),
        half * t * ((k::<T>(4.0) - k::<T>(3.0) * t) * t + T::one()),
        half * (t - T::one()) * t2,
    ]
}

#[inline(always)]
fn catmull_rom_first<T: Real>(t: T) -> [T; 4] {
    let half = k::<T>(0.5);
    let t2 = t * t;
    [
        half * (k::<T>(4.0) * t - k::<T>(3.0) * t2 - T::one()),
        half * (k::<T>(9.0) * t - k::<T>(10.0)) * t,
        half * (k::<T>(8.0) * t - k::<T>(9.0) * t2 + T::one()),
        half * (k::<T>(3.0) * t - k::<T>(2.0)) * t,
    ]
}

#[inline(always)]
fn catmull_rom_second<T: Real>(t: T) -> [T; 4] {
    [
        k::<T>(2.0) - k::<T>(3.0) * t,
        k::<T>(9.0) * t - k::<T>(5.0),
        k::<T>(4.0) - k::<T>(9.0) * t,
        k::<T>(3.0) * t - T::one(),
    ]
}

/// Largest cell index magnitude a coordinate may map to. Neighborhood
/// offsets stay far from `isize` overflow below it.
pub const MAX_CELL: f64 = 4_503_599_627_370_496.0;

/// Split a continuous lattice coordinate into its cell index and the
/// fractional offset within the cell. A negative offset caused by rounding
/// is clamped to zero.
///
/// Returns `None` for NaN, infinite, or coordinates beyond [`MAX_CELL`].
#[inline(always)]
pub fn split_coordinate<T: Real>(position: T) -> Option<(isize, T)> {
    let cell = position.floor();
    if !cell.is_finite() || cell.abs() > T::cast(MAX_CELL) {
        return None;
    }
    let mut t = position - cell;
    if t < T::zero() {
        t = T::zero();
    }
    Some((cell.to_isize()?, t))
}

/// Planar tensor weights: `w[b * 4 + a] = wx[a] · wy[b]`.
#[inline(always)]
pub fn tensor_2d<T: Real>(wx: &[T; 4], wy: &[T; 4], out: &mut [T; 16]) {
    for b in 0..4 {
        for a in 0..4 {
            out[b * 4 + a] = wx[a] * wy[b];
        }
    }
}

/// Volumetric tensor weights: `w[(c * 4 + b) * 4 + a] = wx[a] · (wy[b] · wz[c])`.
#[inline(always)]
pub fn tensor_3d<T: Real>(wx: &[T; 4], wy: &[T; 4], wz: &[T; 4], out: &mut [T; 64]) {
    for c in 0..4 {
        for b in 0..4 {
            let yz = wy[b] * wz[c];
            for a in 0..4 {
                out[(c * 4 + b) * 4 + a] = wx[a] * yz;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const FAMILIES: [BasisFamily; 2] = [BasisFamily::CubicBSpline, BasisFamily::CatmullRom];

    proptest! {
        #[test]
        fn test_partition_of_unity(t in 0.0f64..1.0) {
            for family in FAMILIES {
                let (w, d1, d2) = family.with_second(t);
                prop_assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
                prop_assert!(d1.iter().sum::<f64>().abs() < 1e-12);
                prop_assert!(d2.iter().sum::<f64>().abs() < 1e-12);
            }
        }

        #[test]
        fn test_bspline_non_negative(t in 0.0f32..1.0) {
            let w = BasisFamily::CubicBSpline.values(t);
            prop_assert!(w.iter().all(|&v| v >= 0.0));
        }

        #[test]
        fn test_derivatives_match_finite_differences(t in 0.05f64..0.95) {
            let h = 1e-6;
            for family in FAMILIES {
                let (_, d1, d2) = family.with_second(t);
                let lo = family.with_first(t - h);
                let hi = family.with_first(t + h);
                let vlo = family.values(t - h);
                let vhi = family.values(t + h);
                for i in 0..4 {
                    prop_assert!(((vhi[i] - vlo[i]) / (2.0 * h) - d1[i]).abs() < 1e-6);
                    prop_assert!(((hi.1[i] - lo.1[i]) / (2.0 * h) - d2[i]).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_bspline_at_cell_origin() {
        let w = BasisFamily::CubicBSpline.values(0.0f64);
        assert_relative_eq!(w[0], 1.0 / 6.0);
        assert_relative_eq!(w[1], 4.0 / 6.0);
        assert_relative_eq!(w[2], 1.0 / 6.0);
        assert_eq!(w[3], 0.0);
    }

    #[test]
    fn test_catmull_rom_interpolates() {
        assert_eq!(BasisFamily::CatmullRom.values(0.0f64), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_split_coordinate() {
        assert_eq!(split_coordinate(2.25f64), Some((2, 0.25)));
        assert_eq!(split_coordinate(-0.75f64), Some((-1, 0.25)));
        assert_eq!(split_coordinate(3.0f32), Some((3, 0.0)));
    }

    #[test]
    fn test_split_coordinate_rejects_unusable_positions() {
        assert_eq!(split_coordinate(f64::NAN), None);
        assert_eq!(split_coordinate(f64::INFINITY), None);
        assert_eq!(split_coordinate(f32::NEG_INFINITY), None);
        assert_eq!(split_coordinate(-9.223372036854775808e18f64), None);
        assert_eq!(split_coordinate(1e30f32), None);
        assert_eq!(split_coordinate(-MAX_CELL), Some((-(MAX_CELL as isize), 0.0)));
    }

    #[test]
    fn test_tensor_weights_sum_to_one() {
        let wx = BasisFamily::CubicBSpline.values(0.3f64);
        let wy = BasisFamily::CubicBSpline.values(0.7f64);
        let wz = BasisFamily::CubicBSpline.values(0.1f64);
        let mut w2 = [0.0; 16];
        let mut w3 = [0.0; 64];
        tensor_2d(&wx, &wy, &mut w2);
        tensor_3d(&wx, &wy, &wz, &mut w3);
        assert_relative_eq!(w2.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(w3.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_eq!(w3[(2 * 4 + 1) * 4 + 3], wx[3] * (wy[1] * wz[2]));
    }
}
