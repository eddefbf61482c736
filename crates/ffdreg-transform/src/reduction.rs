//! The 4-lane weighted reduction every spline evaluation funnels through.
//!
//! Products are accumulated into four lanes (`lane j` takes elements
//! `4i + j`), then the lanes are summed left to right. The `simd` feature
//! swaps in a `wide` implementation with the same lane grouping and the
//! same unfused multiply-then-add, so both builds produce identical sums.

use ffdreg_core::Real;

/// Scalars that provide the weighted 4-lane reduction.
pub trait Reduce4: Real {
    /// `Σ weights[i] · values[i]`; both slices have the same length, a
    /// multiple of four.
    fn weighted_sum(values: &[Self], weights: &[Self]) -> Self;
}

#[cfg_attr(feature = "simd", allow(dead_code))]
#[inline(always)]
fn portable<T: Real>(values: &[T], weights: &[T]) -> T {
    debug_assert_eq!(values.len(), weights.len());
    debug_assert_eq!(values.len() % 4, 0);
    let mut lanes = [T::zero(); 4];
    for (v, w) in values.chunks_exact(4).zip(weights.chunks_exact(4)) {
        lanes[0] = lanes[0] + w[0] * v[0];
        lanes[1] = lanes[1] + w[1] * v[1];
        lanes[2] = lanes[2] + w[2] * v[2];
        lanes[3] = lanes[3] + w[3] * v[3];
    }
    lanes[0] + lanes[1] + lanes[2] + lanes[3]
}

#[cfg(not(feature = "simd"))]
impl Reduce4 for f32 {
    #[inline(always)]
    fn weighted_sum(values: &[f32], weights: &[f32]) -> f32 {
        portable(values, weights)
    }
}

#[cfg(not(feature = "simd"))]
impl Reduce4 for f64 {
    #[inline(always)]
    fn weighted_sum(values: &[f64], weights: &[f64]) -> f64 {
        portable(values, weights)
    }
}

#[cfg(feature = "simd")]
impl Reduce4 for f32 {
    #[inline(always)]
    fn weighted_sum(values: &[f32], weights: &[f32]) -> f32 {
        use wide::f32x4;
        debug_assert_eq!(values.len(), weights.len());
        let mut acc = f32x4::splat(0.0);
        for (v, w) in values.chunks_exact(4).zip(weights.chunks_exact(4)) {
            let v = f32x4::new([v[0], v[1], v[2], v[3]]);
            let w = f32x4::new([w[0], w[1], w[2], w[3]]);
            acc = acc + w * v;
        }
        let lanes = acc.to_array();
        lanes[0] + lanes[1] + lanes[2] + lanes[3]
    }
}

#[cfg(feature = "simd")]
impl Reduce4 for f64 {
    #[inline(always)]
    fn weighted_sum(values: &[f64], weights: &[f64]) -> f64 {
        use wide::f64x4;
        debug_assert_eq!(values.len(), weights.len());
        let mut acc = f64x4::splat(0.0);
        for (v, w) in values.chunks_exact(4).zip(weights.chunks_exact(4)) {
            let v = f64x4::new([v[0], v[1], v[2], v[3]]);
            let w = f64x4::new([w[0], w[1], w[2], w[3]]);
            acc = acc + w * v;
        }
        let lanes = acc.to_array();
        lanes[0] + lanes[1] + lanes[2] + lanes[3]
    }
}
