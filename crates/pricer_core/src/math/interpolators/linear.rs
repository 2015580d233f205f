//! Piecewise linear interpolation.

use super::traits::{segment, sorted_pairs};
use super::Interpolator;
use crate::types::InterpolationError;
use num_traits::Float;

/// Piecewise linear interpolator.
///
/// Data points are sorted by abscissa on construction; at least two are
/// required.
///
/// # Example
///
/// ```
/// use pricer_core::math::interpolators::{Interpolator, LinearInterpolator};
///
/// let interp = LinearInterpolator::<f64>::new(&[-0.2, 0.0, 0.3], &[0.06, 0.04, 0.05]).unwrap();
/// assert_eq!(interp.domain(), (-0.2, 0.3));
/// assert!((interp.interpolate(-0.1).unwrap() - 0.05).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct LinearInterpolator<T: Float> {
    xs: Vec<T>,
    ys: Vec<T>,
}

impl<T: Float> LinearInterpolator<T> {
    /// Construct from paired data.
    ///
    /// # Errors
    ///
    /// - `InterpolationError::InsufficientData` for fewer than two points
    /// - `InterpolationError::InvalidInput` for mismatched lengths or
    ///   non-finite values
    /// - `InterpolationError::NonMonotonicData` for repeated abscissae
    pub fn new(xs: &[T], ys: &[T]) -> Result<Self, InterpolationError> {
        let (xs, ys) = sorted_pairs(xs, ys, 2)?;
        Ok(Self { xs, ys })
    }

    /// Sorted abscissae.
    #[inline]
    pub fn xs(&self) -> &[T] {
        &self.xs
    }

    /// Values in abscissa order.
    #[inline]
    pub fn ys(&self) -> &[T] {
        &self.ys
    }

    /// Slope of the segment containing `x`, end segments extended outside
    /// the domain.
    pub fn slope(&self, x: T) -> T {
        let i = segment(&self.xs, x);
        (self.ys[i + 1] - self.ys[i]) / (self.xs[i + 1] - self.xs[i])
    }

    /// Value at `x`, extending the end segments outside the domain.
    #[inline]
    pub fn evaluate(&self, x: T) -> T {
        let i = segment(&self.xs, x);
        let t = (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        self.ys[i] + t * (self.ys[i + 1] - self.ys[i])
    }

    /// Slopes of the first and last segments.
    pub fn end_slopes(&self) -> (T, T) {
        let (lo, hi) = self.domain();
        (self.slope(lo), self.slope(hi))
    }
}

impl<T: Float> Interpolator<T> for LinearInterpolator<T> {
    fn interpolate(&self, x: T) -> Result<T, InterpolationError> {
        let (lo, hi) = self.domain();
        if x < lo || x > hi {
            return Err(InterpolationError::OutOfBounds {
                x: x.to_f64().unwrap_or(f64::NAN),
                min: lo.to_f64().unwrap_or(f64::NAN),
                max: hi.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(self.evaluate(x))
    }

    #[inline]
    fn domain(&self) -> (T, T) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }
}
