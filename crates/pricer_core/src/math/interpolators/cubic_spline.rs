//! Natural cubic spline interpolation.

use super::traits::{segment, sorted_pairs};
use super::Interpolator;
use crate::types::InterpolationError;
use num_traits::Float;

/// Cubic on one segment: `y = a + b·dx + c·dx² + d·dx³` with `dx = x - xᵢ`.
#[derive(Debug, Clone, Copy)]
struct SplineCoeffs<T: Float> {
    a: T,
    b: T,
    c: T,
    d: T,
}

/// Natural cubic spline interpolator with C² continuity.
///
/// Second derivatives vanish at both ends. Requires at least 3 points with
/// distinct abscissae; input order does not matter.
///
/// # Example
///
/// ```
/// use pricer_core::math::interpolators::{CubicSplineInterpolator, Interpolator};
///
/// let xs = [0.0, 1.0, 2.0, 3.0];
/// let ys = [0.0, 1.0, 4.0, 9.0];
/// let spline = CubicSplineInterpolator::<f64>::new(&xs, &ys).unwrap();
///
/// assert!((spline.interpolate(2.0).unwrap() - 4.0).abs() < 1e-12);
/// let (left, right) = spline.end_slopes();
/// assert!(left < right);
/// ```
#[derive(Debug, Clone)]
pub struct CubicSplineInterpolator<T: Float> {
    xs: Vec<T>,
    coeffs: Vec<SplineCoeffs<T>>,
}

impl<T: Float> CubicSplineInterpolator<T> {
    /// Construct a natural cubic spline.
    ///
    /// # Errors
    ///
    /// - `InterpolationError::InsufficientData` for fewer than 3 points
    /// - `InterpolationError::InvalidInput` for mismatched lengths or non-finite data
    /// - `InterpolationError::NonMonotonicData` for duplicate abscissae
    pub fn new(xs: &[T], ys: &[T]) -> Result<Self, InterpolationError> {
        let (xs, ys) = sorted_pairs(xs, ys, 3)?;
        let coeffs = Self::compute_coefficients(&xs, &ys);
        Ok(Self { xs, coeffs })
    }

    /// Solves the tridiagonal system for the knot second derivatives `M`
    /// (Thomas algorithm), then converts them to segment polynomials.
    fn compute_coefficients(xs: &[T], ys: &[T]) -> Vec<SplineCoeffs<T>> {
        let n = xs.len();
        let two = T::one() + T::one();
        let three = two + T::one();
        let six = three + three;

        let h: Vec<T> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let slope: Vec<T> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

        // Interior rows i = 1..n-2:
        //   h[i-1]·M[i-1] + 2(h[i-1]+h[i])·M[i] + h[i]·M[i+1] = 6(slope[i] - slope[i-1])
        let m_interior = n - 2;
        let mut c_prime = vec![T::zero(); m_interior];
        let mut d_prime = vec![T::zero(); m_interior];
        for k in 0..m_interior {
            let i = k + 1;
            let sub = h[i - 1];
            let diag = two * (h[i - 1] + h[i]);
            let sup = h[i];
            let rhs = six * (slope[i] - slope[i - 1]);
            if k == 0 {
                c_prime[k] = sup / diag;
                d_prime[k] = rhs / diag;
            } else {
                let denom = diag - sub * c_prime[k - 1];
                c_prime[k] = sup / denom;
                d_prime[k] = (rhs - sub * d_prime[k - 1]) / denom;
            }
        }

        let mut m = vec![T::zero(); n];
        for k in (0..m_interior).rev() {
            let next = m[k + 2];
            m[k + 1] = d_prime[k] - c_prime[k] * next;
        }

        (0..n - 1)
            .map(|i| SplineCoeffs {
                a: ys[i],
                b: slope[i] - h[i] * (two * m[i] + m[i + 1]) / six,
                c: m[i] / two,
                d: (m[i + 1] - m[i]) / (six * h[i]),
            })
            .collect()
    }

    /// Sorted abscissae.
    #[inline]
    pub fn xs(&self) -> &[T] {
        &self.xs
    }

    /// First derivative at `x`, extending the end polynomials outside the domain.
    pub fn derivative(&self, x: T) -> T {
        let i = segment(&self.xs, x);
        let c = &self.coeffs[i];
        let dx = x - self.xs[i];
        let two = T::one() + T::one();
        let three = two + T::one();
        c.b + two * c.c * dx + three * c.d * dx * dx
    }

    /// First derivatives at the left and right ends of the domain.
    pub fn end_slopes(&self) -> (T, T) {
        let (lo, hi) = self.domain();
        (self.derivative(lo), self.derivative(hi))
    }

    /// Value at `x`, extending the end polynomials outside the domain.
    #[inline]
    pub fn evaluate(&self, x: T) -> T {
        let i = segment(&self.xs, x);
        let c = &self.coeffs[i];
        let dx = x - self.xs[i];
        c.a + dx * (c.b + dx * (c.c + dx * c.d))
    }
}

impl<T: Float> Interpolator<T> for CubicSplineInterpolator<T> {
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
