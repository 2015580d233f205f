//! Common interface for one-dimensional interpolators.

use crate::types::InterpolationError;
use num_traits::Float;

/// One-dimensional interpolation over a closed domain.
pub trait Interpolator<T: Float> {
    /// Interpolated value at `x`.
    ///
    /// # Errors
    ///
    /// `InterpolationError::OutOfBounds` when `x` lies outside [`Interpolator::domain`].
    fn interpolate(&self, x: T) -> Result<T, InterpolationError>;

    /// Valid interpolation range `(x_min, x_max)`.
    fn domain(&self) -> (T, T);

    /// Returns true when `x` lies inside the domain.
    fn contains(&self, x: T) -> bool {
        let (lo, hi) = self.domain();
        x >= lo && x <= hi
    }
}

/// Sorts paired data by abscissa and rejects duplicates or non-finite values.
pub(crate) fn sorted_pairs<T: Float>(
    xs: &[T],
    ys: &[T],
    need: usize,
) -> Result<(Vec<T>, Vec<T>), InterpolationError> {
    if xs.len() != ys.len() {
        return Err(InterpolationError::InvalidInput(format!(
            "xs and ys must have same length: got {} and {}",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() < need {
        return Err(InterpolationError::InsufficientData {
            got: xs.len(),
            need,
        });
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(InterpolationError::InvalidInput(
            "data contains non-finite values".to_string(),
        ));
    }

    let mut pairs: Vec<(T, T)> = xs.iter().copied().zip(ys.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(i) = pairs.windows(2).position(|w| w[1].0 <= w[0].0) {
        return Err(InterpolationError::NonMonotonicData { index: i + 1 });
    }
    Ok(pairs.into_iter().unzip())
}

/// Index `i` with `xs[i] <= x < xs[i+1]`, clamped to `[0, n-2]`.
#[inline]
pub(crate) fn segment<T: Float>(xs: &[T], x: T) -> usize {
    let pos = xs.partition_point(|&xi| xi <= x);
    pos.saturating_sub(1).min(xs.len() - 2)
}
