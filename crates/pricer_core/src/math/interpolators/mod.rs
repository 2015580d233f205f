//! Interpolation methods for numerical computation.
//!
//! - [`CubicSplineInterpolator`]: natural cubic spline with C² continuity
//! - [`LinearInterpolator`]: piecewise linear
//!
//! Both are generic over `T: num_traits::Float` through [`Interpolator`].
//!
//! ## Example
//!
//! ```
//! use pricer_core::math::interpolators::{CubicSplineInterpolator, Interpolator};
//!
//! let spline = CubicSplineInterpolator::<f64>::new(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]).unwrap();
//! assert!((spline.interpolate(1.5).unwrap() - 1.5).abs() < 1e-10);
//! ```

mod cubic_spline;
mod linear;
mod traits;

pub use cubic_spline::CubicSplineInterpolator;
pub use linear::LinearInterpolator;
pub use traits::Interpolator;
