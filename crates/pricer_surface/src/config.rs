//! Surface builder settings.

use pricer_models::analytical::ImpliedVolConfig;
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::surface::{StrikeInterpolation, DEFAULT_GRID_DENSITY};

/// Lee's moment bound on the asymptotic total-variance slope.
pub const LEE_SLOPE_BOUND: f64 = 2.0;

/// Largest accepted number of check points per strike interval.
pub const MAX_GRID_DENSITY: usize = 64;

/// Settings for [`SurfaceBuilder`](crate::SurfaceBuilder).
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `max_wing_slope` | 1.5 | Cap on |dw/dk| beyond the quoted strikes |
/// | `min_quotes_per_expiry` | 3 | Slices with fewer usable quotes are dropped |
/// | `implied_vol` | solver defaults | Inversion bracket and budget |
/// | `arbitrage_tolerance` | 1e-9 | Slack allowed by the arbitrage checks |
/// | `smoothing` | true | Run one repair pass before rejecting a surface |
/// | `interpolation` | `cubic_spline` | Scheme between quoted strikes within an expiry |
/// | `grid_density` | 8 | Arbitrage check points per strike interval |
///
/// # Examples
///
/// ```
/// use pricer_surface::SurfaceConfig;
///
/// let config: SurfaceConfig = toml::from_str("max_wing_slope = 1.0").unwrap();
/// assert_eq!(config.max_wing_slope, 1.0);
/// assert_eq!(config.min_quotes_per_expiry, 3);
/// assert_eq!(config.grid_density, 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Largest absolute wing slope of total variance in log-moneyness.
    pub max_wing_slope: f64,
    /// Minimum usable quotes for an expiry to enter the surface.
    pub min_quotes_per_expiry: usize,
    /// Implied volatility solver settings.
    pub implied_vol: ImpliedVolConfig,
    /// Tolerance of the calendar and butterfly checks.
    pub arbitrage_tolerance: f64,
    /// Whether a violating surface gets one smoothing pass.
    pub smoothing: bool,
    /// Interpolation of total variance between quoted strikes.
    pub interpolation: StrikeInterpolation,
    /// Points per strike interval sampled by the arbitrage checks.
    pub grid_density: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            max_wing_slope: 1.5,
            min_quotes_per_expiry: 3,
            implied_vol: ImpliedVolConfig::default(),
            arbitrage_tolerance: 1e-9,
            smoothing: true,
            interpolation: StrikeInterpolation::CubicSpline,
            grid_density: DEFAULT_GRID_DENSITY,
        }
    }
}

impl SurfaceConfig {
    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// `SurfaceError::InvalidInput` when:
    /// - `max_wing_slope` is outside [0, 2)
    /// - `min_quotes_per_expiry` is below 3, the spline minimum
    /// - `arbitrage_tolerance` is negative or non-finite
    /// - `grid_density` is outside [1, `MAX_GRID_DENSITY`]
    /// - the implied volatility bracket is empty or the solver budget invalid
    pub fn validate(&self) -> Result<(), SurfaceError> {
        if !(self.max_wing_slope >= 0.0 && self.max_wing_slope < LEE_SLOPE_BOUND) {
            return Err(SurfaceError::InvalidInput(format!(
                "max_wing_slope must lie in [0, {}), got {}",
                LEE_SLOPE_BOUND, self.max_wing_slope
            )));
        }
        if self.min_quotes_per_expiry < 3 {
            return Err(SurfaceError::InvalidInput(format!(
                "min_quotes_per_expiry must be at least 3, got {}",
                self.min_quotes_per_expiry
            )));
        }
        if !(self.arbitrage_tolerance.is_finite() && self.arbitrage_tolerance >= 0.0) {
            return Err(SurfaceError::InvalidInput(format!(
                "arbitrage_tolerance must be non-negative, got {}",
                self.arbitrage_tolerance
            )));
        }
        if !(1..=MAX_GRID_DENSITY).contains(&self.grid_density) {
            return Err(SurfaceError::InvalidInput(format!(
                "grid_density must lie in [1, {}], got {}",
                MAX_GRID_DENSITY, self.grid_density
            )));
        }
        let iv = &self.implied_vol;
        if !(iv.min_vol > 0.0 && iv.max_vol > iv.min_vol && iv.max_vol.is_finite()) {
            return Err(SurfaceError::InvalidInput(format!(
                "implied vol bracket [{}, {}] is empty",
                iv.min_vol, iv.max_vol
            )));
        }
        if !iv.solver.is_valid() {
            return Err(SurfaceError::InvalidInput(
                "implied vol solver settings are invalid".to_string(),
            ));
        }
        Ok(())
    }
}
