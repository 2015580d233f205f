//! Terminal-value simulation for Monte Carlo pricing.
//!
//! Both schemes work in log space and consume one pre-drawn slice of
//! standard normals per path, so an antithetic partner is simulated by
//! negating the slice.
//!
//! # Memory Layout
//!
//! GBM paths read `normals[step]`. Heston paths read the asset shock at
//! `normals[2 * step]` and the independent variance shock at
//! `normals[2 * step + 1]`.

use pricer_models::heston::HestonParams;

/// Parameters for Geometric Brownian Motion simulation.
///
/// # Model
///
/// ```text
/// dS = (r - q) S dt + σ S dW
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GbmParams {
    /// Initial spot price (S₀).
    pub spot: f64,
    /// Risk-free rate (r), annualised.
    pub rate: f64,
    /// Continuous dividend yield (q).
    pub dividend_yield: f64,
    /// Volatility (σ), annualised.
    pub volatility: f64,
    /// Time to maturity in years.
    pub maturity: f64,
}

impl GbmParams {
    /// Number of normals consumed per path.
    #[inline]
    pub fn normals_per_path(n_steps: usize) -> usize {
        n_steps
    }

    /// Simulates the terminal spot using the exact log-space step.
    ///
    /// ```text
    /// S(t+dt) = S(t) × exp((r - q - σ²/2)dt + σ√dt × Z)
    /// ```
    ///
    /// `sign` is `1.0` for the base path and `-1.0` for its antithetic
    /// partner.
    #[inline]
    pub fn terminal(&self, normals: &[f64], sign: f64) -> f64 {
        let dt = self.maturity / normals.len() as f64;
        let vol = self.volatility;
        let drift_dt = (self.rate - self.dividend_yield - 0.5 * vol * vol) * dt;
        let vol_sqrt_dt = vol * dt.sqrt();

        let mut log_s = self.spot.ln();
        for &z in normals {
            log_s += drift_dt + vol_sqrt_dt * sign * z;
        }
        log_s.exp()
    }
}

/// Parameters for Heston simulation with full-truncation Euler.
///
/// The variance process may go negative between steps; only its positive
/// part enters the drift and diffusion of either process.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HestonPathParams {
    /// Initial spot price.
    pub spot: f64,
    /// Risk-free rate.
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend_yield: f64,
    /// Time to maturity in years.
    pub maturity: f64,
    /// Model parameters with v₀ resolved.
    pub params: HestonParams,
}

impl HestonPathParams {
    /// Number of normals consumed per path.
    #[inline]
    pub fn normals_per_path(n_steps: usize) -> usize {
        2 * n_steps
    }

    /// Simulates the terminal spot.
    ///
    /// The log-asset step is exact given the truncated variance, so the
    /// discounted asset remains a martingale under the scheme.
    #[inline]
    pub fn terminal(&self, normals: &[f64], sign: f64) -> f64 {
        let n_steps = normals.len() / 2;
        let dt = self.maturity / n_steps as f64;
        let sqrt_dt = dt.sqrt();
        let HestonParams {
            v0,
            theta,
            kappa,
            xi,
            rho,
        } = self.params;
        let rho_bar = (1.0 - rho * rho).sqrt();
        let carry_dt = (self.rate - self.dividend_yield) * dt;

        let mut log_s = self.spot.ln();
        let mut v = v0;
        for pair in normals.chunks_exact(2) {
            let z_s = sign * pair[0];
            let z_v = rho * z_s + rho_bar * sign * pair[1];
            let v_plus = v.max(0.0);
            let sqrt_v = v_plus.sqrt();

            log_s += carry_dt - 0.5 * v_plus * dt + sqrt_v * sqrt_dt * z_s;
            v += kappa * (theta - v_plus) * dt + xi * sqrt_v * sqrt_dt * z_v;
        }
        log_s.exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gbm_zero_shocks_follow_forward_drift() {
        let params = GbmParams {
            spot: 100.0,
            rate: 0.05,
            dividend_yield: 0.02,
            volatility: 0.2,
            maturity: 1.0,
        };
        let s_t = params.terminal(&[0.0; 12], 1.0);
        assert_relative_eq!(s_t, 100.0 * (0.03f64 - 0.02).exp(), epsilon = 1e-10);
    }

    #[test]
    fn test_gbm_step_count_does_not_change_single_shock_path() {
        let params = GbmParams {
            spot: 100.0,
            rate: 0.03,
            dividend_yield: 0.0,
            volatility: 0.25,
            maturity: 0.5,
        };
        // Four half-size shocks carry the same total diffusion as one unit shock
        let one = params.terminal(&[1.0], 1.0);
        let four = params.terminal(&[0.5, 0.5, 0.5, 0.5], 1.0);
        assert_relative_eq!(one, four, epsilon = 1e-10);
    }

    #[test]
    fn test_antithetic_sign_mirrors_shock() {
        let params = GbmParams {
            spot: 100.0,
            rate: 0.0,
            dividend_yield: 0.0,
            volatility: 0.2,
            maturity: 1.0,
        };
        let up = params.terminal(&[1.0], 1.0);
        let down = params.terminal(&[1.0], -1.0);
        // Product equals S₀² e^{-σ²T}
        assert_relative_eq!(up * down, 100.0 * 100.0 * (-0.04f64).exp(), epsilon = 1e-8);
    }

    #[test]
    fn test_heston_zero_vol_of_vol_matches_gbm() {
        let heston = HestonPathParams {
            spot: 100.0,
            rate: 0.03,
            dividend_yield: 0.01,
            maturity: 1.0,
            params: HestonParams::new(0.04, 0.04, 1.5, 0.0, -0.5),
        };
        let gbm = GbmParams {
            spot: 100.0,
            rate: 0.03,
            dividend_yield: 0.01,
            volatility: 0.2,
            maturity: 1.0,
        };
        let normals = [0.3, -1.1, 0.7, 0.2, -0.4, 2.0];
        let asset_shocks = [0.3, 0.7, -0.4];
        assert_relative_eq!(
            heston.terminal(&normals, 1.0),
            gbm.terminal(&asset_shocks, 1.0),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_heston_truncation_keeps_terminal_finite() {
        let heston = HestonPathParams {
            spot: 100.0,
            rate: 0.03,
            dividend_yield: 0.0,
            maturity: 1.0,
            params: HestonParams::new(0.01, 0.01, 0.5, 1.5, -0.9),
        };
        let normals: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 3.0 } else { -3.0 }).collect();
        let s_t = heston.terminal(&normals, 1.0);
        assert!(s_t.is_finite() && s_t > 0.0);
    }
}
