//! Preset scenarios for common stress tests.
//!
//! Provides a standard ladder for options books:
//! - Spot moves of ±5%, ±10% and ±20%
//! - Parallel volatility moves of ±5 points
//! - Rate moves of ±100bp
//! - Time decay of one day and one week

use super::shifts::Scenario;

/// Types of preset scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresetScenarioType {
    /// Spot +5%
    SpotUp5Pct,
    /// Spot -5%
    SpotDown5Pct,
    /// Spot +10%
    SpotUp10Pct,
    /// Spot -10%
    SpotDown10Pct,
    /// Spot +20%
    SpotUp20Pct,
    /// Spot -20%
    SpotDown20Pct,
    /// Volatility +5 points
    VolUp5Pts,
    /// Volatility -5 points
    VolDown5Pts,
    /// Rate +100bp
    RateUp100bp,
    /// Rate -100bp
    RateDown100bp,
    /// One calendar day forward
    DecayOneDay,
    /// One calendar week forward
    DecayOneWeek,
    /// Spot -20% with volatility +10 points
    Crash,
}

impl PresetScenarioType {
    /// Get all spot scenarios.
    pub fn spot_scenarios() -> Vec<Self> {
        vec![
            Self::SpotUp5Pct,
            Self::SpotDown5Pct,
            Self::SpotUp10Pct,
            Self::SpotDown10Pct,
            Self::SpotUp20Pct,
            Self::SpotDown20Pct,
        ]
    }

    /// Get the standard ladder: every preset except the combined crash.
    pub fn standard_ladder() -> Vec<Self> {
        let mut ladder = Self::spot_scenarios();
        ladder.extend([
            Self::VolUp5Pts,
            Self::VolDown5Pts,
            Self::RateUp100bp,
            Self::RateDown100bp,
            Self::DecayOneDay,
            Self::DecayOneWeek,
        ]);
        ladder
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SpotUp5Pct => "Spot +5%",
            Self::SpotDown5Pct => "Spot -5%",
            Self::SpotUp10Pct => "Spot +10%",
            Self::SpotDown10Pct => "Spot -10%",
            Self::SpotUp20Pct => "Spot +20%",
            Self::SpotDown20Pct => "Spot -20%",
            Self::VolUp5Pts => "Vol +5pts",
            Self::VolDown5Pts => "Vol -5pts",
            Self::RateUp100bp => "IR +100bp",
            Self::RateDown100bp => "IR -100bp",
            Self::DecayOneDay => "1D decay",
            Self::DecayOneWeek => "1W decay",
            Self::Crash => "Crash",
        }
    }

    /// Get description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::SpotUp5Pct => "Underlying rallies 5%",
            Self::SpotDown5Pct => "Underlying falls 5%",
            Self::SpotUp10Pct => "Underlying rallies 10%",
            Self::SpotDown10Pct => "Underlying falls 10%",
            Self::SpotUp20Pct => "Underlying rallies 20%",
            Self::SpotDown20Pct => "Underlying falls 20%",
            Self::VolUp5Pts => "Implied volatility increases 5 percentage points",
            Self::VolDown5Pts => "Implied volatility decreases 5 percentage points",
            Self::RateUp100bp => "Risk-free rate +100 basis points",
            Self::RateDown100bp => "Risk-free rate -100 basis points",
            Self::DecayOneDay => "Valuation moves forward one calendar day",
            Self::DecayOneWeek => "Valuation moves forward seven calendar days",
            Self::Crash => "Underlying falls 20% while volatility rises 10 points",
        }
    }

    /// Builds the scenario.
    pub fn scenario(&self) -> Scenario {
        let base = Scenario::new(self.name());
        match self {
            Self::SpotUp5Pct => base.with_spot_shift(0.05),
            Self::SpotDown5Pct => base.with_spot_shift(-0.05),
            Self::SpotUp10Pct => base.with_spot_shift(0.10),
            Self::SpotDown10Pct => base.with_spot_shift(-0.10),
            Self::SpotUp20Pct => base.with_spot_shift(0.20),
            Self::SpotDown20Pct => base.with_spot_shift(-0.20),
            Self::VolUp5Pts => base.with_vol_shift(0.05),
            Self::VolDown5Pts => base.with_vol_shift(-0.05),
            Self::RateUp100bp => base.with_rate_shift(0.01),
            Self::RateDown100bp => base.with_rate_shift(-0.01),
            Self::DecayOneDay => base.with_days_forward(1),
            Self::DecayOneWeek => base.with_days_forward(7),
            Self::Crash => base.with_spot_shift(-0.20).with_vol_shift(0.10),
        }
    }
}

/// Scenarios of the standard ladder, in ladder order.
pub fn standard_scenarios() -> Vec<Scenario> {
    PresetScenarioType::standard_ladder()
        .iter()
        .map(PresetScenarioType::scenario)
        .collect()
}
