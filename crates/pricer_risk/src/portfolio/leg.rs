//! Portfolio legs and their valuations.

use pricer_core::market_data::OptionsContract;
use pricer_core::types::GreeksSet;
use pricer_pricing::ModelId;
use serde::{Deserialize, Serialize};

/// What a leg holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    /// A listed option.
    Option {
        /// The contract
        contract: OptionsContract,
    },
    /// Shares of the underlying.
    Underlying,
}

/// A signed holding: positive long, negative short.
///
/// Option quantities count contracts and are scaled by the contract
/// multiplier; underlying quantities count shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    /// Held instrument
    pub instrument: Instrument,
    /// Signed quantity
    pub quantity: f64,
}

impl Leg {
    /// Option leg of `quantity` contracts.
    pub fn option(contract: OptionsContract, quantity: f64) -> Self {
        Self {
            instrument: Instrument::Option { contract },
            quantity,
        }
    }

    /// Underlying leg of `quantity` shares.
    pub fn underlying(quantity: f64) -> Self {
        Self {
            instrument: Instrument::Underlying,
            quantity,
        }
    }

    /// Units per quantity: the contract multiplier, or one share.
    pub fn multiplier(&self) -> f64 {
        match &self.instrument {
            Instrument::Option { contract } => contract.multiplier,
            Instrument::Underlying => 1.0,
        }
    }

    /// Contract symbol, or `None` for the underlying.
    pub fn symbol(&self) -> Option<&str> {
        match &self.instrument {
            Instrument::Option { contract } => Some(&contract.symbol),
            Instrument::Underlying => None,
        }
    }
}

/// Valuation of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegRisk {
    /// Price of one unit: the option premium or the spot
    pub unit_price: f64,
    /// Per-unit sensitivities
    pub unit_greeks: GreeksSet,
    /// quantity × multiplier × unit price
    pub value: f64,
    /// quantity × multiplier × unit Greeks
    pub greeks: GreeksSet,
    /// Model that priced the leg; `None` for the underlying
    pub model: Option<ModelId>,
    /// True when the Black-Scholes fallback priced the leg
    pub fallback: bool,
}

/// Aggregated valuation of a set of legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRisk {
    /// Sum of leg values
    pub value: f64,
    /// Sum of leg Greeks
    pub greeks: GreeksSet,
    /// Per-leg valuations, in input order
    pub legs: Vec<LegRisk>,
}

impl PortfolioRisk {
    /// Sums leg valuations in order.
    pub fn from_legs(legs: Vec<LegRisk>) -> Self {
        let mut value = 0.0;
        let mut greeks = GreeksSet::zero();
        for leg in &legs {
            value += leg.value;
            greeks += leg.greeks;
        }
        Self { value, greeks, legs }
    }

    /// Number of legs valued by the fallback model.
    pub fn fallback_count(&self) -> usize {
        self.legs.iter().filter(|l| l.fallback).count()
    }
}
