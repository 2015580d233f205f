//! Trading strategies.
//!
//! A [`Strategy`] is called once per simulated date, after open positions
//! have been marked: first [`risk_management`](Strategy::risk_management)
//! for exits, then [`generate_signals`](Strategy::generate_signals) for new
//! entries. Both return [`Order`]s that the engine executes in the same
//! date's transition phase. Strategies only read the portfolio; every
//! mutation goes through the engine.

mod covered_call;
mod short_straddle;

pub use covered_call::CoveredCall;
pub use short_straddle::ShortStraddle;

use chrono::{Duration, NaiveDate};
use pricer_core::market_data::{MarketData, OptionsContract};
use pricer_core::types::OptionType;
use pricer_surface::VolatilitySurface;

use crate::execution::Order;
use crate::portfolio::Portfolio;

/// Read-only view handed to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    /// Simulation date
    pub date: NaiveDate,
    /// Snapshot of the date
    pub snapshot: &'a MarketData,
    /// Surface the positions were marked with
    pub surface: &'a VolatilitySurface,
    /// Portfolio after marking
    pub portfolio: &'a Portfolio,
}

impl StrategyContext<'_> {
    /// Underlying price of the date.
    #[inline]
    pub fn spot(&self) -> f64 {
        self.snapshot.spot
    }

    /// Quoted contract of `option_type` with the expiry nearest
    /// `target_days` ahead and the strike nearest spot.
    ///
    /// Only unexpired contracts with a two-sided quote qualify. Ties go to
    /// the earlier expiry and the lower strike.
    pub fn nearest_contract(
        &self,
        option_type: OptionType,
        target_days: i64,
    ) -> Option<&OptionsContract> {
        let expiry = self.target_expiry(target_days)?;
        let spot = self.spot();
        self.snapshot
            .chain
            .iter()
            .filter(|c| {
                c.expiration == expiry && c.option_type == option_type && c.has_two_sided_quote()
            })
            .min_by(|a, b| {
                let da = (a.strike - spot).abs();
                let db = (b.strike - spot).abs();
                da.total_cmp(&db).then(a.strike.total_cmp(&b.strike))
            })
    }

    /// Quoted contract matching `contract`'s strike and expiry on the
    /// other side.
    pub fn counterpart(&self, contract: &OptionsContract) -> Option<&OptionsContract> {
        let other = contract.option_type.flip();
        self.snapshot.chain.iter().find(|c| {
            c.option_type == other
                && c.expiration == contract.expiration
                && c.strike == contract.strike
                && c.has_two_sided_quote()
        })
    }

    fn target_expiry(&self, target_days: i64) -> Option<NaiveDate> {
        let target = self.date + Duration::days(target_days);
        self.snapshot
            .expirations()
            .into_iter()
            .min_by_key(|e| ((*e - target).num_days().abs(), *e))
    }
}

/// Decision logic plugged into the engine.
///
/// # Examples
/// ```
/// use pricer_backtest::{Order, Strategy, StrategyContext};
///
/// /// Buys 100 shares once and holds them.
/// struct BuyAndHold {
///     bought: bool,
/// }
///
/// impl Strategy for BuyAndHold {
///     fn name(&self) -> &str {
///         "buy_and_hold"
///     }
///
///     fn generate_signals(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Order> {
///         if self.bought {
///             return vec![];
///         }
///         self.bought = true;
///         vec![Order::underlying(100.0)]
///     }
/// }
///
/// let strategy = BuyAndHold { bought: false };
/// assert_eq!(strategy.name(), "buy_and_hold");
/// ```
pub trait Strategy: Send {
    /// Name recorded in the results.
    fn name(&self) -> &str;

    /// Exit and adjustment orders, evaluated before new signals.
    fn risk_management(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Order> {
        Vec::new()
    }

    /// Entry orders for the date.
    fn generate_signals(&mut self, ctx: &StrategyContext<'_>) -> Vec<Order>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use pricer_core::market_data::{MarketData, OptionsContract};
    use pricer_core::types::{OptionType, PricingInputs};
    use pricer_models::analytical::BlackScholes;
    use pricer_surface::{SurfaceBuilder, SurfaceConfig, VolatilitySurface};

    pub(crate) fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    /// Flat 20% vol chain around 100 with two expiries, quoted 2% either
    /// side of the model price.
    pub(crate) fn snapshot(on: NaiveDate, spot: f64) -> MarketData {
        let mut chain = Vec::new();
        for expiry in [date(3, 15), date(4, 19)] {
            let t = (expiry - on).num_days() as f64 / 365.0;
            for strike in [90.0, 95.0, 100.0, 105.0, 110.0] {
                for option_type in [OptionType::Call, OptionType::Put] {
                    let inputs = PricingInputs::new(spot, strike, t, 0.03, 0.0, 0.2, option_type);
                    let mid = BlackScholes.price(&inputs).unwrap();
                    if mid < 0.005 {
                        continue;
                    }
                    let symbol = format!("XYZ{}{}{}", expiry.format("%m%d"), option_type, strike);
                    chain.push(
                        OptionsContract::new(symbol, "XYZ", strike, expiry, option_type)
                            .with_quote(mid * 0.98, mid * 1.02),
                    );
                }
            }
        }
        MarketData::new("XYZ", on.and_hms_opt(16, 0, 0).unwrap(), spot, 0.03, 0.0, chain).unwrap()
    }

    pub(crate) fn surface(snapshot: &MarketData) -> VolatilitySurface {
        SurfaceBuilder::new(SurfaceConfig::default())
            .unwrap()
            .build_from_snapshot(snapshot)
            .unwrap()
            .into_surface()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_nearest_contract_picks_expiry_and_strike() {
        let snapshot = snapshot(date(2, 1), 101.0);
        let surface = surface(&snapshot);
        let portfolio = Portfolio::new(10_000.0);
        let ctx = StrategyContext {
            date: date(2, 1),
            snapshot: &snapshot,
            surface: &surface,
            portfolio: &portfolio,
        };

        let call = ctx.nearest_contract(OptionType::Call, 30).unwrap();
        assert_eq!(call.expiration, date(3, 15));
        assert_eq!(call.strike, 100.0);

        let later = ctx.nearest_contract(OptionType::Put, 70).unwrap();
        assert_eq!(later.expiration, date(4, 19));

        let put = ctx.counterpart(call).unwrap();
        assert_eq!(put.option_type, OptionType::Put);
        assert_eq!(put.strike, 100.0);
    }
}
