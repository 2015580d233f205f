//! Day counting for option expiries.

use chrono::{NaiveDate, NaiveDateTime};

/// Days per year in the Actual/365 Fixed convention.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Trading days per year used for annualising daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Actual/365 Fixed year fraction between two dates.
///
/// Negative when `end` precedes `start`.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_core::types::year_fraction;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
/// assert!((year_fraction(start, end) - 365.0 / 365.0).abs() < 1e-12);
/// ```
#[inline]
pub fn year_fraction(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / DAYS_PER_YEAR
}

/// Year fraction from a timestamp to an expiry date, floored at zero.
///
/// Options expire at the close of their expiration date, so intraday
/// timestamps on the expiry date itself give zero remaining life.
pub fn time_to_expiry(valuation: NaiveDateTime, expiration: NaiveDate) -> f64 {
    year_fraction(valuation.date(), expiration).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_year_fraction_sign() {
        assert!(year_fraction(d(2024, 6, 1), d(2024, 1, 1)) < 0.0);
        assert_eq!(year_fraction(d(2024, 1, 1), d(2024, 1, 1)), 0.0);
    }

    #[test]
    fn test_time_to_expiry_floors_at_zero() {
        let ts = d(2024, 3, 20).and_hms_opt(15, 30, 0).unwrap();
        assert_eq!(time_to_expiry(ts, d(2024, 3, 15)), 0.0);
        assert!((time_to_expiry(ts, d(2024, 3, 27)) - 7.0 / 365.0).abs() < 1e-12);
    }
}
