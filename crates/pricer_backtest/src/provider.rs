//! Market data sources for a run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use pricer_core::market_data::MarketData;

/// Source of one snapshot per simulation date.
///
/// Implementations must be shareable across threads: surface prefetch and
/// parameter sweeps query the provider concurrently.
pub trait MarketDataProvider: Send + Sync {
    /// Snapshot for `date`, or `None` when the date has no data.
    fn snapshot(&self, date: NaiveDate) -> Option<MarketData>;
}

/// Snapshots held in memory, keyed by valuation date.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_backtest::{InMemoryProvider, MarketDataProvider};
/// use pricer_core::market_data::MarketData;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
/// let snapshot = MarketData::new(
///     "SPY",
///     date.and_hms_opt(16, 0, 0).unwrap(),
///     475.0,
///     0.05,
///     0.013,
///     vec![],
/// )
/// .unwrap();
///
/// let provider = InMemoryProvider::from_snapshots([snapshot]);
/// assert!(provider.snapshot(date).is_some());
/// assert!(provider.snapshot(date.succ_opt().unwrap()).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    snapshots: BTreeMap<NaiveDate, MarketData>,
}

impl InMemoryProvider {
    /// Empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider holding `snapshots`; a later snapshot replaces an earlier one
    /// on the same date.
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = MarketData>) -> Self {
        let mut provider = Self::new();
        for snapshot in snapshots {
            provider.insert(snapshot);
        }
        provider
    }

    /// Adds or replaces the snapshot of its valuation date.
    pub fn insert(&mut self, snapshot: MarketData) {
        self.snapshots.insert(snapshot.valuation_date(), snapshot);
    }

    /// Removes the snapshot of `date`.
    pub fn remove(&mut self, date: NaiveDate) -> Option<MarketData> {
        self.snapshots.remove(&date)
    }

    /// Dates with data, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.snapshots.keys().copied()
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns true when no snapshot is held.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl MarketDataProvider for InMemoryProvider {
    fn snapshot(&self, date: NaiveDate) -> Option<MarketData> {
        self.snapshots.get(&date).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(day: u32, spot: f64) -> MarketData {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        MarketData::new("SPY", timestamp, spot, 0.05, 0.0, vec![]).unwrap()
    }

    #[test]
    fn test_later_snapshot_replaces_same_date() {
        let provider = InMemoryProvider::from_snapshots([snapshot(3, 470.0), snapshot(3, 472.0)]);
        assert_eq!(provider.len(), 1);
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(provider.snapshot(date).unwrap().spot, 472.0);
    }

    #[test]
    fn test_dates_ascending() {
        let mut provider = InMemoryProvider::from_snapshots([snapshot(5, 1.0), snapshot(2, 1.0)]);
        let dates: Vec<u32> = provider.dates().map(|d| d.format("%d").to_string().parse().unwrap()).collect();
        assert_eq!(dates, vec![2, 5]);
        provider.remove(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(provider.len(), 1);
    }
}
