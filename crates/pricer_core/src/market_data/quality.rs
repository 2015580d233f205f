//! Data quality assessment for a ticker over a date range.
//!
//! A [`DataQualityReport`] records missing dates and anomalies seen while
//! consuming market data, and condenses them into a score in [0, 1]:
//!
//! ```text
//! score = max(0, 1 - 0.1 × missing_dates - 0.05 × anomalies)
//! ```

use super::error::MarketDataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score deduction per missing date.
const MISSING_DATE_PENALTY: f64 = 0.1;
/// Score deduction per anomaly.
const ANOMALY_PENALTY: f64 = 0.05;
/// Default threshold for [`DataQualityReport::is_high_quality`].
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.8;

/// Granularity of the assessed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// End-of-day bars.
    Daily,
    /// Intraday minute bars.
    Minute,
    /// Option chains.
    Options,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Daily => "daily",
            DataType::Minute => "minute",
            DataType::Options => "options",
        };
        write!(f, "{}", s)
    }
}

/// Data quality report for one ticker and data type.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_core::market_data::{DataQualityReport, DataType};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
/// let mut report = DataQualityReport::new("SPY", DataType::Options, start, end).unwrap();
///
/// report.add_missing_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
/// report.add_anomaly("crossed quote on SPY240119C00480000");
///
/// let score = report.calculate_quality_score();
/// assert!((score - 0.85).abs() < 1e-12);
/// assert!(report.is_high_quality(0.8));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    /// Ticker assessed.
    pub ticker: String,
    /// Data granularity.
    pub data_type: DataType,
    /// First date of the assessed range.
    pub start_date: NaiveDate,
    /// Last date of the assessed range.
    pub end_date: NaiveDate,
    /// Records successfully consumed.
    pub total_records: usize,
    /// Dates with no data, ascending and unique.
    pub missing_dates: Vec<NaiveDate>,
    /// Free-text anomaly descriptions.
    pub anomalies: Vec<String>,
    /// Score in [0, 1]; 1.0 until recalculated.
    pub quality_score: f64,
}

impl DataQualityReport {
    /// Creates an empty report with a perfect score.
    ///
    /// # Errors
    ///
    /// - `MarketDataError::EmptyTicker` for a blank ticker
    /// - `MarketDataError::InvalidDateRange` when `start > end`
    pub fn new(
        ticker: impl Into<String>,
        data_type: DataType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, MarketDataError> {
        let ticker = ticker.into();
        if ticker.trim().is_empty() {
            return Err(MarketDataError::EmptyTicker);
        }
        if start_date > end_date {
            return Err(MarketDataError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            ticker,
            data_type,
            start_date,
            end_date,
            total_records: 0,
            missing_dates: Vec::new(),
            anomalies: Vec::new(),
            quality_score: 1.0,
        })
    }

    /// Records a missing date; duplicates are ignored.
    pub fn add_missing_date(&mut self, date: NaiveDate) {
        if let Err(pos) = self.missing_dates.binary_search(&date) {
            self.missing_dates.insert(pos, date);
        }
    }

    /// Records an anomaly.
    pub fn add_anomaly(&mut self, anomaly: impl Into<String>) {
        self.anomalies.push(anomaly.into());
    }

    /// Increments the consumed record count.
    pub fn add_records(&mut self, count: usize) {
        self.total_records += count;
    }

    /// Recomputes, stores and returns the quality score.
    pub fn calculate_quality_score(&mut self) -> f64 {
        let score = 1.0
            - self.missing_dates.len() as f64 * MISSING_DATE_PENALTY
            - self.anomalies.len() as f64 * ANOMALY_PENALTY;
        self.quality_score = score.max(0.0);
        self.quality_score
    }

    /// Returns true when the stored score meets `threshold`.
    #[inline]
    pub fn is_high_quality(&self, threshold: f64) -> bool {
        self.quality_score >= threshold
    }

    /// Human-readable multi-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Data Quality Report for {} ({})\n\
             Date Range: {} to {}\n\
             Total Records: {}\n\
             Missing Dates: {}\n\
             Anomalies: {}\n\
             Quality Score: {:.2}",
            self.ticker,
            self.data_type,
            self.start_date,
            self.end_date,
            group_thousands(self.total_records),
            self.missing_dates.len(),
            self.anomalies.len(),
            self.quality_score
        )
    }
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
