//! Recoverable events recorded during a run.
//!
//! Nothing here aborts a run; the log is returned with the results and
//! condensed into a [`DataQualityReport`].

use chrono::NaiveDate;
use pricer_core::market_data::{DataQualityReport, DataType, MarketDataError};
use pricer_pricing::ModelId;
use serde::{Deserialize, Serialize};

use crate::position::PositionId;

/// One recoverable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// No usable snapshot or surface; marks carried forward.
    DataGap {
        /// Skipped date
        date: NaiveDate,
        /// Why the date was skipped
        reason: String,
    },
    /// The surface failed to build; the last validated one was reused.
    StaleSurface {
        /// Date of the failed build
        date: NaiveDate,
        /// Date the reused surface was built
        surface_date: NaiveDate,
        /// Build error
        reason: String,
    },
    /// A quote was left out of the day's surface.
    ExcludedQuote {
        /// Date of the snapshot
        date: NaiveDate,
        /// Contract symbol
        symbol: String,
        /// Why it was excluded
        reason: String,
    },
    /// A valuation used the Black-Scholes fallback.
    ModelFallback {
        /// Valuation date
        date: NaiveDate,
        /// Contract symbol
        symbol: String,
        /// Model that failed
        model: ModelId,
    },
    /// An order could not be executed.
    OrderRejected {
        /// Order date
        date: NaiveDate,
        /// Position concerned, for close orders
        position: Option<PositionId>,
        /// Why it was rejected
        reason: String,
    },
}

impl DiagnosticEvent {
    /// Date the event refers to.
    pub fn date(&self) -> NaiveDate {
        match self {
            DiagnosticEvent::DataGap { date, .. }
            | DiagnosticEvent::StaleSurface { date, .. }
            | DiagnosticEvent::ExcludedQuote { date, .. }
            | DiagnosticEvent::ModelFallback { date, .. }
            | DiagnosticEvent::OrderRejected { date, .. } => *date,
        }
    }
}

/// Ordered log of diagnostic events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    events: Vec<DiagnosticEvent>,
}

impl Diagnostics {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&mut self, event: DiagnosticEvent) {
        self.events.push(event);
    }

    /// Events in recording order.
    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Dates skipped for lack of data.
    pub fn data_gaps(&self) -> Vec<NaiveDate> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DiagnosticEvent::DataGap { date, .. } => Some(*date),
                _ => None,
            })
            .collect()
    }

    /// Number of fallback valuations.
    pub fn fallback_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DiagnosticEvent::ModelFallback { .. }))
            .count()
    }

    /// Number of days marked with a reused surface.
    pub fn stale_surface_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DiagnosticEvent::StaleSurface { .. }))
            .count()
    }

    /// Quality report over `[start, end]`: data gaps become missing dates,
    /// excluded quotes and stale surfaces become anomalies.
    ///
    /// # Errors
    ///
    /// `MarketDataError` for an empty ticker or inverted range.
    pub fn quality_report(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        records: usize,
    ) -> Result<DataQualityReport, MarketDataError> {
        let mut report = DataQualityReport::new(ticker, DataType::Options, start, end)?;
        report.add_records(records);
        for event in &self.events {
            match event {
                DiagnosticEvent::DataGap { date, .. } => report.add_missing_date(*date),
                DiagnosticEvent::ExcludedQuote {
                    date,
                    symbol,
                    reason,
                } => report.add_anomaly(format!("{} {}: {}", date, symbol, reason)),
                DiagnosticEvent::StaleSurface { date, reason, .. } => {
                    report.add_anomaly(format!("{} surface rejected: {}", date, reason))
                }
                DiagnosticEvent::ModelFallback { .. } | DiagnosticEvent::OrderRejected { .. } => {}
            }
        }
        report.calculate_quality_score();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    #[test]
    fn test_quality_report_from_events() {
        let mut log = Diagnostics::new();
        log.push(DiagnosticEvent::DataGap {
            date: date(3),
            reason: "no snapshot".to_string(),
        });
        log.push(DiagnosticEvent::ExcludedQuote {
            date: date(4),
            symbol: "SPY240419C00600000".to_string(),
            reason: "no bid".to_string(),
        });
        log.push(DiagnosticEvent::ModelFallback {
            date: date(4),
            symbol: "SPY240419C00500000".to_string(),
            model: ModelId::MonteCarlo,
        });

        let report = log.quality_report("SPY", date(1), date(30), 20).unwrap();
        assert_eq!(report.missing_dates, vec![date(3)]);
        assert_eq!(report.anomalies.len(), 1);
        assert!(report.anomalies[0].contains("no bid"));
        assert_eq!(report.total_records, 20);
        assert_relative_eq!(report.quality_score, 0.85, epsilon = 1e-12);
        assert_eq!(log.fallback_count(), 1);
        assert_eq!(log.data_gaps(), vec![date(3)]);
    }

    #[test]
    fn test_event_serde_tag() {
        let event = DiagnosticEvent::DataGap {
            date: date(8),
            reason: "holiday".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"event":"data_gap""#));
        assert_eq!(event.date(), date(8));
    }
}
