//! Trade records and the immutable record set shared by every analysis.

use crate::domain::error::BtlensError;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Trading day of the week. Weekend entries are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl DayOfWeek {
    /// Canonical Monday → Friday order.
    pub const ALL: [DayOfWeek; 5] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
    ];

    pub fn from_date(date: NaiveDate) -> Option<Self> {
        match date.weekday() {
            Weekday::Mon => Some(DayOfWeek::Monday),
            Weekday::Tue => Some(DayOfWeek::Tuesday),
            Weekday::Wed => Some(DayOfWeek::Wednesday),
            Weekday::Thu => Some(DayOfWeek::Thursday),
            Weekday::Fri => Some(DayOfWeek::Friday),
            Weekday::Sat | Weekday::Sun => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
        }
    }

    /// Position in the canonical order, 0 for Monday.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a trading day: {0}")]
pub struct ParseDayError(pub String);

impl FromStr for DayOfWeek {
    type Err = ParseDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Ok(DayOfWeek::Monday),
            "tuesday" | "tue" => Ok(DayOfWeek::Tuesday),
            "wednesday" | "wed" => Ok(DayOfWeek::Wednesday),
            "thursday" | "thu" => Ok(DayOfWeek::Thursday),
            "friday" | "fri" => Ok(DayOfWeek::Friday),
            _ => Err(ParseDayError(s.trim().to_string())),
        }
    }
}

/// Bucket size for time-based breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodGranularity {
    Month,
    Quarter,
    Year,
}

impl FromStr for PeriodGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "month" | "monthly" => Ok(PeriodGranularity::Month),
            "quarter" | "quarterly" => Ok(PeriodGranularity::Quarter),
            "year" | "yearly" => Ok(PeriodGranularity::Year),
            other => Err(format!("unknown period granularity: {other}")),
        }
    }
}

/// A calendar bucket of entry dates. Orders chronologically within one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year(i32),
}

impl Period {
    pub fn of(date: NaiveDate, granularity: PeriodGranularity) -> Self {
        match granularity {
            PeriodGranularity::Month => Period::Month {
                year: date.year(),
                month: date.month(),
            },
            PeriodGranularity::Quarter => Period::Quarter {
                year: date.year(),
                quarter: (date.month() - 1) / 3 + 1,
            },
            PeriodGranularity::Year => Period::Year(date.year()),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month { year, month } => write!(f, "{year}-{month:02}"),
            Period::Quarter { year, quarter } => write!(f, "{year}-Q{quarter}"),
            Period::Year(year) => write!(f, "{year}"),
        }
    }
}

/// One closed trade of one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_date: NaiveDate,
    pub pnl: f64,
    pub day_of_week: DayOfWeek,
    pub stop_loss: String,
    pub strategy: String,
}

impl TradeRecord {
    /// Builds a record, deriving the day of week from `entry_date`.
    pub fn new(
        entry_date: NaiveDate,
        pnl: f64,
        stop_loss: impl Into<String>,
        strategy: impl Into<String>,
    ) -> Result<Self, BtlensError> {
        let day_of_week =
            DayOfWeek::from_date(entry_date).ok_or(BtlensError::WeekendEntry { date: entry_date })?;
        Ok(Self {
            entry_date,
            pnl,
            day_of_week,
            stop_loss: stop_loss.into(),
            strategy: strategy.into(),
        })
    }

    pub fn period(&self, granularity: PeriodGranularity) -> Period {
        Period::of(self.entry_date, granularity)
    }
}

/// Immutable, ordered collection of trade records.
///
/// Label orders are captured once at construction: `stop_losses()` and `strategies()`
/// list each distinct label in the order it was first observed.
#[derive(Debug, Clone, Default)]
pub struct TradeRecordSet {
    records: Vec<TradeRecord>,
    stop_losses: Vec<String>,
    strategies: Vec<String>,
}

impl TradeRecordSet {
    pub fn new(records: Vec<TradeRecord>) -> Self {
        let mut stop_losses: Vec<String> = Vec::new();
        let mut strategies: Vec<String> = Vec::new();
        for record in &records {
            if !stop_losses.contains(&record.stop_loss) {
                stop_losses.push(record.stop_loss.clone());
            }
            if !strategies.contains(&record.strategy) {
                strategies.push(record.strategy.clone());
            }
        }
        Self {
            records,
            stop_losses,
            strategies,
        }
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TradeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stop_losses(&self) -> &[String] {
        &self.stop_losses
    }

    pub fn strategies(&self) -> &[String] {
        &self.strategies
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.entry_date).max()
    }

    /// Number of distinct entry dates.
    pub fn trading_days(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.entry_date)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// The per-trade P/L values, in record order.
    pub fn pnl_pool(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.pnl).collect()
    }

    /// A new set holding the records accepted by `keep`, in their original order.
    pub fn subset<F>(&self, mut keep: F) -> TradeRecordSet
    where
        F: FnMut(&TradeRecord) -> bool,
    {
        TradeRecordSet::new(self.records.iter().filter(|r| keep(*r)).cloned().collect())
    }
}

impl FromIterator<TradeRecord> for TradeRecordSet {
    fn from_iter<I: IntoIterator<Item = TradeRecord>>(iter: I) -> Self {
        TradeRecordSet::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TradeRecordSet {
    type Item = &'a TradeRecord;
    type IntoIter = std::slice::Iter<'a, TradeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
