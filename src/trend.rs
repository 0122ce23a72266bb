//! Trend windows and summary statistics over a rate series

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::currency::Currency;
use crate::sources::{RateRecord, RateSource};

/// A trailing window ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendWindow {
    #[default]
    Days7,
    Days30,
    Months3,
    Months6,
    Year1,
}

impl TrendWindow {
    /// Parse a window token
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "7d" => Some(TrendWindow::Days7),
            "30d" => Some(TrendWindow::Days30),
            "3m" => Some(TrendWindow::Months3),
            "6m" => Some(TrendWindow::Months6),
            "1y" => Some(TrendWindow::Year1),
            _ => None,
        }
    }

    /// Window length in days
    pub fn days(&self) -> i64 {
        match self {
            TrendWindow::Days7 => 7,
            TrendWindow::Days30 => 30,
            TrendWindow::Months3 => 90,
            TrendWindow::Months6 => 180,
            TrendWindow::Year1 => 365,
        }
    }

    /// User-facing label
    pub fn label(&self) -> &'static str {
        match self {
            TrendWindow::Days7 => "7d",
            TrendWindow::Days30 => "30d",
            TrendWindow::Months3 => "3m",
            TrendWindow::Months6 => "6m",
            TrendWindow::Year1 => "1y",
        }
    }

    /// First day of a window ending at `end`, so the span covers
    /// exactly `days()` calendar dates
    pub fn start(&self, end: NaiveDate) -> NaiveDate {
        end - Duration::days(self.days() - 1)
    }

    /// All windows, shortest first
    pub fn all() -> [TrendWindow; 5] {
        [
            TrendWindow::Days7,
            TrendWindow::Days30,
            TrendWindow::Months3,
            TrendWindow::Months6,
            TrendWindow::Year1,
        ]
    }
}

/// One dated value inside a series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// An ascending, day-deduplicated rate series
///
/// Days with no stored rate are simply absent; a gappy series still renders
/// with the points it has.
#[derive(Debug, Clone)]
pub struct TrendSeries {
    pub currency: Currency,
    pub source: RateSource,
    pub window: TrendWindow,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Assemble a series from raw records, keeping only the matching
    /// currency, one point per date, ascending
    pub fn from_records(
        currency: Currency,
        source: RateSource,
        window: TrendWindow,
        records: &[RateRecord],
    ) -> Self {
        let mut points: Vec<TrendPoint> = records
            .iter()
            .filter(|r| r.currency == currency && r.source == source)
            .map(|r| TrendPoint {
                date: r.date,
                value: r.value,
            })
            .collect();
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            currency,
            source,
            window,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Summary statistics, or `None` when fewer than two points exist
    pub fn stats(&self) -> Option<TrendStats> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if self.points.len() < 2 {
            return None;
        }
        let min = self.points.iter().map(|p| p.value).min()?;
        let max = self.points.iter().map(|p| p.value).max()?;
        let sum: Decimal = self.points.iter().map(|p| p.value).sum();
        let avg = sum / Decimal::from(self.points.len() as u64);
        let change = last.value - first.value;
        let change_pct = change / first.value * Decimal::from(100);
        Some(TrendStats {
            min,
            max,
            avg,
            change,
            change_pct,
            first: first.clone(),
            last: last.clone(),
        })
    }
}

/// Movement over a series, computed exactly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendStats {
    pub min: Decimal,
    pub max: Decimal,
    pub avg: Decimal,
    pub change: Decimal,
    pub change_pct: Decimal,
    pub first: TrendPoint,
    pub last: TrendPoint,
}

impl TrendStats {
    pub fn direction(&self) -> TrendDirection {
        if self.change > Decimal::ZERO {
            TrendDirection::Up
        } else if self.change < Decimal::ZERO {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::Up => "↑",
            TrendDirection::Down => "↓",
            TrendDirection::Flat => "→",
        }
    }
}
