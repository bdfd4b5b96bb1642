//! Data Processor Module
//! Date coercion and date-range filtering of the Working Table.

use crate::data::schema::{has_date_column, DATE_COLUMN};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fmt;
use thiserror::Error;

/// Days between 0001-01-01 and 1970-01-01; Polars stores dates relative to the latter.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Inclusive calendar range. `start > end` is allowed and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}

/// Handles the Filter Stage.
pub struct DataProcessor;

impl DataProcessor {
    /// Parse a calendar date in any of the accepted layouts.
    pub fn parse_date(value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .or_else(|| {
                DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                    .map(|dt| dt.date())
            })
    }

    /// Convert the `Date` column to a date dtype. Unparseable values become null.
    ///
    /// Tables without a `Date` column are returned unchanged.
    pub fn coerce_dates(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        if !has_date_column(df) {
            return Ok(df.clone());
        }
        let column = df.column(DATE_COLUMN)?;
        if column.dtype() == &DataType::Date {
            return Ok(df.clone());
        }

        let as_text = column.cast(&DataType::String)?;
        let days: Vec<Option<i32>> = as_text
            .str()?
            .into_iter()
            .map(|value| value.and_then(Self::parse_date).map(date_to_days))
            .collect();

        let unparsed = days
            .iter()
            .filter(|d| d.is_none())
            .count()
            .saturating_sub(column.null_count());
        if unparsed > 0 {
            tracing::debug!("{} Date values could not be parsed", unparsed);
        }

        let dates = Series::new(DATE_COLUMN.into(), days).cast(&DataType::Date)?;
        let mut out = df.clone();
        out.with_column(dates)?;
        Ok(out)
    }

    /// Observed min/max of the `Date` column, used as the default selection.
    pub fn date_bounds(df: &DataFrame) -> Option<DateRange> {
        let column = df.column(DATE_COLUMN).ok()?;
        if column.dtype() != &DataType::Date {
            return None;
        }
        let days = column.cast(&DataType::Int32).ok()?;
        let days = days.i32().ok()?;
        let start = days_to_date(days.min()?)?;
        let end = days_to_date(days.max()?)?;
        Some(DateRange::new(start, end))
    }

    /// Keep rows whose date lies in the inclusive range. Null dates are dropped.
    pub fn filter_by_date(df: &DataFrame, range: DateRange) -> Result<DataFrame, ProcessorError> {
        if !has_date_column(df) {
            return Ok(df.clone());
        }
        let df = Self::coerce_dates(df)?;

        let day = col(DATE_COLUMN).cast(DataType::Int32);
        let filtered = df
            .lazy()
            .filter(
                day.clone()
                    .gt_eq(lit(date_to_days(range.start)))
                    .and(day.lt_eq(lit(date_to_days(range.end)))),
            )
            .collect()?;
        Ok(filtered)
    }
}
