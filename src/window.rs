//! The inclusive `[lower, upper]` time range bounding collected articles.

use crate::error::ConfigError;
use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub lower: NaiveDateTime,
    pub upper: NaiveDateTime,
}

/// Where a timestamp falls relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Newer than the upper bound; skipped, scanning goes on.
    After,
    Inside,
    /// Older than the lower bound; listings are newest first, so scanning stops.
    Before,
}

impl DateWindow {
    pub fn new(lower: NaiveDateTime, upper: NaiveDateTime) -> Result<Self, ConfigError> {
        if lower > upper {
            return Err(ConfigError::InvalidWindow { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// Build the window from optional `YYYYMMDD` bounds.
    ///
    /// - no bounds: `[now - 1 month, now]`
    /// - `to` given: upper is `to` at the current time of day if `to` is
    ///   today, otherwise at 23:59:59; lower is upper minus one month
    /// - `from` given: lower is `from` at midnight
    pub fn resolve(
        now: NaiveDateTime,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut upper = now;
        if let Some(raw) = to {
            let day = parse_day(raw)?;
            upper = if day == now.date() {
                now
            } else {
                day.and_time(end_of_day())
            };
        }
        let mut lower = upper
            .checked_sub_months(Months::new(1))
            .unwrap_or(NaiveDateTime::MIN);
        if let Some(raw) = from {
            lower = parse_day(raw)?.and_time(NaiveTime::MIN);
        }
        Self::new(lower, upper)
    }

    pub fn position(&self, ts: NaiveDateTime) -> Position {
        if ts < self.lower {
            Position::Before
        } else if ts > self.upper {
            Position::After
        } else {
            Position::Inside
        }
    }

    #[cfg(test)]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.position(ts) == Position::Inside
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn parse_day(raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d").map_err(|_| ConfigError::InvalidDate {
        raw: raw.to_string(),
    })
}
