//! Filter selections and the period resolver
//!
//! A [`FilterSelection`] names a user and two calendar periods. Resolving one
//! of its period fields yields the half-open date range sent to the
//! aggregation backend as `createdAtGte` / `createdAtLt`.

use chrono::{Datelike, Days, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Date format used on the wire
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A named, calendar-aligned period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    CurrentWeek,
    CurrentMonth,
    LastWeek,
    LastMonth,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::CurrentWeek,
        Period::CurrentMonth,
        Period::LastWeek,
        Period::LastMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::CurrentWeek => "current_week",
            Period::CurrentMonth => "current_month",
            Period::LastWeek => "last_week",
            Period::LastMonth => "last_month",
        }
    }

    /// Resolve this period against `today`.
    pub fn range(&self, today: NaiveDate, week_start: WeekStart) -> Result<DateRange> {
        match self {
            Period::CurrentWeek => {
                let start = week_start.start_of_week(today)?;
                Ok(DateRange::new(start, add_days(start, 7)?))
            }
            Period::CurrentMonth => {
                let start = start_of_month(today)?;
                Ok(DateRange::new(start, add_months(start, 1)?))
            }
            Period::LastWeek => {
                let end = week_start.start_of_week(today)?;
                Ok(DateRange::new(sub_days(end, 7)?, end))
            }
            Period::LastMonth => {
                let end = start_of_month(today)?;
                Ok(DateRange::new(sub_months(end, 1)?, end))
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "current_week" => Ok(Period::CurrentWeek),
            "current_month" => Ok(Period::CurrentMonth),
            "last_week" => Ok(Period::LastWeek),
            "last_month" => Ok(Period::LastMonth),
            other => Err(Error::UnknownPeriod(other.to_string())),
        }
    }
}

/// Comparison period: either `none` or one of the concrete periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComparePeriod {
    #[default]
    None,
    CurrentWeek,
    CurrentMonth,
    LastWeek,
    LastMonth,
}

impl ComparePeriod {
    pub const ALL: [ComparePeriod; 5] = [
        ComparePeriod::None,
        ComparePeriod::CurrentWeek,
        ComparePeriod::CurrentMonth,
        ComparePeriod::LastWeek,
        ComparePeriod::LastMonth,
    ];

    /// The concrete period, or `None` when no comparison is requested
    pub fn period(&self) -> Option<Period> {
        match self {
            ComparePeriod::None => None,
            ComparePeriod::CurrentWeek => Some(Period::CurrentWeek),
            ComparePeriod::CurrentMonth => Some(Period::CurrentMonth),
            ComparePeriod::LastWeek => Some(Period::LastWeek),
            ComparePeriod::LastMonth => Some(Period::LastMonth),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.period().map(|p| p.as_str()).unwrap_or("none")
    }
}

impl From<Period> for ComparePeriod {
    fn from(period: Period) -> Self {
        match period {
            Period::CurrentWeek => ComparePeriod::CurrentWeek,
            Period::CurrentMonth => ComparePeriod::CurrentMonth,
            Period::LastWeek => ComparePeriod::LastWeek,
            Period::LastMonth => ComparePeriod::LastMonth,
        }
    }
}

impl fmt::Display for ComparePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparePeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "none" {
            return Ok(ComparePeriod::None);
        }
        s.parse::<Period>().map(ComparePeriod::from)
    }
}

/// First day of the week used to align weekly periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    pub fn start_of_week(&self, date: NaiveDate) -> Result<NaiveDate> {
        let offset = match self {
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
            WeekStart::Monday => date.weekday().num_days_from_monday(),
        };
        sub_days(date, u64::from(offset))
    }
}

/// Which period field of a [`FilterSelection`] to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodField {
    Period,
    Compare,
}

impl PeriodField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodField::Period => "period",
            PeriodField::Compare => "period_compare",
        }
    }
}

/// Half-open calendar date range `[start_inclusive, end_exclusive)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start_inclusive: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl DateRange {
    pub fn new(start_inclusive: NaiveDate, end_exclusive: NaiveDate) -> Self {
        Self {
            start_inclusive,
            end_exclusive,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_inclusive <= date && date < self.end_exclusive
    }

    pub fn num_days(&self) -> i64 {
        (self.end_exclusive - self.start_inclusive).num_days()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start_inclusive.format(DATE_FORMAT),
            self.end_exclusive.format(DATE_FORMAT)
        )
    }
}

/// Dashboard filter state shared between the form and the fetcher
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSelection {
    pub user: Uuid,
    pub period: Period,
    #[serde(default)]
    pub period_compare: ComparePeriod,
}

impl FilterSelection {
    pub fn new(user: Uuid, period: Period, period_compare: ComparePeriod) -> Self {
        Self {
            user,
            period,
            period_compare,
        }
    }

    /// Build a selection from raw form values, rejecting unknown periods
    pub fn parse(user: &str, period: &str, period_compare: &str) -> Result<Self> {
        let user = Uuid::parse_str(user.trim())
            .map_err(|e| Error::InvalidUser(format!("'{}': {}", user, e)))?;
        Ok(Self {
            user,
            period: period.parse()?,
            period_compare: period_compare.parse()?,
        })
    }

    pub fn period_for(&self, field: PeriodField) -> Option<Period> {
        match field {
            PeriodField::Period => Some(self.period),
            PeriodField::Compare => self.period_compare.period(),
        }
    }

    /// Resolve one period field into query variables.
    ///
    /// Returns `Ok(None)` when the comparison field is `none`; the fetch for
    /// that field must then be skipped.
    pub fn resolve(
        &self,
        field: PeriodField,
        today: NaiveDate,
        week_start: WeekStart,
    ) -> Result<Option<PeriodQuery>> {
        let Some(period) = self.period_for(field) else {
            return Ok(None);
        };
        let range = period.range(today, week_start)?;
        Ok(Some(PeriodQuery {
            user_id: self.user,
            range,
        }))
    }

    /// Resolve against the local wall clock
    pub fn resolve_now(
        &self,
        field: PeriodField,
        week_start: WeekStart,
    ) -> Result<Option<PeriodQuery>> {
        self.resolve(field, Local::now().date_naive(), week_start)
    }
}

/// A resolved aggregate query: one user, one date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodQuery {
    pub user_id: Uuid,
    pub range: DateRange,
}

impl PeriodQuery {
    pub fn variables(&self) -> QueryVariables {
        QueryVariables {
            user_id: self.user_id,
            created_at_gte: self.range.start_inclusive.format(DATE_FORMAT).to_string(),
            created_at_lt: self.range.end_exclusive.format(DATE_FORMAT).to_string(),
        }
    }
}

/// GraphQL variables `{ userId, createdAtGte, createdAtLt }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryVariables {
    pub user_id: Uuid,
    pub created_at_gte: String,
    pub created_at_lt: String,
}

fn start_of_month(date: NaiveDate) -> Result<NaiveDate> {
    date.with_day(1)
        .ok_or_else(|| Error::DateOutOfRange(format!("no first day for {}", date)))
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} + {} days", date, days)))
}

fn sub_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} - {} days", date, days)))
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} + {} months", date, months)))
}

fn sub_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_sub_months(Months::new(months))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} - {} months", date, months)))
}
