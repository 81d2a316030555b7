use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::session::Session;

/// Date window applied to the visible session list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DateFilter {
    /// No date constraint.
    All,
    /// The trailing seven days, evaluated against "now".
    Week,
    /// The current calendar month, including days of it still to come.
    Month,
    /// One specific calendar month, as a half-open UTC interval.
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl DateFilter {
    /// Builds a filter from query parameters: `range` is one of
    /// `all|week|month|custom`, and `month` gives the `YYYY-MM` key a custom
    /// range refers to.
    pub fn from_query(range: Option<&str>, month: Option<&str>) -> Result<Self, AppError> {
        match range.unwrap_or("all") {
            "all" => Ok(DateFilter::All),
            "week" => Ok(DateFilter::Week),
            "month" => Ok(DateFilter::Month),
            "custom" => {
                let key = month.ok_or_else(|| {
                    AppError::validation("month", "a month (YYYY-MM) is required for a custom range")
                })?;
                let (year, month) = parse_month_key(key)?;
                let (start, end) = month_bounds(year, month).ok_or_else(|| {
                    AppError::validation("month", "not a valid calendar month")
                })?;
                Ok(DateFilter::Custom { start, end })
            }
            other => Err(AppError::validation(
                "range",
                format!("unknown range '{other}'; expected all, week, month or custom"),
            )),
        }
    }

    fn contains(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            DateFilter::All => true,
            DateFilter::Week => at >= now - Duration::days(7),
            DateFilter::Month => match month_bounds(now.year(), now.month()) {
                Some((start, end)) => at >= start && at < end,
                None => true,
            },
            DateFilter::Custom { start, end } => at >= *start && at < *end,
        }
    }
}

/// Everything that scopes the visible session list: the selected client, an
/// optional project, and a date window.
#[derive(Debug, Clone)]
pub struct SessionFilter {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub date: DateFilter,
}

/// The sessions a selected client's ledger view shows, in input order.
///
/// This is a pure function over an already loaded list; the same filtered
/// subset feeds the list view, the aggregates and the CSV export, so the
/// three can never disagree.
pub fn visible_sessions(
    sessions: &[Session],
    filter: &SessionFilter,
    now: DateTime<Utc>,
) -> Vec<Session> {
    sessions
        .iter()
        .filter(|s| s.client_id == filter.client_id)
        .filter(|s| match filter.project_id {
            Some(project_id) => s.project_id == Some(project_id),
            None => true,
        })
        .filter(|s| filter.date.contains(s.occurred_at, now))
        .cloned()
        .collect()
}

fn parse_month_key(key: &str) -> Result<(i32, u32), AppError> {
    let invalid = || AppError::validation("month", "expected a YYYY-MM month key");
    let (year, month) = key.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Half-open UTC interval covering one calendar month.
fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single()?;
    Some((start, end))
}
