use crate::domain::model::Period;
use crate::utils::error::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Length of the trailing window shown on the dashboard.
pub const DEFAULT_WINDOW_MONTHS: u32 = 24;

/// No CRM data exists before this month.
pub const DEFAULT_EARLIEST_MONTH: (i32, u32) = (2023, 5);

/// Months covering `window_months` back from the month of `today`, oldest first.
/// Months starting before `earliest_allowed` are left out.
pub fn generate_trailing_months(
    window_months: u32,
    earliest_allowed: &Period,
    today: NaiveDate,
) -> Vec<Period> {
    let mut periods = Vec::with_capacity(window_months as usize);
    let mut cursor = Period::containing(today);

    for _ in 0..window_months {
        if cursor.date_from() < earliest_allowed.date_from() {
            break;
        }
        periods.push(cursor);
        cursor = cursor.previous();
    }

    periods.reverse();
    periods
}

/// From the first instant of the current month up to `now`.
pub fn current_month_to_date(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (Period::containing_instant(now).date_from(), now)
}

/// From January 1st of the current year up to `now`.
pub fn year_to_date(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let january = Period::containing(today.with_ordinal(1).unwrap_or(today));
    (january.date_from(), now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSettings {
    pub window_months: u32,
    pub earliest_allowed: Period,
}

impl PeriodSettings {
    pub fn new(window_months: u32, earliest_allowed: Period) -> Self {
        Self {
            window_months,
            earliest_allowed,
        }
    }

    /// Builds settings from a `YYYY-MM` cutoff label.
    pub fn from_label(window_months: u32, earliest_month: &str) -> Result<Self> {
        Ok(Self::new(window_months, Period::parse(earliest_month)?))
    }

    pub fn trailing_months(&self, today: NaiveDate) -> Vec<Period> {
        generate_trailing_months(self.window_months, &self.earliest_allowed, today)
    }
}

impl Default for PeriodSettings {
    fn default() -> Self {
        let (year, month) = DEFAULT_EARLIEST_MONTH;
        Self {
            window_months: DEFAULT_WINDOW_MONTHS,
            earliest_allowed: Period::month(year, month)
                .unwrap_or_else(|_| Period::containing(NaiveDate::MIN)),
        }
    }
}
