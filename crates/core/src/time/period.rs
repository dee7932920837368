use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// ISO week, starting Monday.
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Month => first_of_month(date.year(), date.month()),
            Granularity::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                first_of_month(date.year(), month)
            }
            Granularity::Year => first_of_month(date.year(), 1),
        }
    }

    /// Moves a period start by `n` periods (negative goes back). Saturates at the calendar bounds.
    pub fn shift(self, start: NaiveDate, n: i32) -> NaiveDate {
        match self {
            Granularity::Week => start
                .checked_add_signed(Duration::weeks(n as i64))
                .unwrap_or(if n < 0 { NaiveDate::MIN } else { NaiveDate::MAX }),
            Granularity::Month => shift_months(start, n),
            Granularity::Quarter => shift_months(start, n.saturating_mul(3)),
            Granularity::Year => shift_months(start, n.saturating_mul(12)),
        }
    }

    pub fn next(self, start: NaiveDate) -> NaiveDate {
        self.shift(start, 1)
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Week => start.format("Wk %d %b %Y").to_string(),
            Granularity::Month => start.format("%b %Y").to_string(),
            Granularity::Quarter => format!("Q{} {}", start.month0() / 3 + 1, start.year()),
            Granularity::Year => start.year().to_string(),
        }
    }
}

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn month_of(date: NaiveDate) -> Self {
        let start = Granularity::Month.period_start(date);
        Self::new(start, Granularity::Month.next(start))
    }
}

pub fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

pub fn start_of_year(date: NaiveDate) -> NaiveDate {
    Granularity::Year.period_start(date)
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

fn shift_months(date: NaiveDate, n: i32) -> NaiveDate {
    let months = Months::new(n.unsigned_abs());
    let shifted = if n >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    };
    shifted.unwrap_or(if n < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}
