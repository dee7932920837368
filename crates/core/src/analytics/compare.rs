use crate::analytics::trend::TrendSeriesBuilder;
use crate::domain::metrics::{ComparisonResult, MonthlyComparison};
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Period-over-period change. `change_percent` is zero whenever `previous <= 0`, so a negative base
/// never flips the sign and a zero base never divides.
pub fn compare(current: Decimal, previous: Decimal) -> ComparisonResult {
    let change_percent = if previous > Decimal::ZERO {
        (current - previous) / previous * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };
    ComparisonResult {
        current_value: current,
        previous_value: previous,
        change_percent,
    }
}

/// Like [`compare`] but relative to `|previous|`, for signed figures such as account balances.
/// Zero only when `previous` is exactly zero.
pub fn compare_magnitude(current: Decimal, previous: Decimal) -> ComparisonResult {
    let change_percent = if previous.is_zero() {
        Decimal::ZERO
    } else {
        (current - previous) / previous.abs() * Decimal::ONE_HUNDRED
    };
    ComparisonResult {
        current_value: current,
        previous_value: previous,
        change_percent,
    }
}

/// One row per month for the `months` months ending with `as_of`'s month, oldest first. Each
/// month's total is compared with the month before it (which may fall outside the table).
pub fn monthly_performance<T, D, V>(
    records: &[T],
    date: D,
    value: V,
    months: usize,
    as_of: NaiveDate,
) -> Vec<MonthlyComparison>
where
    D: Fn(&T) -> NaiveDate,
    V: Fn(&T) -> Decimal,
{
    let builder = TrendSeriesBuilder::monthly(months + 1, as_of);
    let sums = builder.sum_by(records, &date, value);
    let counts = builder.count_by(records, &date);

    sums.windows(2)
        .zip(counts.iter().skip(1))
        .map(|(pair, count)| {
            let (previous, current) = (&pair[0], &pair[1]);
            MonthlyComparison {
                period_start: current.period_start,
                month: current.period_start.format("%B").to_string(),
                year: current.period_start.year(),
                comparison: compare(current.value, previous.value),
                transaction_count: count.value.to_usize().unwrap_or(0),
            }
        })
        .collect()
}
