//! Pure aggregation functions shared by every dashboard. Nothing here performs I/O or reads the
//! wall clock; the as-of date is always passed in.

pub mod aging;
pub mod alerts;
pub mod compare;
pub mod risk;
pub mod trend;

use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// `numerator / denominator * 100`, or zero when the denominator is not positive.
pub fn ratio_percent(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    numerator / denominator * HUNDRED
}

/// `numerator / denominator`, or zero when the denominator is not positive.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    numerator / denominator
}

pub fn average<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let mut sum = Decimal::ZERO;
    let mut n: i64 = 0;
    for v in values {
        sum += v;
        n += 1;
    }
    safe_div(sum, Decimal::from(n))
}
