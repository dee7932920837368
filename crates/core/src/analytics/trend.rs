use crate::domain::metrics::TrendPoint;
use crate::time::period::{DateRange, Granularity};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Rolling window of `periods` consecutive periods ending with the one that contains `as_of`,
/// oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendSeriesBuilder {
    granularity: Granularity,
    periods: usize,
    as_of: NaiveDate,
}

impl TrendSeriesBuilder {
    pub fn new(granularity: Granularity, periods: usize, as_of: NaiveDate) -> Self {
        Self {
            granularity,
            periods,
            as_of,
        }
    }

    pub fn monthly(periods: usize, as_of: NaiveDate) -> Self {
        Self::new(Granularity::Month, periods, as_of)
    }

    /// Period windows, oldest first. `windows()[k].start` is `periods - 1 - k` periods before the
    /// start of the period containing `as_of`.
    pub fn windows(&self) -> Vec<DateRange> {
        let anchor = self.granularity.period_start(self.as_of);
        let n = self.periods as i32;
        (0..n)
            .map(|k| {
                let start = self.granularity.shift(anchor, -(n - 1 - k));
                DateRange::new(start, self.granularity.next(start))
            })
            .collect()
    }

    pub fn aggregate<'a, T, D, F>(&self, records: &'a [T], date: D, aggregate: F) -> Vec<TrendPoint>
    where
        D: Fn(&T) -> NaiveDate,
        F: Fn(&[&'a T]) -> Decimal,
    {
        self.windows()
            .into_iter()
            .map(|w| {
                let in_window: Vec<&'a T> = records.iter().filter(|r| w.contains(date(r))).collect();
                self.point(w.start, aggregate(&in_window))
            })
            .collect()
    }

    pub fn sum_by<T, D, V>(&self, records: &[T], date: D, value: V) -> Vec<TrendPoint>
    where
        D: Fn(&T) -> NaiveDate,
        V: Fn(&T) -> Decimal,
    {
        self.aggregate(records, date, |rows| rows.iter().map(|r| value(r)).sum())
    }

    pub fn count_by<T, D>(&self, records: &[T], date: D) -> Vec<TrendPoint>
    where
        D: Fn(&T) -> NaiveDate,
    {
        self.aggregate(records, date, |rows| Decimal::from(rows.len()))
    }

    /// Running total of `value` starting from zero at the oldest period; records before the window
    /// are not counted.
    pub fn cumulative_by<T, D, V>(&self, records: &[T], date: D, value: V) -> Vec<TrendPoint>
    where
        D: Fn(&T) -> NaiveDate,
        V: Fn(&T) -> Decimal,
    {
        let mut running = Decimal::ZERO;
        self.sum_by(records, date, value)
            .into_iter()
            .map(|mut p| {
                running += p.value;
                p.value = running;
                p
            })
            .collect()
    }

    /// Balance at the end of each period, back-solved from the only durably known figure: the
    /// current balance. The opening balance is `current_balance - sum(period net changes)`, so the
    /// last point equals `current_balance` exactly. Movements dated after the last window are
    /// treated as already reflected in `current_balance` and are ignored.
    pub fn running_balance<T, D, V>(
        &self,
        current_balance: Decimal,
        records: &[T],
        date: D,
        net_change: V,
    ) -> Vec<TrendPoint>
    where
        D: Fn(&T) -> NaiveDate,
        V: Fn(&T) -> Decimal,
    {
        let changes = self.sum_by(records, date, net_change);
        let total_change: Decimal = changes.iter().map(|p| p.value).sum();

        let mut balance = current_balance - total_change;
        changes
            .into_iter()
            .map(|mut p| {
                balance += p.value;
                p.value = balance;
                p
            })
            .collect()
    }

    fn point(&self, period_start: NaiveDate, value: Decimal) -> TrendPoint {
        TrendPoint {
            period_start,
            value,
            label: self.granularity.label(period_start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::MovementRecord;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn movement(date: NaiveDate, debit: Decimal, credit: Decimal) -> MovementRecord {
        MovementRecord {
            id: Uuid::new_v4(),
            subject_id: Uuid::nil(),
            occurred_date: date,
            debit_amount: debit,
            credit_amount: credit,
        }
    }

    #[test]
    fn twelve_points_ending_at_as_of_month() {
        let as_of = d(2026, 3, 17);
        let points = TrendSeriesBuilder::monthly(12, as_of).sum_by(
            &Vec::<MovementRecord>::new(),
            |m| m.occurred_date,
            |m| m.debit_amount,
        );

        assert_eq!(points.len(), 12);
        assert_eq!(points[0].period_start, d(2025, 4, 1));
        assert_eq!(points[11].period_start, d(2026, 3, 1));
        assert_eq!(points[11].label, "Mar 2026");
        for pair in points.windows(2) {
            assert_eq!(Granularity::Month.next(pair[0].period_start), pair[1].period_start);
        }
        let last = DateRange::month_of(points[11].period_start);
        assert!(last.contains(as_of));
    }

    #[test]
    fn one_record_per_month() {
        let as_of = d(2026, 6, 10);
        let records: Vec<MovementRecord> = (1..=6)
            .map(|m| movement(d(2026, m, 5), dec!(100), Decimal::ZERO))
            .collect();

        let points =
            TrendSeriesBuilder::monthly(6, as_of).sum_by(&records, |m| m.occurred_date, |m| m.debit_amount);
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.value == dec!(100)));
        assert_eq!(points[0].period_start, d(2026, 1, 1));
        assert_eq!(points[5].period_start, d(2026, 6, 1));
    }

    #[test]
    fn window_is_half_open() {
        let as_of = d(2026, 2, 28);
        let records = vec![
            movement(d(2026, 1, 31), dec!(1), Decimal::ZERO),
            movement(d(2026, 2, 1), dec!(10), Decimal::ZERO),
            movement(d(2026, 3, 1), dec!(100), Decimal::ZERO),
        ];
        let points =
            TrendSeriesBuilder::monthly(2, as_of).sum_by(&records, |m| m.occurred_date, |m| m.debit_amount);
        assert_eq!(points[0].value, dec!(1));
        assert_eq!(points[1].value, dec!(10));
    }

    #[test]
    fn running_balance_reconciles_to_current_balance() {
        let as_of = d(2026, 12, 3);
        let records = vec![
            movement(d(2024, 5, 1), dec!(999.99), Decimal::ZERO),
            movement(d(2026, 1, 14), dec!(0.1), Decimal::ZERO),
            movement(d(2026, 1, 20), dec!(0.2), Decimal::ZERO),
            movement(d(2026, 7, 2), Decimal::ZERO, dec!(333.333)),
            movement(d(2026, 12, 1), dec!(12.34), dec!(0.01)),
        ];
        let current = dec!(1234.56);

        let points = TrendSeriesBuilder::monthly(12, as_of).running_balance(
            current,
            &records,
            |m| m.occurred_date,
            |m| m.net(),
        );

        assert_eq!(points.len(), 12);
        assert_eq!(points[11].value, current);
        // January's change is on top of the back-solved opening balance.
        let opening = current - (dec!(0.3) - dec!(333.333) + dec!(12.33));
        assert_eq!(points[0].value, opening + dec!(0.3));
    }

    #[test]
    fn cumulative_and_count() {
        let as_of = d(2026, 3, 31);
        let records = vec![
            movement(d(2026, 1, 2), dec!(5), Decimal::ZERO),
            movement(d(2026, 3, 2), dec!(7), Decimal::ZERO),
            movement(d(2026, 3, 9), dec!(1), Decimal::ZERO),
        ];
        let builder = TrendSeriesBuilder::monthly(3, as_of);

        let cumulative = builder.cumulative_by(&records, |m| m.occurred_date, |m| m.debit_amount);
        let values: Vec<Decimal> = cumulative.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![dec!(5), dec!(5), dec!(13)]);

        let counts = builder.count_by(&records, |m| m.occurred_date);
        let values: Vec<Decimal> = counts.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![dec!(1), dec!(0), dec!(2)]);
    }

    #[test]
    fn quarterly_windows() {
        let windows = TrendSeriesBuilder::new(Granularity::Quarter, 4, d(2026, 2, 14)).windows();
        let starts: Vec<NaiveDate> = windows.iter().map(|w| w.start).collect();
        assert_eq!(
            starts,
            vec![d(2025, 4, 1), d(2025, 7, 1), d(2025, 10, 1), d(2026, 1, 1)]
        );
    }
}
