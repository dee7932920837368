use crate::analytics::ratio_percent;
use crate::domain::metrics::RiskSnapshot;
use crate::domain::records::{Loan, LoanStatus, ScheduleLine};
use crate::time::period::days_between;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

pub const PAR_THRESHOLDS: [i64; 4] = [1, 30, 60, 90];

#[derive(Debug, Clone, PartialEq)]
pub struct LoanDelinquency {
    pub loan_id: Uuid,
    pub member_id: Uuid,
    pub outstanding_principal: Decimal,
    /// Days since the oldest unpaid overdue installment fell due; 0 when nothing is overdue.
    pub days_overdue: i64,
    /// Unpaid part of the overdue installments (not the full principal).
    pub overdue_amount: Decimal,
}

pub fn delinquencies(
    loans: &[Loan],
    schedules: &[ScheduleLine],
    as_of: NaiveDate,
) -> Vec<LoanDelinquency> {
    let mut overdue_by_loan: HashMap<Uuid, (NaiveDate, Decimal)> = HashMap::new();
    for line in schedules.iter().filter(|s| s.is_overdue(as_of)) {
        let entry = overdue_by_loan
            .entry(line.loan_id)
            .or_insert((line.due_date, Decimal::ZERO));
        entry.0 = entry.0.min(line.due_date);
        entry.1 += line.unpaid_amount();
    }

    loans
        .iter()
        .filter(|l| l.is_active())
        .map(|loan| {
            let (days_overdue, overdue_amount) = match overdue_by_loan.get(&loan.id) {
                Some((oldest_due, amount)) => (days_between(*oldest_due, as_of).max(0), *amount),
                None => (0, Decimal::ZERO),
            };
            LoanDelinquency {
                loan_id: loan.id,
                member_id: loan.member_id,
                outstanding_principal: loan.outstanding_principal,
                days_overdue,
                overdue_amount,
            }
        })
        .collect()
}

/// Portfolio-at-risk tiers, write-off rate and arrears for a loan portfolio.
///
/// Each PAR-T sums the principal of loans at least T days overdue, so every tier's population is
/// a subset of the previous one and the percentages never increase with T.
pub fn compute(loans: &[Loan], schedules: &[ScheduleLine], as_of: NaiveDate) -> RiskSnapshot {
    let rows = delinquencies(loans, schedules, as_of);
    let total_outstanding: Decimal = rows.iter().map(|r| r.outstanding_principal).sum();

    let mut par = [Decimal::ZERO; PAR_THRESHOLDS.len()];
    for (idx, threshold) in PAR_THRESHOLDS.iter().enumerate() {
        let at_risk: Decimal = rows
            .iter()
            .filter(|r| r.days_overdue >= *threshold)
            .map(|r| r.outstanding_principal)
            .sum();
        par[idx] = ratio_percent(at_risk, total_outstanding);
    }

    let in_arrears: Vec<&LoanDelinquency> = rows.iter().filter(|r| r.days_overdue > 0).collect();
    let arrears_amount: Decimal = in_arrears.iter().map(|r| r.overdue_amount).sum();

    let written_off: Vec<&Loan> = loans
        .iter()
        .filter(|l| l.status == LoanStatus::WrittenOff)
        .collect();
    let written_off_amount: Decimal = written_off.iter().map(|l| l.outstanding_total()).sum();
    let total_disbursed: Decimal = loans
        .iter()
        .filter(|l| l.disbursement_date.is_some())
        .map(|l| l.principal_amount)
        .sum();

    RiskSnapshot {
        par1: par[0],
        par30: par[1],
        par60: par[2],
        par90: par[3],
        write_off_rate: ratio_percent(written_off_amount, total_disbursed),
        written_off_amount,
        written_off_count: written_off.len(),
        arrears_amount,
        arrears_count: in_arrears.len(),
        total_outstanding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 15).unwrap()
    }

    fn loan(status: LoanStatus, principal: Decimal, outstanding: Decimal) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            member_id: Uuid::new_v4(),
            status,
            principal_amount: principal,
            outstanding_principal: outstanding,
            outstanding_interest: Decimal::ZERO,
            interest_rate: dec!(12),
            term_months: 12,
            application_date: as_of() - Duration::days(400),
            disbursement_date: Some(as_of() - Duration::days(365)),
        }
    }

    fn installment(loan: &Loan, days_past_due: i64, amount: Decimal, is_paid: bool) -> ScheduleLine {
        ScheduleLine {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            due_date: as_of() - Duration::days(days_past_due),
            total_amount: amount,
            paid_amount: Decimal::ZERO,
            is_paid,
        }
    }

    #[test]
    fn par_from_oldest_overdue_installment() {
        let late = loan(LoanStatus::Disbursed, dec!(12000), dec!(10000));
        let fine = loan(LoanStatus::Disbursed, dec!(6000), dec!(5000));
        let schedules = vec![
            installment(&late, 35, dec!(400), false),
            installment(&late, 5, dec!(400), false),
            installment(&fine, 20, dec!(300), true),
            installment(&fine, -10, dec!(300), false),
        ];

        let snap = compute(&[late, fine], &schedules, as_of());
        assert_eq!(snap.par1.round_dp(2), dec!(66.67));
        assert_eq!(snap.par1, snap.par30);
        assert_eq!(snap.par60, Decimal::ZERO);
        assert_eq!(snap.par90, Decimal::ZERO);
        assert_eq!(snap.arrears_amount, dec!(800));
        assert_eq!(snap.arrears_count, 1);
        assert_eq!(snap.total_outstanding, dec!(15000));
    }

    #[test]
    fn tiers_never_increase() {
        let loans: Vec<Loan> = (0..6)
            .map(|i| loan(LoanStatus::Disbursed, dec!(1000), Decimal::from(1000 + i * 250)))
            .collect();
        let schedules: Vec<ScheduleLine> = loans
            .iter()
            .zip([0i64, 3, 31, 59, 61, 120])
            .filter(|(_, days)| *days > 0)
            .map(|(l, days)| installment(l, days, dec!(100), false))
            .collect();

        let snap = compute(&loans, &schedules, as_of());
        assert!(snap.par1 >= snap.par30);
        assert!(snap.par30 >= snap.par60);
        assert!(snap.par60 >= snap.par90);
        assert!(snap.par90 > Decimal::ZERO);
    }

    #[test]
    fn empty_portfolio_is_all_zero() {
        let snap = compute(&[], &[], as_of());
        assert_eq!(snap, RiskSnapshot::default());
    }

    #[test]
    fn write_off_rate_over_all_disbursed_principal() {
        let active = loan(LoanStatus::Disbursed, dec!(8000), dec!(4000));
        let mut gone = loan(LoanStatus::WrittenOff, dec!(2000), dec!(1500));
        gone.outstanding_interest = dec!(500);
        let mut pending = loan(LoanStatus::Pending, dec!(5000), dec!(5000));
        pending.disbursement_date = None;

        let snap = compute(&[active, gone, pending], &[], as_of());
        assert_eq!(snap.written_off_count, 1);
        assert_eq!(snap.written_off_amount, dec!(2000));
        assert_eq!(snap.write_off_rate, dec!(20));
        // written-off and pending loans are not part of the active portfolio
        assert_eq!(snap.total_outstanding, dec!(4000));
    }

    #[test]
    fn overdue_lines_of_inactive_loans_are_ignored() {
        let closed = loan(LoanStatus::Closed, dec!(1000), dec!(0));
        let schedules = vec![installment(&closed, 100, dec!(50), false)];
        let snap = compute(&[closed], &schedules, as_of());
        assert_eq!(snap.arrears_count, 0);
        assert_eq!(snap.par90, Decimal::ZERO);
    }
}
