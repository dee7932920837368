use super::error::not_found;
use super::{Calendar, SubjectKind, RECENT_ITEMS, TREND_MONTHS};
use crate::analytics::alerts::{AlertDraft, AlertEvaluator};
use crate::analytics::trend::TrendSeriesBuilder;
use crate::analytics::{ratio_percent, risk};
use crate::domain::metrics::{Alert, RiskSnapshot, Severity, TrendPoint};
use crate::domain::records::{Loan, LoanStatus, MovementRecord, ScheduleLine};
use crate::domain::subjects::Staff;
use crate::repo::MicrofinanceRepository;
use crate::time::period::days_between;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub assigned_members: usize,
    pub active_loans: usize,
    /// Active loans with at least one overdue installment.
    pub overdue_loans: usize,
    pub outstanding_principal: Decimal,
    pub outstanding_interest: Decimal,
    pub risk: RiskSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthPerformance {
    pub loans_disbursed: usize,
    pub amount_disbursed: Decimal,
    pub applications_received: usize,
    pub loans_collected: usize,
    pub amount_collected: Decimal,
    pub amount_due: Decimal,
    /// Collected against installments falling due this month.
    pub collection_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedMember {
    pub member_id: Uuid,
    pub active_loans: usize,
    pub total_outstanding: Decimal,
    pub has_overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffDashboard {
    pub staff: Staff,
    pub as_of: NaiveDate,
    pub tenure_days: i64,
    pub portfolio: PortfolioSummary,
    pub this_month: MonthPerformance,
    pub repayment_trend: Vec<TrendPoint>,
    pub assigned_members: Vec<AssignedMember>,
    pub alerts: Vec<Alert>,
}

pub async fn build(
    repo: &dyn MicrofinanceRepository,
    staff_id: Uuid,
    as_of: NaiveDate,
) -> anyhow::Result<StaffDashboard> {
    let (staff, member_ids) = tokio::try_join!(
        repo.get_staff(staff_id),
        repo.list_assigned_member_ids(staff_id),
    )?;
    let staff = staff.ok_or_else(|| not_found(SubjectKind::Staff, staff_id))?;

    let loans = repo.list_loans_by_members(&member_ids).await?;
    let loan_ids: Vec<Uuid> = loans.iter().map(|l| l.id).collect();
    let (schedules, repayments) = tokio::try_join!(
        repo.list_schedules_by_loans(&loan_ids),
        repo.list_repayments_by_loans(&loan_ids, None),
    )?;

    Ok(assemble(staff, &member_ids, &loans, &schedules, &repayments, as_of))
}

fn assemble(
    staff: Staff,
    member_ids: &[Uuid],
    loans: &[Loan],
    schedules: &[ScheduleLine],
    repayments: &[MovementRecord],
    as_of: NaiveDate,
) -> StaffDashboard {
    let cal = Calendar::new(as_of);
    let overdue_loans: HashSet<Uuid> = schedules
        .iter()
        .filter(|s| s.is_overdue(as_of))
        .map(|s| s.loan_id)
        .collect();
    let active: Vec<&Loan> = loans.iter().filter(|l| l.is_active()).collect();

    let due_by = as_of + Duration::days(DUE_SOON_DAYS);
    let due_soon: HashSet<Uuid> = schedules
        .iter()
        .filter(|s| !s.is_paid && s.due_date >= as_of && s.due_date <= due_by)
        .map(|s| s.loan_id)
        .collect();

    let facts = StaffFacts {
        members_with_overdue: active
            .iter()
            .filter(|l| overdue_loans.contains(&l.id))
            .map(|l| l.member_id)
            .collect::<HashSet<_>>()
            .len(),
        pending_applications: loans.iter().filter(|l| l.status == LoanStatus::Pending).count(),
        loans_due_soon: active.iter().filter(|l| due_soon.contains(&l.id)).count(),
    };

    StaffDashboard {
        as_of,
        tenure_days: days_between(staff.joining_date, as_of),
        portfolio: PortfolioSummary {
            assigned_members: member_ids.len(),
            active_loans: active.len(),
            overdue_loans: active.iter().filter(|l| overdue_loans.contains(&l.id)).count(),
            outstanding_principal: active.iter().map(|l| l.outstanding_principal).sum(),
            outstanding_interest: active.iter().map(|l| l.outstanding_interest).sum(),
            risk: risk::compute(loans, schedules, as_of),
        },
        this_month: month_performance(loans, schedules, repayments, &cal),
        repayment_trend: TrendSeriesBuilder::monthly(TREND_MONTHS, as_of).sum_by(
            repayments,
            |r| r.occurred_date,
            |r| r.credit_amount,
        ),
        assigned_members: member_ids
            .iter()
            .take(RECENT_ITEMS)
            .map(|id| member_summary(*id, &active, &overdue_loans))
            .collect(),
        alerts: alert_rules().evaluate(staff.id, &facts).alerts,
        staff,
    }
}

fn month_performance(
    loans: &[Loan],
    schedules: &[ScheduleLine],
    repayments: &[MovementRecord],
    cal: &Calendar,
) -> MonthPerformance {
    let month = cal.this_month;
    let disbursed: Vec<&Loan> = loans
        .iter()
        .filter(|l| l.disbursement_date.map_or(false, |d| month.contains(d)))
        .collect();
    let collected: Vec<&MovementRecord> = repayments
        .iter()
        .filter(|r| month.contains(r.occurred_date))
        .collect();
    let amount_collected: Decimal = collected.iter().map(|r| r.credit_amount).sum();
    let amount_due: Decimal = schedules
        .iter()
        .filter(|s| month.contains(s.due_date))
        .map(|s| s.total_amount)
        .sum();

    MonthPerformance {
        loans_disbursed: disbursed.len(),
        amount_disbursed: disbursed.iter().map(|l| l.principal_amount).sum(),
        applications_received: loans.iter().filter(|l| month.contains(l.application_date)).count(),
        loans_collected: collected.iter().map(|r| r.subject_id).collect::<HashSet<_>>().len(),
        amount_collected,
        amount_due,
        collection_rate: ratio_percent(amount_collected, amount_due),
    }
}

fn member_summary(member_id: Uuid, active: &[&Loan], overdue_loans: &HashSet<Uuid>) -> AssignedMember {
    let loans: Vec<&&Loan> = active.iter().filter(|l| l.member_id == member_id).collect();
    AssignedMember {
        member_id,
        active_loans: loans.len(),
        total_outstanding: loans.iter().map(|l| l.outstanding_total()).sum(),
        has_overdue: loans.iter().any(|l| overdue_loans.contains(&l.id)),
    }
}

struct StaffFacts {
    members_with_overdue: usize,
    pending_applications: usize,
    loans_due_soon: usize,
}

fn alert_rules() -> AlertEvaluator<StaffFacts> {
    AlertEvaluator::new(vec![overdue_members, pending_applications, upcoming_due_dates])
}

fn overdue_members(f: &StaffFacts) -> Option<AlertDraft> {
    (f.members_with_overdue > 0).then(|| {
        AlertDraft::new(
            Severity::Critical,
            "Overdue Loans",
            format!("{} member(s) have overdue loan payments", f.members_with_overdue),
        )
    })
}

fn pending_applications(f: &StaffFacts) -> Option<AlertDraft> {
    (f.pending_applications > 0).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Pending Applications",
            format!("{} loan application(s) awaiting review", f.pending_applications),
        )
    })
}

fn upcoming_due_dates(f: &StaffFacts) -> Option<AlertDraft> {
    (f.loans_due_soon > 0).then(|| {
        AlertDraft::new(
            Severity::Info,
            "Upcoming Due Dates",
            format!("{} loan(s) due within the next week", f.loans_due_soon),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::is_not_found;
    use crate::dashboard::testkit::{d, installment, loan, payment};
    use crate::repo::memory::StaffAssignment;
    use crate::repo::InMemoryRepository;
    use rust_decimal_macros::dec;

    fn officer() -> Staff {
        Staff {
            id: Uuid::new_v4(),
            employee_number: "EMP-014".to_string(),
            full_name: "Dana Okafor".to_string(),
            status: "Active".to_string(),
            joining_date: d(2024, 6, 1),
        }
    }

    #[tokio::test]
    async fn portfolio_over_assigned_members() {
        let as_of = d(2026, 6, 20);
        let s = officer();
        let (m1, m2, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let product = Uuid::new_v4();
        let late = loan(product, m1, LoanStatus::Disbursed, dec!(5000), dec!(4000), Some(d(2026, 1, 10)));
        let fresh = loan(product, m2, LoanStatus::Disbursed, dec!(3000), dec!(3000), Some(d(2026, 6, 5)));
        let pending = loan(product, m2, LoanStatus::Pending, dec!(1000), dec!(1000), None);
        let other = loan(product, stranger, LoanStatus::Disbursed, dec!(9000), dec!(9000), Some(d(2026, 6, 1)));

        let repo = InMemoryRepository {
            schedules: vec![
                installment(&late, d(2026, 5, 10), dec!(500), false),
                installment(&late, d(2026, 6, 10), dec!(500), true),
                installment(&fresh, d(2026, 6, 25), dec!(300), false),
            ],
            repayments: vec![payment(late.id, d(2026, 6, 10), dec!(500))],
            loans: vec![late.clone(), fresh.clone(), pending, other],
            staff: vec![s.clone()],
            assignments: vec![
                StaffAssignment { staff_id: s.id, member_id: m1 },
                StaffAssignment { staff_id: s.id, member_id: m2 },
            ],
            ..Default::default()
        };

        let dash = build(&repo, s.id, as_of).await.unwrap();

        assert_eq!(dash.tenure_days, 749);
        assert_eq!(dash.portfolio.assigned_members, 2);
        assert_eq!(dash.portfolio.active_loans, 2);
        assert_eq!(dash.portfolio.overdue_loans, 1);
        assert_eq!(dash.portfolio.outstanding_principal, dec!(7000));
        assert_eq!(dash.portfolio.risk.par30, ratio_percent(dec!(4000), dec!(7000)));
        assert_eq!(dash.this_month.loans_disbursed, 1);
        assert_eq!(dash.this_month.amount_disbursed, dec!(3000));
        assert_eq!(dash.this_month.amount_collected, dec!(500));
        assert_eq!(dash.this_month.amount_due, dec!(800));
        assert_eq!(dash.this_month.collection_rate, dec!(62.5));
        assert_eq!(dash.repayment_trend.last().unwrap().value, dec!(500));
        assert!(dash.assigned_members[0].has_overdue);
        assert!(!dash.assigned_members[1].has_overdue);

        let titles: Vec<&str> = dash.alerts.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Overdue Loans", "Pending Applications", "Upcoming Due Dates"]);
        assert_eq!(dash.alerts[0].severity, Severity::Critical);
        assert_eq!(dash.alerts[0].description, "1 member(s) have overdue loan payments");
    }

    #[tokio::test]
    async fn staff_without_members() {
        let s = officer();
        let repo = InMemoryRepository {
            staff: vec![s.clone()],
            ..Default::default()
        };
        let dash = build(&repo, s.id, d(2026, 1, 1)).await.unwrap();
        assert_eq!(dash.portfolio.active_loans, 0);
        assert_eq!(dash.portfolio.risk, RiskSnapshot::default());
        assert_eq!(dash.this_month.collection_rate, Decimal::ZERO);
        assert!(dash.assigned_members.is_empty());
        assert!(dash.alerts.is_empty());

        let err = build(&repo, Uuid::new_v4(), d(2026, 1, 1)).await.unwrap_err();
        assert!(is_not_found(&err));
    }
}
