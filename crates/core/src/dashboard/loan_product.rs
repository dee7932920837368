use super::error::not_found;
use super::{SubjectKind, RECENT_ITEMS, TREND_MONTHS};
use crate::analytics::alerts::{AlertDraft, AlertEvaluator};
use crate::analytics::trend::TrendSeriesBuilder;
use crate::analytics::{aging, average, ratio_percent, risk};
use crate::domain::metrics::{AgingReport, Alert, RiskSnapshot, SeverityCounts, Severity, TrendPoint};
use crate::domain::records::{Loan, LoanStatus, MovementRecord, Obligation, ScheduleLine};
use crate::domain::subjects::LoanProduct;
use crate::repo::MicrofinanceRepository;
use crate::time::period::days_between;
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

const PAR30_CRITICAL: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
const PAR30_WARNING: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const WRITE_OFF_CRITICAL: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const PENDING_BACKLOG: usize = 5;
const QUIET_AFTER_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProductOverview {
    pub total_loans: usize,
    pub active_loans: usize,
    pub pending_loans: usize,
    pub approved_loans: usize,
    pub closed_loans: usize,
    pub rejected_loans: usize,
    pub written_off_loans: usize,
    pub total_disbursed: Decimal,
    /// Principal plus interest still owed on active loans.
    pub total_outstanding: Decimal,
    pub average_interest_rate: Decimal,
    pub average_loan_size: Decimal,
    pub average_term_months: i64,
    pub total_borrowers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentMetrics {
    pub total_repayments: usize,
    pub total_collected: Decimal,
    pub total_scheduled: Decimal,
    pub collection_rate: Decimal,
    pub average_repayment: Decimal,
    pub overdue_installments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusShare {
    pub status: LoanStatus,
    pub count: usize,
    pub total_principal: Decimal,
    pub percent_of_loans: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentDisbursement {
    pub loan_id: Uuid,
    pub member_id: Uuid,
    pub principal_amount: Decimal,
    pub disbursement_date: NaiveDate,
    pub status: LoanStatus,
    pub outstanding_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProductDashboard {
    pub product: LoanProduct,
    pub as_of: NaiveDate,
    pub overview: LoanProductOverview,
    pub risk: RiskSnapshot,
    pub installment_aging: AgingReport,
    pub repayments: RepaymentMetrics,
    pub status_distribution: Vec<StatusShare>,
    pub disbursement_trend: Vec<TrendPoint>,
    pub collection_trend: Vec<TrendPoint>,
    pub recent_disbursements: Vec<RecentDisbursement>,
    pub alerts: Vec<Alert>,
    /// Tallied before the alert list is capped.
    pub alert_counts: SeverityCounts,
}

pub async fn build(
    repo: &dyn MicrofinanceRepository,
    product_id: Uuid,
    as_of: NaiveDate,
) -> anyhow::Result<LoanProductDashboard> {
    let (product, loans) = tokio::try_join!(
        repo.get_loan_product(product_id),
        repo.list_loans_by_product(product_id),
    )?;
    let product = product.ok_or_else(|| not_found(SubjectKind::LoanProduct, product_id))?;

    let loan_ids: Vec<Uuid> = loans.iter().map(|l| l.id).collect();
    let (schedules, repayments) = tokio::try_join!(
        repo.list_schedules_by_loans(&loan_ids),
        repo.list_repayments_by_loans(&loan_ids, None),
    )?;

    Ok(assemble(product, &loans, &schedules, &repayments, as_of))
}

fn assemble(
    product: LoanProduct,
    loans: &[Loan],
    schedules: &[ScheduleLine],
    repayments: &[MovementRecord],
    as_of: NaiveDate,
) -> LoanProductDashboard {
    let trend = TrendSeriesBuilder::monthly(TREND_MONTHS, as_of);
    let snapshot = risk::compute(loans, schedules, as_of);

    let unpaid: Vec<Obligation> = schedules
        .iter()
        .filter(|s| !s.is_paid)
        .map(ScheduleLine::to_obligation)
        .collect();

    let disbursed: Vec<&Loan> = loans.iter().filter(|l| l.disbursement_date.is_some()).collect();
    let mut recent = disbursed.clone();
    recent.sort_by(|a, b| b.disbursement_date.cmp(&a.disbursement_date));
    let recent_disbursements = recent
        .into_iter()
        .take(RECENT_ITEMS)
        .filter_map(|l| {
            l.disbursement_date.map(|date| RecentDisbursement {
                loan_id: l.id,
                member_id: l.member_id,
                principal_amount: l.principal_amount,
                disbursement_date: date,
                status: l.status,
                outstanding_balance: l.outstanding_total(),
            })
        })
        .collect();

    let quiet_since = as_of - Duration::days(QUIET_AFTER_DAYS);
    let facts = ProductFacts {
        par30: snapshot.par30,
        loans_30_days_overdue: loans_overdue_at_least(schedules, as_of, 30),
        pending: count_status(loans, LoanStatus::Pending),
        written_off: snapshot.written_off_count,
        total_loans: loans.len(),
        active: loans.iter().filter(|l| l.is_active()).count(),
        recent_disbursements: disbursed
            .iter()
            .filter(|l| l.disbursement_date.map_or(false, |d| d >= quiet_since))
            .count(),
    };
    let outcome = alert_rules().evaluate(product.id, &facts);

    LoanProductDashboard {
        as_of,
        overview: overview(loans),
        risk: snapshot,
        installment_aging: aging::classify(&unpaid, as_of),
        repayments: repayment_metrics(schedules, repayments, as_of),
        status_distribution: status_distribution(loans),
        disbursement_trend: trend.sum_by(
            &disbursed,
            |l| l.disbursement_date.unwrap_or(NaiveDate::MIN),
            |l| l.principal_amount,
        ),
        collection_trend: trend.sum_by(repayments, |r| r.occurred_date, |r| r.credit_amount),
        recent_disbursements,
        alerts: outcome.alerts,
        alert_counts: outcome.counts,
        product,
    }
}

fn count_status(loans: &[Loan], status: LoanStatus) -> usize {
    loans.iter().filter(|l| l.status == status).count()
}

fn overview(loans: &[Loan]) -> LoanProductOverview {
    let disbursed: Vec<&Loan> = loans.iter().filter(|l| l.disbursement_date.is_some()).collect();
    let borrowers: HashSet<Uuid> = loans.iter().map(|l| l.member_id).collect();
    LoanProductOverview {
        total_loans: loans.len(),
        active_loans: count_status(loans, LoanStatus::Disbursed),
        pending_loans: count_status(loans, LoanStatus::Pending),
        approved_loans: count_status(loans, LoanStatus::Approved),
        closed_loans: count_status(loans, LoanStatus::Closed),
        rejected_loans: count_status(loans, LoanStatus::Rejected),
        written_off_loans: count_status(loans, LoanStatus::WrittenOff),
        total_disbursed: disbursed.iter().map(|l| l.principal_amount).sum(),
        total_outstanding: loans
            .iter()
            .filter(|l| l.is_active())
            .map(|l| l.outstanding_total())
            .sum(),
        average_interest_rate: average(loans.iter().map(|l| l.interest_rate)),
        average_loan_size: average(disbursed.iter().map(|l| l.principal_amount)),
        average_term_months: average(loans.iter().map(|l| Decimal::from(l.term_months)))
            .trunc()
            .to_i64()
            .unwrap_or(0),
        total_borrowers: borrowers.len(),
    }
}

fn repayment_metrics(
    schedules: &[ScheduleLine],
    repayments: &[MovementRecord],
    as_of: NaiveDate,
) -> RepaymentMetrics {
    let total_collected: Decimal = repayments.iter().map(|r| r.credit_amount).sum();
    let total_scheduled: Decimal = schedules.iter().map(|s| s.total_amount).sum();
    RepaymentMetrics {
        total_repayments: repayments.len(),
        total_collected,
        total_scheduled,
        collection_rate: ratio_percent(total_collected, total_scheduled),
        average_repayment: average(repayments.iter().map(|r| r.credit_amount)),
        overdue_installments: schedules.iter().filter(|s| s.is_overdue(as_of)).count(),
    }
}

fn status_distribution(loans: &[Loan]) -> Vec<StatusShare> {
    let mut groups: BTreeMap<LoanStatus, (usize, Decimal)> = BTreeMap::new();
    for l in loans {
        let entry = groups.entry(l.status).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += l.principal_amount;
    }

    let total = Decimal::from(loans.len());
    let mut shares: Vec<StatusShare> = groups
        .into_iter()
        .map(|(status, (count, principal))| StatusShare {
            status,
            count,
            total_principal: principal,
            percent_of_loans: ratio_percent(Decimal::from(count), total),
        })
        .collect();
    // stable sort keeps status order among ties
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

/// Distinct loans with an unpaid installment at least `days` past due, whatever the loan's status.
fn loans_overdue_at_least(schedules: &[ScheduleLine], as_of: NaiveDate, days: i64) -> usize {
    schedules
        .iter()
        .filter(|s| s.is_overdue(as_of) && days_between(s.due_date, as_of) >= days)
        .map(|s| s.loan_id)
        .collect::<HashSet<_>>()
        .len()
}

struct ProductFacts {
    par30: Decimal,
    loans_30_days_overdue: usize,
    pending: usize,
    written_off: usize,
    total_loans: usize,
    active: usize,
    recent_disbursements: usize,
}

fn alert_rules() -> AlertEvaluator<ProductFacts> {
    AlertEvaluator::new(vec![portfolio_at_risk, pending_backlog, write_offs, no_recent_disbursements])
}

fn portfolio_at_risk(f: &ProductFacts) -> Option<AlertDraft> {
    if f.par30 > PAR30_CRITICAL {
        Some(AlertDraft::new(
            Severity::Critical,
            "High Portfolio at Risk",
            format!(
                "PAR 30 is at {:.1}% ({} loans). Industry standard is below 5%.",
                f.par30.round_dp(1),
                f.loans_30_days_overdue
            ),
        ))
    } else if f.par30 > PAR30_WARNING {
        Some(AlertDraft::new(
            Severity::Warning,
            "Elevated Portfolio at Risk",
            format!(
                "PAR 30 is at {:.1}%. Monitor closely to prevent further deterioration.",
                f.par30.round_dp(1)
            ),
        ))
    } else {
        None
    }
}

fn pending_backlog(f: &ProductFacts) -> Option<AlertDraft> {
    (f.pending > PENDING_BACKLOG).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Pending Loan Applications",
            format!("{} loan applications awaiting approval", f.pending),
        )
    })
}

fn write_offs(f: &ProductFacts) -> Option<AlertDraft> {
    let rate = ratio_percent(Decimal::from(f.written_off), Decimal::from(f.total_loans));
    (f.written_off > 0 && rate > WRITE_OFF_CRITICAL).then(|| {
        AlertDraft::new(
            Severity::Critical,
            "High Write-off Rate",
            format!("{} loans written off ({:.1}%)", f.written_off, rate.round_dp(1)),
        )
    })
}

fn no_recent_disbursements(f: &ProductFacts) -> Option<AlertDraft> {
    (f.recent_disbursements == 0 && f.active > 0).then(|| {
        AlertDraft::new(
            Severity::Info,
            "No Recent Disbursements",
            format!("No new loans disbursed in the last {QUIET_AFTER_DAYS} days"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::testkit::{d, installment, loan, payment};
    use crate::domain::metrics::AgingLabel;
    use crate::repo::InMemoryRepository;
    use rust_decimal_macros::dec;

    fn product() -> LoanProduct {
        LoanProduct {
            id: Uuid::new_v4(),
            code: "LP-SME".to_string(),
            name: "Small Business".to_string(),
            is_active: true,
            interest_rate: dec!(18),
            min_loan_amount: dec!(500),
            max_loan_amount: dec!(50000),
        }
    }

    #[tokio::test]
    async fn par_and_installment_aging_from_schedules() {
        let as_of = d(2026, 5, 15);
        let p = product();
        let late = loan(p.id, Uuid::new_v4(), LoanStatus::Disbursed, dec!(12000), dec!(10000), Some(d(2025, 11, 1)));
        let fine = loan(p.id, Uuid::new_v4(), LoanStatus::Disbursed, dec!(6000), dec!(5000), Some(d(2026, 5, 1)));
        let repo = InMemoryRepository {
            schedules: vec![
                installment(&late, d(2026, 4, 10), dec!(400), false),
                installment(&late, d(2026, 5, 10), dec!(400), false),
                installment(&fine, d(2026, 6, 1), dec!(300), false),
                installment(&late, d(2026, 3, 10), dec!(400), true),
            ],
            repayments: vec![payment(late.id, d(2026, 3, 9), dec!(400))],
            loans: vec![late.clone(), fine.clone()],
            loan_products: vec![p.clone()],
            ..Default::default()
        };

        let dash = build(&repo, p.id, as_of).await.unwrap();

        assert_eq!(dash.risk.par30.round_dp(2), dec!(66.67));
        assert_eq!(dash.risk.par60, Decimal::ZERO);
        assert_eq!(dash.risk.arrears_amount, dec!(800));
        assert_eq!(dash.installment_aging.amount(AgingLabel::Days31To60), dec!(400));
        assert_eq!(dash.installment_aging.amount(AgingLabel::Days1To30), dec!(400));
        assert_eq!(dash.installment_aging.amount(AgingLabel::Current), dec!(300));
        assert_eq!(dash.repayments.total_collected, dec!(400));
        assert_eq!(dash.repayments.total_scheduled, dec!(1500));
        assert_eq!(dash.repayments.collection_rate.round_dp(2), dec!(26.67));
        assert_eq!(dash.overview.total_disbursed, dec!(18000));
        assert_eq!(dash.overview.total_outstanding, dec!(15000));
        assert_eq!(dash.overview.total_borrowers, 2);
        assert_eq!(dash.recent_disbursements[0].loan_id, fine.id);

        assert_eq!(dash.alerts.len(), 1);
        assert_eq!(dash.alerts[0].severity, Severity::Critical);
        assert_eq!(
            dash.alerts[0].description,
            "PAR 30 is at 66.7% (1 loans). Industry standard is below 5%."
        );
        assert_eq!(dash.alert_counts.critical, 1);
    }

    #[test]
    fn overdue_loan_count_includes_written_off_arrears() {
        let p = product();
        let as_of = d(2026, 5, 15);
        let late = loan(p.id, Uuid::new_v4(), LoanStatus::Disbursed, dec!(12000), dec!(10000), Some(d(2025, 11, 1)));
        let gone = loan(p.id, Uuid::new_v4(), LoanStatus::WrittenOff, dec!(1000), dec!(800), Some(d(2025, 6, 1)));
        let schedules = vec![
            installment(&late, d(2026, 4, 10), dec!(400), false),
            installment(&late, d(2026, 4, 1), dec!(400), false),
            installment(&gone, d(2026, 3, 1), dec!(200), false),
            installment(&gone, d(2026, 5, 1), dec!(200), false),
        ];

        assert_eq!(loans_overdue_at_least(&schedules, as_of, 30), 2);
        assert_eq!(loans_overdue_at_least(&schedules, as_of, 60), 1);

        let dash = assemble(p, &[late, gone], &schedules, &[], as_of);
        assert_eq!(
            dash.alerts[0].description,
            "PAR 30 is at 100.0% (2 loans). Industry standard is below 5%."
        );
    }

    #[test]
    fn backlog_write_offs_and_quiet_product() {
        let p = product();
        let as_of = d(2026, 8, 1);
        let mut loans: Vec<Loan> = (0..6)
            .map(|_| loan(p.id, Uuid::new_v4(), LoanStatus::Pending, dec!(1000), dec!(1000), None))
            .collect();
        loans.push(loan(p.id, Uuid::new_v4(), LoanStatus::WrittenOff, dec!(1000), dec!(800), Some(d(2025, 1, 1))));
        loans.push(loan(p.id, Uuid::new_v4(), LoanStatus::Disbursed, dec!(2000), dec!(1500), Some(d(2026, 3, 1))));

        let dash = assemble(p, &loans, &[], &[], as_of);

        let titles: Vec<&str> = dash.alerts.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Pending Loan Applications", "High Write-off Rate", "No Recent Disbursements"]
        );
        assert_eq!(dash.alert_counts.total, 3);
        assert_eq!(dash.alert_counts.warning, 1);
        assert_eq!(dash.status_distribution[0].status, LoanStatus::Pending);
        assert_eq!(dash.status_distribution[0].percent_of_loans, dec!(75));
        assert_eq!(dash.overview.pending_loans, 6);
        assert_eq!(dash.disbursement_trend.iter().map(|t| t.value).sum::<Decimal>(), dec!(2000));
    }

    #[test]
    fn empty_product_is_quiet() {
        let dash = assemble(product(), &[], &[], &[], d(2026, 1, 1));
        assert_eq!(dash.risk, RiskSnapshot::default());
        assert_eq!(dash.repayments.collection_rate, Decimal::ZERO);
        assert!(dash.alerts.is_empty());
        assert_eq!(dash.alert_counts, SeverityCounts::default());
    }
}
