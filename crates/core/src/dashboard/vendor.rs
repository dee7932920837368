use super::error::not_found;
use super::{issued_as_movements, Calendar, SubjectKind, PERFORMANCE_MONTHS, TREND_MONTHS};
use crate::analytics::aging::{self, PaymentTimeliness};
use crate::analytics::alerts::{AlertDraft, AlertEvaluator};
use crate::analytics::compare::{compare, monthly_performance};
use crate::analytics::safe_div;
use crate::analytics::trend::TrendSeriesBuilder;
use crate::domain::metrics::{AgingReport, Alert, ComparisonResult, MonthlyComparison, Severity, TrendPoint};
use crate::domain::records::{MovementRecord, Obligation, ObligationStatus};
use crate::domain::subjects::Vendor;
use crate::repo::AccountingRepository;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorFinancials {
    pub total_bills_amount: Decimal,
    pub total_bills_amount_ytd: Decimal,
    pub total_payments_amount: Decimal,
    pub total_payments_amount_ytd: Decimal,
    pub outstanding_balance: Decimal,
    pub overdue_balance: Decimal,
    pub average_bill_amount: Decimal,
    pub ytd_vs_last_year: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillCounts {
    pub total: usize,
    pub ytd: usize,
    pub draft: usize,
    pub pending: usize,
    pub partially_paid: usize,
    pub paid: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorPayments {
    pub total_payments: usize,
    pub total_payments_ytd: usize,
    pub average_payment_amount: Decimal,
    pub payments_this_month: usize,
    pub payments_this_month_amount: Decimal,
    pub timeliness: PaymentTimeliness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorDashboard {
    pub vendor: Vendor,
    pub as_of: NaiveDate,
    pub financials: VendorFinancials,
    pub bills: BillCounts,
    pub payments: VendorPayments,
    pub aging: AgingReport,
    pub bill_value_trend: Vec<TrendPoint>,
    pub payment_trend: Vec<TrendPoint>,
    pub balance_trend: Vec<TrendPoint>,
    pub monthly_performance: Vec<MonthlyComparison>,
    pub alerts: Vec<Alert>,
}

pub async fn build(
    repo: &dyn AccountingRepository,
    vendor_id: Uuid,
    as_of: NaiveDate,
) -> anyhow::Result<VendorDashboard> {
    let (vendor, bills, payments) = tokio::try_join!(
        repo.get_vendor(vendor_id),
        repo.list_bills_by_vendor(vendor_id, None),
        repo.list_vendor_payments(vendor_id, None),
    )?;
    let vendor = vendor.ok_or_else(|| not_found(SubjectKind::Vendor, vendor_id))?;

    Ok(assemble(vendor, &bills, &payments, as_of))
}

fn assemble(vendor: Vendor, bills: &[Obligation], payments: &[MovementRecord], as_of: NaiveDate) -> VendorDashboard {
    let cal = Calendar::new(as_of);
    let financials = financials(bills, payments, &cal);

    let trend = TrendSeriesBuilder::monthly(TREND_MONTHS, as_of);
    let mut movements = issued_as_movements(bills);
    movements.extend(payments.iter().cloned());

    let overdue: Vec<&Obligation> = bills.iter().filter(|b| b.is_overdue(as_of)).collect();
    let due_soon: Vec<&Obligation> = bills
        .iter()
        .filter(|b| b.is_open() && b.due_date >= as_of && b.due_date <= as_of + Duration::days(DUE_SOON_DAYS))
        .collect();
    let facts = VendorFacts {
        name: vendor.name.clone(),
        is_active: vendor.is_active,
        overdue_count: overdue.len(),
        overdue_total: overdue.iter().map(|b| b.balance()).sum(),
        due_soon_count: due_soon.len(),
        due_soon_total: due_soon.iter().map(|b| b.balance()).sum(),
    };

    VendorDashboard {
        as_of,
        bills: bill_counts(bills, &cal),
        payments: vendor_payments(payments, bills, &cal),
        aging: aging::classify(bills, as_of),
        bill_value_trend: trend.sum_by(bills, |b| b.issue_date, |b| b.total_amount),
        payment_trend: trend.sum_by(payments, |p| p.occurred_date, |p| p.credit_amount),
        balance_trend: trend.running_balance(
            financials.outstanding_balance,
            &movements,
            |m| m.occurred_date,
            |m| m.net(),
        ),
        monthly_performance: monthly_performance(
            bills,
            |b| b.issue_date,
            |b| b.total_amount,
            PERFORMANCE_MONTHS,
            as_of,
        ),
        alerts: alert_rules().evaluate(vendor.id, &facts).alerts,
        financials,
        vendor,
    }
}

fn financials(bills: &[Obligation], payments: &[MovementRecord], cal: &Calendar) -> VendorFinancials {
    let total: Decimal = bills.iter().map(|b| b.total_amount).sum();
    let ytd: Decimal = bills
        .iter()
        .filter(|b| cal.in_ytd(b.issue_date))
        .map(|b| b.total_amount)
        .sum();
    let last_year: Decimal = bills
        .iter()
        .filter(|b| cal.last_year.contains(b.issue_date))
        .map(|b| b.total_amount)
        .sum();

    VendorFinancials {
        total_bills_amount: total,
        total_bills_amount_ytd: ytd,
        total_payments_amount: payments.iter().map(|p| p.credit_amount).sum(),
        total_payments_amount_ytd: payments
            .iter()
            .filter(|p| cal.in_ytd(p.occurred_date))
            .map(|p| p.credit_amount)
            .sum(),
        outstanding_balance: bills.iter().filter(|b| b.is_open()).map(|b| b.balance()).sum(),
        overdue_balance: bills
            .iter()
            .filter(|b| b.is_overdue(cal.as_of))
            .map(|b| b.balance())
            .sum(),
        average_bill_amount: safe_div(total, Decimal::from(bills.len())),
        ytd_vs_last_year: compare(ytd, last_year),
    }
}

fn bill_counts(bills: &[Obligation], cal: &Calendar) -> BillCounts {
    let count_status = |s: ObligationStatus| bills.iter().filter(|b| b.status == s).count();
    BillCounts {
        total: bills.len(),
        ytd: bills.iter().filter(|b| cal.in_ytd(b.issue_date)).count(),
        draft: count_status(ObligationStatus::Draft),
        pending: count_status(ObligationStatus::Sent),
        partially_paid: count_status(ObligationStatus::PartiallyPaid),
        paid: count_status(ObligationStatus::Paid),
        overdue: bills.iter().filter(|b| b.is_overdue(cal.as_of)).count(),
    }
}

fn vendor_payments(payments: &[MovementRecord], bills: &[Obligation], cal: &Calendar) -> VendorPayments {
    let total: Decimal = payments.iter().map(|p| p.credit_amount).sum();
    let this_month: Vec<&MovementRecord> = payments
        .iter()
        .filter(|p| cal.this_month.contains(p.occurred_date))
        .collect();
    VendorPayments {
        total_payments: payments.len(),
        total_payments_ytd: payments.iter().filter(|p| cal.in_ytd(p.occurred_date)).count(),
        average_payment_amount: safe_div(total, Decimal::from(payments.len())),
        payments_this_month: this_month.len(),
        payments_this_month_amount: this_month.iter().map(|p| p.credit_amount).sum(),
        timeliness: aging::payment_timeliness(bills),
    }
}

struct VendorFacts {
    name: String,
    is_active: bool,
    overdue_count: usize,
    overdue_total: Decimal,
    due_soon_count: usize,
    due_soon_total: Decimal,
}

fn alert_rules() -> AlertEvaluator<VendorFacts> {
    AlertEvaluator::new(vec![overdue_bills, bills_due_soon, inactive])
}

fn overdue_bills(f: &VendorFacts) -> Option<AlertDraft> {
    (f.overdue_count > 0).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Overdue Bills",
            format!("{} overdue bills totaling {:.2}", f.overdue_count, f.overdue_total),
        )
    })
}

fn bills_due_soon(f: &VendorFacts) -> Option<AlertDraft> {
    (f.due_soon_count > 0).then(|| {
        AlertDraft::new(
            Severity::Info,
            "Bills Due Soon",
            format!(
                "{} bills due within {DUE_SOON_DAYS} days totaling {:.2}",
                f.due_soon_count, f.due_soon_total
            ),
        )
    })
}

fn inactive(f: &VendorFacts) -> Option<AlertDraft> {
    (!f.is_active).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Inactive Vendor",
            format!("Vendor {} is currently inactive", f.name),
        )
    })
}
