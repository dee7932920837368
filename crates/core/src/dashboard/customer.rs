use super::error::not_found;
use super::{issued_as_movements, Calendar, SubjectKind, PERFORMANCE_MONTHS, RECENT_ITEMS, TREND_MONTHS};
use crate::analytics::aging::{self, PaymentTimeliness};
use crate::analytics::alerts::{AlertDraft, AlertEvaluator};
use crate::analytics::compare::{compare, monthly_performance};
use crate::analytics::trend::TrendSeriesBuilder;
use crate::analytics::{ratio_percent, safe_div};
use crate::domain::metrics::{Alert, AgingReport, ComparisonResult, MonthlyComparison, Severity, TrendPoint};
use crate::domain::records::{MovementRecord, Obligation, ObligationStatus};
use crate::domain::subjects::Customer;
use crate::repo::AccountingRepository;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditMetrics {
    pub credit_limit: Decimal,
    pub current_balance: Decimal,
    /// Never negative.
    pub available_credit: Decimal,
    pub credit_utilization: Decimal,
    pub overdue_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMetrics {
    pub total_invoices: usize,
    pub total_invoices_ytd: usize,
    pub total_invoiced_amount: Decimal,
    pub draft_invoices: usize,
    pub sent_invoices: usize,
    pub paid_invoices: usize,
    pub overdue_invoices: usize,
    pub average_invoice_amount: Decimal,
    /// Year to date against the whole of last year.
    pub ytd_vs_last_year: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetrics {
    pub total_payments: usize,
    pub total_payments_ytd: usize,
    pub total_payment_amount: Decimal,
    pub total_payment_amount_ytd: Decimal,
    pub average_payment_amount: Decimal,
    pub payments_this_month: usize,
    pub payments_this_month_amount: Decimal,
    pub timeliness: PaymentTimeliness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAging {
    pub report: AgingReport,
    pub days_sales_outstanding: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentInvoice {
    pub id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub status: ObligationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDashboard {
    pub customer: Customer,
    pub as_of: NaiveDate,
    pub credit: CreditMetrics,
    pub invoices: InvoiceMetrics,
    pub payments: PaymentMetrics,
    pub aging: CustomerAging,
    pub invoice_value_trend: Vec<TrendPoint>,
    pub payment_trend: Vec<TrendPoint>,
    pub balance_trend: Vec<TrendPoint>,
    pub recent_invoices: Vec<RecentInvoice>,
    pub monthly_performance: Vec<MonthlyComparison>,
    pub alerts: Vec<Alert>,
}

pub async fn build(
    repo: &dyn AccountingRepository,
    customer_id: Uuid,
    as_of: NaiveDate,
) -> anyhow::Result<CustomerDashboard> {
    let (customer, invoices, payments) = tokio::try_join!(
        repo.get_customer(customer_id),
        repo.list_invoices_by_customer(customer_id, None),
        repo.list_payments_by_customer(customer_id, None),
    )?;
    let customer = customer.ok_or_else(|| not_found(SubjectKind::Customer, customer_id))?;

    Ok(assemble(customer, &invoices, &payments, as_of))
}

fn assemble(
    customer: Customer,
    invoices: &[Obligation],
    payments: &[MovementRecord],
    as_of: NaiveDate,
) -> CustomerDashboard {
    let cal = Calendar::new(as_of);
    let credit = credit_metrics(&customer, invoices, as_of);

    let report = aging::classify(invoices, as_of);
    let dso = aging::days_sales_outstanding(report.total, invoices, as_of);

    let trend = TrendSeriesBuilder::monthly(TREND_MONTHS, as_of);
    let invoice_value_trend = trend.sum_by(invoices, |o| o.issue_date, |o| o.total_amount);
    let payment_trend = trend.sum_by(payments, |p| p.occurred_date, |p| p.credit_amount);
    let mut movements = issued_as_movements(invoices);
    movements.extend(payments.iter().cloned());
    let balance_trend = trend.running_balance(
        customer.current_balance,
        &movements,
        |m| m.occurred_date,
        |m| m.net(),
    );

    let mut recent: Vec<&Obligation> = invoices.iter().collect();
    recent.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));
    let recent_invoices = recent
        .into_iter()
        .take(RECENT_ITEMS)
        .map(|o| RecentInvoice {
            id: o.id,
            issue_date: o.issue_date,
            due_date: o.due_date,
            total_amount: o.total_amount,
            paid_amount: o.paid_amount,
            balance_due: o.balance(),
            status: o.status,
        })
        .collect();

    let overdue: Vec<&Obligation> = invoices.iter().filter(|o| o.is_overdue(as_of)).collect();
    let facts = CustomerFacts {
        name: customer.name.clone(),
        is_active: customer.is_active,
        is_on_credit_hold: customer.is_on_credit_hold,
        credit_limit: customer.credit_limit,
        current_balance: customer.current_balance,
        overdue_count: overdue.len(),
        overdue_total: overdue.iter().map(|o| o.balance()).sum(),
    };
    let alerts = alert_rules().evaluate(customer.id, &facts).alerts;

    CustomerDashboard {
        as_of,
        credit,
        invoices: invoice_metrics(invoices, &cal),
        payments: payment_metrics(payments, invoices, &cal),
        aging: CustomerAging {
            report,
            days_sales_outstanding: dso,
        },
        invoice_value_trend,
        payment_trend,
        balance_trend,
        recent_invoices,
        monthly_performance: monthly_performance(
            invoices,
            |o| o.issue_date,
            |o| o.total_amount,
            PERFORMANCE_MONTHS,
            as_of,
        ),
        alerts,
        customer,
    }
}

fn credit_metrics(customer: &Customer, invoices: &[Obligation], as_of: NaiveDate) -> CreditMetrics {
    CreditMetrics {
        credit_limit: customer.credit_limit,
        current_balance: customer.current_balance,
        available_credit: (customer.credit_limit - customer.current_balance).max(Decimal::ZERO),
        credit_utilization: ratio_percent(customer.current_balance, customer.credit_limit),
        overdue_balance: invoices
            .iter()
            .filter(|o| o.is_overdue(as_of))
            .map(|o| o.balance())
            .sum(),
    }
}

fn invoice_metrics(invoices: &[Obligation], cal: &Calendar) -> InvoiceMetrics {
    let total: Decimal = invoices.iter().map(|o| o.total_amount).sum();
    let ytd: Vec<&Obligation> = invoices.iter().filter(|o| cal.in_ytd(o.issue_date)).collect();
    let last_year: Decimal = invoices
        .iter()
        .filter(|o| cal.last_year.contains(o.issue_date))
        .map(|o| o.total_amount)
        .sum();
    let count_status = |s: ObligationStatus| invoices.iter().filter(|o| o.status == s).count();

    InvoiceMetrics {
        total_invoices: invoices.len(),
        total_invoices_ytd: ytd.len(),
        total_invoiced_amount: total,
        draft_invoices: count_status(ObligationStatus::Draft),
        sent_invoices: count_status(ObligationStatus::Sent),
        paid_invoices: count_status(ObligationStatus::Paid),
        overdue_invoices: invoices
            .iter()
            .filter(|o| o.status == ObligationStatus::Overdue || o.is_overdue(cal.as_of))
            .count(),
        average_invoice_amount: safe_div(total, Decimal::from(invoices.len())),
        ytd_vs_last_year: compare(ytd.iter().map(|o| o.total_amount).sum(), last_year),
    }
}

fn payment_metrics(payments: &[MovementRecord], invoices: &[Obligation], cal: &Calendar) -> PaymentMetrics {
    let total: Decimal = payments.iter().map(|p| p.credit_amount).sum();
    let ytd: Vec<&MovementRecord> = payments.iter().filter(|p| cal.in_ytd(p.occurred_date)).collect();
    let this_month: Vec<&MovementRecord> = payments
        .iter()
        .filter(|p| cal.this_month.contains(p.occurred_date))
        .collect();

    PaymentMetrics {
        total_payments: payments.len(),
        total_payments_ytd: ytd.len(),
        total_payment_amount: total,
        total_payment_amount_ytd: ytd.iter().map(|p| p.credit_amount).sum(),
        average_payment_amount: safe_div(total, Decimal::from(payments.len())),
        payments_this_month: this_month.len(),
        payments_this_month_amount: this_month.iter().map(|p| p.credit_amount).sum(),
        timeliness: aging::payment_timeliness(invoices),
    }
}

struct CustomerFacts {
    name: String,
    is_active: bool,
    is_on_credit_hold: bool,
    credit_limit: Decimal,
    current_balance: Decimal,
    overdue_count: usize,
    overdue_total: Decimal,
}

fn alert_rules() -> AlertEvaluator<CustomerFacts> {
    AlertEvaluator::new(vec![credit_hold, over_credit_limit, overdue_invoices, inactive])
}

fn credit_hold(f: &CustomerFacts) -> Option<AlertDraft> {
    f.is_on_credit_hold.then(|| {
        AlertDraft::new(
            Severity::Critical,
            "Credit Hold",
            format!("Customer {} is on credit hold", f.name),
        )
    })
}

fn over_credit_limit(f: &CustomerFacts) -> Option<AlertDraft> {
    (f.credit_limit > Decimal::ZERO && f.current_balance > f.credit_limit).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Over Credit Limit",
            format!("Customer exceeds credit limit by {:.2}", f.current_balance - f.credit_limit),
        )
    })
}

fn overdue_invoices(f: &CustomerFacts) -> Option<AlertDraft> {
    (f.overdue_count > 0).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Overdue Invoices",
            format!("{} overdue invoices totaling {:.2}", f.overdue_count, f.overdue_total),
        )
    })
}

fn inactive(f: &CustomerFacts) -> Option<AlertDraft> {
    (!f.is_active).then(|| {
        AlertDraft::new(
            Severity::Info,
            "Inactive Customer",
            format!("Customer {} is currently inactive", f.name),
        )
    })
}
