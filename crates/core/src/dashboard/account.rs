use super::error::not_found;
use super::{Calendar, SubjectKind, PERFORMANCE_MONTHS, RECENT_ITEMS, TREND_MONTHS};
use crate::analytics::alerts::{AlertDraft, AlertEvaluator};
use crate::analytics::compare::{compare_magnitude, monthly_performance};
use crate::analytics::trend::TrendSeriesBuilder;
use crate::analytics::{average, ratio_percent};
use crate::domain::metrics::{Alert, ComparisonResult, MonthlyComparison, Severity, TrendPoint};
use crate::domain::records::MovementRecord;
use crate::domain::subjects::ChartOfAccount;
use crate::repo::AccountingRepository;
use crate::time::period::days_between;
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOP_SUB_ACCOUNTS: usize = 5;
const DORMANT_AFTER_DAYS: i64 = 90;
const SIGNIFICANT_YTD_CHANGE: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

/// Historical balances are back-solved from the current balance and the postings since each anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceMetrics {
    pub current_balance: Decimal,
    pub beginning_of_year_balance: Decimal,
    pub ytd_debits: Decimal,
    pub ytd_credits: Decimal,
    pub ytd_net_change: Decimal,
    pub last_month_balance: Decimal,
    pub last_year_balance: Decimal,
    pub change_vs_last_year: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetrics {
    pub total_transactions: usize,
    pub transactions_ytd: usize,
    pub transactions_this_month: usize,
    pub transactions_last_month: usize,
    pub average_transaction_amount: Decimal,
    pub largest_debit: Decimal,
    pub largest_credit: Decimal,
    pub last_transaction_date: Option<NaiveDate>,
    /// Zero when the account has never been posted to.
    pub days_since_last_transaction: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccountInfo {
    pub id: Uuid,
    pub account_code: String,
    pub account_name: String,
    pub balance: Decimal,
    pub percent_of_parent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccountSummary {
    pub total_sub_accounts: usize,
    pub active_sub_accounts: usize,
    pub combined_balance: Decimal,
    /// Largest by absolute balance.
    pub top_sub_accounts: Vec<SubAccountInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodActivity {
    pub period_start: NaiveDate,
    pub label: String,
    pub amount: Decimal,
    pub percent_of_total: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPosting {
    pub id: Uuid,
    pub date: NaiveDate,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDashboard {
    pub account: ChartOfAccount,
    pub as_of: NaiveDate,
    pub balance: BalanceMetrics,
    pub activity: ActivityMetrics,
    /// Present for control accounts only.
    pub sub_accounts: Option<SubAccountSummary>,
    pub balance_trend: Vec<TrendPoint>,
    pub debit_trend: Vec<TrendPoint>,
    pub credit_trend: Vec<TrendPoint>,
    pub period_activity: Vec<PeriodActivity>,
    pub recent_postings: Vec<RecentPosting>,
    pub monthly_performance: Vec<MonthlyComparison>,
    pub alerts: Vec<Alert>,
}

pub async fn build(
    repo: &dyn AccountingRepository,
    account_id: Uuid,
    as_of: NaiveDate,
) -> anyhow::Result<AccountDashboard> {
    let (account, lines, subs) = tokio::try_join!(
        repo.get_account(account_id),
        repo.list_journal_lines_by_account(account_id, None),
        repo.list_sub_accounts(account_id),
    )?;
    let account = account.ok_or_else(|| not_found(SubjectKind::ChartOfAccount, account_id))?;

    Ok(assemble(account, &lines, &subs, as_of))
}

fn assemble(
    account: ChartOfAccount,
    lines: &[MovementRecord],
    subs: &[ChartOfAccount],
    as_of: NaiveDate,
) -> AccountDashboard {
    let cal = Calendar::new(as_of);
    let trend = TrendSeriesBuilder::monthly(TREND_MONTHS, as_of);
    let balance = balance_metrics(&account, lines, &cal);

    let mut recent: Vec<&MovementRecord> = lines.iter().collect();
    recent.sort_by(|a, b| b.occurred_date.cmp(&a.occurred_date));
    let recent_postings = recent
        .into_iter()
        .take(RECENT_ITEMS)
        .map(|l| RecentPosting {
            id: l.id,
            date: l.occurred_date,
            debit_amount: l.debit_amount,
            credit_amount: l.credit_amount,
        })
        .collect();

    let dormant_since = as_of - Duration::days(DORMANT_AFTER_DAYS);
    let facts = AccountFacts {
        code: account.account_code.clone(),
        name: account.account_name.clone(),
        is_active: account.is_active,
        is_control_account: account.is_control_account,
        posting_count: lines.len(),
        recent_postings: lines.iter().filter(|l| l.occurred_date >= dormant_since).count(),
        ytd_net_change: balance.ytd_net_change,
    };

    AccountDashboard {
        as_of,
        activity: activity_metrics(lines, &cal),
        sub_accounts: account
            .is_control_account
            .then(|| sub_account_summary(subs, account.balance)),
        balance_trend: trend.running_balance(account.balance, lines, |l| l.occurred_date, |l| l.net()),
        debit_trend: trend.sum_by(lines, |l| l.occurred_date, |l| l.debit_amount),
        credit_trend: trend.sum_by(lines, |l| l.occurred_date, |l| l.credit_amount),
        period_activity: period_activity(lines, as_of),
        recent_postings,
        monthly_performance: monthly_performance(
            lines,
            |l| l.occurred_date,
            |l| l.gross(),
            PERFORMANCE_MONTHS,
            as_of,
        ),
        alerts: alert_rules().evaluate(account.id, &facts).alerts,
        balance,
        account,
    }
}

fn net_since(lines: &[MovementRecord], since: NaiveDate) -> Decimal {
    lines
        .iter()
        .filter(|l| l.occurred_date >= since)
        .map(|l| l.net())
        .sum()
}

fn balance_metrics(account: &ChartOfAccount, lines: &[MovementRecord], cal: &Calendar) -> BalanceMetrics {
    let ytd: Vec<&MovementRecord> = lines.iter().filter(|l| cal.in_ytd(l.occurred_date)).collect();
    let ytd_debits: Decimal = ytd.iter().map(|l| l.debit_amount).sum();
    let ytd_credits: Decimal = ytd.iter().map(|l| l.credit_amount).sum();
    let ytd_net_change = ytd_debits - ytd_credits;

    let last_year_balance = account.balance - net_since(lines, cal.last_year.start);
    BalanceMetrics {
        current_balance: account.balance,
        beginning_of_year_balance: account.balance - ytd_net_change,
        ytd_debits,
        ytd_credits,
        ytd_net_change,
        last_month_balance: account.balance - net_since(lines, cal.this_month.start),
        last_year_balance,
        change_vs_last_year: compare_magnitude(account.balance, last_year_balance),
    }
}

fn activity_metrics(lines: &[MovementRecord], cal: &Calendar) -> ActivityMetrics {
    let last_transaction_date = lines.iter().map(|l| l.occurred_date).max();
    ActivityMetrics {
        total_transactions: lines.len(),
        transactions_ytd: lines.iter().filter(|l| cal.in_ytd(l.occurred_date)).count(),
        transactions_this_month: lines
            .iter()
            .filter(|l| l.occurred_date >= cal.this_month.start)
            .count(),
        transactions_last_month: lines
            .iter()
            .filter(|l| cal.last_month.contains(l.occurred_date))
            .count(),
        average_transaction_amount: average(lines.iter().map(|l| l.net().abs())),
        largest_debit: lines.iter().map(|l| l.debit_amount).max().unwrap_or(Decimal::ZERO),
        largest_credit: lines.iter().map(|l| l.credit_amount).max().unwrap_or(Decimal::ZERO),
        last_transaction_date,
        days_since_last_transaction: last_transaction_date
            .map(|d| days_between(d, cal.as_of))
            .unwrap_or(0),
    }
}

fn sub_account_summary(subs: &[ChartOfAccount], parent_balance: Decimal) -> SubAccountSummary {
    let mut ranked: Vec<&ChartOfAccount> = subs.iter().collect();
    ranked.sort_by(|a, b| b.balance.abs().cmp(&a.balance.abs()));

    SubAccountSummary {
        total_sub_accounts: subs.len(),
        active_sub_accounts: subs.iter().filter(|s| s.is_active).count(),
        combined_balance: subs.iter().map(|s| s.balance).sum(),
        top_sub_accounts: ranked
            .into_iter()
            .take(TOP_SUB_ACCOUNTS)
            .map(|s| SubAccountInfo {
                id: s.id,
                account_code: s.account_code.clone(),
                account_name: s.account_name.clone(),
                balance: s.balance,
                percent_of_parent: ratio_percent(s.balance, parent_balance.abs()),
            })
            .collect(),
    }
}

fn period_activity(lines: &[MovementRecord], as_of: NaiveDate) -> Vec<PeriodActivity> {
    let builder = TrendSeriesBuilder::monthly(PERFORMANCE_MONTHS, as_of);
    let total: Decimal = lines.iter().map(|l| l.gross()).sum();
    let amounts = builder.sum_by(lines, |l| l.occurred_date, |l| l.gross());
    let counts = builder.count_by(lines, |l| l.occurred_date);

    amounts
        .into_iter()
        .zip(counts)
        .map(|(amount, count)| PeriodActivity {
            period_start: amount.period_start,
            percent_of_total: ratio_percent(amount.value, total),
            amount: amount.value,
            transaction_count: count.value.to_usize().unwrap_or(0),
            label: amount.label,
        })
        .collect()
}

struct AccountFacts {
    code: String,
    name: String,
    is_active: bool,
    is_control_account: bool,
    posting_count: usize,
    recent_postings: usize,
    ytd_net_change: Decimal,
}

fn alert_rules() -> AlertEvaluator<AccountFacts> {
    AlertEvaluator::new(vec![inactive, control_postings, dormant, significant_change])
}

fn inactive(f: &AccountFacts) -> Option<AlertDraft> {
    (!f.is_active).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Inactive Account",
            format!("Account {} - {} is inactive", f.code, f.name),
        )
    })
}

fn control_postings(f: &AccountFacts) -> Option<AlertDraft> {
    (f.is_control_account && f.posting_count > 0).then(|| {
        AlertDraft::new(
            Severity::Info,
            "Control Account Postings",
            format!("Control account has {} direct postings", f.posting_count),
        )
    })
}

fn dormant(f: &AccountFacts) -> Option<AlertDraft> {
    (f.is_active && f.posting_count > 0 && f.recent_postings == 0).then(|| {
        AlertDraft::new(
            Severity::Info,
            "No Recent Activity",
            format!("Account has no activity in the last {DORMANT_AFTER_DAYS} days"),
        )
    })
}

fn significant_change(f: &AccountFacts) -> Option<AlertDraft> {
    (f.ytd_net_change.abs() > SIGNIFICANT_YTD_CHANGE).then(|| {
        AlertDraft::new(
            Severity::Info,
            "Significant Balance Change",
            format!("YTD net change of {:.2}", f.ytd_net_change),
        )
    })
}
