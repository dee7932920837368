use super::error::not_found;
use super::{Calendar, SubjectKind, PERFORMANCE_MONTHS, TREND_MONTHS};
use crate::analytics::alerts::{AlertDraft, AlertEvaluator};
use crate::analytics::compare::{compare, monthly_performance};
use crate::analytics::trend::TrendSeriesBuilder;
use crate::analytics::{average, ratio_percent, safe_div};
use crate::domain::metrics::{Alert, ComparisonResult, MonthlyComparison, Severity, TrendPoint};
use crate::domain::records::CostEntry;
use crate::domain::subjects::{Project, ProjectStatus};
use crate::repo::AccountingRepository;
use crate::time::period::days_between;
use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const TOP_CATEGORIES: usize = 10;
const NEAR_BUDGET_PERCENT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);
const STALE_AFTER_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetMetrics {
    pub budgeted_amount: Decimal,
    pub actual_cost: Decimal,
    pub actual_revenue: Decimal,
    pub remaining_budget: Decimal,
    pub budget_utilization: Decimal,
    pub cost_variance_percent: Decimal,
    pub gross_margin: Decimal,
    pub gross_margin_percent: Decimal,
    pub is_over_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostMetrics {
    pub total_entries: usize,
    pub this_month_vs_last: ComparisonResult,
    pub entries_this_month: usize,
    pub entries_last_month: usize,
    pub average_entry: Decimal,
    pub largest_entry: Decimal,
    pub approved_entries: usize,
    pub pending_entries: usize,
    pub billable_entries: usize,
    pub billable_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineMetrics {
    pub days_active: i64,
    /// Zero without an end date; negative once the end date has passed.
    pub days_remaining: i64,
    pub percent_complete: Decimal,
    pub burn_rate: Decimal,
    pub estimated_days_to_completion: i64,
    pub estimated_completion_date: Option<NaiveDate>,
    pub is_on_schedule: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub entry_count: usize,
    pub total_amount: Decimal,
    pub percent_of_total: Decimal,
    pub average_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDashboard {
    pub project: Project,
    pub as_of: NaiveDate,
    pub budget: BudgetMetrics,
    pub costs: CostMetrics,
    pub timeline: TimelineMetrics,
    pub cost_trend: Vec<TrendPoint>,
    /// Cumulative in-window cost as a share of budget, capped at 100.
    pub budget_utilization_trend: Vec<TrendPoint>,
    pub cost_by_category: Vec<CategoryBreakdown>,
    pub monthly_performance: Vec<MonthlyComparison>,
    pub alerts: Vec<Alert>,
}

pub async fn build(
    repo: &dyn AccountingRepository,
    project_id: Uuid,
    as_of: NaiveDate,
) -> anyhow::Result<ProjectDashboard> {
    let (project, entries) = tokio::try_join!(
        repo.get_project(project_id),
        repo.list_cost_entries_by_project(project_id, None),
    )?;
    let project = project.ok_or_else(|| not_found(SubjectKind::Project, project_id))?;

    Ok(assemble(project, &entries, as_of))
}

fn assemble(project: Project, entries: &[CostEntry], as_of: NaiveDate) -> ProjectDashboard {
    let cal = Calendar::new(as_of);
    let trend = TrendSeriesBuilder::monthly(TREND_MONTHS, as_of);
    let budget = project.budgeted_amount;

    let budget_utilization_trend = trend
        .cumulative_by(entries, |c| c.entry_date, |c| c.amount)
        .into_iter()
        .map(|mut p| {
            p.value = ratio_percent(p.value, budget).min(Decimal::ONE_HUNDRED);
            p
        })
        .collect();

    let stale_since = as_of - Duration::days(STALE_AFTER_DAYS);
    let facts = ProjectFacts {
        budgeted_amount: project.budgeted_amount,
        actual_cost: project.actual_cost,
        status: project.status,
        entry_count: entries.len(),
        pending_approvals: entries.iter().filter(|c| !c.is_approved).count(),
        recent_entries: entries.iter().filter(|c| c.entry_date >= stale_since).count(),
    };

    ProjectDashboard {
        as_of,
        budget: budget_metrics(&project, entries),
        costs: cost_metrics(entries, &cal),
        timeline: timeline_metrics(&project, as_of),
        cost_trend: trend.sum_by(entries, |c| c.entry_date, |c| c.amount),
        budget_utilization_trend,
        cost_by_category: category_breakdown(entries),
        monthly_performance: monthly_performance(
            entries,
            |c| c.entry_date,
            |c| c.amount,
            PERFORMANCE_MONTHS,
            as_of,
        ),
        alerts: alert_rules().evaluate(project.id, &facts).alerts,
        project,
    }
}

fn budget_metrics(project: &Project, entries: &[CostEntry]) -> BudgetMetrics {
    let recorded: Decimal = entries.iter().map(|c| c.amount).sum();
    let variance = project.budgeted_amount - recorded;
    let gross_margin = project.actual_revenue - project.actual_cost;
    BudgetMetrics {
        budgeted_amount: project.budgeted_amount,
        actual_cost: project.actual_cost,
        actual_revenue: project.actual_revenue,
        remaining_budget: variance,
        budget_utilization: ratio_percent(recorded, project.budgeted_amount),
        cost_variance_percent: ratio_percent(variance, project.budgeted_amount),
        gross_margin,
        gross_margin_percent: ratio_percent(gross_margin, project.actual_revenue),
        is_over_budget: recorded > project.budgeted_amount,
    }
}

fn cost_metrics(entries: &[CostEntry], cal: &Calendar) -> CostMetrics {
    let this_month: Vec<&CostEntry> = entries
        .iter()
        .filter(|c| cal.this_month.contains(c.entry_date))
        .collect();
    let last_month: Vec<&CostEntry> = entries
        .iter()
        .filter(|c| cal.last_month.contains(c.entry_date))
        .collect();
    let billable: Vec<&CostEntry> = entries.iter().filter(|c| c.is_billable).collect();

    CostMetrics {
        total_entries: entries.len(),
        this_month_vs_last: compare(
            this_month.iter().map(|c| c.amount).sum(),
            last_month.iter().map(|c| c.amount).sum(),
        ),
        entries_this_month: this_month.len(),
        entries_last_month: last_month.len(),
        average_entry: average(entries.iter().map(|c| c.amount)),
        largest_entry: entries.iter().map(|c| c.amount).max().unwrap_or(Decimal::ZERO),
        approved_entries: entries.iter().filter(|c| c.is_approved).count(),
        pending_entries: entries.iter().filter(|c| !c.is_approved).count(),
        billable_entries: billable.len(),
        billable_amount: billable.iter().map(|c| c.amount).sum(),
    }
}

fn timeline_metrics(project: &Project, as_of: NaiveDate) -> TimelineMetrics {
    let days_active = days_between(project.start_date, as_of);
    let burn_rate = safe_div(project.actual_cost, Decimal::from(days_active));
    let remaining = project.budgeted_amount - project.actual_cost;
    let estimated_days = if burn_rate > Decimal::ZERO {
        safe_div(remaining, burn_rate).trunc().to_i64().unwrap_or(0)
    } else {
        0
    };
    let estimated_completion_date = (burn_rate > Decimal::ZERO && remaining > Decimal::ZERO)
        .then(|| as_of.checked_add_signed(Duration::days(estimated_days)))
        .flatten();

    let (days_remaining, is_on_schedule) = match project.end_date {
        Some(end) => {
            let left = days_between(as_of, end);
            (left, estimated_days <= left || left < 0)
        }
        None => (0, true),
    };

    TimelineMetrics {
        days_active,
        days_remaining,
        percent_complete: ratio_percent(project.actual_cost, project.budgeted_amount).min(Decimal::ONE_HUNDRED),
        burn_rate,
        estimated_days_to_completion: estimated_days,
        estimated_completion_date,
        is_on_schedule,
    }
}

fn category_breakdown(entries: &[CostEntry]) -> Vec<CategoryBreakdown> {
    let total: Decimal = entries.iter().map(|c| c.amount).sum();
    let mut groups: HashMap<&str, Vec<Decimal>> = HashMap::new();
    for c in entries {
        let key = c.category.as_deref().unwrap_or("Uncategorized");
        groups.entry(key).or_default().push(c.amount);
    }

    let mut rows: Vec<CategoryBreakdown> = groups
        .into_iter()
        .map(|(category, amounts)| {
            let sum: Decimal = amounts.iter().copied().sum();
            CategoryBreakdown {
                category: category.to_string(),
                entry_count: amounts.len(),
                total_amount: sum,
                percent_of_total: ratio_percent(sum, total),
                average_amount: average(amounts),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.category.cmp(&b.category))
    });
    rows.truncate(TOP_CATEGORIES);
    rows
}

struct ProjectFacts {
    budgeted_amount: Decimal,
    actual_cost: Decimal,
    status: ProjectStatus,
    entry_count: usize,
    pending_approvals: usize,
    recent_entries: usize,
}

impl ProjectFacts {
    fn utilization(&self) -> Decimal {
        ratio_percent(self.actual_cost, self.budgeted_amount)
    }
}

fn alert_rules() -> AlertEvaluator<ProjectFacts> {
    AlertEvaluator::new(vec![over_budget, near_budget, pending_approvals, on_hold, no_recent_activity])
}

fn over_budget(f: &ProjectFacts) -> Option<AlertDraft> {
    (f.actual_cost > f.budgeted_amount).then(|| {
        AlertDraft::new(
            Severity::Critical,
            "Over Budget",
            format!("Project is over budget by {:.2}", f.actual_cost - f.budgeted_amount),
        )
    })
}

fn near_budget(f: &ProjectFacts) -> Option<AlertDraft> {
    let u = f.utilization();
    (u >= NEAR_BUDGET_PERCENT && u < Decimal::ONE_HUNDRED).then(|| {
        AlertDraft::new(
            Severity::Warning,
            "Near Budget Limit",
            format!("Project has used {:.1}% of budget", u.round_dp(1)),
        )
    })
}

fn pending_approvals(f: &ProjectFacts) -> Option<AlertDraft> {
    (f.pending_approvals > 0).then(|| {
        AlertDraft::new(
            Severity::Info,
            "Pending Approvals",
            format!("{} cost entries pending approval", f.pending_approvals),
        )
    })
}

fn on_hold(f: &ProjectFacts) -> Option<AlertDraft> {
    (f.status == ProjectStatus::OnHold)
        .then(|| AlertDraft::new(Severity::Warning, "Project On Hold", "Project is currently on hold"))
}

fn no_recent_activity(f: &ProjectFacts) -> Option<AlertDraft> {
    (f.status == ProjectStatus::Active && f.entry_count > 0 && f.recent_entries == 0).then(|| {
        AlertDraft::new(
            Severity::Info,
            "No Recent Activity",
            format!("No cost entries in the last {STALE_AFTER_DAYS} days"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::testkit::{cost, d, project};
    use crate::repo::InMemoryRepository;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn budget_and_category_metrics() {
        let as_of = d(2026, 5, 20);
        let p = project(ProjectStatus::Active, d(2026, 1, 1), dec!(10000), dec!(8500));
        let repo = InMemoryRepository {
            cost_entries: vec![
                cost(p.id, d(2026, 4, 10), dec!(4000), "Labor", true),
                cost(p.id, d(2026, 5, 5), dec!(3000), "Labor", true),
                cost(p.id, d(2026, 5, 6), dec!(1500), "Materials", false),
            ],
            projects: vec![p.clone()],
            ..Default::default()
        };

        let dash = build(&repo, p.id, as_of).await.unwrap();

        assert_eq!(dash.budget.budget_utilization, dec!(85));
        assert!(!dash.budget.is_over_budget);
        assert_eq!(dash.costs.this_month_vs_last.current_value, dec!(4500));
        assert_eq!(dash.costs.this_month_vs_last.change_percent, dec!(12.5));
        assert_eq!(dash.costs.largest_entry, dec!(4000));
        assert_eq!(dash.cost_by_category[0].category, "Labor");
        assert_eq!(dash.cost_by_category[0].entry_count, 2);
        assert_eq!(dash.cost_by_category[1].category, "Materials");
        assert_eq!(dash.budget_utilization_trend.last().unwrap().value, dec!(85));

        let titles: Vec<&str> = dash.alerts.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Near Budget Limit", "Pending Approvals"]);
        assert_eq!(dash.alerts[0].description, "Project has used 85.0% of budget");
    }

    #[test]
    fn utilization_trend_is_capped() {
        let p = project(ProjectStatus::Active, d(2026, 1, 1), dec!(1000), dec!(1800));
        let entries = vec![cost(p.id, d(2026, 2, 1), dec!(1800), "Labor", true)];
        let dash = assemble(p, &entries, d(2026, 6, 1));

        assert!(dash.budget_utilization_trend.iter().all(|pt| pt.value <= dec!(100)));
        assert_eq!(dash.budget_utilization_trend.last().unwrap().value, dec!(100));
        assert_eq!(dash.alerts[0].severity, Severity::Critical);
        // active with entries but nothing in the last 30 days
        assert_eq!(dash.alerts.last().unwrap().title, "No Recent Activity");
    }

    #[test]
    fn timeline_estimates_completion() {
        let p = project(ProjectStatus::Active, d(2026, 1, 1), dec!(2000), dec!(1000));
        let t = timeline_metrics(&p, d(2026, 1, 11));
        assert_eq!(t.days_active, 10);
        assert_eq!(t.burn_rate, dec!(100));
        assert_eq!(t.estimated_days_to_completion, 10);
        assert_eq!(t.estimated_completion_date, Some(d(2026, 1, 21)));
        assert_eq!(t.percent_complete, dec!(50));
    }

    #[test]
    fn zero_budget_is_guarded() {
        let p = project(ProjectStatus::Planning, d(2026, 3, 1), Decimal::ZERO, Decimal::ZERO);
        let dash = assemble(p, &[], d(2026, 3, 1));
        assert_eq!(dash.budget.budget_utilization, Decimal::ZERO);
        assert_eq!(dash.timeline.burn_rate, Decimal::ZERO);
        assert!(dash.cost_by_category.is_empty());
        assert!(dash.alerts.is_empty());
    }
}
