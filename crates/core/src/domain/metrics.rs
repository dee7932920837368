use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgingLabel {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingLabel {
    pub const ALL: [AgingLabel; 5] = [
        AgingLabel::Current,
        AgingLabel::Days1To30,
        AgingLabel::Days31To60,
        AgingLabel::Days61To90,
        AgingLabel::Over90,
    ];

    /// Ascending threshold ladder; `days_past_due <= 0` is current.
    pub fn for_days_past_due(days_past_due: i64) -> Self {
        match days_past_due {
            d if d <= 0 => AgingLabel::Current,
            1..=30 => AgingLabel::Days1To30,
            31..=60 => AgingLabel::Days31To60,
            61..=90 => AgingLabel::Days61To90,
            _ => AgingLabel::Over90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingBucket {
    pub label: AgingLabel,
    pub amount: Decimal,
}

/// Outstanding balances split by how overdue they are. Buckets are always the five labels in
/// ladder order, zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub buckets: Vec<AgingBucket>,
    pub total: Decimal,
}

impl AgingReport {
    pub fn amount(&self, label: AgingLabel) -> Decimal {
        self.buckets
            .iter()
            .find(|b| b.label == label)
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn past_due(&self) -> Decimal {
        self.total - self.amount(AgingLabel::Current)
    }
}

/// Portfolio-at-risk tiers and delinquency figures. PAR values and `write_off_rate` are
/// percentages (0..=100).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub par1: Decimal,
    pub par30: Decimal,
    pub par60: Decimal,
    pub par90: Decimal,
    pub write_off_rate: Decimal,
    pub written_off_amount: Decimal,
    pub written_off_count: usize,
    pub arrears_amount: Decimal,
    pub arrears_count: usize,
    pub total_outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub value: Decimal,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub current_value: Decimal,
    pub previous_value: Decimal,
    pub change_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyComparison {
    pub period_start: NaiveDate,
    pub month: String,
    pub year: i32,
    pub comparison: ComparisonResult,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub subject_id: Uuid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

/// Alerts as shown on a dashboard (capped, declaration order) plus severity tallies over every
/// rule that fired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub alerts: Vec<Alert>,
    pub counts: SeverityCounts,
}
