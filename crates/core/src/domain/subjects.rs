use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub customer_number: String,
    pub name: String,
    pub is_active: bool,
    pub is_on_credit_hold: bool,
    pub credit_limit: Decimal,
    pub current_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: Uuid,
    pub vendor_code: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub interest_rate: Decimal,
    pub min_loan_amount: Decimal,
    pub max_loan_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub employee_number: String,
    pub full_name: String,
    pub status: String,
    pub joining_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl FromStr for ProjectStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "planning" | "draft" => ProjectStatus::Planning,
            "active" | "inprogress" => ProjectStatus::Active,
            "onhold" => ProjectStatus::OnHold,
            "completed" | "closed" => ProjectStatus::Completed,
            "cancelled" | "canceled" => ProjectStatus::Cancelled,
            _ => anyhow::bail!("unknown project status: {s}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub budgeted_amount: Decimal,
    pub actual_cost: Decimal,
    pub actual_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOfAccount {
    pub id: Uuid,
    pub account_code: String,
    pub account_name: String,
    pub is_active: bool,
    pub is_control_account: bool,
    #[serde(default)]
    pub parent_account_id: Option<Uuid>,
    pub balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_status_accepts_display_spellings() {
        assert_eq!("On Hold".parse::<ProjectStatus>().unwrap(), ProjectStatus::OnHold);
        assert_eq!("in_progress".parse::<ProjectStatus>().unwrap(), ProjectStatus::Active);
        assert!("archived".parse::<ProjectStatus>().is_err());
    }
}
