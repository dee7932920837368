use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Overdue,
    Paid,
    Cancelled,
}

impl ObligationStatus {
    /// Paid and cancelled obligations carry no collectible balance.
    pub fn is_settled(self) -> bool {
        matches!(self, ObligationStatus::Paid | ObligationStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObligationStatus::Draft => "draft",
            ObligationStatus::Sent => "sent",
            ObligationStatus::PartiallyPaid => "partially_paid",
            ObligationStatus::Overdue => "overdue",
            ObligationStatus::Paid => "paid",
            ObligationStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ObligationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "draft" => ObligationStatus::Draft,
            "sent" | "open" | "pending" | "approved" => ObligationStatus::Sent,
            "partially_paid" | "partiallypaid" | "partial" => ObligationStatus::PartiallyPaid,
            "overdue" => ObligationStatus::Overdue,
            "paid" => ObligationStatus::Paid,
            "cancelled" | "canceled" | "void" => ObligationStatus::Cancelled,
            other => anyhow::bail!("unknown obligation status: {other}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ObligationStatus,
    #[serde(default)]
    pub settled_date: Option<NaiveDate>,
}

impl Obligation {
    /// Negative when overpaid; callers let it offset other balances.
    pub fn balance(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_settled()
    }

    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.is_open() && self.due_date < as_of
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub occurred_date: NaiveDate,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
}

impl MovementRecord {
    pub fn net(&self) -> Decimal {
        self.debit_amount - self.credit_amount
    }

    pub fn gross(&self) -> Decimal {
        self.debit_amount + self.credit_amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    Approved,
    Disbursed,
    Closed,
    Rejected,
    WrittenOff,
}

impl LoanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Disbursed => "disbursed",
            LoanStatus::Closed => "closed",
            LoanStatus::Rejected => "rejected",
            LoanStatus::WrittenOff => "written_off",
        }
    }
}

impl FromStr for LoanStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pending" => LoanStatus::Pending,
            "approved" => LoanStatus::Approved,
            "disbursed" | "active" => LoanStatus::Disbursed,
            "closed" => LoanStatus::Closed,
            "rejected" => LoanStatus::Rejected,
            "written_off" | "writtenoff" => LoanStatus::WrittenOff,
            other => anyhow::bail!("unknown loan status: {other}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub product_id: Uuid,
    pub member_id: Uuid,
    pub status: LoanStatus,
    pub principal_amount: Decimal,
    pub outstanding_principal: Decimal,
    pub outstanding_interest: Decimal,
    pub interest_rate: Decimal,
    pub term_months: i32,
    pub application_date: NaiveDate,
    #[serde(default)]
    pub disbursement_date: Option<NaiveDate>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Disbursed
    }

    pub fn outstanding_total(&self) -> Decimal {
        self.outstanding_principal + self.outstanding_interest
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleLine {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub is_paid: bool,
}

impl ScheduleLine {
    pub fn unpaid_amount(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }

    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_paid && self.due_date < as_of
    }

    pub fn to_obligation(&self) -> Obligation {
        let status = if self.is_paid {
            ObligationStatus::Paid
        } else if self.paid_amount > Decimal::ZERO {
            ObligationStatus::PartiallyPaid
        } else {
            ObligationStatus::Sent
        };
        Obligation {
            id: self.id,
            subject_id: self.loan_id,
            issue_date: self.due_date,
            due_date: self.due_date,
            total_amount: self.total_amount,
            paid_amount: self.paid_amount,
            status,
            settled_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    pub entry_date: NaiveDate,
    pub amount: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    pub is_approved: bool,
    pub is_billable: bool,
}
